#![deny(unsafe_code)]

//! # httpupgrade
//!
//! A client-side transport that turns an established byte stream (plain or TLS) into an HTTP/1.1
//! `Upgrade` handshake. After the `101 Switching Protocols` reply is validated, the returned
//! connection is byte-transparent.
//!
//! - `Dialer::dial` connects, optionally layers TLS, writes the upgrade request and hands back a
//! `HandshakeConnection`.
//! - Without early data, `dial` only returns once the reply has been validated.
//! - With early data, `dial` returns as soon as the request is written; the first read validates the
//! reply and yields whatever stream bytes arrived behind it.
//!
//! Raw socket establishment and TLS sessions are supplied by the caller through the `Connector` and
//! `TlsConnector` traits, so the crate runs on any executor that speaks futures-io.

mod config;
mod connection;
mod destination;
mod dialer;
mod error;
mod request;
mod timeout;
pub mod transport;

pub use config::{Config, ConfigBuilder, StreamSettings, TlsSettings};
pub use connection::{validate_response, HandshakeConnection};
pub use destination::{Address, Destination};
pub use dialer::{DialedConnection, Dialer};
pub use error::{Error, ErrorKind, HandshakeError, Result};
pub use request::{Header, UpgradeRequest};
