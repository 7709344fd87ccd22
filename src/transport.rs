//! Seams to the collaborators this crate does not own: raw socket establishment and TLS.
//!
//! The dialer picks one `Transport` variant per dial, before any I/O happens, and the rest of the
//! connection only sees the resulting stream.

use futures_util::io::{AsyncRead, AsyncWrite};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::destination::Destination;

/// Opens raw byte-stream connections.
///
/// `O` is the socket options type carried in `StreamSettings::socket`. Cancellation and timeouts of
/// the connect belong to the implementation (or to dropping the future).
pub trait Connector<O> {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    fn connect(
        &self,
        dest: &Destination,
        socket: &O,
    ) -> impl Future<Output = io::Result<Self::Stream>>;
}

/// Parameters handed to a `TlsConnector` for one dial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsParams {
    pub server_name: String,
    pub alpn: Vec<String>,
}

/// A TLS client stream that performs its handshake explicitly.
pub trait EmulatedHandshake {
    fn handshake(&mut self) -> impl Future<Output = io::Result<()>>;
}

/// Wraps raw connections in TLS.
///
/// `wrap` returns a stream that handshakes implicitly on first I/O. `wrap_emulated` returns a
/// stream shaped after a client fingerprint; the dialer calls its `handshake` before writing.
pub trait TlsConnector<S> {
    type Stream: AsyncRead + AsyncWrite + Unpin;
    type Emulated: AsyncRead + AsyncWrite + EmulatedHandshake + Unpin;

    fn wrap(&self, conn: S, params: &TlsParams) -> io::Result<Self::Stream>;

    fn wrap_emulated(
        &self,
        conn: S,
        params: &TlsParams,
        fingerprint: &str,
    ) -> io::Result<Self::Emulated>;

    /// Whether `fingerprint` names a known profile. Unknown profiles fall back to plain TLS.
    fn supports_fingerprint(&self, fingerprint: &str) -> bool {
        let _ = fingerprint;
        true
    }
}

/// A `TlsConnector` for dialers without TLS support. Every wrap fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTls;

/// Uninhabited stream type for `NoTls`.
#[derive(Debug)]
pub enum Never {}

impl<S> TlsConnector<S> for NoTls {
    type Stream = Never;
    type Emulated = Never;

    fn wrap(&self, _conn: S, _params: &TlsParams) -> io::Result<Never> {
        Err(unsupported())
    }

    fn wrap_emulated(&self, _conn: S, _params: &TlsParams, _fp: &str) -> io::Result<Never> {
        Err(unsupported())
    }

    fn supports_fingerprint(&self, _fingerprint: &str) -> bool {
        false
    }
}

fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "TLS requested but the dialer has no TLS connector",
    )
}

impl AsyncRead for Never {
    fn poll_read(self: Pin<&mut Self>, _: &mut Context<'_>, _: &mut [u8]) -> Poll<io::Result<usize>> {
        match *self.get_mut() {}
    }
}

impl AsyncWrite for Never {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
        match *self.get_mut() {}
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        match *self.get_mut() {}
    }

    fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        match *self.get_mut() {}
    }
}

impl EmulatedHandshake for Never {
    async fn handshake(&mut self) -> io::Result<()> {
        match *self {}
    }
}

/// The stream a dial ended up with.
#[derive(Debug)]
pub enum Transport<S, T, E> {
    Raw(S),
    Tls(T),
    Emulated(E),
}

impl<S, T, E> Transport<S, T, E> {
    pub fn is_tls(&self) -> bool {
        !matches!(self, Transport::Raw(_))
    }
}

impl<S, T, E> AsyncRead for Transport<S, T, E>
where
    S: AsyncRead + Unpin,
    T: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Raw(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Emulated(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl<S, T, E> AsyncWrite for Transport<S, T, E>
where
    S: AsyncWrite + Unpin,
    T: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Raw(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Emulated(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Raw(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s).poll_flush(cx),
            Transport::Emulated(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Raw(s) => Pin::new(s).poll_close(cx),
            Transport::Tls(s) => Pin::new(s).poll_close(cx),
            Transport::Emulated(s) => Pin::new(s).poll_close(cx),
        }
    }
}
