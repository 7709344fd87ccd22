use std::io;
use std::sync::Arc;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by `Dialer::dial`.
///
/// Every variant is terminal for the attempt; nothing here is retried internally.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Raw connection or TLS setup failed.
    #[error("failed to dial {dest}: {source}")]
    Dial {
        dest: String,
        #[source]
        source: io::Error,
    },

    /// The upgrade request could not be written to the connection.
    #[error("failed to write upgrade request to {dest}: {source}")]
    Write {
        dest: String,
        #[source]
        source: io::Error,
    },

    /// The reply could not be read or parsed as an HTTP response.
    #[error("malformed upgrade response from {dest}: {source}")]
    MalformedResponse {
        dest: String,
        #[source]
        source: HandshakeError,
    },

    /// The reply parsed, but is not a `101 Switching Protocols` websocket upgrade.
    #[error("upgrade rejected by {dest}: {source}")]
    UnrecognizedReply {
        dest: String,
        #[source]
        source: HandshakeError,
    },
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Dial { source, .. } | Error::Write { source, .. } => source.kind(),
            Error::MalformedResponse { .. } | Error::UnrecognizedReply { .. } => {
                io::ErrorKind::InvalidData
            }
        };
        io::Error::new(kind, err)
    }
}

/// Coarse classification of an `Error` or `HandshakeError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Dial,
    Write,
    MalformedResponse,
    UnrecognizedReply,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            Dial { .. } => ErrorKind::Dial,
            Write { .. } => ErrorKind::Write,
            MalformedResponse { .. } => ErrorKind::MalformedResponse,
            UnrecognizedReply { .. } => ErrorKind::UnrecognizedReply,
        }
    }

    /// The destination the failed attempt was dialing.
    pub fn destination(&self) -> &str {
        use Error::*;
        match self {
            Dial { dest, .. }
            | Write { dest, .. }
            | MalformedResponse { dest, .. }
            | UnrecognizedReply { dest, .. } => dest,
        }
    }

    pub(crate) fn dial<D: ToString>(dest: &D, source: io::Error) -> Self {
        Error::Dial {
            dest: dest.to_string(),
            source,
        }
    }

    pub(crate) fn write<D: ToString>(dest: &D, source: io::Error) -> Self {
        Error::Write {
            dest: dest.to_string(),
            source,
        }
    }

    pub(crate) fn handshake<D: ToString>(dest: &D, source: HandshakeError) -> Self {
        let dest = dest.to_string();
        match source.kind() {
            ErrorKind::UnrecognizedReply => Error::UnrecognizedReply { dest, source },
            _ => Error::MalformedResponse { dest, source },
        }
    }
}

/// Failure of the first-read validation.
///
/// A `HandshakeConnection` keeps this once validation fails and hands out a clone on every later
/// call, wrapped in an `io::Error`. Use `HandshakeError::from_io` to get it back.
#[derive(ThisError, Debug, Clone)]
pub enum HandshakeError {
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("connection failed while reading response: {0}")]
    Io(Arc<io::Error>),

    #[error("unrecognized reply: {0}")]
    UnrecognizedReply(String),
}

impl HandshakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandshakeError::UnrecognizedReply(_) => ErrorKind::UnrecognizedReply,
            HandshakeError::Malformed(_) | HandshakeError::Io(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Recover the handshake failure carried by an `io::Error` from a `HandshakeConnection`.
    pub fn from_io(err: &io::Error) -> Option<&HandshakeError> {
        err.get_ref()?.downcast_ref::<HandshakeError>()
    }

    pub(crate) fn to_io(&self) -> io::Error {
        let kind = match self {
            HandshakeError::Io(err) => err.kind(),
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, self.clone())
    }
}

pub(crate) fn malformed<S: Into<String>>(msg: S) -> HandshakeError {
    HandshakeError::Malformed(msg.into())
}

pub(crate) fn malformed_err<E: std::fmt::Display>(err: E) -> HandshakeError {
    HandshakeError::Malformed(err.to_string())
}

pub(crate) fn unrecognized<S: Into<String>>(msg: S) -> HandshakeError {
    HandshakeError::UnrecognizedReply(msg.into())
}

pub(crate) fn io(err: io::Error) -> HandshakeError {
    HandshakeError::Io(Arc::new(err))
}
