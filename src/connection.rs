//! The connection returned by a dial.
//!
//! `HandshakeConnection` starts out `Pending`: the upgrade request is on the wire but the reply has
//! not been seen. The first read parses and checks the reply, then the connection is a plain
//! pass-through for the rest of its life. A failed check is sticky.

use futures_util::io::{AsyncRead, AsyncWrite};
use futures_util::ready;
use http::StatusCode;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{self, HandshakeError};
use crate::request::UpgradeRequest;

/// Smallest chunk read from the underlying stream while looking for the reply head.
const MIN_BUFFER_SIZE: usize = 16;
const MAX_HEADERS: usize = 128;
const MAX_HEAD_LENGTH: usize = 8 * 1024;

const SWITCHING_PROTOCOLS_REASON: &str = "Switching Protocols";

#[derive(Debug)]
enum State {
    /// Reply not validated yet. Holds the bytes read so far.
    Pending { head: Vec<u8> },
    /// Reply accepted. `leftover[pos..]` are stream bytes that arrived behind the reply head.
    Validated { leftover: Vec<u8>, pos: usize },
    Failed(HandshakeError),
}

/// A duplex stream whose first read validates the `101 Switching Protocols` reply.
///
/// Single owner: reads must not race each other, nor writes.
#[derive(Debug)]
pub struct HandshakeConnection<S> {
    inner: S,
    request: UpgradeRequest,
    state: State,
}

impl<S> HandshakeConnection<S> {
    /// Wrap a stream on which `request` has already been written.
    pub fn new(inner: S, request: UpgradeRequest) -> Self {
        Self {
            inner,
            request,
            state: State::Pending { head: Vec::new() },
        }
    }

    /// The request that was sent for this connection.
    pub fn request(&self) -> &UpgradeRequest {
        &self.request
    }

    pub fn is_validated(&self) -> bool {
        matches!(self.state, State::Validated { .. })
    }

    /// The failure recorded by validation, if it failed.
    pub fn failure(&self) -> Option<&HandshakeError> {
        match &self.state {
            State::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S> AsyncRead for HandshakeConnection<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match &mut this.state {
            State::Validated { leftover, pos } => {
                if *pos < leftover.len() {
                    return Poll::Ready(Ok(drain(leftover, pos, buf)));
                }
                Pin::new(&mut this.inner).poll_read(cx, buf)
            }
            State::Failed(err) => Poll::Ready(Err(err.to_io())),
            State::Pending { head } => {
                let chunk = buf.len().max(MIN_BUFFER_SIZE);
                match ready!(poll_head(&mut this.inner, head, cx, chunk)) {
                    Ok(len) => {
                        let mut leftover = head.split_off(len);
                        tracing::debug!(
                            target_uri = %String::from_utf8_lossy(&this.request.request_target()),
                            buffered = leftover.len(),
                            "upgrade handshake complete"
                        );
                        // only what was already buffered; no second read in this call
                        let mut pos = 0;
                        let n = drain(&mut leftover, &mut pos, buf);
                        this.state = State::Validated { leftover, pos };
                        if n == 0 && !buf.is_empty() {
                            // Ok(0) would read as EOF to the caller
                            return Pin::new(&mut this.inner).poll_read(cx, buf);
                        }
                        Poll::Ready(Ok(n))
                    }
                    Err(err) => {
                        tracing::debug!(
                            target_uri = %String::from_utf8_lossy(&this.request.request_target()),
                            "upgrade handshake failed: {}",
                            err
                        );
                        let io_err = err.to_io();
                        this.state = State::Failed(err);
                        Poll::Ready(Err(io_err))
                    }
                }
            }
        }
    }
}

impl<S> AsyncWrite for HandshakeConnection<S>
where
    S: AsyncWrite + Unpin,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let State::Failed(err) = &this.state {
            return Poll::Ready(Err(err.to_io()));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let State::Failed(err) = &this.state {
            return Poll::Ready(Err(err.to_io()));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_close(cx)
    }
}

fn drain(leftover: &mut Vec<u8>, pos: &mut usize, buf: &mut [u8]) -> usize {
    let n = std::cmp::min(buf.len(), leftover.len() - *pos);
    buf[..n].copy_from_slice(&leftover[*pos..*pos + n]);
    *pos += n;
    if *pos == leftover.len() {
        leftover.clear();
        leftover.shrink_to_fit();
        *pos = 0;
    }
    n
}

/// Read from `inner` in chunks of at most `chunk` bytes until `head` holds a complete, valid reply
/// head. Returns the head length; anything in `head` past it belongs to the stream.
fn poll_head<S>(
    inner: &mut S,
    head: &mut Vec<u8>,
    cx: &mut Context<'_>,
    chunk: usize,
) -> Poll<Result<usize, HandshakeError>>
where
    S: AsyncRead + Unpin,
{
    loop {
        let start = head.len();
        head.resize(start + chunk, 0);
        let n = match Pin::new(&mut *inner).poll_read(cx, &mut head[start..]) {
            Poll::Ready(Ok(n)) => n,
            Poll::Ready(Err(err)) if err.kind() == io::ErrorKind::Interrupted => {
                head.truncate(start);
                continue;
            }
            Poll::Ready(Err(err)) => {
                head.truncate(start);
                return Poll::Ready(Err(error::io(err)));
            }
            Poll::Pending => {
                head.truncate(start);
                return Poll::Pending;
            }
        };
        head.truncate(start + n);

        if n == 0 {
            return Poll::Ready(Err(error::malformed(
                "connection closed before the response head was complete",
            )));
        }

        match validate_response(head) {
            Ok(Some(len)) => return Poll::Ready(Ok(len)),
            Ok(None) => {}
            Err(err) => return Poll::Ready(Err(err)),
        }

        // Prevent CWE-400 DDOS with large HTTP Headers.
        if head.len() >= MAX_HEAD_LENGTH {
            return Poll::Ready(Err(error::malformed(
                "Head byte length should be less than 8kb",
            )));
        }
    }
}

/// Parse an HTTP/1.x response head from `buf` and check it is a websocket upgrade.
///
/// `Ok(None)` means the head is incomplete. On success returns the head length, so
/// `buf[len..]` is whatever followed it on the wire.
pub fn validate_response(buf: &[u8]) -> Result<Option<usize>, HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut res = httparse::Response::new(&mut headers);

    let len = match res.parse(buf).map_err(error::malformed_err)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let code = res
        .code
        .ok_or_else(|| error::malformed("No status code found"))?;
    let reason = res.reason.unwrap_or("");
    if code != StatusCode::SWITCHING_PROTOCOLS.as_u16() || reason != SWITCHING_PROTOCOLS_REASON {
        return Err(error::unrecognized(format!("status {} {}", code, reason)));
    }

    let upgrade = header_value(res.headers, "Upgrade");
    if !upgrade.map_or(false, |v| v.eq_ignore_ascii_case("websocket")) {
        return Err(error::unrecognized(format!("Upgrade header {:?}", upgrade)));
    }

    let connection = header_value(res.headers, "Connection");
    if !connection.map_or(false, |v| v.eq_ignore_ascii_case("upgrade")) {
        return Err(error::unrecognized(format!(
            "Connection header {:?}",
            connection
        )));
    }

    Ok(Some(len))
}

/// First value of `name`, matched case-insensitively.
fn header_value<'a>(headers: &[httparse::Header<'a>], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .map(str::trim)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    const RESP_101: &[u8] =
        b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";

    #[test]
    fn test_valid_response() {
        assert_eq!(validate_response(RESP_101).unwrap(), Some(RESP_101.len()));

        let mut with_payload = RESP_101.to_vec();
        with_payload.extend_from_slice(b"hello");
        assert_eq!(validate_response(&with_payload).unwrap(), Some(RESP_101.len()));
    }

    #[test]
    fn test_header_values_are_case_insensitive() {
        let resp = b"HTTP/1.1 101 Switching Protocols\r\nupgrade: WebSocket\r\nCONNECTION: UPGRADE\r\n\r\n";
        assert!(validate_response(resp).unwrap().is_some());
    }

    #[test]
    fn test_partial_response() {
        assert_eq!(validate_response(b"HTTP/1.1 101 Switch").unwrap(), None);
        assert_eq!(validate_response(&RESP_101[..RESP_101.len() - 2]).unwrap(), None);
    }

    #[test]
    fn test_wrong_status() {
        let err = validate_response(b"HTTP/1.1 200 OK\r\nUpgrade: websocket\r\nConnection: upgrade\r\n\r\n")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedReply);

        // reason phrase must match too
        let err = validate_response(b"HTTP/1.1 101 OK\r\nUpgrade: websocket\r\nConnection: upgrade\r\n\r\n")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedReply);
    }

    #[test]
    fn test_missing_headers() {
        let err = validate_response(b"HTTP/1.1 101 Switching Protocols\r\nConnection: upgrade\r\n\r\n")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedReply);

        let err = validate_response(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedReply);

        let err = validate_response(
            b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: h2c\r\nConnection: upgrade\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedReply);
    }

    #[test]
    fn test_malformed() {
        let err = validate_response(b"SSH-2.0-OpenSSH\r\n\r\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_drain_keeps_remainder() {
        let mut leftover = b"abcdef".to_vec();
        let mut pos = 0;
        let mut buf = [0u8; 4];

        assert_eq!(drain(&mut leftover, &mut pos, &mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(drain(&mut leftover, &mut pos, &mut [0u8; 0]), 0);
        assert_eq!(drain(&mut leftover, &mut pos, &mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert!(leftover.is_empty());
        assert_eq!(pos, 0);
    }
}
