
use futures::io::{AsyncReadExt, AsyncWriteExt};
use http::uri::Scheme;
use httpupgrade::{Config, Destination, ErrorKind, HandshakeConnection, HandshakeError, UpgradeRequest};
use std::io;

use mock::{Server, RESP_101, RESP_200};

fn connection(server: &Server) -> HandshakeConnection<Server> {
    let req = UpgradeRequest::build(
        &Config::builder().path("/ws").build(),
        &Destination::new("example.com", 80),
        Scheme::HTTP,
    );
    HandshakeConnection::new(server.clone(), req)
}

#[test]
fn test_zero_length_probe_validates() {
    smol::block_on(async {
        let server = Server::new(&[RESP_101]);
        let mut conn = connection(&server);

        assert_eq!(conn.read(&mut [0u8; 0]).await.unwrap(), 0);
        assert!(conn.is_validated());
    });
}

#[test]
fn test_probe_keeps_over_read_bytes() {
    smol::block_on(async {
        // the whole reply and payload arrive in one segment
        let segment = format!("{}0123456789", RESP_101);
        let server = Server::new(&[segment.as_str()]);
        let mut conn = connection(&server);

        assert_eq!(conn.read(&mut [0u8; 0]).await.unwrap(), 0);

        let mut rest = Vec::new();
        conn.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"0123456789");
    });
}

#[test]
fn test_validated_connection_does_not_parse_again() {
    smol::block_on(async {
        let first = format!("{}abc", RESP_101);
        let server = Server::new(&[first.as_str(), RESP_200]);
        let mut conn = connection(&server);

        let mut buf = [0u8; 256];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abc");

        // looks like a response, but is stream data now
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], RESP_200.as_bytes());
        assert!(conn.is_validated());
    });
}

#[test]
fn test_response_split_across_reads() {
    smol::block_on(async {
        let server = Server::new(&[
            "HTTP/1.1 101 Switching",
            " Protocols\r\nUpgrade: websocket\r\n",
            "Connection: upgrade\r\n\r\n",
            "data",
        ]);
        let mut conn = connection(&server);

        let mut buf = [0u8; 64];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"data");
    });
}

#[test]
fn test_failure_is_sticky() {
    smol::block_on(async {
        let server = Server::new(&[RESP_200, RESP_101]);
        let mut conn = connection(&server);

        let mut buf = [0u8; 256];
        let err = conn.read(&mut buf).await.unwrap_err();
        let handshake = HandshakeError::from_io(&err).unwrap();
        assert_eq!(handshake.kind(), ErrorKind::UnrecognizedReply);
        let calls = server.read_calls();

        // later reads keep failing without touching the stream
        let err = conn.read(&mut buf).await.unwrap_err();
        assert_eq!(HandshakeError::from_io(&err).unwrap().kind(), ErrorKind::UnrecognizedReply);
        assert_eq!(server.read_calls(), calls);

        let err = conn.write_all(b"late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(conn.failure().is_some());
    });
}

#[test]
fn test_eof_before_head_is_malformed() {
    smol::block_on(async {
        let server = Server::new::<&str>(&[]);
        let mut conn = connection(&server);

        let err = conn.read(&mut [0u8; 8]).await.unwrap_err();
        assert_eq!(
            HandshakeError::from_io(&err).unwrap().kind(),
            ErrorKind::MalformedResponse
        );
    });
}

#[test]
fn test_oversized_head_is_malformed() {
    smol::block_on(async {
        let mut head = String::from("HTTP/1.1 101 Switching Protocols\r\n");
        while head.len() < 9 * 1024 {
            head.push_str("X-Padding: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
        }
        let server = Server::new(&[head.as_str()]);
        let mut conn = connection(&server);

        let err = conn.read(&mut [0u8; 1024]).await.unwrap_err();
        assert_eq!(
            HandshakeError::from_io(&err).unwrap().kind(),
            ErrorKind::MalformedResponse
        );
    });
}

#[test]
fn test_writes_pass_through_before_validation() {
    smol::block_on(async {
        let server = Server::new(&[RESP_101]);
        let mut conn = connection(&server);

        conn.write_all(b"early bytes").await.unwrap();
        assert_eq!(server.written(), "early bytes");
        assert!(!conn.is_validated());
    });
}
