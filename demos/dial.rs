//! Dial a plain-TCP upgrade endpoint, send a line and print what comes back.
//!
//! cargo run --example dial -- 127.0.0.1 8080 /tunnel

use futures::io::{AsyncReadExt, AsyncWriteExt};
use httpupgrade::transport::Connector;
use httpupgrade::{Config, Destination, Dialer, StreamSettings};
use smol::net::TcpStream;
use std::io;

struct TcpConnector;

impl Connector<()> for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, dest: &Destination, _socket: &()) -> io::Result<TcpStream> {
        TcpStream::connect(dest.net_addr()).await
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_owned());
    let port = args.next().map(|p| p.parse()).transpose()?.unwrap_or(8080);
    let path = args.next().unwrap_or_else(|| "/".to_owned());

    let settings = StreamSettings::new(
        Config::builder()
            .host(host.as_str())
            .path(path)
            .header("User-Agent", "httpupgrade-demo")
            .build(),
    );
    let dest = Destination::new(host.as_str(), port);

    smol::block_on(async {
        let mut conn = Dialer::new(TcpConnector).dial(&dest, &settings).await?;
        conn.write_all(b"hello\n").await?;

        let mut buf = [0u8; 1024];
        let n = conn.read(&mut buf).await?;
        println!("{}", String::from_utf8_lossy(&buf[..n]));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
