use futures_util::io::{AsyncReadExt, AsyncWriteExt};
use http::uri::Scheme;
use std::time::Duration;

use crate::config::{StreamSettings, TlsSettings};
use crate::connection::HandshakeConnection;
use crate::destination::Destination;
use crate::error::{self, Error, HandshakeError, Result};
use crate::request::UpgradeRequest;
use crate::timeout::timeout;
use crate::transport::{Connector, EmulatedHandshake, NoTls, TlsConnector, Transport};

/// Connection type produced by a `Dialer<C, T>` with socket options `O`.
pub type DialedConnection<C, T, O> = HandshakeConnection<
    Transport<
        <C as Connector<O>>::Stream,
        <T as TlsConnector<<C as Connector<O>>::Stream>>::Stream,
        <T as TlsConnector<<C as Connector<O>>::Stream>>::Emulated,
    >,
>;

/// How the raw connection gets wrapped. Decided from settings before any I/O.
enum TlsStrategy<'a> {
    None,
    Plain(&'a TlsSettings),
    Emulated(&'a TlsSettings, &'a str),
}

impl<'a> TlsStrategy<'a> {
    fn select<S, T: TlsConnector<S>>(settings: Option<&'a TlsSettings>, tls: &T) -> Self {
        match settings {
            None => TlsStrategy::None,
            Some(settings) => match settings.fingerprint() {
                Some(fp) if tls.supports_fingerprint(fp) => TlsStrategy::Emulated(settings, fp),
                _ => TlsStrategy::Plain(settings),
            },
        }
    }

    fn scheme(&self) -> Scheme {
        match self {
            TlsStrategy::None => Scheme::HTTP,
            _ => Scheme::HTTPS,
        }
    }
}

/// Dials destinations and performs the HTTP/1.1 upgrade handshake.
///
/// Holds no per-connection state; one dialer can serve any number of concurrent dials.
#[derive(Clone, Debug)]
pub struct Dialer<C, T = NoTls> {
    connector: C,
    tls: T,
    timeout: Option<Duration>,
}

impl<C> Dialer<C, NoTls> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            tls: NoTls,
            timeout: None,
        }
    }
}

impl<C, T> Dialer<C, T> {
    pub fn with_tls<U>(self, tls: U) -> Dialer<C, U> {
        Dialer {
            connector: self.connector,
            tls,
            timeout: self.timeout,
        }
    }

    /// Bound the raw connect and any explicit TLS handshake. Reply validation is not covered.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    /// Connect to `dest`, write the upgrade request and return the connection.
    ///
    /// Without early data this resolves only after the `101` reply has been validated. With early
    /// data it resolves once the request is written, and the first read validates.
    pub async fn dial<O>(
        &self,
        dest: &Destination,
        settings: &StreamSettings<O>,
    ) -> Result<DialedConnection<C, T, O>>
    where
        C: Connector<O>,
        T: TlsConnector<C::Stream>,
    {
        tracing::info!(destination = %dest, "creating connection");

        let strategy = TlsStrategy::select::<C::Stream, T>(settings.tls.as_ref(), &self.tls);
        let scheme = strategy.scheme();

        let establish = self.establish(dest, &settings.socket, strategy);
        let mut conn = match self.timeout {
            Some(dur) => timeout(dur, establish).await.map_err(|err| {
                tracing::error!(destination = %dest, "failed to dial: {}", err);
                Error::dial(dest, err)
            })??,
            None => establish.await?,
        };

        let req = UpgradeRequest::build(&settings.protocol, dest, scheme);
        let wire = req.encode().map_err(|e| Error::write(dest, e))?;
        conn.write_all(&wire)
            .await
            .map_err(|e| Error::write(dest, e))?;
        conn.flush().await.map_err(|e| Error::write(dest, e))?;

        let mut conn = HandshakeConnection::new(conn, req);

        if !settings.protocol.early_data() {
            if let Err(err) = conn.read(&mut [0u8; 0]).await {
                let err = match HandshakeError::from_io(&err) {
                    Some(handshake) => handshake.clone(),
                    None => error::io(err),
                };
                return Err(Error::handshake(dest, err));
            }
        }

        Ok(conn)
    }

    async fn establish<O>(
        &self,
        dest: &Destination,
        socket: &O,
        strategy: TlsStrategy<'_>,
    ) -> Result<Transport<C::Stream, T::Stream, T::Emulated>>
    where
        C: Connector<O>,
        T: TlsConnector<C::Stream>,
    {
        let raw = match self.connector.connect(dest, socket).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(destination = %dest, "failed to dial: {}", err);
                return Err(Error::dial(dest, err));
            }
        };

        let conn = match strategy {
            TlsStrategy::None => Transport::Raw(raw),
            TlsStrategy::Plain(settings) => {
                let params = settings.params_for(dest);
                let tls = self.tls.wrap(raw, &params).map_err(|e| Error::dial(dest, e))?;
                Transport::Tls(tls)
            }
            TlsStrategy::Emulated(settings, fingerprint) => {
                let params = settings.params_for(dest);
                let mut tls = self
                    .tls
                    .wrap_emulated(raw, &params, fingerprint)
                    .map_err(|e| Error::dial(dest, e))?;
                tls.handshake().await.map_err(|e| Error::dial(dest, e))?;
                Transport::Emulated(tls)
            }
        };

        Ok(conn)
    }
}
