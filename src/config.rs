use std::sync::Arc;

use crate::destination::Destination;
use crate::transport::TlsParams;

/// Protocol negotiation hint advertised on every TLS dial.
pub(crate) const ALPN_HTTP_1_1: &str = "http/1.1";

/// Upgrade transport configuration.
///
/// Immutable once built. Dials share it read-only through `StreamSettings`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    host: String,
    path: String,
    headers: Vec<(String, Vec<String>)>,
    early_data: bool,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Virtual host sent in the `Host` header. Empty means "use the destination".
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Configured path, possibly percent-encoded and carrying an opaque segment.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Configured headers, in the order their keys were first added. Keys keep their exact casing.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.headers
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn early_data(&self) -> bool {
        self.early_data
    }
}

/// Builder for `Config`.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.inner.host = host.into();
        self
    }

    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.inner.path = path.into();
        self
    }

    /// Append a value under `key`. The key is stored exactly as given, never canonicalized.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        let value = value.into();
        match self.inner.headers.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.inner.headers.push((key, vec![value])),
        }
        self
    }

    /// Return from `dial` as soon as the request is written; validate the reply on first read.
    pub fn early_data(mut self, enabled: bool) -> Self {
        self.inner.early_data = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.inner
    }
}

/// TLS options for a transport. Handshake details belong to the `TlsConnector`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// Server name for SNI. Falls back to the destination host.
    pub server_name: Option<String>,
    /// Client fingerprint profile name. `None` or empty selects plain TLS.
    pub fingerprint: Option<String>,
    /// Overridden with `http/1.1` on dial.
    pub alpn: Vec<String>,
}

impl TlsSettings {
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref().filter(|f| !f.is_empty())
    }

    pub(crate) fn params_for(&self, dest: &Destination) -> TlsParams {
        TlsParams {
            server_name: self
                .server_name
                .clone()
                .unwrap_or_else(|| dest.address.host()),
            alpn: vec![ALPN_HTTP_1_1.to_owned()],
        }
    }
}

/// Everything a single dial reads: the shared protocol config, optional TLS and socket options.
///
/// `socket` is opaque here and handed to the `Connector` as-is.
#[derive(Clone, Debug)]
pub struct StreamSettings<O = ()> {
    pub protocol: Arc<Config>,
    pub tls: Option<TlsSettings>,
    pub socket: O,
}

impl StreamSettings<()> {
    pub fn new(protocol: Config) -> Self {
        Self {
            protocol: Arc::new(protocol),
            tls: None,
            socket: (),
        }
    }
}

impl<O> StreamSettings<O> {
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_socket<P>(self, socket: P) -> StreamSettings<P> {
        StreamSettings {
            protocol: self.protocol,
            tls: self.tls,
            socket,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_order_and_multiple_values() {
        let config = Config::builder()
            .header("X-B", "1")
            .header("WebSocket-Test", "a")
            .header("X-B", "2")
            .header("x-b", "3")
            .build();

        let headers: Vec<_> = config.headers().collect();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0], ("X-B", &["1".to_owned(), "2".to_owned()][..]));
        assert_eq!(headers[1].0, "WebSocket-Test");
        assert_eq!(headers[2], ("x-b", &["3".to_owned()][..]));
    }

    #[test]
    fn test_tls_params() {
        let dest = Destination::new("example.com", 443);
        let tls = TlsSettings {
            alpn: vec!["h2".to_owned()],
            fingerprint: Some(String::new()),
            ..TlsSettings::default()
        };
        let params = tls.params_for(&dest);
        assert_eq!(params.server_name, "example.com");
        assert_eq!(params.alpn, vec!["http/1.1".to_owned()]);
        assert_eq!(tls.fingerprint(), None);

        let tls = TlsSettings {
            server_name: Some("cdn.example.org".to_owned()),
            fingerprint: Some("chrome".to_owned()),
            ..TlsSettings::default()
        };
        assert_eq!(tls.params_for(&dest).server_name, "cdn.example.org");
        assert_eq!(tls.fingerprint(), Some("chrome"));
    }
}
