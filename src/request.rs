//! Upgrade request construction and encoding. No I/O happens here.

use http::header::HeaderName;
use http::uri::Scheme;
use http::Method;
use percent_encoding::{percent_decode, percent_encode, AsciiSet, CONTROLS};
use std::io;

use crate::config::Config;
use crate::destination::Destination;

/// Path used when none is configured. Not a real path.
const DEFAULT_PATH: &str = "GET";

/// Bytes escaped in a structural URL path. Unreserved characters and `$&+,/:;=@` go out as-is.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A single header line. The name is written exactly as stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    fn new<K: Into<String>, V: Into<String>>(name: K, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An HTTP/1.1 upgrade request, built fresh for every dial.
#[derive(Clone, Debug)]
pub struct UpgradeRequest {
    method: Method,
    scheme: Scheme,
    authority: String,
    host: String,
    path: Option<Vec<u8>>,
    opaque: Option<Vec<u8>>,
    headers: Vec<Header>,
}

impl UpgradeRequest {
    /// Build the request for `dest`. `scheme` is `https` when TLS was layered, `http` otherwise.
    pub fn build(config: &Config, dest: &Destination, scheme: Scheme) -> Self {
        let mut path = config.path().to_owned();
        if path.is_empty() {
            path = DEFAULT_PATH.to_owned();
        }
        let (path, opaque) = split_opaque(path);

        // set by exact key, over any configured `Connection`/`Upgrade`
        let mut headers = vec![
            Header::new("Connection", "upgrade"),
            Header::new("Upgrade", "websocket"),
        ];
        for (key, values) in config.headers() {
            // `Host` comes from the config's host, never from the header set
            if key.eq_ignore_ascii_case("host") || key == "Connection" || key == "Upgrade" {
                continue;
            }
            headers.extend(values.iter().map(|v| Header::new(key, v.as_str())));
        }

        let authority = dest.net_addr();
        let host = if config.host().is_empty() {
            authority.clone()
        } else {
            config.host().to_owned()
        };

        Self {
            method: Method::GET,
            scheme,
            authority,
            host,
            path,
            opaque,
            headers,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Destination `host:port`.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Value of the `Host` header.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Structural URL path, if set. Decoded bytes, not necessarily UTF-8.
    pub fn path(&self) -> Option<&[u8]> {
        self.path.as_deref()
    }

    /// Opaque request-target component, written verbatim when set.
    pub fn opaque(&self) -> Option<&[u8]> {
        self.opaque.as_deref()
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// The request-target written on the request line.
    pub fn request_target(&self) -> Vec<u8> {
        match &self.opaque {
            Some(opaque) if opaque.starts_with(b"//") => {
                [self.scheme.as_str().as_bytes(), &b":"[..], opaque.as_slice()].concat()
            }
            Some(opaque) => opaque.clone(),
            None => match self.path.as_deref() {
                None | Some(b"") => b"/".to_vec(),
                Some(path) => percent_encode(path, PATH).to_string().into_bytes(),
            },
        }
    }

    /// Serialize request line, headers and the terminating blank line. There is never a body.
    ///
    /// Fails with `InvalidInput` if the request target or `Host` holds control characters, or a
    /// header name is not a valid token. CR and LF in header values are written as spaces.
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let target = self.request_target();
        if target.iter().any(u8::is_ascii_control) {
            return Err(invalid_input("control character in request target"));
        }
        if self.host.bytes().any(|b| b.is_ascii_control() || b == b' ') {
            return Err(invalid_input(format!("invalid Host header {:?}", self.host)));
        }

        let mut buf: Vec<u8> = Vec::with_capacity(256);

        tracing::trace!("> {} {} HTTP/1.1", self.method, String::from_utf8_lossy(&target));
        buf.extend_from_slice(self.method.as_str().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(&target);
        buf.extend_from_slice(b" HTTP/1.1\r\n");

        let val = format!("Host: {}\r\n", self.host);
        tracing::trace!("> {}", val.trim_end());
        buf.extend_from_slice(val.as_bytes());

        for header in &self.headers {
            if HeaderName::from_bytes(header.name.as_bytes()).is_err() {
                return Err(invalid_input(format!("invalid header name {:?}", header.name)));
            }
            let value = header.value.replace(&['\r', '\n'][..], " ");
            tracing::trace!("> {}: {}", header.name, value);
            buf.extend_from_slice(header.name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }

        buf.extend_from_slice(b"\r\n");
        Ok(buf)
    }
}

fn invalid_input<E>(msg: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

/// Split a configured path into (structural path, opaque component).
///
/// The decoded, `/`-trimmed path has its first space turned into `:` and is split on `:`.
/// Two parts make the whole trimmed string opaque; three parts make the first a path and the
/// other two, rejoined, opaque. Any other count leaves the configured path untouched.
fn split_opaque(path: String) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    let unescaped = query_unescape(&path).unwrap_or_default();
    let trimmed = unescaped.strip_prefix(b"/").unwrap_or(&unescaped);
    let mut replaced = trimmed.to_vec();
    if let Some(space) = replaced.iter().position(|&b| b == b' ') {
        replaced[space] = b':';
    }
    let parts: Vec<&[u8]> = replaced.split(|&b| b == b':').collect();

    match parts.len() {
        2 => (None, Some(trimmed.to_vec())),
        3 => (Some(parts[0].to_vec()), Some([parts[1], &b":"[..], parts[2]].concat())),
        _ => (Some(path.into_bytes()), None),
    }
}

/// Query-component unescape: `+` is a space, `%XX` is a byte. Malformed escapes yield `None`.
/// The result is raw bytes and need not be UTF-8.
fn query_unescape(s: &str) -> Option<Vec<u8>> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = s.replace('+', " ");
    Some(percent_decode(spaced.as_bytes()).collect())
}
