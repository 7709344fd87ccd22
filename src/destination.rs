use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Host part of a `Destination`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    Ip(IpAddr),
    Domain(String),
}

impl Address {
    /// Host as it appears in a URL authority; IPv6 is bracketed.
    pub fn to_authority(&self) -> String {
        match self {
            Address::Ip(IpAddr::V6(ip)) => format!("[{}]", ip),
            Address::Ip(IpAddr::V4(ip)) => ip.to_string(),
            Address::Domain(domain) => domain.clone(),
        }
    }

    /// Host as used for TLS server name indication.
    pub fn host(&self) -> String {
        match self {
            Address::Ip(ip) => ip.to_string(),
            Address::Domain(domain) => domain.clone(),
        }
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        let trimmed = s.trim_start_matches('[').trim_end_matches(']');
        match trimmed.parse::<IpAddr>() {
            Ok(ip) => Address::Ip(ip),
            Err(_) => Address::Domain(s.to_owned()),
        }
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Address::Ip(ip)
    }
}

/// The remote endpoint a dial targets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Destination {
    pub address: Address,
    pub port: u16,
}

impl Destination {
    pub fn new<A: Into<Address>>(address: A, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// `host:port`, suitable for a URL authority or a `Host` header.
    pub fn net_addr(&self) -> String {
        format!("{}:{}", self.address.to_authority(), self.port)
    }
}

impl From<SocketAddr> for Destination {
    fn from(addr: SocketAddr) -> Self {
        Destination::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp:{}", self.net_addr())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_net_addr() {
        assert_eq!(Destination::new("example.com", 80).net_addr(), "example.com:80");
        assert_eq!(Destination::new("10.0.0.1", 443).net_addr(), "10.0.0.1:443");
        assert_eq!(Destination::new("::1", 8443).net_addr(), "[::1]:8443");
        assert_eq!(Destination::new("[::1]", 8443).net_addr(), "[::1]:8443");
    }

    #[test]
    fn test_display_and_host() {
        let dest = Destination::new("::1", 443);
        assert_eq!(dest.to_string(), "tcp:[::1]:443");
        assert_eq!(dest.address.host(), "::1");
    }
}
