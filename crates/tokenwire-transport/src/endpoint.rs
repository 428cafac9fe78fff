use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// URL scheme for the persistent message transport.
pub const SCHEME: &str = "ws";

/// A `ws://host:port` server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `ws://host:port` URL. A single trailing `/` is tolerated.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            endpoint: input.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        if scheme != SCHEME {
            return Err(invalid("scheme must be 'ws'"));
        }

        let authority = rest.strip_suffix('/').unwrap_or(rest);
        if authority.contains('/') {
            return Err(invalid("paths are not supported"));
        }

        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("port is not a number"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The full URL handed to the WebSocket client.
    pub fn url(&self) -> String {
        format!("{SCHEME}://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_ws_url() {
        let endpoint = Endpoint::new("10.0.0.4", 9099);
        assert_eq!(endpoint.url(), "ws://10.0.0.4:9099");
        assert_eq!(endpoint.to_string(), endpoint.url());
    }

    #[test]
    fn parses_host_and_port() {
        let endpoint: Endpoint = "ws://localhost:9099/".parse().unwrap();
        assert_eq!(endpoint.host(), "localhost");
        assert_eq!(endpoint.port(), 9099);
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let endpoint = Endpoint::parse("ws://[::1]:8080").unwrap();
        assert_eq!(endpoint.host(), "[::1]");
        assert_eq!(endpoint.port(), 8080);
    }

    #[test]
    fn rejects_bad_endpoints() {
        for input in [
            "localhost:9099",
            "http://localhost:9099",
            "ws://localhost",
            "ws://:9099",
            "ws://localhost:0",
            "ws://localhost:99999",
            "ws://localhost:9099/path",
        ] {
            assert!(
                matches!(
                    Endpoint::parse(input),
                    Err(TransportError::InvalidEndpoint { .. })
                ),
                "{input} should be rejected"
            );
        }
    }
}
