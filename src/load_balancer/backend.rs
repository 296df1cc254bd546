//! Backend address abstraction.
//!
//! # Responsibilities
//! - Represent a single backend by its canonical `host:port` string
//! - Validate addresses once, at registration time
//! - Serve as the unique membership key inside every router

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a backend address is not of the form `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("missing port in backend address `{0}`")]
    MissingPort(String),
    #[error("empty host in backend address `{0}`")]
    EmptyHost(String),
    #[error("invalid port in backend address `{0}`")]
    InvalidPort(String),
}

/// Address of a backend server in canonical `host:port` form.
///
/// The host may be a name (`localhost`) or an IP literal; it is resolved only
/// when a connection is opened. IPv6 literals must be bracketed (`[::1]:80`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendAddress(String);

impl BackendAddress {
    /// The canonical `host:port` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The port component.
    pub fn port(&self) -> u16 {
        // Validated in `from_str`.
        self.0
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for BackendAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;

        if host.is_empty() || host == "[]" {
            return Err(AddressError::EmptyHost(s.to_string()));
        }
        if port.parse::<u16>().is_err() {
            return Err(AddressError::InvalidPort(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let addr: BackendAddress = "localhost:1004".parse().unwrap();
        assert_eq!(addr.as_str(), "localhost:1004");
        assert_eq!(addr.port(), 1004);
        assert_eq!(addr.to_string(), "localhost:1004");
    }

    #[test]
    fn accepts_bracketed_ipv6() {
        let addr: BackendAddress = "[::1]:8080".parse().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(
            "localhost".parse::<BackendAddress>(),
            Err(AddressError::MissingPort("localhost".into()))
        );
        assert_eq!(
            ":80".parse::<BackendAddress>(),
            Err(AddressError::EmptyHost(":80".into()))
        );
        assert_eq!(
            "localhost:http".parse::<BackendAddress>(),
            Err(AddressError::InvalidPort("localhost:http".into()))
        );
        assert!("localhost:70000".parse::<BackendAddress>().is_err());
    }
}
