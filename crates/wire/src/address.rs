use std::fmt;
use std::str::FromStr;

/// A shard endpoint, parsed once at registration rather than re-split on
/// every dial (see the "string-keyed shard identity" redesign note).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ShardAddress {
    host: String,
    port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("shard address '{0}' is missing a port")]
    MissingPort(String),
    #[error("shard address '{0}' has an invalid port")]
    InvalidPort(String),
}

impl ShardAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn to_socket_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for ShardAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ShardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_socket_string())
    }
}

impl fmt::Debug for ShardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardAddress({})", self.to_socket_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let addr: ShardAddress = "shard-1:12345".parse().unwrap();
        assert_eq!(addr.host(), "shard-1");
        assert_eq!(addr.port(), 12345);
        assert_eq!(addr.to_string(), "shard-1:12345");
    }

    #[test]
    fn rejects_missing_port() {
        assert!("shard-1".parse::<ShardAddress>().is_err());
    }
}
