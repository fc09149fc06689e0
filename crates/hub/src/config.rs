//! Environment-sourced configuration for the `hub` binary, following the
//! teacher's small `Config`/environment-plumbing modules: parsing happens
//! once at startup and a missing or malformed value is a fatal, logged
//! error rather than a panic deep inside request handling.

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {0} is not a valid integer: {1}")]
    InvalidInt(&'static str, std::num::ParseIntError),
    #[error("environment variable HMAC_SECRET is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub chunks_per_file: usize,
    pub replicas: usize,
    pub hmac_secret: Vec<u8>,
    /// Shared secret shards use to authorize connections. Not yet enforced
    /// anywhere in the wire protocol (see DESIGN.md), but read up front so
    /// a deployment can start carrying it before that lands.
    pub connection_secret: String,
    /// Catalog connection string. Stored verbatim and otherwise unused —
    /// the relational catalog is an external collaborator, not part of
    /// this crate.
    pub db_url: Option<String>,
}

fn read_env(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::Missing(key))
}

/// Reads `key` as a `usize`, falling back to `default` when the variable is
/// unset entirely — an unset `CHUNKS_PER_FILE`/`REPLICAS` is not an error,
/// per `spec.md` §3/§6, but a present, unparsable value still is.
fn read_usize_or(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|err| ConfigError::InvalidInt(key, err)),
        Err(_) => Ok(default),
    }
}

impl HubConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            chunks_per_file: read_usize_or("CHUNKS_PER_FILE", 3)?,
            replicas: read_usize_or("REPLICAS", 2)?,
            hmac_secret: hex::decode(read_env("HMAC_SECRET")?)?,
            connection_secret: read_env("CONNECTION_SECRET")?,
            db_url: std::env::var("DB_URL").ok(),
        })
    }
}
