//! Error types for dynip.

use thiserror::Error;

/// Result type alias for dynip.
pub type Result<T> = std::result::Result<T, Error>;

/// dynip error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid schedule expression.
    #[error("Invalid schedule expression '{expression}': {message}")]
    Schedule { expression: String, message: String },

    /// The dynamic DNS hostname could not be resolved to an IPv4 address.
    #[error("Failed to resolve {host}: {message}")]
    Resolution { host: String, message: String },

    /// Credential rejected or token acquisition failed.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// DNS zone does not exist in the resource group.
    #[error("DNS zone {zone} not found")]
    ZoneNotFound { zone: String },

    /// Record set does not exist in the zone.
    #[error("Record set {record} not found in zone {zone}")]
    RecordSetNotFound { zone: String, record: String },

    /// Record set exists but holds no address records.
    #[error("Record set {record} in zone {zone} has no A records")]
    EmptyRecordSet { zone: String, record: String },

    /// Conditional update rejected because the record set changed since it was fetched.
    #[error("Record set {record} in zone {zone} was modified concurrently (etag {etag} is stale)")]
    PreconditionFailed {
        zone: String,
        record: String,
        etag: String,
    },

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Any other DNS API error.
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True when a conditional update lost against a concurrent writer.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::PreconditionFailed { .. })
    }

    /// True when the error prevents any further zone from being processed this tick.
    pub fn is_fatal_for_tick(&self) -> bool {
        matches!(self, Error::Resolution { .. } | Error::Authorization(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
