//! DNS zone record access.

mod azure;
mod credential;

pub use azure::AzureDnsAccessor;
pub use credential::ClientSecretCredential;

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

/// Identifies one managed DNS zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneRef {
    pub subscription_id: String,
    pub resource_group: String,
    pub zone_name: String,
}

impl fmt::Display for ZoneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.zone_name)
    }
}

/// Opaque concurrency token of a record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(pub String);

impl ETag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single address record as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ARecord {
    /// Raw address text.
    #[serde(rename = "ipv4Address", default, skip_serializing_if = "Option::is_none")]
    pub ipv4_address: Option<String>,
}

impl ARecord {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ipv4_address: Some(ip.to_string()),
        }
    }

    /// Address in canonical dotted-quad form, if the record carries one.
    ///
    /// Text that does not parse as IPv4 is returned trimmed but otherwise as-is,
    /// so it never compares equal to a resolved address.
    pub fn normalized_address(&self) -> Option<String> {
        let raw = self.ipv4_address.as_deref()?.trim();
        Some(
            raw.parse::<Ipv4Addr>()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|_| raw.to_string()),
        )
    }
}

/// A named set of A records plus its concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// Record set name relative to the zone.
    pub name: String,
    /// Fully qualified domain name, when the provider reports it.
    pub fqdn: Option<String>,
    /// Time-to-live in seconds.
    pub ttl: Option<u32>,
    /// Provider metadata, preserved on update.
    pub metadata: HashMap<String, String>,
    /// Address records in provider order.
    pub a_records: Vec<ARecord>,
    /// Concurrency token captured at fetch time.
    pub etag: ETag,
}

impl RecordSet {
    /// Address of the first record, normalized for comparison.
    pub fn first_address(&self) -> Option<String> {
        self.a_records.first().and_then(ARecord::normalized_address)
    }

    /// Replace every record with a single record holding `ip`.
    pub fn replace_addresses(&mut self, ip: Ipv4Addr) {
        self.a_records.clear();
        self.a_records.push(ARecord::new(ip));
    }
}

/// Read and conditionally write A record sets in managed DNS zones.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ZoneRecordAccessor: Send + Sync {
    /// Fetch the current A record set, including its etag.
    async fn fetch(&self, zone: &ZoneRef, record_name: &str) -> Result<RecordSet>;

    /// Write `record_set`, only if the stored record set still carries `etag`.
    ///
    /// A stale etag fails with [`crate::Error::PreconditionFailed`].
    async fn update(
        &self,
        zone: &ZoneRef,
        record_name: &str,
        record_set: &RecordSet,
        etag: &ETag,
    ) -> Result<RecordSet>;
}

/// Create the Azure DNS accessor described by `config`.
pub fn create_accessor(config: &Config) -> Result<Box<dyn ZoneRecordAccessor>> {
    Ok(Box::new(AzureDnsAccessor::from_config(config)?))
}

#[cfg(test)]
mod tests;
