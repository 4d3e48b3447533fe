//! Dynamic DNS hostname resolution.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Resolves a hostname to the IPv4 address that should be published.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve `hostname` to a single IPv4 address.
    async fn resolve(&self, hostname: &str) -> Result<Ipv4Addr>;
}

/// Resolver backed by the system's name resolution (`getaddrinfo`).
#[derive(Debug, Default, Clone)]
pub struct SystemResolver;

impl SystemResolver {
    /// Create a new system resolver.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AddressResolver for SystemResolver {
    async fn resolve(&self, hostname: &str) -> Result<Ipv4Addr> {
        let host = hostname.trim();
        if host.is_empty() {
            return Err(Error::Resolution {
                host: hostname.to_string(),
                message: "hostname is empty".to_string(),
            });
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| Error::Resolution {
                host: host.to_string(),
                message: e.to_string(),
            })?
            .collect();

        tracing::debug!(host, count = addrs.len(), "Resolved addresses");

        first_ipv4(addrs.iter().map(SocketAddr::ip)).ok_or_else(|| Error::Resolution {
            host: host.to_string(),
            message: "no IPv4 address returned".to_string(),
        })
    }
}

/// First IPv4 address in resolver order.
fn first_ipv4<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find_map(|ip| match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    })
}
