// # IP Source Trait
//
// Defines the interface for discovering the caller's current public IPv4
// address.
//
// ## Implementations
//
// - HTTP echo service: `cfddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> cfddns_core::Result<()> {
//     let source = /* IpSource implementation */;
//     let current_ip = source.current().await?;
//     println!("public address: {}", current_ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{Error, Result};

/// Trait for IP source implementations
///
/// # Contract
///
/// - Exactly one outbound request per call to [`IpSource::current`]
/// - No retry, no caching, no sleeping: the Reconciler decides what to do
///   with a failure and the Scheduler owns all timing
/// - `Error::Network` when the request fails, times out, or returns a
///   non-2xx status
/// - `Error::Parse` when the answer is not a usable IPv4 literal
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Resolve the current public IPv4 address
    async fn current(&self) -> Result<Ipv4Addr>;

    /// Short name for logging (e.g. the service host)
    fn source_name(&self) -> &str;
}

/// Parse an IP service answer into a public IPv4 address
///
/// Shared by IP source implementations so that every source applies the
/// same sanity rules. Addresses that can never be a public egress address
/// (unspecified, loopback, private, link-local, broadcast) are rejected.
pub fn parse_public_ipv4(text: &str) -> Result<Ipv4Addr> {
    let text = text.trim();

    let ip: IpAddr = text
        .parse()
        .map_err(|_| Error::parse(format!("Invalid IP address: '{}'", text)))?;

    let ip = match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => {
            return Err(Error::parse(format!("Expected IPv4, got: {}", v6)));
        }
    };

    if ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
    {
        return Err(Error::parse(format!(
            "Address {} is not a public IPv4 address",
            ip
        )));
    }

    Ok(ip)
}
