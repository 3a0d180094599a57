//! Core traits for cfddns
//!
//! - [`IpSource`]: Discover the current public IPv4 address
//! - [`DnsProvider`]: Read and update the managed DNS record

pub mod dns_provider;
pub mod ip_source;

pub use dns_provider::{DnsProvider, PublishedRecord, RecordId, RecordType, RecordUpdate, Ttl, ZoneId};
pub use ip_source::{IpSource, parse_public_ipv4};
