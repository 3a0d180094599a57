// # DNS Provider Trait
//
// Defines the interface the Reconciler uses to read and write the managed
// record on a DNS provider.
//
// ## Implementations
//
// - Cloudflare: `cfddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::traits::{DnsProvider, RecordType};
//
// let zone_id = provider.find_zone("example.com").await?;
// let record = provider
//     .find_record(&zone_id, "home.example.com", RecordType::A)
//     .await?;
// println!("published: {}", record.content);
// ```

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

/// Provider-internal identifier of a DNS zone
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-internal identifier of a DNS record within a zone
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// IPv4 address record
    A,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record time-to-live
///
/// The managed record always uses the provider's automatic TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Provider picks the fastest propagation it supports
    Automatic,
}

/// A record as currently published by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    /// The record ID (provider-specific)
    pub id: RecordId,
    /// The record name as the provider reports it
    pub name: String,
    /// The record content as the provider reports it
    pub content: String,
}

/// Full replacement of a record's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub record_id: RecordId,
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub ttl: Ttl,
}

/// Trait for DNS provider implementations
///
/// Each method maps to exactly one provider API call.
///
/// # Contract
///
/// - Stateless and single-shot: no retry, no backoff, no caching
/// - Never decides whether an update is needed (owned by the Reconciler)
/// - Lookups fail with `ZoneNotFound` / `RecordNotFound` on zero matches,
///   `ProviderAuth` when credentials are rejected, `Provider` for anything
///   else the provider refuses
/// - Credentials never appear in errors or logs
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up a zone by name
    async fn find_zone(&self, zone_name: &str) -> Result<ZoneId>;

    /// Look up a record by name and type within a zone
    ///
    /// The returned record carries both the record ID and the currently
    /// published content.
    async fn find_record(
        &self,
        zone_id: &ZoneId,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<PublishedRecord>;

    /// Replace the content of an existing record
    async fn update_record(&self, zone_id: &ZoneId, update: &RecordUpdate) -> Result<()>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
