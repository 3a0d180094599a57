//! Reconciliation cycle
//!
//! One cycle compares the current public IP with the content of the managed
//! `A` record and updates the record only when they differ.
//!
//! ## Flow
//!
//! ```text
//! IpSource::current ──► DnsProvider::find_zone ──► DnsProvider::find_record
//!                                                         │
//!                                          content == current IP ?
//!                                            │                 │
//!                                          yes                 no
//!                                            │                 │
//!                                     NoChangeNeeded   DnsProvider::update_record
//!                                                              │
//!                                                     Updated / Failed
//! ```
//!
//! Every step short-circuits to [`CycleResult::Failed`]. The Reconciler never
//! retries and never sleeps; the next scheduled tick is the retry.

use std::fmt;
use tracing::{debug, error, info, warn};

use crate::cache::ZoneCache;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpSource, PublishedRecord, RecordType, RecordUpdate, Ttl, ZoneId};

/// The step of a cycle that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStep {
    ResolveIp,
    LookupZone,
    LookupRecord,
    UpdateRecord,
}

impl fmt::Display for CycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStep::ResolveIp => "resolve current IP",
            CycleStep::LookupZone => "zone lookup",
            CycleStep::LookupRecord => "record lookup",
            CycleStep::UpdateRecord => "record update",
        };
        f.write_str(name)
    }
}

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleResult {
    /// The record already points at the current IP; nothing was written
    NoChangeNeeded {
        ip: String,
    },

    /// The record was rewritten
    Updated {
        old_ip: String,
        new_ip: String,
    },

    /// The cycle stopped at `step`
    Failed {
        step: CycleStep,
        error: Error,
    },
}

impl CycleResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, CycleResult::Failed { .. })
    }

    /// The error of a failed cycle
    pub fn error(&self) -> Option<&Error> {
        match self {
            CycleResult::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Compares the published record against the current IP and converges it
///
/// The Reconciler owns its collaborators and the (optional) zone cache; it
/// holds no other state between cycles.
pub struct Reconciler {
    /// Source of the current public IP
    ip_source: Box<dyn IpSource>,

    /// Provider holding the managed record
    provider: Box<dyn DnsProvider>,

    /// Zone name
    zone: String,

    /// Fully-qualified record name
    record_name: String,

    /// Zone ID cache, `None` when disabled
    zone_cache: Option<ZoneCache>,
}

impl Reconciler {
    /// Create a new Reconciler
    ///
    /// # Parameters
    ///
    /// - `ip_source`: IP source implementation
    /// - `provider`: DNS provider implementation
    /// - `settings`: validated run settings
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        settings: &Settings,
    ) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            ip_source,
            provider,
            zone: settings.zone.clone(),
            record_name: settings.dnsrecord.clone(),
            zone_cache: settings.zone_cache_ttl().map(ZoneCache::new),
        })
    }

    /// The record this Reconciler manages
    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// Run one reconciliation cycle
    pub async fn run_cycle(&self) -> CycleResult {
        info!("Starting DNS update check for {}", self.record_name);

        let current_ip = match self.ip_source.current().await {
            Ok(ip) => ip.to_string(),
            Err(e) => return self.fail(CycleStep::ResolveIp, e),
        };
        info!("Current IP is {} (via {})", current_ip, self.ip_source.source_name());

        let (zone_id, record) = match self.lookup_record().await {
            Ok(found) => found,
            Err((step, e)) => return self.fail(step, e),
        };
        info!(
            "DNS record ID for {} is {}, published IP is {}",
            record.name, record.id, record.content
        );

        if record.content == current_ip {
            info!(
                outcome = "success",
                "{} is currently set to {}; no changes needed", self.record_name, current_ip
            );
            return CycleResult::NoChangeNeeded { ip: current_ip };
        }

        warn!(
            "DNS record needs updating from {} to {}",
            record.content, current_ip
        );

        let update = RecordUpdate {
            record_id: record.id,
            record_type: RecordType::A,
            name: self.record_name.clone(),
            content: current_ip.clone(),
            ttl: Ttl::Automatic,
        };

        match self.provider.update_record(&zone_id, &update).await {
            Ok(()) => {
                info!(
                    outcome = "success",
                    "Successfully updated {} to {}", self.record_name, current_ip
                );
                CycleResult::Updated {
                    old_ip: record.content,
                    new_ip: current_ip,
                }
            }
            Err(e) => {
                let e = match e {
                    Error::UpdateRejected(_) => e,
                    other => Error::update_rejected(other.to_string()),
                };
                self.fail(CycleStep::UpdateRecord, e)
            }
        }
    }

    /// Resolve the zone ID and look up the record in it
    ///
    /// A cached zone ID is only trusted while the provider keeps accepting
    /// it. Any provider-side complaint about a lookup made with a cached ID
    /// drops the entry and falls back to a live zone lookup, once.
    async fn lookup_record(
        &self,
    ) -> std::result::Result<(ZoneId, PublishedRecord), (CycleStep, Error)> {
        if let Some(cache) = &self.zone_cache
            && let Some(zone_id) = cache.get(&self.zone).await
        {
            debug!("Using cached zone ID {} for {}", zone_id, self.zone);

            match self
                .provider
                .find_record(&zone_id, &self.record_name, RecordType::A)
                .await
            {
                Ok(record) => return Ok((zone_id, record)),
                Err(e @ Error::Network(_)) => return Err((CycleStep::LookupRecord, e)),
                Err(e) => {
                    warn!(
                        "Lookup with cached zone ID {} failed ({}), resolving zone again",
                        zone_id, e
                    );
                    cache.invalidate(&self.zone).await;
                }
            }
        }

        let zone_id = self
            .provider
            .find_zone(&self.zone)
            .await
            .map_err(|e| (CycleStep::LookupZone, e))?;
        info!("Zone ID for {} is {}", self.zone, zone_id);

        if let Some(cache) = &self.zone_cache {
            cache.insert(&self.zone, zone_id.clone()).await;
        }

        let record = self
            .provider
            .find_record(&zone_id, &self.record_name, RecordType::A)
            .await
            .map_err(|e| (CycleStep::LookupRecord, e))?;

        Ok((zone_id, record))
    }

    fn fail(&self, step: CycleStep, error: Error) -> CycleResult {
        error!(
            "DNS update for {} failed during {} ({}): {}",
            self.record_name,
            step,
            self.provider.provider_name(),
            error
        );
        CycleResult::Failed { step, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_result_helpers() {
        let failed = CycleResult::Failed {
            step: CycleStep::LookupZone,
            error: Error::zone_not_found("example.com"),
        };
        assert!(failed.is_failed());
        assert_eq!(failed.error(), Some(&Error::zone_not_found("example.com")));

        let unchanged = CycleResult::NoChangeNeeded {
            ip: "203.0.113.45".to_string(),
        };
        assert!(!unchanged.is_failed());
        assert_eq!(unchanged.error(), None);
    }

    #[test]
    fn test_step_display() {
        assert_eq!(CycleStep::UpdateRecord.to_string(), "record update");
    }
}
