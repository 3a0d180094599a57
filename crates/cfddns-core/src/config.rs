//! Configuration for cfddns
//!
//! Settings are read once from a JSON file at startup and validated before
//! the scheduler starts. Any problem here is fatal: without a valid zone and
//! record there is nothing to reconcile.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Default IP echo service, returns the address as plain text
pub const DEFAULT_IP_SERVICE_URL: &str = "https://checkip.amazonaws.com";

/// Fields that must be present and non-empty
const REQUIRED_FIELDS: [&str; 4] = [
    "zone",
    "dnsrecord",
    "cloudflare_auth_email",
    "cloudflare_auth_key",
];

/// Run settings, immutable for the lifetime of the process
///
/// The JSON layout is flat:
///
/// ```json
/// {
///   "zone": "example.com",
///   "dnsrecord": "home.example.com",
///   "cloudflare_auth_email": "admin@example.com",
///   "cloudflare_auth_key": "..."
/// }
/// ```
///
/// Everything besides the four required fields has a default.
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// Zone name, e.g. "example.com"
    #[serde(default)]
    pub zone: String,

    /// Fully-qualified record name, e.g. "home.example.com"
    #[serde(default)]
    pub dnsrecord: String,

    /// Account email sent as `X-Auth-Email`
    #[serde(default)]
    pub cloudflare_auth_email: String,

    /// Global API key sent as `X-Auth-Key`
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub cloudflare_auth_key: String,

    /// Scoped API token; when set it is sent as a bearer token instead of
    /// the email/key pair
    #[serde(default)]
    pub cloudflare_api_token: Option<String>,

    /// Seconds between reconciliation cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// URL of the public IP echo service
    #[serde(default = "default_ip_service_url")]
    pub ip_service_url: String,

    /// If the IP service answers with JSON, the field holding the address
    #[serde(default)]
    pub ip_service_json_field: Option<String>,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Lifetime of cached zone IDs in seconds (0 disables the cache)
    #[serde(default)]
    pub zone_cache_ttl_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for daily-rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Number of daily log files kept in `log_dir`
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: usize,

    /// Resolve and compare, but never write to the provider
    #[serde(default)]
    pub dry_run: bool,
}

// Keeps credentials out of logs and panics
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("zone", &self.zone)
            .field("dnsrecord", &self.dnsrecord)
            .field("cloudflare_auth_email", &self.cloudflare_auth_email)
            .field("cloudflare_auth_key", &"<REDACTED>")
            .field(
                "cloudflare_api_token",
                &self.cloudflare_api_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("interval_secs", &self.interval_secs)
            .field("ip_service_url", &self.ip_service_url)
            .field("ip_service_json_field", &self.ip_service_json_field)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("zone_cache_ttl_secs", &self.zone_cache_ttl_secs)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .field("log_retention_days", &self.log_retention_days)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Settings {
    /// Create settings for a zone and record with every optional field at
    /// its default
    pub fn new(
        zone: impl Into<String>,
        dnsrecord: impl Into<String>,
        auth_email: impl Into<String>,
        auth_key: impl Into<String>,
    ) -> Self {
        Self {
            zone: zone.into(),
            dnsrecord: dnsrecord.into(),
            cloudflare_auth_email: auth_email.into(),
            cloudflare_auth_key: auth_key.into(),
            cloudflare_api_token: None,
            interval_secs: default_interval_secs(),
            ip_service_url: default_ip_service_url(),
            ip_service_json_field: None,
            request_timeout_secs: default_request_timeout_secs(),
            zone_cache_ttl_secs: 0,
            log_level: default_log_level(),
            log_dir: None,
            log_retention_days: default_log_retention_days(),
            dry_run: false,
        }
    }

    /// Load and validate settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::config(format!("Configuration file '{}' not found", path.display()))
            }
            _ => Error::config(format!(
                "Failed to read configuration file '{}': {}",
                path.display(),
                e
            )),
        })?;

        let settings = Self::from_json_str(&raw)?;
        tracing::debug!("Configuration loaded successfully from {}", path.display());
        Ok(settings)
    }

    /// Parse and validate settings from a JSON document
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("Invalid JSON in configuration file: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .zip([
                &self.zone,
                &self.dnsrecord,
                &self.cloudflare_auth_email,
                &self.cloudflare_auth_key,
            ])
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(Error::config(format!(
                "Missing required fields in config: {}",
                missing.join(", ")
            )));
        }

        validate_domain_name(&self.zone)?;
        validate_domain_name(&self.dnsrecord)?;

        if !is_within_zone(&self.dnsrecord, &self.zone) {
            return Err(Error::config(format!(
                "dnsrecord '{}' is not inside zone '{}'",
                self.dnsrecord, self.zone
            )));
        }

        if self
            .cloudflare_api_token
            .as_ref()
            .is_some_and(|t| t.trim().is_empty())
        {
            return Err(Error::config(
                "cloudflare_api_token cannot be empty when present",
            ));
        }

        if !(10..=86_400).contains(&self.interval_secs) {
            return Err(Error::config(format!(
                "interval_secs must be between 10 and 86400 seconds. Got: {}",
                self.interval_secs
            )));
        }

        if !(1..=120).contains(&self.request_timeout_secs) {
            return Err(Error::config(format!(
                "request_timeout_secs must be between 1 and 120 seconds. Got: {}",
                self.request_timeout_secs
            )));
        }

        if self.zone_cache_ttl_secs > 86_400 {
            return Err(Error::config(format!(
                "zone_cache_ttl_secs must be at most 86400 seconds. Got: {}",
                self.zone_cache_ttl_secs
            )));
        }

        if !self.ip_service_url.starts_with("https://") && !self.ip_service_url.starts_with("http://")
        {
            return Err(Error::config(format!(
                "ip_service_url must use HTTP or HTTPS scheme. Got: {}",
                self.ip_service_url
            )));
        }

        if self
            .ip_service_json_field
            .as_ref()
            .is_some_and(|f| f.is_empty())
        {
            return Err(Error::config("ip_service_json_field cannot be empty when present"));
        }

        if !(1..=3650).contains(&self.log_retention_days) {
            return Err(Error::config(format!(
                "log_retention_days must be between 1 and 3650. Got: {}",
                self.log_retention_days
            )));
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(Error::config(format!(
                    "log_level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                    self.log_level
                )));
            }
        }

        Ok(())
    }

    /// Scheduler period
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Zone cache lifetime, `None` when caching is disabled
    pub fn zone_cache_ttl(&self) -> Option<Duration> {
        (self.zone_cache_ttl_secs > 0).then(|| Duration::from_secs(self.zone_cache_ttl_secs))
    }
}

/// Whether `record` is `zone` itself or a name below it
fn is_within_zone(record: &str, zone: &str) -> bool {
    let record = record.to_ascii_lowercase();
    let zone = zone.to_ascii_lowercase();
    record == zone || record.ends_with(&format!(".{}", zone))
}

/// Basic RFC 1035 domain name validation
///
/// Not comprehensive, but catches the usual typos before they turn into
/// confusing "not found" answers from the provider.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_interval_secs() -> u64 {
    60
}

fn default_ip_service_url() -> String {
    DEFAULT_IP_SERVICE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_retention_days() -> usize {
    30
}
