// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of `DnsProvider` for
// cfddns.
//
// ## Behaviour
//
// - One HTTP request per trait call: zone lookup, record lookup, update
// - No retry, backoff or caching (the scheduler's next tick is the retry,
//   the zone cache lives in cfddns-core)
// - Dry-run mode performs both lookups and logs the PUT it would send
//
// ## Authentication
//
// - Global API key: `X-Auth-Email` + `X-Auth-Key` headers
// - API token: `Authorization: Bearer <token>`, used whenever a token is
//   configured
//
// Credentials never appear in logs, errors or `Debug` output.
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...&status=active`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
//
// Every response uses the envelope `{"success", "errors", "result"}`. A 2xx
// response with `success: false` is still a failure.

use async_trait::async_trait;
use cfddns_core::Settings;
use cfddns_core::traits::{
    DnsProvider, PublishedRecord, RecordId, RecordType, RecordUpdate, Ttl, ZoneId,
};
use cfddns_core::{Error, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Provider name used in errors and logs
const PROVIDER: &str = "cloudflare";

/// Cloudflare's value for "automatic" TTL
const AUTOMATIC_TTL: u32 = 1;

/// How requests authenticate against the Cloudflare API
#[derive(Clone)]
pub enum Credentials {
    /// Account email plus Global API Key
    GlobalKey { email: String, key: String },

    /// Scoped API token with Zone:DNS:Edit permission
    Token(String),
}

impl Credentials {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
            Credentials::Token(token) => request.bearer_auth(token),
        }
    }
}

// Custom Debug implementation that hides the key and token
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .field("key", &"<REDACTED>")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<REDACTED>").finish(),
        }
    }
}

/// Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CloudflareMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CloudflareMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
    content: String,
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record lookup)
/// - Log the intended PUT payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// API base URL, without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credentials", &self.credentials)
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `credentials`: Global API key or API token
    /// - `timeout`: Upper bound for each API request
    /// - `dry_run`: If true, perform GET requests but skip PUT updates
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a credential is empty or the HTTP client
    /// cannot be built.
    pub fn new(credentials: Credentials, timeout: Duration, dry_run: bool) -> Result<Self> {
        let empty = match &credentials {
            Credentials::GlobalKey { email, key } => {
                email.trim().is_empty() || key.trim().is_empty()
            }
            Credentials::Token(token) => token.trim().is_empty(),
        };
        if empty {
            return Err(Error::config("Cloudflare credentials cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a provider from run settings
    ///
    /// An API token, when configured, takes precedence over the global key.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let credentials = match &settings.cloudflare_api_token {
            Some(token) => Credentials::Token(token.clone()),
            None => Credentials::GlobalKey {
                email: settings.cloudflare_auth_email.clone(),
                key: settings.cloudflare_auth_key.clone(),
            },
        };

        if settings.dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Self::new(credentials, settings.request_timeout(), settings.dry_run)
    }

    /// Point the provider at a different API base (e.g. a local proxy)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_base, path);
        self.credentials
            .apply(self.client.request(method, url))
            .header("Content-Type", "application/json")
    }

    /// Send a request and unwrap the Cloudflare envelope
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<Option<T>> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::network(format!("{}: request to Cloudflare timed out", action))
            } else {
                Error::network(format!("{}: HTTP request failed: {}", action, e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("{}: failed to read response: {}", action, e)))?;

        check_status(status, &body, action)?;
        unwrap_envelope(&body, action)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com&status=active
    /// ```
    async fn find_zone(&self, zone_name: &str) -> Result<ZoneId> {
        tracing::debug!("Looking up zone ID for domain: {}", zone_name);

        let request = self
            .request(Method::GET, "/zones")
            .query(&[("name", zone_name), ("status", "active")]);

        let zones: Vec<Zone> = self
            .execute(request, "Zone lookup")
            .await?
            .unwrap_or_default();

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::zone_not_found(zone_name))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(ZoneId::new(zone.id))
    }

    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=home.example.com
    /// ```
    async fn find_record(
        &self,
        zone_id: &ZoneId,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<PublishedRecord> {
        tracing::debug!(
            "Looking up record ID: {} (type: {})",
            record_name,
            record_type
        );

        let request = self
            .request(Method::GET, &format!("/zones/{}/dns_records", zone_id))
            .query(&[("type", record_type.as_str()), ("name", record_name)]);

        let records: Vec<DnsRecord> = self
            .execute(request, "Record lookup")
            .await?
            .unwrap_or_default();

        let record = records.into_iter().next().ok_or_else(|| {
            Error::record_not_found(format!("{} (type: {})", record_name, record_type))
        })?;

        tracing::debug!("Found record ID: {} (content: {})", record.id, record.content);
        Ok(PublishedRecord {
            id: RecordId::new(record.id),
            name: record.name,
            content: record.content,
        })
    }

    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "home.example.com", "content": "203.0.113.99", "ttl": 1}
    /// ```
    ///
    /// Skipped in dry-run mode.
    async fn update_record(&self, zone_id: &ZoneId, update: &RecordUpdate) -> Result<()> {
        let path = format!("/zones/{}/dns_records/{}", zone_id, update.record_id);
        let payload = update_payload(update);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {}{} with payload: {}",
                self.api_base,
                path,
                payload
            );
            return Ok(());
        }

        let request = self.request(Method::PUT, &path).json(&payload);
        self.execute::<Value>(request, "Record update")
            .await
            .map_err(|e| match e {
                Error::Provider { message, .. } => Error::update_rejected(message),
                other => other,
            })?;

        tracing::debug!("Cloudflare accepted update of {}", update.name);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Map a non-2xx status to an error
fn check_status(status: StatusCode, body: &str, action: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    let detail = serde_json::from_str::<CloudflareResponse<Value>>(body)
        .ok()
        .map(|envelope| describe(&envelope.errors))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| body.trim().chars().take(200).collect());

    match status.as_u16() {
        401 | 403 => Err(Error::auth(format!(
            "{}: invalid credentials or insufficient permissions. Status: {} {}",
            action, status, detail
        ))),
        429 => Err(Error::provider(
            PROVIDER,
            format!("{}: rate limit exceeded. Status: {}", action, status),
        )),
        500..=599 => Err(Error::provider(
            PROVIDER,
            format!("{}: Cloudflare server error: {} {}", action, status, detail),
        )),
        _ => Err(Error::provider(
            PROVIDER,
            format!("{} failed: {} {}", action, status, detail),
        )),
    }
}

/// Decode a 2xx body and check its `success` flag
fn unwrap_envelope<T: DeserializeOwned>(body: &str, action: &str) -> Result<Option<T>> {
    let envelope: CloudflareResponse<T> = serde_json::from_str(body)
        .map_err(|e| Error::parse(format!("{}: unexpected Cloudflare response: {}", action, e)))?;

    if !envelope.success {
        return Err(Error::provider(
            PROVIDER,
            format!("{} failed: {}", action, describe(&envelope.errors)),
        ));
    }

    Ok(envelope.result)
}

fn describe(errors: &[CloudflareMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn update_payload(update: &RecordUpdate) -> Value {
    let ttl = match update.ttl {
        Ttl::Automatic => AUTOMATIC_TTL,
    };

    serde_json::json!({
        "type": update.record_type.as_str(),
        "name": update.name,
        "content": update.content,
        "ttl": ttl,
    })
}
