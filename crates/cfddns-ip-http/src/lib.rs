// # HTTP IP Source
//
// This crate provides the public IP resolver for cfddns.
//
// ## Architecture
//
// Asks an external "what is my IP" service (default:
// https://checkip.amazonaws.com) for the caller's address. Each call to
// `current()` issues exactly one GET request; there is no polling loop, no
// cache and no retry. Timing belongs to the scheduler in cfddns-core.
//
// ## Response formats
//
// - Plain text: the body is the address, optionally surrounded by whitespace
// - JSON: set a field name (e.g. "ip" for https://api.ipify.org?format=json)
//   or a JSON pointer (e.g. "/data/ip") and the address is read from there

use cfddns_core::Settings;
use cfddns_core::traits::{IpSource, parse_public_ipv4};
use cfddns_core::{Error, Result};

use serde_json::Value;
use std::net::Ipv4Addr;
use std::time::Duration;

/// HTTP-based public IP resolver
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL to fetch IP from
    url: String,

    /// Host part of the URL, for logging
    name: String,

    /// JSON field or pointer holding the IP; `None` for plain-text services
    json_field: Option<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a resolver for a plain-text IP service
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch IP from (e.g., "https://checkip.amazonaws.com")
    /// - `timeout`: upper bound for the whole request
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: host_of(&url).to_string(),
            url,
            json_field: None,
            client,
        })
    }

    /// Create a resolver from run settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let source = Self::new(settings.ip_service_url.clone(), settings.request_timeout())?;
        Ok(match &settings.ip_service_json_field {
            Some(field) => source.with_json_field(field.clone()),
            None => source,
        })
    }

    /// Read the IP from a JSON response field instead of the raw body
    pub fn with_json_field(mut self, field: impl Into<String>) -> Self {
        self.json_field = Some(field.into());
        self
    }

    /// Pull the IPv4 address out of a response body
    fn extract_ip(&self, body: &str) -> Result<Ipv4Addr> {
        let Some(field) = &self.json_field else {
            return parse_public_ipv4(body);
        };

        let json: Value = serde_json::from_str(body)
            .map_err(|e| Error::parse(format!("IP service returned invalid JSON: {}", e)))?;

        let value = if field.starts_with('/') {
            json.pointer(field)
        } else {
            json.get(field.as_str())
        };

        let text = value
            .and_then(Value::as_str)
            .ok_or_else(|| Error::parse(format!("IP service response has no string field '{}'", field)))?;

        parse_public_ipv4(text)
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        tracing::debug!("Fetching external IP address from {}", self.url);

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::network(format!("Request to {} timed out", self.name))
            } else {
                Error::network(format!("Request to {} failed: {}", self.name, e))
            }
        })?;

        if !response.status().is_success() {
            return Err(Error::network(format!(
                "{} returned HTTP {}",
                self.name,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response from {}: {}", self.name, e)))?;

        let ip = self.extract_ip(&body)?;
        tracing::debug!("External IP retrieved: {}", ip);
        Ok(ip)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Host part of a URL, without scheme, port or path
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);

    // Bracketed IPv6 literal: the port, if any, follows the closing bracket
    if authority.starts_with('[') {
        return authority
            .find(']')
            .map_or(authority, |end| &authority[..=end]);
    }

    authority.split_once(':').map_or(authority, |(host, _)| host)
}
