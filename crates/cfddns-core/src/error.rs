//! Error types for cfddns
//!
//! `Config` is the only kind that is fatal at startup. Every other kind is
//! scoped to a single reconciliation cycle and ends up inside
//! [`CycleResult::Failed`](crate::reconciler::CycleResult::Failed).

use thiserror::Error;

/// Result type alias for cfddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cfddns
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport failure, timeout, or non-2xx status from the IP service
    #[error("Network error: {0}")]
    Network(String),

    /// A response body did not contain what we expected
    #[error("Parse error: {0}")]
    Parse(String),

    /// Zone lookup returned no matches
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// Record lookup returned no matches
    #[error("DNS record not found: {0}")]
    RecordNotFound(String),

    /// Provider rejected our credentials (401/403)
    #[error("Provider authentication failed: {0}")]
    ProviderAuth(String),

    /// Any other provider-side failure
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The provider did not accept the record update
    #[error("Update rejected: {0}")]
    UpdateRejected(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(zone: impl Into<String>) -> Self {
        Self::ZoneNotFound(zone.into())
    }

    /// Create a "record not found" error
    pub fn record_not_found(record: impl Into<String>) -> Self {
        Self::RecordNotFound(record.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::ProviderAuth(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an "update rejected" error
    pub fn update_rejected(msg: impl Into<String>) -> Self {
        Self::UpdateRejected(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
