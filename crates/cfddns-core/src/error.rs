//! Error types for the DDNS controller
//!
//! Every failure in the workspace is expressed through [`Error`]. The
//! controller loop uses [`Error::is_fatal`] to decide whether a failure only
//! skips the record (or cycle) in flight, or must stop the process.

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS controller
#[derive(Error, Debug)]
pub enum Error {
    /// Echo endpoint unreachable or returned a malformed body
    #[error("Address detection error: {0}")]
    Detection(String),

    /// Zone authority call failed (transport, malformed response, duplicates)
    #[error("Zone API error: {0}")]
    ZoneApi(String),

    /// Desired and actual records passed to the reconciler do not describe
    /// the same (name, type). Always a defect in the caller.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an address detection error
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    /// Create a zone API error
    pub fn zone_api(msg: impl Into<String>) -> Self {
        Self::ZoneApi(msg.into())
    }

    /// Create a consistency violation
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error must stop the controller.
    ///
    /// Consistency violations and configuration errors are never retried:
    /// the process exits so that leadership can move to another member.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency(_) | Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
