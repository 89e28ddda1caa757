//! Error types for the dyndns gateway
//!
//! Every failure a request can run into maps onto one variant here, and the
//! HTTP layer turns the variant into a status code. The retry loop looks only
//! at [`Error::is_transient`].

use std::net::Ipv4Addr;
use thiserror::Error;

/// Result type alias for dyndns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dyndns gateway
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing request parameter (client fault)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Unknown FQDN or token mismatch
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Host is not in the registry
    #[error("Host not found: {0}")]
    NotFound(String),

    /// Transport failure talking to the provider (retryable)
    #[error("Network error ({provider}): {message}")]
    Network {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The provider answered but reported a failure (terminal)
    #[error("Provider error ({provider}): {payload}")]
    Provider {
        /// Provider name
        provider: String,
        /// Provider diagnostic, usually the response payload
        payload: String,
    },

    /// The provider confirmed the change but echoed a different value
    #[error("Provider inconsistency ({provider}): requested {requested}, provider reports {echoed}")]
    ProviderInconsistency {
        /// Provider name
        provider: String,
        /// The IP that was sent
        requested: Ipv4Addr,
        /// The IP the provider reported back
        echoed: Ipv4Addr,
    },

    /// File system errors from the config store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an authorization error
    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a transient network error
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a provider-reported error
    pub fn provider(provider: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            payload: payload.into(),
        }
    }

    /// Create an echo-mismatch error
    pub fn inconsistency(provider: impl Into<String>, requested: Ipv4Addr, echoed: Ipv4Addr) -> Self {
        Self::ProviderInconsistency {
            provider: provider.into(),
            requested,
            echoed,
        }
    }

    /// Whether the reconciler may retry after this error
    ///
    /// Only transport failures qualify. A provider that answered with a
    /// failure status has already made its decision.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
