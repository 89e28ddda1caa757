//! Configuration types for the dyndns gateway
//!
//! The whole configuration is one JSON document: the provider credential
//! set, the authorization model, the reconciler tuning and the managed
//! hosts. The same schema is written back after provider identifiers have
//! been discovered, so every field that round-trips must serialize exactly
//! the way it was read.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main dyndns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// DNS provider configuration (one credential set for all hosts)
    pub provider: ProviderConfig,

    /// How update requests are authorized
    #[serde(default)]
    pub auth: AuthMode,

    /// Optional reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Managed hosts
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl DdnsConfig {
    /// Create a configuration for the given provider with no hosts
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            auth: AuthMode::default(),
            reconciler: ReconcilerConfig::default(),
            hosts: Vec::new(),
        }
    }

    /// Add a host definition
    pub fn with_host(mut self, host: HostConfig) -> Self {
        self.hosts.push(host);
        self
    }

    /// Set the authorization model
    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// Validate the parts of the configuration that are fatal when wrong
    ///
    /// Individual host records are not checked here; the registry drops
    /// invalid ones with a diagnostic instead of failing the whole load.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.reconciler.validate()?;
        Ok(())
    }
}

/// Authorization model for update requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// `fqdn`, `ipv4` and `token` parameters; the token must match the host's secret
    #[default]
    Token,
    /// `hostname`, `domain` and `ip` parameters; membership in the registry is enough
    AllowList,
}

impl AuthMode {
    /// Whether host records must carry a secret token
    pub fn requires_token(self) -> bool {
        matches!(self, AuthMode::Token)
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare-style token REST provider
    Cloudflare {
        /// API token with Zone:DNS:Edit permission
        api_token: String,
        /// Override of the API base URL (tests, proxies)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_base: Option<String>,
    },

    /// Netcup-style session JSON provider
    Netcup {
        /// Customer number
        customer_number: u64,
        /// API key
        api_key: String,
        /// API password
        api_password: String,
        /// Override of the JSON endpoint URL (tests, proxies)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

// Credentials never reach Debug output
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Cloudflare { api_base, .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("api_base", api_base)
                .finish(),
            ProviderConfig::Netcup {
                customer_number,
                endpoint,
                ..
            } => f
                .debug_struct("Netcup")
                .field("customer_number", customer_number)
                .field("api_key", &"<REDACTED>")
                .field("api_password", &"<REDACTED>")
                .field("endpoint", endpoint)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.trim().is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Netcup {
                customer_number,
                api_key,
                api_password,
                ..
            } => {
                if *customer_number == 0 {
                    return Err(crate::Error::config("Netcup customer number must be > 0"));
                }
                if api_key.trim().is_empty() {
                    return Err(crate::Error::config("Netcup API key cannot be empty"));
                }
                if api_password.trim().is_empty() {
                    return Err(crate::Error::config("Netcup API password cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Netcup { .. } => "netcup",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// One managed host as it appears in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host label (e.g. "home")
    pub hostname: String,

    /// Parent zone (e.g. "example.com")
    #[serde(alias = "domain")]
    pub zone: String,

    /// Secret used to authorize update requests for this host
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// Provider zone identifier, filled in by discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,

    /// Provider record identifier, filled in by discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl HostConfig {
    /// Create a host definition
    pub fn new(
        hostname: impl Into<String>,
        zone: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            zone: zone.into(),
            token: token.into(),
            zone_id: None,
            record_id: None,
        }
    }

    /// Set pre-known provider identifiers
    pub fn with_ids(mut self, zone_id: impl Into<String>, record_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self.record_id = Some(record_id.into());
        self
    }

    /// Fully-qualified name, normalized for lookups
    pub fn fqdn(&self) -> String {
        normalize_fqdn(&format!(
            "{}.{}",
            self.hostname.trim(),
            self.zone.trim()
        ))
    }

    /// Check the record-level invariants
    ///
    /// Returns the name of the first offending property.
    pub fn validate(&self, auth: AuthMode) -> Result<(), crate::Error> {
        if self.hostname.trim().is_empty() {
            return Err(crate::Error::config("hostname property not set"));
        }
        if self.zone.trim().is_empty() {
            return Err(crate::Error::config("zone property not set"));
        }
        if auth.requires_token() && self.token.trim().is_empty() {
            return Err(crate::Error::config("token property not set"));
        }
        Ok(())
    }
}

/// Normalize a DNS name for comparison: trimmed, lower-case, no trailing dot
pub fn normalize_fqdn(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Total attempts per reconciliation, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (in milliseconds), doubled after each retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Timeout for each provider HTTP call (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("reconciler.max_attempts must be >= 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config(
                "reconciler.request_timeout_secs must be > 0",
            ));
        }
        Ok(())
    }

    /// Per-call provider timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_request_timeout_secs() -> u64 {
    10
}
