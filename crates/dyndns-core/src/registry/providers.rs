//! Plugin-based provider registry
//!
//! Providers are selected once, at configuration-load time, by the `type`
//! tag of the provider configuration. Backend crates register a factory
//! under their type name:
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::new();
//! dyndns_provider_cloudflare::register(&registry);
//! dyndns_provider_netcup::register(&registry);
//!
//! let provider = registry.create_provider(&config)?;
//! ```

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory};

/// Provider registry for plugin-based DNS provider creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare", "netcup")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        self.write().insert(name.into(), factory);
    }

    /// Create the DNS provider named by `config.provider`
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &DdnsConfig) -> Result<Box<dyn DnsProvider>> {
        config.provider.validate()?;

        let provider_type = config.provider.type_name();
        let providers = self.read();

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    // A panic while holding the lock cannot leave the map half-written
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Box<dyn DnsProviderFactory>>> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Box<dyn DnsProviderFactory>>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }
}
