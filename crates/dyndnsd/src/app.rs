//! Startup wiring: configuration, provider, registry, reconciler

use std::sync::Arc;

use anyhow::{Context, Result};
use dyndns_core::{
    ConfigStore, DdnsConfig, DnsProvider, HostRegistry, ProviderRegistry, Reconciler,
    RequestScheme, RetryPolicy,
};
use tracing::{debug, info};

use crate::server::AppState;

/// Provider registry with every backend compiled into this binary
pub fn builtin_providers() -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    dyndns_provider_cloudflare::register(&registry);

    #[cfg(feature = "netcup")]
    dyndns_provider_netcup::register(&registry);

    debug!(providers = ?registry.list_providers(), "Registered providers");
    registry
}

/// Load the configuration behind `store` and build the endpoint state
///
/// Runs discovery for hosts without stored identifiers and writes them back
/// through the same store.
pub async fn load(store: &dyn ConfigStore, providers: &ProviderRegistry) -> Result<AppState> {
    let config: DdnsConfig = store
        .load()
        .await
        .with_context(|| format!("failed to load configuration from {}", store.location()))?;

    info!(
        location = %store.location(),
        provider = config.provider.type_name(),
        hosts = config.hosts.len(),
        "Configuration loaded"
    );

    let provider: Arc<dyn DnsProvider> = Arc::from(
        providers
            .create_provider(&config)
            .context("failed to create DNS provider")?,
    );

    let policy = RetryPolicy::from(&config.reconciler);
    let scheme = RequestScheme::from(config.auth);

    let registry = HostRegistry::load(store, config, provider.as_ref())
        .await
        .context("failed to load host registry")?;

    for (fqdn, ip) in registry.snapshot().await {
        info!(fqdn = %fqdn, ip = ?ip, "Managing host");
    }

    Ok(AppState {
        registry: Arc::new(registry),
        reconciler: Reconciler::new(provider, policy),
        scheme,
    })
}
