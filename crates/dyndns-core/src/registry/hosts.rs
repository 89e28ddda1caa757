//! Host registry
//!
//! The authoritative local view of which FQDNs may be updated, with which
//! secret, and what IP was last confirmed for each. The set of hosts is
//! fixed once the registry is built; the only runtime mutation is the
//! per-host cached state, written by the reconciler under the host's lock.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use ring::constant_time;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::{AuthMode, DdnsConfig, HostConfig, normalize_fqdn};
use crate::error::{Error, Result};
use crate::traits::{ConfigStore, DnsProvider, ProviderHandle};

/// Mutable per-host state, guarded by the host's lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostState {
    /// Last IP confirmed at the provider; a performance hint, not a lock
    pub last_known_ip: Option<Ipv4Addr>,
    /// How to address the remote record without querying for it
    pub handle: Option<ProviderHandle>,
}

/// One managed DNS name
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    fqdn: String,
    state: Mutex<HostState>,
}

impl Host {
    /// Create a host with empty cached state
    pub fn new(config: HostConfig) -> Self {
        let fqdn = config.fqdn();
        Self {
            config,
            fqdn,
            state: Mutex::new(HostState::default()),
        }
    }

    /// Seed the cached IP
    pub fn with_last_known_ip(mut self, ip: Option<Ipv4Addr>) -> Self {
        self.state.get_mut().last_known_ip = ip;
        self
    }

    /// Seed the provider handle
    pub fn with_handle(mut self, handle: Option<ProviderHandle>) -> Self {
        self.state.get_mut().handle = handle;
        self
    }

    /// Normalized fully-qualified name
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Host definition as configured
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Last IP confirmed at the provider
    ///
    /// Waits for an in-flight reconciliation of this host to finish.
    pub async fn last_known_ip(&self) -> Option<Ipv4Addr> {
        self.state.lock().await.last_known_ip
    }

    /// Copy of the cached state
    pub async fn state(&self) -> HostState {
        self.state.lock().await.clone()
    }

    /// Exclusive access to the cached state
    ///
    /// Held by the reconciler across read, decide, mutate and cache update.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().await
    }

    /// Constant-time comparison against the configured secret
    fn token_matches(&self, supplied: &str) -> bool {
        constant_time::verify_slices_are_equal(self.config.token.as_bytes(), supplied.as_bytes())
            .is_ok()
    }
}

/// Registry of managed hosts, keyed by normalized FQDN
#[derive(Debug)]
pub struct HostRegistry {
    hosts: HashMap<String, Arc<Host>>,
    auth: AuthMode,
}

impl HostRegistry {
    /// Build a registry from host definitions without contacting a provider
    ///
    /// Invalid and duplicate records are dropped with a warning.
    ///
    /// # Returns
    ///
    /// - `Ok(HostRegistry)`: at least one valid record
    /// - `Err(Error::Configuration)`: no valid record survived
    pub fn new(hosts: Vec<HostConfig>, auth: AuthMode) -> Result<Self> {
        let mut seen = HashSet::new();
        let hosts = hosts
            .into_iter()
            .enumerate()
            .filter(|(index, host)| admit(*index, host, auth, &mut seen))
            .map(|(_, host)| Host::new(host))
            .collect();
        Self::from_hosts(hosts, auth)
    }

    /// Build a registry from prepared hosts
    ///
    /// Later hosts with an FQDN already present are dropped.
    pub fn from_hosts(hosts: Vec<Host>, auth: AuthMode) -> Result<Self> {
        let mut map = HashMap::with_capacity(hosts.len());
        for host in hosts {
            if map.contains_key(host.fqdn()) {
                warn!(fqdn = %host.fqdn(), "Duplicate host record is not loaded");
                continue;
            }
            map.insert(host.fqdn().to_string(), Arc::new(host));
        }

        if map.is_empty() {
            return Err(Error::config("no records were loaded"));
        }

        Ok(Self { hosts: map, auth })
    }

    /// Load the registry from configuration, discovering provider identifiers
    ///
    /// Each valid host whose handle cannot be derived from configuration is
    /// looked up (and, for providers that need it, created) once. Discovered
    /// zone and record identifiers are copied into the document, which is
    /// written back through `store` so the next start skips discovery.
    ///
    /// Records that fail validation or discovery are dropped with a
    /// diagnostic; they stay in the written document untouched.
    ///
    /// # Returns
    ///
    /// - `Ok(HostRegistry)`: at least one record survived
    /// - `Err(Error::Configuration)`: no record survived, or the write-back failed
    pub async fn load(
        store: &dyn ConfigStore,
        mut config: DdnsConfig,
        provider: &dyn DnsProvider,
    ) -> Result<Self> {
        config.validate()?;
        let auth = config.auth;

        let mut seen = HashSet::new();
        let mut hosts = Vec::new();
        let mut enriched = false;

        for (index, host_config) in config.hosts.iter_mut().enumerate() {
            if !admit(index, host_config, auth, &mut seen) {
                continue;
            }

            let host = match provider.known_handle(host_config) {
                Some(handle) => Host::new(host_config.clone()).with_handle(Some(handle)),
                None => {
                    debug!(fqdn = %host_config.fqdn(), "Discovering provider identifiers");
                    match provider.resolve_current_ip(host_config).await {
                        Ok(resolved) => {
                            if let ProviderHandle::Record { zone_id, record_id } = &resolved.handle {
                                host_config.zone_id = Some(zone_id.clone());
                                host_config.record_id = Some(record_id.clone());
                                enriched = true;
                            }
                            Host::new(host_config.clone())
                                .with_handle(Some(resolved.handle))
                                .with_last_known_ip(resolved.current_ip)
                        }
                        Err(e) => {
                            warn!(
                                index,
                                fqdn = %host_config.fqdn(),
                                "Record has errors and is not loaded: {}",
                                e
                            );
                            continue;
                        }
                    }
                }
            };

            hosts.push(host);
        }

        let registry = Self::from_hosts(hosts, auth)?;

        if enriched {
            store.save(&config).await.map_err(|e| {
                Error::config(format!(
                    "failed to write discovered identifiers to {}: {}",
                    store.location(),
                    e
                ))
            })?;
            info!(location = %store.location(), "Wrote discovered identifiers back");
        }

        info!(
            hosts = registry.len(),
            provider = provider.provider_name(),
            "Host registry loaded"
        );
        Ok(registry)
    }

    /// Look up a host by FQDN
    pub fn lookup(&self, fqdn: &str) -> Result<Arc<Host>> {
        self.hosts
            .get(&normalize_fqdn(fqdn))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("unknown fqdn {}", fqdn)))
    }

    /// Check that a request may update `fqdn`
    ///
    /// In token mode the supplied token must equal the host's secret. In
    /// allow-list mode registry membership is sufficient and `token` is
    /// ignored.
    pub fn authorize(&self, fqdn: &str, token: Option<&str>) -> Result<Arc<Host>> {
        let host = self
            .lookup(fqdn)
            .map_err(|_| Error::authorization(format!("unknown fqdn {}", fqdn)))?;

        if self.auth.requires_token() {
            let supplied = token.unwrap_or_default();
            if !host.token_matches(supplied) {
                return Err(Error::authorization(format!(
                    "invalid token supplied for fqdn {}",
                    host.fqdn()
                )));
            }
        }

        Ok(host)
    }

    /// Authorization model in force
    pub fn auth_mode(&self) -> AuthMode {
        self.auth
    }

    /// Number of managed hosts
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the registry is empty (never true for a loaded registry)
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Managed FQDNs, sorted
    pub fn fqdns(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hosts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Cached IP per FQDN, sorted by name
    pub async fn snapshot(&self) -> Vec<(String, Option<Ipv4Addr>)> {
        let mut out = Vec::with_capacity(self.hosts.len());
        for name in self.fqdns() {
            if let Some(host) = self.hosts.get(&name) {
                out.push((name, host.last_known_ip().await));
            }
        }
        out
    }
}

/// Validate a host record and enforce FQDN uniqueness
fn admit(index: usize, host: &HostConfig, auth: AuthMode, seen: &mut HashSet<String>) -> bool {
    let fqdn = host.fqdn();

    if let Err(e) = host.validate(auth) {
        warn!(index, fqdn = %fqdn, "Record has errors and is not loaded: {}", e);
        return false;
    }

    if !seen.insert(fqdn.clone()) {
        warn!(index, fqdn = %fqdn, "Duplicate host record is not loaded");
        return false;
    }

    true
}
