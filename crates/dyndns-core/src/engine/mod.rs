//! Reconciliation engine
//!
//! The Reconciler brings one host's `A` record to a requested IPv4 address:
//! - Skips the provider when the cached IP already matches
//! - Discovers the remote record when no handle is cached
//! - Applies the new content and checks the provider's echo
//! - Retries transport failures with exponential backoff
//!
//! ## Flow
//!
//! ```text
//!   reconcile(host, ip)
//!         │
//!         ▼
//!  ┌──────────────┐  cached == ip   ┌───────────┐
//!  │  host lock   │────────────────▶│ Unchanged │
//!  └──────────────┘                 └───────────┘
//!         │
//!         ▼                 transient error
//!  ┌──────────────┐  ◀──────── sleep(backoff) ───────┐
//!  │   attempt    │                                  │
//!  │ resolve?     │──────────────────────────────────┘
//!  │ apply        │
//!  └──────────────┘
//!         │ ok
//!         ▼
//!  cache ip + handle ──▶ Updated
//! ```
//!
//! ## Serialization
//!
//! The host's lock is held for the whole reconciliation, sleeps included,
//! so two requests for the same FQDN never interleave their provider calls.
//! Different hosts proceed independently.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::registry::{Host, HostState};
use crate::traits::{DnsProvider, ProviderHandle, UpdateResult};

/// Bounded retry schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Create a retry policy
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    ///
    /// Doubles per attempt: 200ms, 400ms, 800ms, 1600ms with the defaults.
    pub fn delay_for_retry(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }

    /// Sum of all sleeps when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_for_retry(attempt))
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ReconcilerConfig::default())
    }
}

impl From<&ReconcilerConfig> for RetryPolicy {
    fn from(config: &ReconcilerConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
        )
    }
}

/// What one attempt found or did
enum Attempt {
    /// The provider already holds the desired IP
    AlreadyCurrent { handle: ProviderHandle },
    /// The provider accepted and echoed the desired IP
    Applied {
        handle: ProviderHandle,
        previous_ip: Option<Ipv4Addr>,
    },
}

/// Drives a host's record towards a requested IP
///
/// Cheap to clone; clones share the provider.
#[derive(Clone)]
pub struct Reconciler {
    provider: Arc<dyn DnsProvider>,
    policy: RetryPolicy,
}

impl Reconciler {
    /// Create a reconciler for the given provider
    pub fn new(provider: Arc<dyn DnsProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Retry schedule in force
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Bring `host`'s record to `desired`
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResult::Unchanged)`: cache or provider already had `desired`
    /// - `Ok(UpdateResult::Updated)`: the provider confirmed the new content
    /// - `Err(Error::Network)`: every attempt failed in transport
    /// - `Err(Error::ProviderInconsistency)`: the provider echoed other content
    /// - `Err(Error)`: the first non-transient failure, unretried
    ///
    /// The cached IP and handle change only on success.
    pub async fn reconcile(&self, host: &Host, desired: Ipv4Addr) -> Result<UpdateResult> {
        let mut state = host.lock().await;

        if state.last_known_ip == Some(desired) {
            debug!(fqdn = %host.fqdn(), ip = %desired, "Cached IP matches, nothing to do");
            return Ok(UpdateResult::Unchanged { current_ip: desired });
        }

        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.attempt(host, &state, desired).await {
                Ok(Attempt::AlreadyCurrent { handle }) => {
                    debug!(fqdn = %host.fqdn(), ip = %desired, "Provider already holds requested IP");
                    state.last_known_ip = Some(desired);
                    state.handle = Some(handle);
                    return Ok(UpdateResult::Unchanged { current_ip: desired });
                }
                Ok(Attempt::Applied { handle, previous_ip }) => {
                    info!(
                        fqdn = %host.fqdn(),
                        previous = ?previous_ip,
                        ip = %desired,
                        attempt,
                        "Record updated"
                    );
                    state.last_known_ip = Some(desired);
                    state.handle = Some(handle);
                    return Ok(UpdateResult::Updated {
                        previous_ip,
                        new_ip: desired,
                    });
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        fqdn = %host.fqdn(),
                        attempt,
                        max_attempts,
                        "Update attempt failed: {}",
                        e
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.delay_for_retry(attempt)).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(fqdn = %host.fqdn(), attempt, "Update failed without retry: {}", e);
                    return Err(e);
                }
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        Err(Error::network(
            self.provider_name(),
            format!("giving up after {} attempts: {}", max_attempts, cause),
        ))
    }

    /// One pass of resolve (if needed) and apply
    ///
    /// The provider is read first unless both the handle and the IP are
    /// cached. A stored handle without a confirmed IP still gets a read.
    async fn attempt(&self, host: &Host, state: &HostState, desired: Ipv4Addr) -> Result<Attempt> {
        let (handle, previous_ip) = match (&state.handle, state.last_known_ip) {
            (Some(handle), Some(cached)) => (handle.clone(), Some(cached)),
            _ => {
                let resolved = self.provider.resolve_current_ip(host.config()).await?;
                if resolved.current_ip == Some(desired) {
                    return Ok(Attempt::AlreadyCurrent {
                        handle: resolved.handle,
                    });
                }
                (resolved.handle, resolved.current_ip)
            }
        };

        debug!(fqdn = %host.fqdn(), handle = %handle, ip = %desired, "Applying IP");
        let applied = self.provider.apply_ip(&handle, desired).await?;

        match applied.echoed_ip {
            Some(echoed) if echoed != desired => {
                Err(Error::inconsistency(self.provider_name(), desired, echoed))
            }
            _ => Ok(Attempt::Applied {
                handle,
                previous_ip,
            }),
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("provider", &self.provider_name())
            .field("policy", &self.policy)
            .finish()
    }
}
