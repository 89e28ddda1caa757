// # DNS Provider Trait
//
// Defines the interface the reconciler uses to read and write an `A` record.
//
// ## Implementations
//
// - Cloudflare-style token REST API: `dyndns-provider-cloudflare` crate
// - Netcup-style session JSON API: `dyndns-provider-netcup` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::DnsProvider;
//
// let resolved = provider.resolve_current_ip(&host_config).await?;
// if resolved.current_ip != Some(desired) {
//     let applied = provider.apply_ip(&resolved.handle, desired).await?;
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;

use crate::config::{DdnsConfig, HostConfig};

/// Result of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// Record already had the requested IP (no mutation)
    Unchanged {
        /// The current IP address
        current_ip: Ipv4Addr,
    },
    /// Record was changed at the provider
    Updated {
        /// The previously known IP, if any
        previous_ip: Option<Ipv4Addr>,
        /// The IP the provider now holds
        new_ip: Ipv4Addr,
    },
}

/// Opaque reference to a remote record
///
/// Enough to address the record on a follow-up call without querying the
/// provider again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderHandle {
    /// Zone and record identifiers (token variant)
    Record {
        /// Provider zone identifier
        zone_id: String,
        /// Provider record identifier
        record_id: String,
    },
    /// Host label and domain (session variant, which has no stable record id)
    Name {
        /// Host label
        hostname: String,
        /// Domain the record lives in
        domain: String,
    },
}

impl fmt::Display for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderHandle::Record { zone_id, record_id } => {
                write!(f, "zone {} record {}", zone_id, record_id)
            }
            ProviderHandle::Name { hostname, domain } => write!(f, "{}.{}", hostname, domain),
        }
    }
}

/// Current provider-side state of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    /// How to address the record from now on
    pub handle: ProviderHandle,
    /// Content of the record, `None` if it does not exist yet
    pub current_ip: Option<Ipv4Addr>,
}

/// Provider acknowledgement of a content change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    /// Content the provider reports after the change, if it reports one
    pub echoed_ip: Option<Ipv4Addr>,
}

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// A provider performs API calls against its own endpoint and translates
/// the answers. It does not retry, sleep, cache record state between calls,
/// or decide whether an update is needed: all of that belongs to the
/// [`Reconciler`](crate::Reconciler).
///
/// Errors must be classified at the source: transport failures (connection
/// refused, timeouts, DNS failure for the provider endpoint) are
/// [`Error::Network`](crate::Error::Network), anything the provider actually
/// answered is [`Error::Provider`](crate::Error::Provider). Only the former
/// is retried.
///
/// # Multiple matches
///
/// If the provider reports several `A` records for the same name, the first
/// one wins. Duplicates are not supposed to exist and are not cleaned up.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the current `A` record for a host
    ///
    /// Variants that need a record to exist before they can address it (the
    /// token variant) create it here with placeholder content.
    ///
    /// # Returns
    ///
    /// - `Ok(ResolvedRecord)`: the handle and the record's current content
    /// - `Err(Error)`: if the lookup failed
    async fn resolve_current_ip(&self, host: &HostConfig) -> Result<ResolvedRecord, crate::Error>;

    /// Set the content of the record addressed by `handle`
    ///
    /// # Returns
    ///
    /// - `Ok(AppliedRecord)`: the provider accepted the change
    /// - `Err(Error)`: if the update failed
    async fn apply_ip(
        &self,
        handle: &ProviderHandle,
        ip: Ipv4Addr,
    ) -> Result<AppliedRecord, crate::Error>;

    /// Handle derivable from configuration alone
    ///
    /// `None` means the host needs a one-time discovery against the
    /// provider before it can be addressed directly.
    fn known_handle(&self, host: &HostConfig) -> Option<ProviderHandle>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// The factory reads the provider credential set and the per-call
    /// timeout from `config`.
    fn create(&self, config: &DdnsConfig) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
