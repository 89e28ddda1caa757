// # dyndns-core
//
// Core library for the dyndns gateway.
//
// ## Architecture Overview
//
// An update request travels through four pieces:
// - **RequestValidator** (`request`): syntactic checks on the query parameters
// - **HostRegistry** (`registry`): which FQDNs are managed, their tokens, cached IPs
// - **Reconciler** (`engine`): idempotency check, provider call, bounded retry
// - **DnsProvider** (`traits`): one DNS provider's remote API behind a uniform surface
//
// ```text
// query ──▶ validate_query ──▶ HostRegistry::authorize ──▶ Reconciler::reconcile
//                                                                │
//                                                                ▼
//                                                DnsProvider::resolve_current_ip
//                                                DnsProvider::apply_ip
// ```
//
// ## Design Principles
//
// 1. **Provider isolation**: providers make API calls only; retry and caching live in the engine
// 2. **Plugin-based**: providers are built from configuration through a factory registry
// 3. **Idempotency**: a host already at the requested IP never reaches the provider
// 4. **Per-host serialization**: at most one in-flight mutation per FQDN
// 5. **Library-first**: the daemon is a thin layer over this crate

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod request;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{AuthMode, DdnsConfig, HostConfig, ProviderConfig, ReconcilerConfig};
pub use engine::{Reconciler, RetryPolicy};
pub use error::{Error, Result};
pub use registry::{Host, HostRegistry, ProviderRegistry};
pub use request::{QueryParams, RequestScheme, UpdateRequest, validate_query};
pub use store::{FileConfigStore, MemoryConfigStore};
pub use traits::{
    AppliedRecord, ConfigStore, DnsProvider, ProviderHandle, ResolvedRecord, UpdateResult,
};
