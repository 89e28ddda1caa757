//! Core traits for the dyndns gateway
//!
//! - [`DnsProvider`]: Read and write one `A` record through a provider API
//! - [`DnsProviderFactory`]: Build a provider from configuration
//! - [`ConfigStore`]: Read and write back the configuration document

pub mod config_store;
pub mod dns_provider;

pub use config_store::ConfigStore;
pub use dns_provider::{
    AppliedRecord, DnsProvider, DnsProviderFactory, ProviderHandle, ResolvedRecord, UpdateResult,
};
