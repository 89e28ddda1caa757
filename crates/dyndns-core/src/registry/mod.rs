//! Registries
//!
//! - [`HostRegistry`]: managed hosts, their secrets and cached state
//! - [`ProviderRegistry`]: provider factories keyed by type name

pub mod hosts;
pub mod providers;

pub use hosts::{Host, HostRegistry, HostState};
pub use providers::ProviderRegistry;
