// # Config Store Trait
//
// Defines where the configuration document comes from and where the
// enriched version goes after provider identifiers have been discovered.
//
// ## Purpose
//
// Discovery (zone and record lookups, record creation) costs provider API
// calls. Writing the discovered identifiers back means the next process
// start can address every record directly.
//
// ## Implementations
//
// - File-based: JSON document with atomic replace (`FileConfigStore`)
// - In-memory: tests and embedding (`MemoryConfigStore`)

use async_trait::async_trait;

use crate::config::DdnsConfig;

/// Trait for configuration storage
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Round trip
///
/// `save` receives the same schema `load` produced. Host records that were
/// rejected at load time are still part of the document and must be written
/// back unchanged so the operator can fix them.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the configuration document
    ///
    /// # Returns
    ///
    /// - `Ok(DdnsConfig)`: the parsed document
    /// - `Err(Error)`: missing, unreadable or malformed document
    async fn load(&self) -> Result<DdnsConfig, crate::Error>;

    /// Replace the stored document
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the new document is durable
    /// - `Err(Error)`: storage error
    async fn save(&self, config: &DdnsConfig) -> Result<(), crate::Error>;

    /// Human-readable location (for logging)
    fn location(&self) -> String;
}
