// # Memory Config Store
//
// In-memory implementation of ConfigStore.
//
// Holds the document in a RwLock and counts saves, which makes it the
// store of choice for tests and for embedding the gateway in a process
// that manages its own configuration.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::DdnsConfig;
use crate::traits::config_store::ConfigStore;

/// In-memory config store
#[derive(Debug, Clone)]
pub struct MemoryConfigStore {
    inner: Arc<RwLock<DdnsConfig>>,
    saves: Arc<AtomicUsize>,
    fail_saves: bool,
}

impl MemoryConfigStore {
    /// Create a store holding `config`
    pub fn new(config: DdnsConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            saves: Arc::new(AtomicUsize::new(0)),
            fail_saves: false,
        }
    }

    /// Create a store whose `save` always fails
    pub fn read_only(config: DdnsConfig) -> Self {
        Self {
            fail_saves: true,
            ..Self::new(config)
        }
    }

    /// Current document
    pub async fn snapshot(&self) -> DdnsConfig {
        self.inner.read().await.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<DdnsConfig, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, config: &DdnsConfig) -> Result<(), Error> {
        if self.fail_saves {
            return Err(Error::config("memory store is read-only"));
        }
        *self.inner.write().await = config.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
