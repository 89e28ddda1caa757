// # File Config Store
//
// JSON file implementation of ConfigStore.
//
// ## Write-back
//
// - Atomic writes: the new document goes to a `.tmp` sibling, then is renamed
// - Backup: the previous document is copied to `.backup` before the rename
// - Permissions: the file holds provider credentials and is written 0600 on unix
//
// ## Recovery
//
// A main document that no longer parses fails the load. The `.backup` is
// never read implicitly; the error names it for manual recovery.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::config::DdnsConfig;
use crate::traits::config_store::ConfigStore;

/// File-based config store
///
/// # Example
///
/// ```rust,no_run
/// use dyndns_core::{ConfigStore, FileConfigStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileConfigStore::new("/etc/dyndns/config.json");
///     let config = store.load().await?;
///     store.save(&config).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    /// Create a store for the document at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the configuration document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(path: &Path) -> Result<DdnsConfig, Error> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse configuration {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    #[cfg(unix)]
    async fn restrict_permissions(path: &Path) -> Result<(), Error> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn restrict_permissions(_path: &Path) -> Result<(), Error> {
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    /// Read the configuration document
    ///
    /// An unreadable document is fatal even when a `.backup` exists; the
    /// error names the backup so an operator can restore it by hand.
    async fn load(&self) -> Result<DdnsConfig, Error> {
        let config = match Self::read_document(&self.path).await {
            Ok(config) => config,
            Err(e) => {
                let backup_path = Self::backup_path(&self.path);
                if backup_path.exists() {
                    return Err(Error::config(format!(
                        "{}; previous version is kept at {}",
                        e,
                        backup_path.display()
                    )));
                }
                return Err(e);
            }
        };

        tracing::debug!(
            path = %self.path.display(),
            hosts = config.hosts.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    async fn save(&self, config: &DdnsConfig) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let mut json = serde_json::to_string_pretty(config)?;
        json.push('\n');

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }
        Self::restrict_permissions(&temp_path).await?;

        // Keep the previous document around
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            } else if let Err(e) = Self::restrict_permissions(&backup_path).await {
                tracing::warn!("Failed to restrict backup permissions: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::config(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "Configuration written back");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
