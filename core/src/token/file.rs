use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::ProjectDirs;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};

use super::{SessionToken, TokenStore, TOKEN_STORAGE_KEY};

const SESSION_FILE: &str = "session.json";

/// Token store backed by a small JSON key-value file.
///
/// The file holds `{"auth.token": "<value>"}`. Writes go to a sibling
/// temporary file which is synced and then renamed over the original, so a
/// crash leaves either the old or the new token on disk, never a torn file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes writers so concurrent set/clear cannot interleave renames.
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store in the platform data directory, if the platform has one.
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("ng", "Allawee", "AllaweePlus")
            .map(|dirs| Self::new(dirs.data_dir().join(SESSION_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file exists but does not parse. A corrupt file holds
    /// nothing worth keeping, so callers treat it as empty and overwrite or
    /// remove it.
    async fn read_entries(&self) -> Result<Option<BTreeMap<String, String>>> {
        match fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => Ok(Some(entries)),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "session file is corrupt, discarding it");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Some(BTreeMap::new())),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_file(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        sync_parent_dir(&self.path).await;
        Ok(())
    }

    async fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json =
            serde_json::to_vec(entries).map_err(|e| ApiError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &self.path).await?;
        sync_parent_dir(&self.path).await;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self) -> Result<Option<SessionToken>> {
        let entries = self.read_entries().await?.unwrap_or_default();
        Ok(entries
            .get(TOKEN_STORAGE_KEY)
            .cloned()
            .and_then(SessionToken::new))
    }

    async fn set(&self, token: &SessionToken) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?.unwrap_or_default();
        entries.insert(TOKEN_STORAGE_KEY.to_string(), token.as_str().to_string());
        self.write_entries(&entries).await?;
        debug!(path = %self.path.display(), "session token persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let Some(mut entries) = self.read_entries().await? else {
            self.remove_file().await?;
            debug!(path = %self.path.display(), "corrupt session file removed");
            return Ok(());
        };
        if entries.remove(TOKEN_STORAGE_KEY).is_none() {
            return Ok(());
        }
        if entries.is_empty() {
            self.remove_file().await?;
        } else {
            self.write_entries(&entries).await?;
        }
        debug!(path = %self.path.display(), "session token cleared");
        Ok(())
    }
}

// Makes the rename itself durable. Directories cannot be opened for sync on
// every platform, so failures here are ignored.
#[cfg(unix)]
async fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent).await {
            let _ = dir.sync_all().await;
        }
    }
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) {}
