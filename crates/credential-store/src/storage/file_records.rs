//! JSON record file
//!
//! A flat array of `{service, username, password}` objects in one file.
//! Every mutation rewrites the whole array. There is no prefixing or
//! uniqueness checking at this level; that belongs to the file backend.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::credential::StoredRecord;
use crate::error::Result;

/// Owner read/write only
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Durable storage of a record array at a single path
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records. A missing or empty file holds no records.
    pub async fn load_entries(&self) -> Result<Vec<StoredRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credential file at {:?}", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<StoredRecord> = serde_json::from_str(&contents)?;
        debug!("Loaded {} credential records", entries.len());
        Ok(entries)
    }

    /// Append `new_entries` to `existing_entries` and save the result
    pub async fn add_entries(
        &self,
        new_entries: Vec<StoredRecord>,
        mut existing_entries: Vec<StoredRecord>,
    ) -> Result<()> {
        existing_entries.extend(new_entries);
        self.save_entries(&existing_entries).await
    }

    /// Save only the records that are kept
    pub async fn remove_entries(&self, entries_to_keep: &[StoredRecord]) -> Result<()> {
        self.save_entries(entries_to_keep).await
    }

    /// Drop every record
    pub async fn clear(&self) -> Result<()> {
        self.save_entries(&[]).await
    }

    /// Rewrite the file with `entries`
    pub async fn save_entries(&self, entries: &[StoredRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_vec(entries)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);

        let mut file = options.open(&self.path).await?;

        // `mode` only applies on creation
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(FILE_MODE)).await?;
        }

        file.write_all(&contents).await?;
        file.flush().await?;

        debug!("Saved {} credential records to {:?}", entries.len(), self.path);
        Ok(())
    }
}
