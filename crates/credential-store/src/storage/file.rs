//! File storage backend
//!
//! Credentials live as plain records in a JSON file under the user's home
//! directory. The file is not shared with any other store, so there is no
//! prefixing; records are matched on their exact service and username.

use async_trait::async_trait;
use directories::BaseDirs;
use std::path::PathBuf;
use tracing::debug;

use super::{CredentialBackend, FileRecordStore};
use crate::credential::{Credential, StoredRecord, WILDCARD_USERNAME};
use crate::error::{CredentialError, Result};

/// File storage backend (Linux and everything else)
pub struct FileAdapter {
    records: FileRecordStore,
}

impl FileAdapter {
    /// Store credentials at `<home>/<folder>/<filename>`
    pub fn new(folder: &str, filename: &str) -> Result<Self> {
        let home = BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| CredentialError::StorageError("Could not determine home directory".to_string()))?;

        Ok(Self::with_path(home.join(folder).join(filename)))
    }

    /// Store credentials at an explicit path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let records = FileRecordStore::new(path);
        debug!("File credential storage at: {:?}", records.path());
        Self { records }
    }

    /// The record file behind this backend
    pub fn records(&self) -> &FileRecordStore {
        &self.records
    }

    async fn find(&self, predicate: impl Fn(&StoredRecord) -> bool) -> Result<Option<Credential>> {
        let entries = self.records.load_entries().await?;
        Ok(entries.iter().find(|r| predicate(*r)).map(Credential::from))
    }

    async fn retain(&self, remove: impl Fn(&StoredRecord) -> bool) -> Result<()> {
        let mut entries = self.records.load_entries().await?;
        let before = entries.len();
        entries.retain(|r| !remove(r));
        debug!("Removing {} credential records", before - entries.len());
        self.records.remove_entries(&entries).await
    }
}

#[async_trait]
impl CredentialBackend for FileAdapter {
    async fn get_credential(&self, service: &str) -> Result<Option<Credential>> {
        self.find(|r| r.service == service).await
    }

    async fn set_credential(&self, service: &str, username: &str, password: &str) -> Result<()> {
        let mut existing = self.records.load_entries().await?;
        existing.retain(|r| !r.matches(service, username));

        let new_entry = StoredRecord::new(service, username, password);
        self.records.add_entries(vec![new_entry], existing).await
    }

    async fn remove_credential(&self, service: &str) -> Result<()> {
        self.retain(|r| r.service == service).await
    }

    async fn get_credential_by_name(&self, service: &str, username: &str) -> Result<Option<Credential>> {
        self.find(|r| r.matches(service, username)).await
    }

    async fn remove_credential_by_name(&self, service: &str, username: &str) -> Result<()> {
        if username == WILDCARD_USERNAME {
            self.retain(|r| r.service == service).await
        } else {
            self.retain(|r| r.matches(service, username)).await
        }
    }

    fn backend_name(&self) -> &'static str {
        "File Storage"
    }
}
