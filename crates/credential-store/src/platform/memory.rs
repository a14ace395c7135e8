//! In-process platform stores
//!
//! Behave like the native vault and keychain (same addressing, same
//! not-found signalling, streamed listing) without touching the OS.
//! Used by tests and by anyone who wants a throwaway store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{ready_stream, KeychainApi, KeychainItem, RecordStream, VaultApi, VaultRecord, TARGET_WILDCARD};
use crate::error::{CredentialError, Result};

/// In-memory credential vault
#[derive(Default)]
pub struct MemoryVault {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    list_error: Option<String>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every listing end with an error after the stored records
    pub fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// Insert a raw record, bypassing any adapter encoding
    pub fn insert_raw(&self, target: &str, secret: &[u8]) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(target.to_string(), secret.to_vec());
        Ok(())
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VaultApi for MemoryVault {
    fn list(&self, filter: Option<&str>) -> RecordStream<VaultRecord> {
        let mut items: Vec<Result<VaultRecord>> = match self.entries.read() {
            Ok(entries) => entries
                .iter()
                .filter(|(target, _)| filter.map_or(true, |f| target.starts_with(f)))
                .map(|(target, secret)| {
                    Ok(VaultRecord {
                        target_name: target.clone(),
                        credential: hex::encode(secret),
                    })
                })
                .collect(),
            Err(_) => vec![Err(poisoned())],
        };

        if let Some(message) = &self.list_error {
            items.push(Err(CredentialError::VaultError(message.clone())));
        }

        ready_stream(items)
    }

    async fn write(&self, target: &str, secret: &[u8]) -> Result<()> {
        self.insert_raw(target, secret)
    }

    async fn remove(&self, target: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;

        let removed = match target.strip_suffix(TARGET_WILDCARD) {
            Some(prefix) => {
                let before = entries.len();
                entries.retain(|t, _| !t.starts_with(prefix));
                before - entries.len()
            }
            None => usize::from(entries.remove(target).is_some()),
        };

        if removed == 0 {
            return Err(CredentialError::NotFound(target.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "In-Memory Vault"
    }
}

/// In-memory keychain
#[derive(Default)]
pub struct MemoryKeychain {
    items: RwLock<BTreeMap<(String, String), String>>,
    list_error: Option<String>,
}

impl MemoryKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every listing end with an error after the stored items
    pub fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.read().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeychainApi for MemoryKeychain {
    fn list(&self) -> RecordStream<KeychainItem> {
        let mut items: Vec<Result<KeychainItem>> = match self.items.read() {
            Ok(items) => items
                .keys()
                .map(|(service, account)| {
                    Ok(KeychainItem {
                        account: account.clone(),
                        service: service.clone(),
                    })
                })
                .collect(),
            Err(_) => vec![Err(poisoned())],
        };

        if let Some(message) = &self.list_error {
            items.push(Err(CredentialError::KeychainError(message.clone())));
        }

        ready_stream(items)
    }

    async fn get_secret(&self, account: &str, service: &str) -> Result<String> {
        self.items
            .read()
            .map_err(|_| poisoned())?
            .get(&(service.to_string(), account.to_string()))
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(format!("{}/{}", service, account)))
    }

    async fn set_secret(&self, account: &str, service: &str, secret: &str) -> Result<()> {
        self.items
            .write()
            .map_err(|_| poisoned())?
            .insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }

    async fn remove(&self, account: &str, service: &str) -> Result<()> {
        self.items
            .write()
            .map_err(|_| poisoned())?
            .remove(&(service.to_string(), account.to_string()))
            .map(|_| ())
            .ok_or_else(|| CredentialError::NotFound(format!("{}/{}", service, account)))
    }

    fn name(&self) -> &'static str {
        "In-Memory Keychain"
    }
}

fn poisoned() -> CredentialError {
    CredentialError::StorageError("In-memory store lock poisoned".to_string())
}
