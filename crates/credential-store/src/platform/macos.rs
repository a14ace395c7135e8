//! macOS login keychain
//!
//! Item metadata is enumerated through a Security framework search; secrets
//! are read and written per item through `keyring`, which stores generic
//! passwords under the same service/account pair.

use async_trait::async_trait;
use keyring::Entry;
use security_framework::item::{ItemClass, ItemSearchOptions, Limit};
use tracing::debug;

use super::{blocking_stream, run_blocking, KeychainApi, KeychainItem, RecordStream};
use crate::error::{CredentialError, Result};

/// `errSecItemNotFound`
const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;

/// macOS Keychain
pub struct MacKeychain;

impl MacKeychain {
    pub fn new() -> Self {
        MacKeychain
    }
}

impl Default for MacKeychain {
    fn default() -> Self {
        Self::new()
    }
}

fn entry(account: &str, service: &str) -> Result<Entry> {
    Entry::new(service, account).map_err(|e| CredentialError::KeychainError(e.to_string()))
}

fn map_keyring_error(e: keyring::Error, account: &str, service: &str) -> CredentialError {
    match e {
        keyring::Error::NoEntry => CredentialError::NotFound(format!("{}/{}", service, account)),
        other => CredentialError::KeychainError(other.to_string()),
    }
}

#[async_trait]
impl KeychainApi for MacKeychain {
    fn list(&self) -> RecordStream<KeychainItem> {
        blocking_stream(|emit| {
            let results = match ItemSearchOptions::new()
                .class(ItemClass::generic_password())
                .load_attributes(true)
                .limit(Limit::All)
                .search()
            {
                Ok(results) => results,
                Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => return Ok(()),
                Err(e) => return Err(CredentialError::KeychainError(e.to_string())),
            };

            debug!("Keychain search returned {} items", results.len());

            for result in results {
                let Some(attrs) = result.simplify_dict() else {
                    continue;
                };
                let (Some(service), Some(account)) = (attrs.get("svce"), attrs.get("acct")) else {
                    continue;
                };
                let item = KeychainItem {
                    account: account.clone(),
                    service: service.clone(),
                };
                if !emit(item) {
                    break;
                }
            }
            Ok(())
        })
    }

    async fn get_secret(&self, account: &str, service: &str) -> Result<String> {
        let (account, service) = (account.to_string(), service.to_string());
        run_blocking(move || {
            entry(&account, &service)?
                .get_password()
                .map_err(|e| map_keyring_error(e, &account, &service))
        })
        .await
    }

    async fn set_secret(&self, account: &str, service: &str, secret: &str) -> Result<()> {
        let (account, service, secret) = (account.to_string(), service.to_string(), secret.to_string());
        run_blocking(move || {
            entry(&account, &service)?
                .set_password(&secret)
                .map_err(|e| map_keyring_error(e, &account, &service))
        })
        .await
    }

    async fn remove(&self, account: &str, service: &str) -> Result<()> {
        let (account, service) = (account.to_string(), service.to_string());
        run_blocking(move || {
            entry(&account, &service)?
                .delete_password()
                .map_err(|e| map_keyring_error(e, &account, &service))
        })
        .await
    }

    fn name(&self) -> &'static str {
        "macOS Keychain"
    }
}
