//! Credential store facade
//!
//! Picks the platform backend once and enforces "one username per service":
//! setting a credential first evicts whatever is stored for the service,
//! since the username itself may be changing.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::types::Credential;
use crate::error::Result;
use crate::options::{Platform, StoreOptions};
use crate::storage::{CredentialBackend, FileAdapter};

/// Credential store with a single credential per service
pub struct CredentialStore {
    /// Storage backend
    backend: Arc<dyn CredentialBackend>,
    /// Serializes mutations of the same service on this instance
    service_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CredentialStore {
    /// Create a store backed by this platform's secret storage
    pub fn new(options: StoreOptions) -> Result<Self> {
        let backend = backend_for(Platform::current(), &options)?;
        info!("Using {} for credentials", backend.backend_name());
        Ok(Self::with_backend(backend))
    }

    /// Create a store over an explicit backend
    pub fn with_backend(backend: Arc<dyn CredentialBackend>) -> Self {
        Self {
            backend,
            service_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Name of the active backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Get the credential stored for a service
    pub async fn get_credential(&self, service: &str) -> Result<Option<Credential>> {
        self.backend.get_credential(service).await
    }

    /// Store a credential, replacing any credential already stored for the service.
    ///
    /// If evicting the previous credential fails, nothing new is written and
    /// the error is returned; the previous credential may be partly removed.
    pub async fn set_credential(&self, service: &str, username: &str, password: &str) -> Result<()> {
        let _guard = self.lock_service(service).await;

        if let Some(existing) = self.backend.get_credential(service).await? {
            debug!("Replacing credential for {} (was user {})", service, existing.username());
            self.backend.remove_credential(service).await?;
        }

        self.backend.set_credential(service, username, password).await?;

        info!("Stored credential for {}", service);
        Ok(())
    }

    /// Remove every credential stored for a service
    pub async fn remove_credential(&self, service: &str) -> Result<()> {
        let _guard = self.lock_service(service).await;
        self.backend.remove_credential(service).await?;

        info!("Removed credential for {}", service);
        Ok(())
    }

    /// Get the credential for an exact service and username
    pub async fn get_credential_by_name(&self, service: &str, username: &str) -> Result<Option<Credential>> {
        self.backend.get_credential_by_name(service, username).await
    }

    /// Remove the credential for an exact service and username (`"*"` for all)
    pub async fn remove_credential_by_name(&self, service: &str, username: &str) -> Result<()> {
        let _guard = self.lock_service(service).await;
        self.backend.remove_credential_by_name(service, username).await
    }

    async fn lock_service(&self, service: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.service_locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(service.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

fn backend_for(platform: Platform, options: &StoreOptions) -> Result<Arc<dyn CredentialBackend>> {
    match platform {
        Platform::Windows => native_vault(options.prefix()),
        Platform::MacOs => native_keychain(options.prefix()),
        Platform::Other => Ok(Arc::new(FileAdapter::new(options.folder(), options.filename())?)),
    }
}

#[cfg(windows)]
fn native_vault(prefix: &str) -> Result<Arc<dyn CredentialBackend>> {
    use crate::platform::WindowsVault;
    use crate::storage::VaultAdapter;

    Ok(Arc::new(VaultAdapter::new(Box::new(WindowsVault::new()), prefix)))
}

#[cfg(not(windows))]
fn native_vault(_prefix: &str) -> Result<Arc<dyn CredentialBackend>> {
    Err(crate::error::CredentialError::Unsupported(
        "Windows Credential Manager".to_string(),
    ))
}

#[cfg(target_os = "macos")]
fn native_keychain(prefix: &str) -> Result<Arc<dyn CredentialBackend>> {
    use crate::platform::MacKeychain;
    use crate::storage::KeychainAdapter;

    Ok(Arc::new(KeychainAdapter::new(Box::new(MacKeychain::new()), prefix)))
}

#[cfg(not(target_os = "macos"))]
fn native_keychain(_prefix: &str) -> Result<Arc<dyn CredentialBackend>> {
    Err(crate::error::CredentialError::Unsupported("macOS Keychain".to_string()))
}
