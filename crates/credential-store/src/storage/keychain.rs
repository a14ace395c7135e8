//! Keychain storage backend
//!
//! Items are stored as `{account: username, service: <prefix><service>}`.
//! Listing only returns metadata, so reads are two-phase: enumerate to find
//! the item, then fetch its secret. There is no wildcard delete either;
//! removing a service removes each matching item in turn.

use async_trait::async_trait;
use tracing::debug;

use super::CredentialBackend;
use crate::credential::{Credential, WILDCARD_USERNAME};
use crate::error::Result;
use crate::platform::{drain, KeychainApi};

/// Keychain storage backend (macOS Keychain)
pub struct KeychainAdapter {
    keychain: Box<dyn KeychainApi>,
    prefix: String,
}

impl KeychainAdapter {
    /// Create a keychain backend namespacing every service with `prefix`
    pub fn new(keychain: Box<dyn KeychainApi>, prefix: &str) -> Self {
        Self {
            keychain,
            prefix: prefix.to_string(),
        }
    }

    fn prefixed(&self, service: &str) -> String {
        format!("{}{}", self.prefix, service)
    }

    /// Credentials under our prefix (without passwords), optionally for one service
    async fn list_credentials(&self, service: Option<&str>) -> Result<Vec<Credential>> {
        let items = drain(self.keychain.list()).await?;

        let credentials: Vec<Credential> = items
            .into_iter()
            .filter_map(|item| {
                let svc = item.service.strip_prefix(&self.prefix)?;
                if service.map_or(true, |s| s == svc) {
                    Some(Credential::without_password(svc, item.account))
                } else {
                    None
                }
            })
            .collect();

        debug!("Listed {} keychain items", credentials.len());
        Ok(credentials)
    }

    /// Fetch the secret for a listed credential
    async fn fill_password(&self, listed: Credential) -> Result<Option<Credential>> {
        let service = self.prefixed(listed.service());
        match self.keychain.get_secret(listed.username(), &service).await {
            Ok(secret) => Ok(Some(listed.with_password(secret))),
            Err(e) if e.is_not_found() => {
                debug!("Keychain item vanished before its secret was read: {}", service);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn remove_item(&self, service: &str, username: &str) -> Result<()> {
        match self.keychain.remove(username, &self.prefixed(service)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Remove every item stored for `service`
    async fn remove_all(&self, service: &str) -> Result<()> {
        let matches = self.list_credentials(Some(service)).await?;
        for cred in &matches {
            self.remove_item(cred.service(), cred.username()).await?;
        }
        debug!("Removed {} keychain items for {}", matches.len(), service);
        Ok(())
    }
}

#[async_trait]
impl CredentialBackend for KeychainAdapter {
    async fn get_credential(&self, service: &str) -> Result<Option<Credential>> {
        match self.list_credentials(Some(service)).await?.into_iter().next() {
            Some(listed) => self.fill_password(listed).await,
            None => Ok(None),
        }
    }

    async fn set_credential(&self, service: &str, username: &str, password: &str) -> Result<()> {
        self.keychain
            .set_secret(username, &self.prefixed(service), password)
            .await?;
        debug!("Stored keychain item for {}", service);
        Ok(())
    }

    async fn remove_credential(&self, service: &str) -> Result<()> {
        self.remove_all(service).await
    }

    async fn get_credential_by_name(&self, service: &str, username: &str) -> Result<Option<Credential>> {
        let listed = self
            .list_credentials(Some(service))
            .await?
            .into_iter()
            .find(|c| c.username() == username);

        match listed {
            Some(listed) => self.fill_password(listed).await,
            None => Ok(None),
        }
    }

    async fn remove_credential_by_name(&self, service: &str, username: &str) -> Result<()> {
        if username == WILDCARD_USERNAME {
            self.remove_all(service).await
        } else {
            self.remove_item(service, username).await
        }
    }

    fn backend_name(&self) -> &'static str {
        self.keychain.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CredentialError;
    use crate::platform::MemoryKeychain;
    use std::sync::Arc;

    /// Lets a test look at the raw keychain behind an adapter
    struct Shared(Arc<MemoryKeychain>);

    #[async_trait]
    impl KeychainApi for Shared {
        fn list(&self) -> crate::platform::RecordStream<crate::platform::KeychainItem> {
            self.0.list()
        }
        async fn get_secret(&self, account: &str, service: &str) -> Result<String> {
            self.0.get_secret(account, service).await
        }
        async fn set_secret(&self, account: &str, service: &str, secret: &str) -> Result<()> {
            self.0.set_secret(account, service, secret).await
        }
        async fn remove(&self, account: &str, service: &str) -> Result<()> {
            self.0.remove(account, service).await
        }
        fn name(&self) -> &'static str {
            self.0.name()
        }
    }

    fn adapter() -> (KeychainAdapter, Arc<MemoryKeychain>) {
        let raw = Arc::new(MemoryKeychain::new());
        (KeychainAdapter::new(Box::new(Shared(raw.clone())), "secret:"), raw)
    }

    #[tokio::test]
    async fn test_prefix_round_trip() {
        let (keychain, raw) = adapter();

        keychain.set_credential("example.com:443", "alice", "pw").await.unwrap();

        // Stored under the prefixed service name
        assert_eq!(raw.get_secret("alice", "secret:example.com:443").await.unwrap(), "pw");

        let cred = keychain.get_credential("example.com:443").await.unwrap().unwrap();
        assert_eq!(cred.service(), "example.com:443");
        assert_eq!(cred.username(), "alice");
        assert_eq!(cred.password(), Some("pw"));
    }

    #[tokio::test]
    async fn test_foreign_items_are_ignored() {
        let (keychain, raw) = adapter();
        raw.set_secret("alice", "example.com", "unrelated").await.unwrap();

        assert!(keychain.get_credential("example.com").await.unwrap().is_none());
        keychain.remove_credential("example.com").await.unwrap();
        assert_eq!(raw.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_all_for_service() {
        let (keychain, raw) = adapter();
        keychain.set_credential("svc", "alice", "a").await.unwrap();
        keychain.set_credential("svc", "bob", "b").await.unwrap();
        keychain.set_credential("svc2", "carol", "c").await.unwrap();

        keychain.remove_credential("svc").await.unwrap();

        assert!(keychain.get_credential("svc").await.unwrap().is_none());
        assert!(keychain.get_credential("svc2").await.unwrap().is_some());
        assert_eq!(raw.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_by_name() {
        let (keychain, _) = adapter();
        keychain.set_credential("svc", "alice", "a").await.unwrap();
        keychain.set_credential("svc", "bob", "b").await.unwrap();

        keychain.remove_credential_by_name("svc", "alice").await.unwrap();
        assert!(keychain.get_credential_by_name("svc", "alice").await.unwrap().is_none());

        let bob = keychain.get_credential_by_name("svc", "bob").await.unwrap().unwrap();
        assert_eq!(bob.password(), Some("b"));

        // Already gone: still fine
        keychain.remove_credential_by_name("svc", "alice").await.unwrap();

        keychain.remove_credential_by_name("svc", WILDCARD_USERNAME).await.unwrap();
        assert!(keychain.get_credential("svc").await.unwrap().is_none());
    }

    /// Lists items whose secrets are already gone
    struct Vanishing(MemoryKeychain);

    #[async_trait]
    impl KeychainApi for Vanishing {
        fn list(&self) -> crate::platform::RecordStream<crate::platform::KeychainItem> {
            self.0.list()
        }
        async fn get_secret(&self, account: &str, service: &str) -> Result<String> {
            Err(CredentialError::NotFound(format!("{}/{}", service, account)))
        }
        async fn set_secret(&self, account: &str, service: &str, secret: &str) -> Result<()> {
            self.0.set_secret(account, service, secret).await
        }
        async fn remove(&self, account: &str, service: &str) -> Result<()> {
            self.0.remove(account, service).await
        }
        fn name(&self) -> &'static str {
            self.0.name()
        }
    }

    #[tokio::test]
    async fn test_secret_gone_after_listing() {
        let keychain = KeychainAdapter::new(Box::new(Vanishing(MemoryKeychain::new())), "secret:");
        keychain.set_credential("svc", "alice", "pw").await.unwrap();

        assert!(keychain.get_credential("svc").await.unwrap().is_none());
        assert!(keychain.get_credential_by_name("svc", "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_separators_in_names() {
        let (keychain, _) = adapter();
        keychain.set_credential("a|b", "u|v", "p").await.unwrap();
        keychain.set_credential("a", "w", "q").await.unwrap();

        let cred = keychain.get_credential("a|b").await.unwrap().unwrap();
        assert_eq!(cred.username(), "u|v");

        keychain.remove_credential("a").await.unwrap();
        assert!(keychain.get_credential("a").await.unwrap().is_none());
        assert!(keychain.get_credential_by_name("a|b", "u|v").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_listing_error_fails_lookup() {
        let keychain = KeychainAdapter::new(
            Box::new(MemoryKeychain::new().with_list_error("stream broke")),
            "secret:",
        );

        let err = keychain.get_credential("svc").await.unwrap_err();
        assert!(matches!(err, CredentialError::KeychainError(_)));

        let err = keychain.remove_credential("svc").await.unwrap_err();
        assert!(matches!(err, CredentialError::KeychainError(_)));
    }
}
