//! Storage trait definitions

use crate::credential::Credential;
use crate::error::Result;
use async_trait::async_trait;

/// Platform-specific CRUD over stored credentials.
///
/// Backends know nothing about the one-credential-per-service policy; that
/// is applied by [`CredentialStore`](crate::CredentialStore).
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// First credential stored for `service`, if any
    async fn get_credential(&self, service: &str) -> Result<Option<Credential>>;

    /// Store a credential. Existing records for other usernames are left alone.
    async fn set_credential(&self, service: &str, username: &str, password: &str) -> Result<()>;

    /// Remove every credential stored for `service`. Succeeds when none exist.
    async fn remove_credential(&self, service: &str) -> Result<()>;

    /// Credential stored for exactly `service` and `username`
    async fn get_credential_by_name(&self, service: &str, username: &str) -> Result<Option<Credential>>;

    /// Remove the credential for `service` and `username`.
    /// [`WILDCARD_USERNAME`](crate::credential::WILDCARD_USERNAME) removes all usernames.
    async fn remove_credential_by_name(&self, service: &str, username: &str) -> Result<()>;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
