//! Credential type definitions

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Username that addresses every credential stored for a service
pub const WILDCARD_USERNAME: &str = "*";

/// A username/password pair stored for a service.
///
/// The password may be missing when the credential comes out of a metadata
/// enumeration (the keychain lists accounts without their secrets).
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    #[zeroize(skip)]
    service: String,
    #[zeroize(skip)]
    username: String,
    password: Option<String>,
}

impl Credential {
    /// Create a new credential
    pub fn new(service: impl Into<String>, username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            service: service.into(),
            username: username.into(),
            password,
        }
    }

    /// Create a credential that carries no secret yet
    pub fn without_password(service: impl Into<String>, username: impl Into<String>) -> Self {
        Self::new(service, username, None)
    }

    /// Service this credential authenticates against
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password (use carefully)
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Copy of this credential with the given password filled in
    pub fn with_password(&self, password: String) -> Self {
        Self::new(self.service.clone(), self.username.clone(), Some(password))
    }

    /// Whether this credential belongs to `service` and `username`
    pub fn matches(&self, service: &str, username: &str) -> bool {
        self.service == service && self.username == username
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("service", &self.service)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// One entry of the JSON file store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub service: String,
    pub username: String,
    pub password: String,
}

impl StoredRecord {
    pub fn new(service: &str, username: &str, password: &str) -> Self {
        Self {
            service: service.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn matches(&self, service: &str, username: &str) -> bool {
        self.service == service && self.username == username
    }
}

impl From<&StoredRecord> for Credential {
    fn from(record: &StoredRecord) -> Self {
        Credential::new(
            record.service.clone(),
            record.username.clone(),
            Some(record.password.clone()),
        )
    }
}

impl std::fmt::Debug for StoredRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredRecord")
            .field("service", &self.service)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
