//! # credential-store
//!
//! Cross-platform storage for one username/password pair per service:
//! - Windows: Credential Manager, targets named `<prefix><service>|<username>`
//! - macOS: Keychain, services named `<prefix><service>`
//! - Linux and others: a JSON file under the home directory (mode 0600)
//!
//! [`CredentialStore`] picks the backend for the host platform and makes
//! sure a service never ends up with more than one stored credential.

pub mod credential;
pub mod error;
pub mod options;
pub mod platform;
pub mod storage;

pub use credential::{Credential, CredentialStore, StoredRecord, WILDCARD_USERNAME};
pub use error::{CredentialError, Result};
pub use options::{Platform, StoreOptions};
pub use storage::{CredentialBackend, FileAdapter, FileRecordStore, KeychainAdapter, VaultAdapter};
