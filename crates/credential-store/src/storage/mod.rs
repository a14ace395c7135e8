//! Storage backends for credential persistence
//!
//! Three backends share the [`CredentialBackend`] contract:
//! 1. Credential vault with composite target names (Windows)
//! 2. Keychain with prefixed service names (macOS)
//! 3. JSON record file (Linux and fallback)

mod traits;
mod vault;
mod keychain;
mod file;
mod file_records;

pub use traits::CredentialBackend;
pub use vault::{escape_service, split_target, VaultAdapter, TARGET_ESCAPE, TARGET_SEPARATOR};
pub use keychain::KeychainAdapter;
pub use file::FileAdapter;
pub use file_records::FileRecordStore;
