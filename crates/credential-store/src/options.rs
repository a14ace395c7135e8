//! Store construction options
//!
//! All fields are optional overrides. Defaults depend on the backend in use:
//! vault and keychain namespace entries with a prefix, the file backend
//! picks a folder and file name under the home directory.

use serde::{Deserialize, Serialize};

/// Default service prefix for vault and keychain entries
pub const DEFAULT_PREFIX: &str = "secret:";
/// Default folder (relative to home) for the file backend
pub const DEFAULT_FOLDER: &str = ".secrets";
/// Default file name for the file backend
pub const DEFAULT_FILENAME: &str = "secrets.json";

/// Host platform, as far as backend selection is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Windows Credential Manager
    Windows,
    /// macOS Keychain
    MacOs,
    /// Anything else gets the JSON file
    Other,
}

impl Platform {
    /// Platform this binary was built for
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }
}

/// Optional overrides for a [`CredentialStore`](crate::CredentialStore)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOptions {
    /// Service prefix (vault and keychain)
    pub prefix: Option<String>,
    /// Folder under the home directory (file backend)
    pub folder: Option<String>,
    /// File name inside the folder (file backend)
    pub filename: Option<String>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Effective prefix
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    /// Effective folder
    pub fn folder(&self) -> &str {
        self.folder.as_deref().unwrap_or(DEFAULT_FOLDER)
    }

    /// Effective file name
    pub fn filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(DEFAULT_FILENAME)
    }
}
