//! Error types for credential-store

use thiserror::Error;

/// Result type alias for credential store operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Credential store error types
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Raised by the raw platform APIs when a record is absent.
    /// Adapters turn this into `Ok(None)` / `Ok(())`.
    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Credential vault error: {0}")]
    VaultError(String),

    #[error("Keychain error: {0}")]
    KeychainError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Backend not supported on this platform: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl CredentialError {
    /// Whether this error only signals that the record does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(CredentialError::NotFound("x".into()).is_not_found());
        assert!(CredentialError::IoError(std::io::Error::from(std::io::ErrorKind::NotFound)).is_not_found());
        assert!(!CredentialError::IoError(std::io::Error::from(std::io::ErrorKind::PermissionDenied)).is_not_found());
        assert!(!CredentialError::VaultError("boom".into()).is_not_found());
    }
}
