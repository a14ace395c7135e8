//! Error types for webdav-cli

use thiserror::Error;

use crate::config::ConfigError;
use crate::transfer::TransferError;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Error while retrieving credentials: {0}")]
    Credential(#[from] credential_store::CredentialError),

    #[error("Error in WebDAV communication: {0}")]
    Transfer(#[from] TransferError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("WebDAV login cancelled")]
    Cancelled,

    #[error("Cannot download remote file {0}")]
    EmptyRemote(String),
}
