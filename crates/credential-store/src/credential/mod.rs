//! Credential values and the single-credential-per-service store

mod store;
mod types;

pub use store::CredentialStore;
pub use types::*;
