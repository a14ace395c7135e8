//! Credential vault backend
//!
//! The vault has no service field, so each record lives under a composite
//! target `<prefix><service>|<username>`. Any `|` or `\\` inside the service is
//! escaped with `\\`, which makes the first unescaped `|` the end of the
//! service. Usernames are stored as-is and may contain anything.

use async_trait::async_trait;
use std::borrow::Cow;
use tracing::{debug, warn};

use super::CredentialBackend;
use crate::credential::Credential;
use crate::error::Result;
use crate::platform::{drain, VaultApi, VaultRecord, TARGET_WILDCARD};

/// Separator between service and username in a target name
pub const TARGET_SEPARATOR: char = '|';

/// Escapes a separator (or itself) inside the service part of a target
pub const TARGET_ESCAPE: char = '\\';

/// Credential vault backend (Windows Credential Manager)
pub struct VaultAdapter {
    vault: Box<dyn VaultApi>,
    prefix: String,
}

impl VaultAdapter {
    /// Create a vault backend over a raw vault, namespacing targets with `prefix`
    pub fn new(vault: Box<dyn VaultApi>, prefix: &str) -> Self {
        Self {
            vault,
            prefix: prefix.to_string(),
        }
    }

    /// Target name for a service and username
    pub fn target_name(&self, service: &str, username: &str) -> String {
        format!("{}{}{}{}", self.prefix, escape_service(service), TARGET_SEPARATOR, username)
    }

    /// Turn a listed record back into a credential.
    ///
    /// Returns `None` for records that were not written by this adapter.
    fn decode(&self, record: &VaultRecord) -> Option<Credential> {
        let composite = record.target_name.strip_prefix(&self.prefix)?;
        let Some((service, username)) = split_target(composite) else {
            warn!("Skipping vault record without a separator: {}", record.target_name);
            return None;
        };

        let password = hex::decode(&record.credential)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        let Some(password) = password else {
            warn!("Skipping vault record with an undecodable payload: {}", record.target_name);
            return None;
        };

        Some(Credential::new(service, username, Some(password)))
    }

    /// Every credential under our prefix
    async fn list_credentials(&self) -> Result<Vec<Credential>> {
        let records = drain(self.vault.list(Some(&self.prefix))).await?;
        debug!("Listed {} vault records", records.len());
        Ok(records.iter().filter_map(|r| self.decode(r)).collect())
    }

    async fn remove_target(&self, target: &str) -> Result<()> {
        match self.vault.remove(target).await {
            Ok(()) => {
                debug!("Removed vault target: {}", target);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Vault target already absent: {}", target);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Escape `service` for use in a target name
pub fn escape_service(service: &str) -> Cow<'_, str> {
    if !service.contains(&[TARGET_ESCAPE, TARGET_SEPARATOR][..]) {
        return Cow::Borrowed(service);
    }

    let mut escaped = String::with_capacity(service.len() + 2);
    for c in service.chars() {
        if c == TARGET_ESCAPE || c == TARGET_SEPARATOR {
            escaped.push(TARGET_ESCAPE);
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Split `service|username` on the first unescaped separator, unescaping the service
pub fn split_target(composite: &str) -> Option<(String, &str)> {
    let mut service = String::new();
    let mut chars = composite.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            TARGET_ESCAPE => service.push(chars.next()?.1),
            TARGET_SEPARATOR => return Some((service, &composite[idx + c.len_utf8()..])),
            _ => service.push(c),
        }
    }
    None
}

#[async_trait]
impl CredentialBackend for VaultAdapter {
    async fn get_credential(&self, service: &str) -> Result<Option<Credential>> {
        let found = self
            .list_credentials()
            .await?
            .into_iter()
            .find(|c| c.service() == service);
        Ok(found)
    }

    async fn set_credential(&self, service: &str, username: &str, password: &str) -> Result<()> {
        let target = self.target_name(service, username);
        self.vault.write(&target, password.as_bytes()).await?;
        debug!("Stored vault target: {}", target);
        Ok(())
    }

    async fn remove_credential(&self, service: &str) -> Result<()> {
        // Escaping keeps `svc|*` from reaching into a service named `svc|other`
        let target = self.target_name(service, &TARGET_WILDCARD.to_string());
        self.remove_target(&target).await
    }

    async fn get_credential_by_name(&self, service: &str, username: &str) -> Result<Option<Credential>> {
        let found = self
            .list_credentials()
            .await?
            .into_iter()
            .find(|c| c.matches(service, username));
        Ok(found)
    }

    async fn remove_credential_by_name(&self, service: &str, username: &str) -> Result<()> {
        let target = self.target_name(service, username);
        self.remove_target(&target).await
    }

    fn backend_name(&self) -> &'static str {
        self.vault.name()
    }
}
