//! Credentials for a remote endpoint
//!
//! Stored credentials are keyed by the endpoint's `host[:port]`. When none
//! are stored the user is prompted; prompted credentials are only saved
//! after a transfer using them has succeeded.

use async_trait::async_trait;
use credential_store::{CredentialStore, StoreOptions};
use std::io::{self, BufRead, Write};
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::transfer::TransferError;

/// Service prefix for endpoint credentials in the vault and keychain
pub const STORE_PREFIX: &str = "vscode-webdav:";
/// Folder under the home directory for the fallback secrets file
pub const STORE_FOLDER: &str = ".webdav";
/// Name of the fallback secrets file
pub const STORE_FILENAME: &str = "webdav-secrets.json";

/// Store options for endpoint credentials
pub fn store_options() -> StoreOptions {
    StoreOptions::new()
        .with_prefix(STORE_PREFIX)
        .with_folder(STORE_FOLDER)
        .with_filename(STORE_FILENAME)
}

/// Lookup key for an endpoint URL: `host:port` when the URL spells out a
/// port (even the scheme's default one), else `host`
pub fn credentials_key(raw_url: &str) -> std::result::Result<String, TransferError> {
    let url = Url::parse(raw_url).map_err(|e| TransferError::InvalidUrl(format!("{}: {}", raw_url, e)))?;
    let host = url.host_str().unwrap_or_default();

    // `Url` drops default ports, so look at the authority as written
    let port = if has_explicit_port(raw_url) {
        url.port_or_known_default()
    } else {
        None
    };

    Ok(match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn has_explicit_port(raw_url: &str) -> bool {
    let Some((_, rest)) = raw_url.split_once("://") else {
        return false;
    };
    let authority = rest.split(&['/', '?', '#'][..]).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);

    match host_port.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Asks the user for credentials. `None` means the prompt was abandoned.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn ask_username(&self, key: &str) -> io::Result<Option<String>>;
    async fn ask_password(&self) -> io::Result<Option<String>>;
}

/// Prompts on the controlling terminal
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn ask_username(&self, key: &str) -> io::Result<Option<String>> {
        let prompt = format!("Username for {} ? ", key);
        tokio::task::spawn_blocking(move || {
            let mut stderr = io::stderr();
            stderr.write_all(prompt.as_bytes())?;
            stderr.flush()?;

            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Ok(None);
            }
            Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn ask_password(&self) -> io::Result<Option<String>> {
        tokio::task::spawn_blocking(|| rpassword::prompt_password("Password ? ").map(Some))
            .await
            .map_err(io::Error::other)?
    }
}

/// Credentials to use for a transfer
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub username: String,
    pub password: String,
    /// Entered by the user rather than loaded from the store
    pub is_new: bool,
}

impl ResolvedCredentials {
    /// Blank credentials: the user skipped the prompt
    pub fn empty() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            is_new: true,
        }
    }

    /// Whether these should be saved once the transfer succeeds
    pub fn should_store(&self) -> bool {
        self.is_new && !self.username.is_empty()
    }
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("is_new", &self.is_new)
            .finish()
    }
}

/// Stored credentials for `key`, or whatever the user types in.
///
/// Returns `Ok(None)` when the user abandoned the prompt.
pub async fn resolve_credentials(
    store: &CredentialStore,
    key: &str,
    prompter: &dyn Prompter,
) -> Result<Option<ResolvedCredentials>> {
    if let Some(cred) = store.get_credential(key).await? {
        debug!("Using stored credentials for {}", key);
        return Ok(Some(ResolvedCredentials {
            username: cred.username().to_string(),
            password: cred.password().unwrap_or_default().to_string(),
            is_new: false,
        }));
    }

    let Some(username) = prompter.ask_username(key).await? else {
        return Ok(None);
    };
    if username.is_empty() {
        return Ok(Some(ResolvedCredentials::empty()));
    }

    let Some(password) = prompter.ask_password().await? else {
        return Ok(None);
    };
    if password.is_empty() {
        return Ok(Some(ResolvedCredentials::empty()));
    }

    Ok(Some(ResolvedCredentials {
        username,
        password,
        is_new: true,
    }))
}

/// Save credentials that were entered for a transfer that just succeeded
pub async fn store_on_success(store: &CredentialStore, key: &str, credentials: &ResolvedCredentials) -> Result<bool> {
    if !credentials.should_store() {
        return Ok(false);
    }
    store
        .set_credential(key, &credentials.username, &credentials.password)
        .await?;
    Ok(true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use credential_store::FileAdapter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Prompter replaying canned answers
    pub(crate) struct Scripted {
        pub username: Option<String>,
        pub password: Option<String>,
        pub asked: AtomicUsize,
    }

    impl Scripted {
        pub(crate) fn new(username: Option<&str>, password: Option<&str>) -> Self {
            Self {
                username: username.map(str::to_string),
                password: password.map(str::to_string),
                asked: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Prompter for Scripted {
        async fn ask_username(&self, _key: &str) -> io::Result<Option<String>> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(self.username.clone())
        }
        async fn ask_password(&self) -> io::Result<Option<String>> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(self.password.clone())
        }
    }

    pub(crate) fn file_store(dir: &TempDir) -> CredentialStore {
        CredentialStore::with_backend(Arc::new(FileAdapter::with_path(dir.path().join("secrets.json"))))
    }

    #[test]
    fn test_credentials_key() {
        assert_eq!(credentials_key("https://dav.example.com:8443/www").unwrap(), "dav.example.com:8443");
        assert_eq!(credentials_key("https://dav.example.com/www").unwrap(), "dav.example.com");
        assert_eq!(credentials_key("https://user@dav.example.com/a:1").unwrap(), "dav.example.com");
        assert_eq!(credentials_key("http://[::1]/www").unwrap(), "[::1]");
        assert_eq!(credentials_key("http://[::1]:8080/www").unwrap(), "[::1]:8080");
        assert!(credentials_key("not a url").is_err());
    }

    #[test]
    fn test_written_default_port_is_kept() {
        assert_eq!(credentials_key("http://dav.example.com:80/").unwrap(), "dav.example.com:80");
        assert_eq!(credentials_key("https://dav.example.com:443").unwrap(), "dav.example.com:443");
    }

    #[test]
    fn test_store_options() {
        let options = store_options();
        assert_eq!(options.prefix(), "vscode-webdav:");
        assert_eq!(options.folder(), ".webdav");
        assert_eq!(options.filename(), "webdav-secrets.json");
    }

    #[tokio::test]
    async fn test_stored_credentials_skip_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let store = file_store(&temp_dir);
        store.set_credential("host", "alice", "pw").await.unwrap();
        let prompter = Scripted::new(Some("bob"), Some("other"));

        let creds = resolve_credentials(&store, "host", &prompter).await.unwrap().unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "pw");
        assert!(!creds.is_new);
        assert!(!creds.should_store());
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prompted_credentials() {
        let temp_dir = TempDir::new().unwrap();
        let store = file_store(&temp_dir);
        let prompter = Scripted::new(Some("bob"), Some("pw"));

        let creds = resolve_credentials(&store, "host", &prompter).await.unwrap().unwrap();
        assert_eq!(creds.username, "bob");
        assert!(creds.should_store());

        // Nothing saved until the transfer succeeds
        assert!(store.get_credential("host").await.unwrap().is_none());

        assert!(store_on_success(&store, "host", &creds).await.unwrap());
        let saved = store.get_credential("host").await.unwrap().unwrap();
        assert_eq!(saved.username(), "bob");
    }

    #[tokio::test]
    async fn test_blank_answers_give_empty_credentials() {
        let temp_dir = TempDir::new().unwrap();
        let store = file_store(&temp_dir);

        let creds = resolve_credentials(&store, "host", &Scripted::new(Some(""), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds, ResolvedCredentials::empty());
        assert!(!creds.should_store());

        let creds = resolve_credentials(&store, "host", &Scripted::new(Some("bob"), Some("")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds, ResolvedCredentials::empty());

        assert!(!store_on_success(&store, "host", &creds).await.unwrap());
        assert!(store.get_credential("host").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let store = file_store(&temp_dir);

        let creds = resolve_credentials(&store, "host", &Scripted::new(None, None)).await.unwrap();
        assert!(creds.is_none());
    }
}
