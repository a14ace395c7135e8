//! Raw platform secret stores
//!
//! These traits mirror what the operating system offers and nothing more:
//! - a credential vault addressed by a single target string (Windows)
//! - a keychain addressed by account + service (macOS)
//!
//! Listing is exposed as a [`RecordStream`]: records are produced one at a
//! time by a blocking enumeration task and the stream ends either normally
//! or with the first enumeration error. Callers drain it with [`drain`].
//!
//! Missing records are reported as [`CredentialError::NotFound`]; deciding
//! whether that is an error is left to the storage adapters.

mod memory;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(windows)]
mod windows;

pub use memory::{MemoryKeychain, MemoryVault};
#[cfg(target_os = "macos")]
pub use macos::MacKeychain;
#[cfg(windows)]
pub use windows::WindowsVault;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{CredentialError, Result};

/// Lazy, finite, non-restartable sequence of enumerated records
pub type RecordStream<T> = BoxStream<'static, Result<T>>;

/// Capacity of the channel between an enumeration task and its consumer
const STREAM_BUFFER: usize = 32;

/// Trailing character that turns a vault target into a prefix match
pub const TARGET_WILDCARD: char = '*';

/// A record as enumerated from the credential vault
#[derive(Clone)]
pub struct VaultRecord {
    /// Full target name, including any prefix
    pub target_name: String,
    /// Stored secret bytes, hex encoded
    pub credential: String,
}

impl std::fmt::Debug for VaultRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultRecord")
            .field("target_name", &self.target_name)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

/// Keychain item metadata. Secrets are fetched separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeychainItem {
    pub account: String,
    pub service: String,
}

/// Credential vault keyed by a single target string
#[async_trait]
pub trait VaultApi: Send + Sync {
    /// Enumerate records whose target starts with `filter` (all records when `None`)
    fn list(&self, filter: Option<&str>) -> RecordStream<VaultRecord>;

    /// Create or overwrite the record at `target`
    async fn write(&self, target: &str, secret: &[u8]) -> Result<()>;

    /// Remove the record at `target`.
    ///
    /// A target ending in [`TARGET_WILDCARD`] removes every record sharing
    /// the preceding prefix. Fails with `NotFound` when nothing matched.
    async fn remove(&self, target: &str) -> Result<()>;

    /// Human-readable backend name
    fn name(&self) -> &'static str;
}

/// Keychain keyed by account and service
#[async_trait]
pub trait KeychainApi: Send + Sync {
    /// Enumerate the metadata of every generic password item
    fn list(&self) -> RecordStream<KeychainItem>;

    /// Fetch the secret for one item. Fails with `NotFound` when absent.
    async fn get_secret(&self, account: &str, service: &str) -> Result<String>;

    /// Create or overwrite an item
    async fn set_secret(&self, account: &str, service: &str, secret: &str) -> Result<()>;

    /// Remove one item. Fails with `NotFound` when absent.
    async fn remove(&self, account: &str, service: &str) -> Result<()>;

    /// Human-readable backend name
    fn name(&self) -> &'static str;
}

/// Run a blocking enumeration on the blocking pool and stream its records.
///
/// The producer pushes records through `emit`; returning an error ends the
/// stream with that error.
#[cfg_attr(not(any(windows, target_os = "macos")), allow(dead_code))]
pub(crate) fn blocking_stream<T, F>(produce: F) -> RecordStream<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn FnMut(T) -> bool) -> Result<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    tokio::task::spawn_blocking(move || {
        let mut emit = |item: T| tx.blocking_send(Ok(item)).is_ok();
        if let Err(e) = produce(&mut emit) {
            let _ = tx.blocking_send(Err(e));
        }
    });

    ReceiverStream::new(rx).boxed()
}

/// Stream over records that are already in memory
pub(crate) fn ready_stream<T: Send + 'static>(items: Vec<Result<T>>) -> RecordStream<T> {
    futures::stream::iter(items).boxed()
}

/// Consume a stream to the end, failing on the first error it yields
pub async fn drain<T>(stream: RecordStream<T>) -> Result<Vec<T>> {
    stream.try_collect().await
}

/// Run a blocking platform call without stalling the runtime
#[cfg_attr(not(any(windows, target_os = "macos")), allow(dead_code))]
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| CredentialError::StorageError(format!("Blocking task failed: {}", e)))?
}
