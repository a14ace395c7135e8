//! Upload and compare a single file against its WebDAV endpoint

use credential_store::CredentialStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{self, ResolvedEndpoint};
use crate::credentials::{credentials_key, resolve_credentials, store_on_success, Prompter, ResolvedCredentials};
use crate::error::{CliError, Result};
use crate::transfer::WebDavClient;

/// Shared state for the file actions
pub struct ActionContext {
    store: Arc<CredentialStore>,
    prompter: Arc<dyn Prompter>,
    project_root: Option<PathBuf>,
}

/// Outcome of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub remote_path: String,
    /// Freshly entered credentials were saved
    pub credentials_saved: bool,
}

/// Outcome of a compare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareReport {
    pub remote_path: String,
    /// Downloaded copy of the remote file
    pub remote_copy: PathBuf,
    pub identical: bool,
}

/// Everything needed to talk to the endpoint of one file
struct Target {
    file: PathBuf,
    remote_path: String,
    key: String,
    credentials: ResolvedCredentials,
    client: WebDavClient,
}

impl ActionContext {
    pub fn new(store: Arc<CredentialStore>, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            store,
            prompter,
            project_root: None,
        }
    }

    /// Directory remote paths are computed from. Defaults to the
    /// directory holding `webdav.json`.
    pub fn with_project_root(mut self, project_root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(project_root.into());
        self
    }

    /// Upload `file` to its remote location
    pub async fn upload(&self, file: &Path) -> Result<UploadReport> {
        let target = self.prepare(file).await?;

        let contents = tokio::fs::read(&target.file).await?;
        target.client.write_file(&target.remote_path, contents).await?;

        let credentials_saved = self.remember(&target).await;
        Ok(UploadReport {
            remote_path: target.remote_path,
            credentials_saved,
        })
    }

    /// Download the remote copy of `file` into a temp file with the same
    /// extension and check whether it matches the local contents
    pub async fn compare(&self, file: &Path) -> Result<CompareReport> {
        let target = self.prepare(file).await?;

        let remote = target.client.read_file(&target.remote_path).await?;
        if remote.is_empty() {
            return Err(CliError::EmptyRemote(target.remote_path));
        }

        let remote_copy = write_temp_copy(&target.file, &remote)?;
        let local = tokio::fs::read(&target.file).await?;
        let identical = local == remote;
        info!(
            "Remote {} downloaded to {:?} ({})",
            target.remote_path,
            remote_copy,
            if identical { "identical" } else { "differs" }
        );

        self.remember(&target).await;
        Ok(CompareReport {
            remote_path: target.remote_path,
            remote_copy,
            identical,
        })
    }

    async fn prepare(&self, file: &Path) -> Result<Target> {
        let file = tokio::fs::canonicalize(file).await?;
        let working_dir = file.parent().unwrap_or_else(|| Path::new("/"));
        let endpoint = config::endpoint_for_dir(working_dir)?;
        let remote_path = self.remote_path_of(&endpoint, &file).await?;

        let key = credentials_key(&endpoint.remote.url)?;

        let credentials = resolve_credentials(&self.store, &key, self.prompter.as_ref())
            .await?
            .ok_or(CliError::Cancelled)?;

        let client = WebDavClient::new(
            &endpoint.remote.url,
            &credentials.username,
            &credentials.password,
            endpoint.remote.ignore_ssl_errors,
        )?;

        Ok(Target {
            file,
            remote_path,
            key,
            credentials,
            client,
        })
    }

    async fn remote_path_of(&self, endpoint: &ResolvedEndpoint, file: &Path) -> Result<String> {
        let root = match &self.project_root {
            Some(root) => tokio::fs::canonicalize(root).await?,
            None => endpoint.config_dir.clone(),
        };
        Ok(config::remote_path(&root, &endpoint.local_root_path, file)?)
    }

    /// The transfer already went through; a failure to save is only logged
    async fn remember(&self, target: &Target) -> bool {
        match store_on_success(&self.store, &target.key, &target.credentials).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Could not save credentials for {}: {}", target.key, e);
                false
            }
        }
    }
}

fn write_temp_copy(file: &Path, contents: &[u8]) -> Result<PathBuf> {
    let suffix = file
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut temp = tempfile::Builder::new()
        .prefix("webdav-remote-")
        .suffix(&suffix)
        .tempfile()?;
    temp.write_all(contents)?;
    temp.flush()?;

    let (_, path) = temp.keep().map_err(|e| e.error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::{file_store, Scripted};
    use crate::transfer::TransferError;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    /// `alice:pw`
    const ALICE_AUTH: &str = "Basic YWxpY2U6cHc=";

    #[derive(Default)]
    struct DavState {
        files: Mutex<HashMap<String, Vec<u8>>>,
        required_auth: Option<String>,
    }

    async fn dav(
        State(state): State<Arc<DavState>>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> (StatusCode, Vec<u8>) {
        if let Some(expected) = &state.required_auth {
            let given = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
            if given != Some(expected.as_str()) {
                return (StatusCode::UNAUTHORIZED, Vec::new());
            }
        }

        let mut files = state.files.lock().await;
        match method {
            Method::PUT => {
                files.insert(uri.path().to_string(), body.to_vec());
                (StatusCode::CREATED, Vec::new())
            }
            Method::GET => match files.get(uri.path()) {
                Some(contents) => (StatusCode::OK, contents.clone()),
                None => (StatusCode::NOT_FOUND, Vec::new()),
            },
            _ => (StatusCode::METHOD_NOT_ALLOWED, Vec::new()),
        }
    }

    /// Serve `state` on an ephemeral port and return `host:port`
    async fn serve(state: Arc<DavState>) -> String {
        let app = Router::new().fallback(dav).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    /// Project with `webdav.json` mapping `/site` to the server's `/www`
    fn project(server: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let config = format!(r#"{{ "/site": {{ "url": "http://{}/www" }} }}"#, server);
        std::fs::write(temp_dir.path().join(config::CONFIG_FILE_NAME), config).unwrap();

        let css = temp_dir.path().join("site").join("css");
        std::fs::create_dir_all(&css).unwrap();
        let file = css.join("main.css");
        std::fs::write(&file, "body { color: red; }").unwrap();
        (temp_dir, file)
    }

    fn context(store: Arc<CredentialStore>, prompter: Arc<Scripted>) -> ActionContext {
        ActionContext::new(store, prompter)
    }

    #[tokio::test]
    async fn test_upload_saves_prompted_credentials() {
        let state = Arc::new(DavState {
            required_auth: Some(ALICE_AUTH.to_string()),
            ..Default::default()
        });
        let server = serve(state.clone()).await;
        let (project_dir, file) = project(&server);
        let store = Arc::new(file_store(&project_dir));
        let prompter = Arc::new(Scripted::new(Some("alice"), Some("pw")));

        let report = context(store.clone(), prompter.clone()).upload(&file).await.unwrap();
        assert_eq!(report.remote_path, "/css/main.css");
        assert!(report.credentials_saved);

        let files = state.files.lock().await;
        assert_eq!(files.get("/www/css/main.css").unwrap(), b"body { color: red; }");
        drop(files);

        let saved = store.get_credential(&server).await.unwrap().unwrap();
        assert_eq!(saved.username(), "alice");
        assert_eq!(saved.password(), Some("pw"));

        // Second run uses the stored credentials without asking
        let asked = prompter.asked.load(Ordering::SeqCst);
        let report = context(store, prompter.clone()).upload(&file).await.unwrap();
        assert!(!report.credentials_saved);
        assert_eq!(prompter.asked.load(Ordering::SeqCst), asked);
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_credentials_unsaved() {
        let state = Arc::new(DavState {
            required_auth: Some(ALICE_AUTH.to_string()),
            ..Default::default()
        });
        let server = serve(state.clone()).await;
        let (project_dir, file) = project(&server);
        let store = Arc::new(file_store(&project_dir));
        let prompter = Arc::new(Scripted::new(Some("alice"), Some("wrong")));

        let err = context(store.clone(), prompter).upload(&file).await.unwrap_err();
        assert!(matches!(
            err,
            CliError::Transfer(TransferError::Status { status, .. }) if status == StatusCode::UNAUTHORIZED
        ));
        assert!(store.get_credential(&server).await.unwrap().is_none());
        assert!(state.files.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_login_cancels() {
        let server = serve(Arc::new(DavState::default())).await;
        let (project_dir, file) = project(&server);
        let store = Arc::new(file_store(&project_dir));

        let err = context(store, Arc::new(Scripted::new(None, None)))
            .upload(&file)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Cancelled));
    }

    #[tokio::test]
    async fn test_anonymous_upload_with_project_root() {
        let state = Arc::new(DavState::default());
        let server = serve(state.clone()).await;
        let (project_dir, file) = project(&server);
        let store = Arc::new(file_store(&project_dir));

        let report = context(store.clone(), Arc::new(Scripted::new(Some(""), None)))
            .with_project_root(project_dir.path())
            .upload(&file)
            .await
            .unwrap();
        assert_eq!(report.remote_path, "/css/main.css");
        assert!(!report.credentials_saved);
        assert!(state.files.lock().await.contains_key("/www/css/main.css"));
        assert!(store.get_credential(&server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compare() {
        let state = Arc::new(DavState::default());
        let server = serve(state.clone()).await;
        let (project_dir, file) = project(&server);
        let store = Arc::new(file_store(&project_dir));
        store.set_credential(&server, "alice", "pw").await.unwrap();

        state
            .files
            .lock()
            .await
            .insert("/www/css/main.css".to_string(), b"body { color: red; }".to_vec());

        let ctx = context(store, Arc::new(Scripted::new(None, None)));
        let report = ctx.compare(&file).await.unwrap();
        assert!(report.identical);
        assert_eq!(report.remote_copy.extension().unwrap(), "css");
        assert_eq!(std::fs::read(&report.remote_copy).unwrap(), b"body { color: red; }");
        std::fs::remove_file(&report.remote_copy).unwrap();

        std::fs::write(&file, "body { color: blue; }").unwrap();
        let report = ctx.compare(&file).await.unwrap();
        assert!(!report.identical);
        std::fs::remove_file(&report.remote_copy).unwrap();
    }

    #[tokio::test]
    async fn test_compare_empty_remote() {
        let state = Arc::new(DavState::default());
        let server = serve(state.clone()).await;
        let (project_dir, file) = project(&server);
        let store = Arc::new(file_store(&project_dir));
        state
            .files
            .lock()
            .await
            .insert("/www/css/main.css".to_string(), Vec::new());

        let err = context(store, Arc::new(Scripted::new(Some(""), None)))
            .compare(&file)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::EmptyRemote(ref p) if p == "/css/main.css"));
    }

    #[tokio::test]
    async fn test_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("orphan.txt");
        std::fs::write(&file, "x").unwrap();
        let store = Arc::new(file_store(&temp_dir));

        let result = context(store, Arc::new(Scripted::new(None, None))).upload(&file).await;
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
