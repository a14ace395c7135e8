//! Minimal WebDAV client: whole-file GET and PUT with basic auth

use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Request timeout for transfers
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {path} failed with status {status}")]
    Status {
        method: &'static str,
        path: String,
        status: StatusCode,
    },
}

/// Client for one WebDAV endpoint
pub struct WebDavClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl WebDavClient {
    /// Create a client. Empty credentials mean anonymous requests.
    pub fn new(base_url: &str, username: &str, password: &str, ignore_tls_errors: bool) -> Result<Self, TransferError> {
        let base_url = Url::parse(base_url).map_err(|e| TransferError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransferError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(ignore_tls_errors)
            .build()?;

        Ok(Self {
            client,
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Full URL of a remote path
    pub fn url_for(&self, remote_path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(remote_path.split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.username, Some(&self.password))
        }
    }

    /// Upload `contents` to `remote_path`, replacing what is there
    pub async fn write_file(&self, remote_path: &str, contents: Vec<u8>) -> Result<(), TransferError> {
        let url = self.url_for(remote_path);
        debug!("PUT {}", url);

        let response = self
            .authorized(self.client.put(url))
            .body(contents)
            .send()
            .await?;

        check_status("PUT", remote_path, response.status())?;
        info!("Uploaded {}", remote_path);
        Ok(())
    }

    /// Download the contents of `remote_path`
    pub async fn read_file(&self, remote_path: &str) -> Result<Vec<u8>, TransferError> {
        let url = self.url_for(remote_path);
        debug!("GET {}", url);

        let response = self.authorized(self.client.get(url)).send().await?;
        check_status("GET", remote_path, response.status())?;

        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), remote_path);
        Ok(bytes.to_vec())
    }
}

fn check_status(method: &'static str, path: &str, status: StatusCode) -> Result<(), TransferError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(TransferError::Status {
            method,
            path: path.to_string(),
            status,
        })
    }
}
