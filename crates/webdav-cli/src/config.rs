//! Endpoint configuration
//!
//! A `webdav.json` file maps local path prefixes (relative to the directory
//! holding the file) to remote endpoints:
//!
//! ```json
//! {
//!   "/site": { "url": "https://dav.example.com/www", "ignoreSSLErrors": false }
//! }
//! ```
//!
//! The most specific prefix containing the working directory wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the endpoint configuration file
pub const CONFIG_FILE_NAME: &str = "webdav.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Endpoint config file for WebDAV (webdav.json) not found from {0:?}")]
    NotFound(PathBuf),

    #[error("Cannot find a remote endpoint configuration for the current working directory {0} in webdav.json")]
    NoEndpoint(String),

    #[error("{0:?} is not inside {1:?}")]
    OutsideRoot(PathBuf, PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid webdav.json: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// One remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the WebDAV share
    pub url: String,
    /// Accept invalid TLS certificates (self-signed servers)
    #[serde(rename = "ignoreSSLErrors", default)]
    pub ignore_ssl_errors: bool,
}

/// Endpoint matched for a working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// Matching key from the config file, e.g. `/site`
    pub local_root_path: String,
    /// Remote endpoint for that key
    pub remote: EndpointConfig,
    /// Directory holding the config file
    pub config_dir: PathBuf,
}

/// Look for `webdav.json` in `start_dir` and its ancestors
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Read every endpoint from a config file
pub fn load_endpoints(config_path: &Path) -> Result<HashMap<String, EndpointConfig>, ConfigError> {
    let contents = std::fs::read_to_string(config_path)?;
    let endpoints: HashMap<String, EndpointConfig> = serde_json::from_str(&contents)?;
    debug!("Loaded {} endpoints from {:?}", endpoints.len(), config_path);
    Ok(endpoints)
}

/// Find the config for `working_dir` and pick its endpoint
pub fn endpoint_for_dir(working_dir: &Path) -> Result<ResolvedEndpoint, ConfigError> {
    let config_path = find_config(working_dir).ok_or_else(|| ConfigError::NotFound(working_dir.to_path_buf()))?;
    resolve_endpoint(&config_path, working_dir)
}

/// Pick the endpoint whose key is the longest prefix of `working_dir`.
///
/// Keys are compared against the working directory relative to the config
/// file's directory, `/`-separated with a leading `/`. A key may also carry
/// a trailing `/`.
pub fn resolve_endpoint(config_path: &Path, working_dir: &Path) -> Result<ResolvedEndpoint, ConfigError> {
    let endpoints = load_endpoints(config_path)?;
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();

    let relative = working_dir
        .strip_prefix(&config_dir)
        .map_err(|_| ConfigError::OutsideRoot(working_dir.to_path_buf(), config_dir.clone()))?;
    let relative = slash_path(relative);

    let mut search_path = relative.as_str();
    loop {
        if search_path.is_empty() {
            return Err(ConfigError::NoEndpoint(relative.clone()));
        }

        let found = endpoints
            .get(search_path)
            .or_else(|| endpoints.get(&format!("{}/", search_path)));
        if let Some(remote) = found {
            debug!("Using endpoint {} for {}", remote.url, search_path);
            return Ok(ResolvedEndpoint {
                local_root_path: search_path.to_string(),
                remote: remote.clone(),
                config_dir,
            });
        }

        search_path = match search_path.rfind('/') {
            Some(idx) => &search_path[..idx],
            None => "",
        };
    }
}

/// Path of `file` on the remote side: its `/`-separated path with
/// `project_root + local_root_path` removed from the front
pub fn remote_path(project_root: &Path, local_root_path: &str, file: &Path) -> Result<String, ConfigError> {
    let relative = file
        .strip_prefix(project_root)
        .map_err(|_| ConfigError::OutsideRoot(file.to_path_buf(), project_root.to_path_buf()))?;
    let relative = slash_path(relative);

    let local_root = local_root_path.trim_end_matches('/');
    match relative.strip_prefix(local_root) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => Ok(rest.to_string()),
        _ => Err(ConfigError::OutsideRoot(
            file.to_path_buf(),
            project_root.join(local_root.trim_start_matches('/')),
        )),
    }
}

/// `/a/b/c` style rendering of a relative path; empty for the path itself
fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(format!("/{}", part.to_string_lossy())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_find_config_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("site").join("css");
        std::fs::create_dir_all(&nested).unwrap();
        let config = write_config(temp_dir.path(), "{}");

        assert_eq!(find_config(&nested), Some(config));
    }

    #[test]
    fn test_find_config_missing() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a");
        std::fs::create_dir_all(&nested).unwrap();

        // Something above the temp dir could carry a webdav.json; only
        // assert that a hit is never inside our tree
        if let Some(found) = find_config(&nested) {
            assert!(!found.starts_with(temp_dir.path()));
        }
    }

    #[test]
    fn test_resolve_longest_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_config(
            temp_dir.path(),
            r#"{
                "/site": { "url": "https://dav.example.com/www" },
                "/site/admin/": { "url": "https://admin.example.com/dav", "ignoreSSLErrors": true }
            }"#,
        );

        let resolved = resolve_endpoint(&config, &temp_dir.path().join("site").join("css")).unwrap();
        assert_eq!(resolved.local_root_path, "/site");
        assert_eq!(resolved.remote.url, "https://dav.example.com/www");
        assert!(!resolved.remote.ignore_ssl_errors);

        let resolved = resolve_endpoint(&config, &temp_dir.path().join("site").join("admin").join("js")).unwrap();
        assert_eq!(resolved.local_root_path, "/site/admin");
        assert!(resolved.remote.ignore_ssl_errors);
        assert_eq!(resolved.config_dir, temp_dir.path());
    }

    #[test]
    fn test_resolve_no_endpoint() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_config(temp_dir.path(), r#"{ "/site": { "url": "https://x" } }"#);

        let err = resolve_endpoint(&config, &temp_dir.path().join("docs")).unwrap_err();
        assert!(matches!(err, ConfigError::NoEndpoint(ref p) if p == "/docs"));

        // The config directory itself never matches
        let err = resolve_endpoint(&config, temp_dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NoEndpoint(_)));
    }

    #[test]
    fn test_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_config(temp_dir.path(), "[1, 2");

        let err = resolve_endpoint(&config, &temp_dir.path().join("site")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_remote_path() {
        let root = Path::new("/work/project");
        let file = root.join("site").join("css").join("main.css");

        assert_eq!(remote_path(root, "/site", &file).unwrap(), "/css/main.css");
        assert_eq!(remote_path(root, "/site/", &file).unwrap(), "/css/main.css");

        // "/sitemap" must not be treated as being under "/site"
        let other = root.join("sitemap").join("index.xml");
        assert!(remote_path(root, "/site", &other).is_err());
    }
}
