//! # webdav-cli
//!
//! Push single files to a WebDAV share and compare them with the remote copy.
//! Endpoints come from a `webdav.json` file found above the file; login
//! credentials live in the platform credential store.

pub mod actions;
pub mod config;
pub mod credentials;
pub mod error;
pub mod transfer;

pub use actions::{ActionContext, CompareReport, UploadReport};
pub use config::{EndpointConfig, ResolvedEndpoint};
pub use credentials::{Prompter, TerminalPrompter};
pub use error::{CliError, Result};
pub use transfer::WebDavClient;
