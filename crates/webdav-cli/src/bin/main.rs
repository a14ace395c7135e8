//! webdav-push - upload single files to a WebDAV share
//!
//! The endpoint for a file comes from the nearest `webdav.json` above it.
//! Login credentials are read from the OS credential store; when none are
//! stored the user is prompted, and the answers are saved once a transfer
//! using them succeeds.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use credential_store::{CredentialStore, StoreOptions};
use webdav_cli::credentials::{STORE_FILENAME, STORE_FOLDER, STORE_PREFIX};
use webdav_cli::{ActionContext, TerminalPrompter};

/// Push files to WebDAV endpoints
#[derive(Parser, Debug)]
#[command(name = "webdav-push")]
#[command(version)]
#[command(about = "Upload and compare files against WebDAV endpoints")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    /// Remote paths are computed relative to this directory
    /// (default: the directory holding webdav.json)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Where credentials are kept
#[derive(Args, Debug)]
struct StoreArgs {
    /// Prefix for credential names in the vault and keychain
    #[arg(long, global = true, env = "WEBDAV_SECRET_PREFIX", default_value = STORE_PREFIX)]
    prefix: String,

    /// Folder under the home directory for the fallback secrets file
    #[arg(long, global = true, env = "WEBDAV_SECRET_FOLDER", default_value = STORE_FOLDER)]
    folder: String,

    /// Name of the fallback secrets file
    #[arg(long, global = true, env = "WEBDAV_SECRET_FILENAME", default_value = STORE_FILENAME)]
    filename: String,
}

impl StoreArgs {
    fn options(&self) -> StoreOptions {
        StoreOptions::new()
            .with_prefix(self.prefix.as_str())
            .with_folder(self.folder.as_str())
            .with_filename(self.filename.as_str())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file to its remote location
    Upload { file: PathBuf },

    /// Download the remote copy of a file and compare it with the local one
    Compare { file: PathBuf },

    /// Inspect or edit stored credentials
    #[command(subcommand)]
    Credential(CredentialCommand),
}

#[derive(Subcommand, Debug)]
enum CredentialCommand {
    /// Show the credential stored for a service
    Get {
        service: String,
        #[arg(long)]
        show_password: bool,
    },

    /// Store a credential, replacing any other for the service
    Set { service: String, username: String },

    /// Remove every credential of a service
    Remove { service: String },

    /// Show the credential stored for a service and username
    GetByName {
        service: String,
        username: String,
        #[arg(long)]
        show_password: bool,
    },

    /// Remove the credential stored for a service and username
    RemoveByName { service: String, username: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(
        CredentialStore::new(cli.store.options())
            .map_err(|e| format!("Failed to initialize credential store: {}", e))?,
    );
    tracing::debug!("Using {}", store.backend_name());

    match cli.command {
        Command::Upload { file } => {
            let report = context(store, cli.project_root).upload(&file).await?;
            println!("Uploaded {} to {}", file.display(), report.remote_path);
            if report.credentials_saved {
                println!("Credentials saved");
            }
        }
        Command::Compare { file } => {
            let report = context(store, cli.project_root).compare(&file).await?;
            let verdict = if report.identical { "identical" } else { "different" };
            println!("{} and {} are {}", file.display(), report.remote_path, verdict);
            println!("Remote copy: {}", report.remote_copy.display());
        }
        Command::Credential(command) => credential(&store, command).await?,
    }

    Ok(())
}

fn context(store: Arc<CredentialStore>, project_root: Option<PathBuf>) -> ActionContext {
    let ctx = ActionContext::new(store, Arc::new(TerminalPrompter));
    match project_root {
        Some(root) => ctx.with_project_root(root),
        None => ctx,
    }
}

async fn credential(store: &CredentialStore, command: CredentialCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        CredentialCommand::Get { service, show_password } => {
            print_credential(store.get_credential(&service).await?, show_password);
        }
        CredentialCommand::Set { service, username } => {
            let password = tokio::task::spawn_blocking(|| rpassword::prompt_password("Password: ")).await??;
            store.set_credential(&service, &username, &password).await?;
            println!("Stored credential for {}", service);
        }
        CredentialCommand::Remove { service } => {
            store.remove_credential(&service).await?;
            println!("Removed credentials for {}", service);
        }
        CredentialCommand::GetByName {
            service,
            username,
            show_password,
        } => {
            print_credential(store.get_credential_by_name(&service, &username).await?, show_password);
        }
        CredentialCommand::RemoveByName { service, username } => {
            store.remove_credential_by_name(&service, &username).await?;
            println!("Removed credential {} for {}", username, service);
        }
    }
    Ok(())
}

fn print_credential(credential: Option<credential_store::Credential>, show_password: bool) {
    match credential {
        Some(cred) if show_password => {
            println!("{}\t{}", cred.username(), cred.password().unwrap_or_default());
        }
        Some(cred) => println!("{}", cred.username()),
        None => println!("No credential stored"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_defaults() {
        let cli = Cli::try_parse_from(["webdav-push", "upload", "index.html"]).unwrap();
        assert_eq!(cli.store.options(), webdav_cli::credentials::store_options());
    }

    #[test]
    fn test_store_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "webdav-push",
            "credential",
            "get",
            "host",
            "--prefix",
            "other:",
            "--filename",
            "x.json",
        ])
        .unwrap();
        let options = cli.store.options();
        assert_eq!(options.prefix(), "other:");
        assert_eq!(options.folder(), STORE_FOLDER);
        assert_eq!(options.filename(), "x.json");
    }
}
