pub mod config;
pub mod edit;
pub mod host;
pub mod remote;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};

use crate::config::RemoteEditConfig;
use crate::edit::EditSession;
use crate::host::EditorHost;
use crate::host::terminal::TerminalHost;
use crate::remote::{CacheLayout, RemoteEdit, RemoteEditError, ScpTransport, TransferError};

/// Exit code when a transfer failed after all attempts.
pub const EXIT_TRANSFER_FAILED: u8 = 3;
/// Exit code when the scp program could not be started.
pub const EXIT_LAUNCH_FAILED: u8 = 4;

#[derive(Parser, Debug)]
#[command(
    name = "remote-edit",
    version,
    about = "Edit files on remote hosts locally over scp, uploading on save"
)]
pub struct Cli {
    /// Config file (default: ~/.config/remote-edit/config.toml)
    #[arg(long, global = true, env = "REMOTE_EDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory for cached copies of remote files
    #[arg(long, global = true, env = "REMOTE_EDIT_CACHE_ROOT")]
    pub cache_root: Option<PathBuf>,

    /// Secure copy program
    #[arg(long, global = true, env = "REMOTE_EDIT_SCP")]
    pub scp: Option<String>,

    /// Value substituted for {SUNetID} in hosts and paths
    #[arg(long, global = true, env = "REMOTE_EDIT_SUNETID")]
    pub sunetid: Option<String>,

    /// More logging (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a remote file into the cache and print its local path
    Fetch {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        path: Option<String>,
    },
    /// Download a remote file, edit it, and upload every save
    Edit {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        path: Option<String>,
        /// Editor command (default: $VISUAL, $EDITOR, vi)
        #[arg(long, env = "REMOTE_EDIT_EDITOR")]
        editor: Option<String>,
    },
    /// Upload a local file to a remote location
    Push {
        file: PathBuf,
        /// Destination as host:path (prompted for when omitted)
        #[arg(long)]
        origin: Option<String>,
    },
    /// Print the cache location a remote path maps to
    CachePath { remote_path: String },
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Load the config file and apply command-line overrides.
    pub fn load_config(&self) -> Result<RemoteEditConfig> {
        let mut config = RemoteEditConfig::load(self.config.as_deref())?;
        if let Some(root) = &self.cache_root {
            config.cache_root = root.clone();
        }
        if let Some(scp) = &self.scp {
            config.scp_program = scp.clone();
        }
        if let Some(id) = &self.sunetid {
            config = config.with_sunetid(id.clone());
        }
        Ok(config)
    }
}

/// Library entrypoint: run one command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    let host = Arc::new(TerminalHost::new());
    let transport = Arc::new(ScpTransport::new(config.scp_program.clone()));

    match cli.command {
        Commands::CachePath { remote_path } => {
            let cache = CacheLayout::new(config.cache_root.clone());
            let path = cache.path_for(&config.expand(&remote_path)?)?;
            println!("{}", path.display());
        }
        Commands::Fetch { host: h, path } => {
            let remote = RemoteEdit::new(config, host.clone(), transport);
            let doc = remote
                .fetcher()
                .download(h.as_deref(), path.as_deref())
                .await?;
            let local = host
                .file_name(doc)
                .context("Downloaded document has no local file")?;
            println!("{}", local.display());
        }
        Commands::Edit {
            host: h,
            path,
            editor,
        } => {
            let remote = RemoteEdit::new(config, host.clone(), transport);
            let session =
                EditSession::open(&remote, host.clone(), h.as_deref(), path.as_deref()).await?;
            session.run(editor.as_deref()).await?;
        }
        Commands::Push { file, origin } => {
            if !file.is_file() {
                bail!("{} is not a file", file.display());
            }
            let file = std::fs::canonicalize(&file)
                .with_context(|| format!("Failed to resolve {}", file.display()))?;
            let remote = RemoteEdit::new(config, host.clone(), transport);
            let (doc, loaded) = host.open_file(&file)?;
            loaded.loaded().await;
            remote.pusher().upload(doc, origin.as_deref(), false).await?;
        }
    }
    Ok(())
}

/// Process exit code for an error returned by [`run`].
///
/// A cancelled prompt is a clean exit.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RemoteEditError>() {
        Some(RemoteEditError::PromptCancelled) => 0,
        Some(RemoteEditError::Transfer(TransferError::Failed { .. })) => EXIT_TRANSFER_FAILED,
        Some(RemoteEditError::Transfer(TransferError::LaunchFailed { .. })) => EXIT_LAUNCH_FAILED,
        _ => 1,
    }
}

/// Whether the error was already shown to the user through the host.
pub fn already_reported(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RemoteEditError>(),
        Some(RemoteEditError::PromptCancelled | RemoteEditError::Transfer(_))
    )
}
