//! Remote file editing over scp.
//!
//! This module owns the lifecycle of a remotely-backed local file: download,
//! local caching, upload on save and cleanup on close.
//!
//! # Architecture
//!
//! - **origin**: `host:path` origins, cache entries and document bindings
//! - **cache**: deterministic local cache paths (`{root}/{hash(dir)}/{name}`)
//! - **transfer**: one `scp -B` invocation per attempt, three attempts per transfer
//! - **fetch**: download a remote file and bind the opened document to it
//! - **push**: upload a document to its origin
//! - **lifecycle**: activation/save/close hooks for bound documents
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use remote_edit::config::RemoteEditConfig;
//! use remote_edit::remote::{RemoteEdit, transfer::ScpTransport};
//!
//! let config = RemoteEditConfig::load(None)?;
//! let transport = Arc::new(ScpTransport::new(&config.scp_program));
//! let remote = RemoteEdit::new(config, host, transport);
//!
//! let doc = remote.fetcher().download(Some("alice@example.com"), Some("/srv/app/config.yml")).await?;
//! // ... user edits and saves ...
//! remote.observer().on_saved(doc).await?;
//! remote.observer().on_closed(doc)?;
//! ```

pub mod cache;
pub mod fetch;
pub mod lifecycle;
pub mod origin;
pub mod push;
pub mod transfer;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, RemoteEditConfig};
use crate::host::{EditorHost, HostError, PromptPurpose};

pub use cache::{CacheError, CacheLayout};
pub use fetch::Fetcher;
pub use lifecycle::{DocumentState, LifecycleObserver};
pub use origin::{CacheEntry, DocumentBinding, OriginError, RemoteOrigin};
pub use push::Pusher;
pub use transfer::{ScpTransport, TransferDirective, TransferError, Transport};

/// Errors from a remote-edit command.
#[derive(Error, Debug)]
pub enum RemoteEditError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Origin(#[from] OriginError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write {path}: {source}")]
    WriteLocal {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Prompt cancelled")]
    PromptCancelled,

    #[error("Blocking task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl RemoteEditError {
    /// Whether the user dismissed a prompt; such aborts are silent.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::PromptCancelled)
    }
}

/// State shared by the fetcher, the pusher and the observer.
pub struct RemoteEditContext {
    pub config: RemoteEditConfig,
    pub cache: CacheLayout,
    pub host: Arc<dyn EditorHost>,
    pub transport: Arc<dyn Transport>,
}

impl RemoteEditContext {
    /// Run a transfer on the blocking pool so the caller's executor stays free.
    pub(crate) async fn transfer(
        &self,
        directive: TransferDirective,
    ) -> Result<Vec<u8>, RemoteEditError> {
        let transport = Arc::clone(&self.transport);
        let attempts = self.config.attempts();
        let bytes = tokio::task::spawn_blocking(move || {
            transfer::transfer_with_retry(transport.as_ref(), &directive, attempts)
        })
        .await??;
        Ok(bytes)
    }

    /// Ask for a host, then a path, each pre-filled with the configured default.
    ///
    /// Returns the raw answers; template expansion is left to the caller.
    /// Prompts block until the user answers, so they run on the blocking pool.
    pub(crate) async fn prompt_host_and_path(
        &self,
        purpose: PromptPurpose,
    ) -> Result<(String, String), RemoteEditError> {
        let default_host = self.config.default_host()?;
        let default_path = self.config.default_path()?;
        let editor = Arc::clone(&self.host);

        tokio::task::spawn_blocking(move || {
            let host = editor
                .prompt_for_host(purpose, &default_host)?
                .ok_or(RemoteEditError::PromptCancelled)?;
            let path = editor
                .prompt_for_path(purpose, &default_path)?
                .ok_or(RemoteEditError::PromptCancelled)?;
            Ok::<_, RemoteEditError>((host, path))
        })
        .await?
    }
}

/// Entry point bundling the three remote operations around one host.
#[derive(Clone)]
pub struct RemoteEdit {
    ctx: Arc<RemoteEditContext>,
}

impl RemoteEdit {
    pub fn new(
        config: RemoteEditConfig,
        host: Arc<dyn EditorHost>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let cache = CacheLayout::new(config.cache_root.clone());
        Self {
            ctx: Arc::new(RemoteEditContext {
                config,
                cache,
                host,
                transport,
            }),
        }
    }

    pub fn context(&self) -> &RemoteEditContext {
        &self.ctx
    }

    pub fn fetcher(&self) -> Fetcher {
        Fetcher::new(Arc::clone(&self.ctx))
    }

    pub fn pusher(&self) -> Pusher {
        Pusher::new(Arc::clone(&self.ctx))
    }

    pub fn observer(&self) -> LifecycleObserver {
        LifecycleObserver::new(Arc::clone(&self.ctx))
    }
}
