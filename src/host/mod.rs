//! The editor that remote-edit plugs into.
//!
//! Fetcher, Pusher and the lifecycle observer never talk to an editor
//! directly. They go through [`EditorHost`], which covers prompting, the
//! per-document binding store, status text, error dialogs and opening files.
//!
//! - **terminal**: [`terminal::TerminalHost`], the production adapter used by
//!   the CLI (dialoguer prompts, stderr status lines, `$EDITOR` documents).
//!
//! Tests drive the same operations through a scripted host.

pub mod terminal;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::remote::origin::DocumentBinding;

/// Handle for one open document in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Which way the value being prompted for will be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    Download,
    Upload,
}

impl PromptPurpose {
    pub fn host_prompt(self) -> &'static str {
        match self {
            Self::Download => "Enter a host name to download from:",
            Self::Upload => "Enter a host name to upload to:",
        }
    }

    pub fn path_prompt(self) -> &'static str {
        match self {
            Self::Download => "Enter a file path to download:",
            Self::Upload => "Enter a path to upload file to:",
        }
    }
}

/// Errors raised by a host adapter.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Cannot prompt for input: not attached to a terminal")]
    NotInteractive,

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Unknown document {0}")]
    UnknownDocument(DocumentId),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fires once the host has finished loading an opened file.
#[derive(Debug)]
pub struct LoadSignal(oneshot::Receiver<()>);

impl LoadSignal {
    /// A signal paired with the sender the host completes it with.
    pub fn pending() -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self(rx))
    }

    /// A signal that has already fired.
    pub fn ready() -> Self {
        let (tx, signal) = Self::pending();
        let _ = tx.send(());
        signal
    }

    /// Wait for the load to finish.
    ///
    /// A host that drops the sender without firing is treated as loaded; the
    /// document is as ready as it will ever be.
    pub async fn loaded(self) {
        let _ = self.0.await;
    }
}

/// Capabilities remote-edit needs from an editor.
///
/// Prompt methods return `Ok(None)` when the user cancels.
pub trait EditorHost: Send + Sync {
    fn prompt_for_host(
        &self,
        purpose: PromptPurpose,
        initial: &str,
    ) -> Result<Option<String>, HostError>;

    fn prompt_for_path(
        &self,
        purpose: PromptPurpose,
        initial: &str,
    ) -> Result<Option<String>, HostError>;

    fn binding(&self, doc: DocumentId) -> Option<DocumentBinding>;

    fn set_binding(&self, doc: DocumentId, binding: DocumentBinding);

    fn clear_binding(&self, doc: DocumentId);

    /// The file the document is saved to, if any.
    fn file_name(&self, doc: DocumentId) -> Option<PathBuf>;

    /// Full in-memory content of the document.
    fn contents(&self, doc: DocumentId) -> Result<String, HostError>;

    /// Open `path` in a new or existing view.
    fn open_file(&self, path: &Path) -> Result<(DocumentId, LoadSignal), HostError>;

    /// Per-document status bar text.
    fn set_status(&self, doc: DocumentId, text: &str);

    /// Transient window-level message.
    fn status_message(&self, text: &str);

    /// Blocking error dialog.
    fn error_message(&self, text: &str);
}
