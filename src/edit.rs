//! Interactive edit session: download, run `$EDITOR`, upload on save.
//!
//! The editor is an external process, so save events come from watching the
//! cached file's directory with `notify`. Editors often write through a
//! temporary file and rename it into place, and emit several events per save;
//! events are coalesced and an upload only happens when the content hash
//! actually changed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use notify::{EventKind, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::host::{DocumentId, EditorHost};
use crate::host::terminal::TerminalHost;
use crate::remote::{LifecycleObserver, RemoteEdit};

/// Quiet period that groups the events of one save.
const SAVE_SETTLE: Duration = Duration::from_millis(150);

/// Editor used when neither `$VISUAL` nor `$EDITOR` is set.
const FALLBACK_EDITOR: &str = "vi";

/// Resolve the editor command line: explicit, `$VISUAL`, `$EDITOR`, then `vi`.
///
/// Returns the program (resolved on `PATH`) and its leading arguments.
pub fn resolve_editor(explicit: Option<&str>) -> Result<(PathBuf, Vec<String>)> {
    let command = explicit
        .map(str::to_string)
        .or_else(|| std::env::var("VISUAL").ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| std::env::var("EDITOR").ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string());

    let mut words = shell_words::split(&command)
        .with_context(|| format!("Failed to parse editor command {command:?}"))?;
    if words.is_empty() {
        bail!("Editor command is empty");
    }
    let program = words.remove(0);
    let program = which::which(&program)
        .with_context(|| format!("Editor {program:?} not found on PATH"))?;
    Ok((program, words))
}

/// SHA-256 of the file, or `None` while it is missing (mid-rename).
fn fingerprint(path: &Path) -> Option<String> {
    std::fs::read(path)
        .ok()
        .map(|bytes| hex::encode(Sha256::digest(&bytes)))
}

/// One downloaded document being edited by an external editor.
pub struct EditSession {
    host: Arc<TerminalHost>,
    observer: LifecycleObserver,
    doc: DocumentId,
    path: PathBuf,
    last_uploaded: Option<String>,
}

impl EditSession {
    /// Download the file and bind it, prompting for missing host/path.
    pub async fn open(
        remote: &RemoteEdit,
        host: Arc<TerminalHost>,
        remote_host: Option<&str>,
        remote_path: Option<&str>,
    ) -> Result<Self> {
        let doc = remote.fetcher().download(remote_host, remote_path).await?;
        let binding = host
            .binding(doc)
            .context("Downloaded document has no binding")?;
        let path = binding.entry.local_path.clone();

        let observer = remote.observer();
        observer.on_activated(doc);

        Ok(Self {
            host,
            observer,
            doc,
            last_uploaded: fingerprint(&path),
            path,
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }

    /// Run the editor until it exits, uploading each save, then clean up.
    ///
    /// The document is closed on every path, including a failure to start
    /// the editor. A cache file whose content never reached the remote is
    /// kept and reported instead of deleted.
    pub async fn run(mut self, editor: Option<&str>) -> Result<()> {
        let edited = self.edit_until_exit(editor).await;
        self.host.set_quiet(false);

        // Catch a save that landed just before the editor exited.
        self.upload_if_changed().await;

        let closed = self.close();
        edited.and(closed)
    }

    async fn edit_until_exit(&mut self, editor: Option<&str>) -> Result<()> {
        let (program, args) = resolve_editor(editor)?;
        let dir = self
            .path
            .parent()
            .context("Cache file has no parent directory")?
            .to_path_buf();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res
                && matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                && event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name)
            {
                let _ = tx.send(());
            }
        })
        .context("Failed to create file watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        tracing::debug!(
            editor = %program.display(),
            path = %self.path.display(),
            "starting editor"
        );
        self.host.set_quiet(true);
        let mut child = tokio::process::Command::new(&program)
            .args(&args)
            .arg(&self.path)
            .spawn()
            .with_context(|| format!("Failed to start editor {}", program.display()))?;

        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                Some(()) = rx.recv() => {
                    tokio::time::sleep(SAVE_SETTLE).await;
                    while rx.try_recv().is_ok() {}
                    self.upload_if_changed().await;
                }
            }
        };
        drop(watcher);

        let status = status.context("Failed to wait for editor")?;
        if !status.success() {
            tracing::warn!(status = %status, "editor exited with failure");
        }
        Ok(())
    }

    /// Upload when the file differs from the last content the remote accepted.
    ///
    /// A failed upload leaves `last_uploaded` untouched, so the next save of
    /// the same content tries again.
    async fn upload_if_changed(&mut self) {
        let current = fingerprint(&self.path);
        if current.is_none() || current == self.last_uploaded {
            return;
        }
        match self.observer.on_saved(self.doc).await {
            Ok(()) => self.last_uploaded = current,
            Err(e) => tracing::warn!(error = %e, "upload after save failed"),
        }
    }

    /// Whether the local file holds content the remote never accepted.
    fn has_unsent_changes(&self) -> bool {
        let current = fingerprint(&self.path);
        current.is_some() && current != self.last_uploaded
    }

    fn close(&self) -> Result<()> {
        if self.has_unsent_changes() {
            self.observer.detach(self.doc);
            tracing::warn!(
                path = %self.path.display(),
                "keeping cache file with changes that were not uploaded"
            );
            bail!(
                "Changes were not uploaded; local copy kept at {}",
                self.path.display()
            );
        }
        self.observer.on_closed(self.doc)?;
        Ok(())
    }
}
