//! Terminal host: prompts on the tty, status lines on stderr.
//!
//! Documents are plain files on disk edited by an external `$EDITOR`, so the
//! "in-memory" content of a document is whatever the file currently holds.
//! Bindings live in memory for the life of the process only.

use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use colored::Colorize;
use dialoguer::{Input, theme::ColorfulTheme};
use parking_lot::Mutex;

use super::{DocumentId, EditorHost, HostError, LoadSignal, PromptPurpose};
use crate::remote::origin::DocumentBinding;

#[derive(Debug)]
struct TerminalDocument {
    path: PathBuf,
    binding: Option<DocumentBinding>,
    status: String,
}

/// [`EditorHost`] for the command line.
#[derive(Debug)]
pub struct TerminalHost {
    documents: Mutex<HashMap<DocumentId, TerminalDocument>>,
    next_id: AtomicU64,
    interactive: bool,
    quiet: AtomicBool,
}

impl Default for TerminalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalHost {
    /// Prompts are allowed only when both stdin and stderr are terminals.
    pub fn new() -> Self {
        let interactive = console::user_attended_stderr() && std::io::stdin().is_terminal();
        Self::with_interactive(interactive)
    }

    pub fn with_interactive(interactive: bool) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            interactive,
            quiet: AtomicBool::new(false),
        }
    }

    /// Suppress status output while a full-screen editor owns the terminal.
    /// Errors are always printed.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::Relaxed)
    }

    /// Last status text set for `doc`.
    pub fn status(&self, doc: DocumentId) -> Option<String> {
        self.documents.lock().get(&doc).map(|d| d.status.clone())
    }

    fn prompt(&self, text: &str, initial: &str) -> Result<Option<String>, HostError> {
        if !self.interactive {
            return Err(HostError::NotInteractive);
        }

        let answer = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(text)
            .with_initial_text(initial)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| HostError::Prompt(e.to_string()))?;

        // An empty answer is how the user backs out.
        let answer = answer.trim();
        if answer.is_empty() {
            Ok(None)
        } else {
            Ok(Some(answer.to_string()))
        }
    }
}

impl EditorHost for TerminalHost {
    fn prompt_for_host(
        &self,
        purpose: PromptPurpose,
        initial: &str,
    ) -> Result<Option<String>, HostError> {
        self.prompt(purpose.host_prompt(), initial)
    }

    fn prompt_for_path(
        &self,
        purpose: PromptPurpose,
        initial: &str,
    ) -> Result<Option<String>, HostError> {
        self.prompt(purpose.path_prompt(), initial)
    }

    fn binding(&self, doc: DocumentId) -> Option<DocumentBinding> {
        self.documents
            .lock()
            .get(&doc)
            .and_then(|d| d.binding.clone())
    }

    fn set_binding(&self, doc: DocumentId, binding: DocumentBinding) {
        if let Some(d) = self.documents.lock().get_mut(&doc) {
            d.binding = Some(binding);
        }
    }

    fn clear_binding(&self, doc: DocumentId) {
        if let Some(d) = self.documents.lock().get_mut(&doc) {
            d.binding = None;
        }
    }

    fn file_name(&self, doc: DocumentId) -> Option<PathBuf> {
        self.documents.lock().get(&doc).map(|d| d.path.clone())
    }

    fn contents(&self, doc: DocumentId) -> Result<String, HostError> {
        let path = self
            .file_name(doc)
            .ok_or(HostError::UnknownDocument(doc))?;
        std::fs::read_to_string(&path).map_err(|source| HostError::Io { path, source })
    }

    fn open_file(&self, path: &Path) -> Result<(DocumentId, LoadSignal), HostError> {
        let mut documents = self.documents.lock();
        if let Some((id, _)) = documents.iter().find(|(_, d)| d.path == path) {
            return Ok((*id, LoadSignal::ready()));
        }

        let id = DocumentId(self.next_id.fetch_add(1, Ordering::Relaxed));
        documents.insert(
            id,
            TerminalDocument {
                path: path.to_path_buf(),
                binding: None,
                status: String::new(),
            },
        );
        // The file is already on disk; there is nothing left to load.
        Ok((id, LoadSignal::ready()))
    }

    fn set_status(&self, doc: DocumentId, text: &str) {
        let changed = match self.documents.lock().get_mut(&doc) {
            Some(d) if d.status != text => {
                d.status = text.to_string();
                true
            }
            _ => false,
        };
        if changed && !text.is_empty() && !self.is_quiet() {
            eprintln!("{} {}", "[remote-edit]".dimmed(), text);
        }
    }

    fn status_message(&self, text: &str) {
        if self.is_quiet() {
            return;
        }
        eprintln!("{}", text.dimmed());
    }

    fn error_message(&self, text: &str) {
        eprintln!("{} {}", "error:".red().bold(), text);
    }
}
