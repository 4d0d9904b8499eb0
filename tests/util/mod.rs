#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use remote_edit::config::RemoteEditConfig;
use remote_edit::host::{DocumentId, EditorHost, HostError, LoadSignal, PromptPurpose};
use remote_edit::remote::origin::DocumentBinding;
use remote_edit::remote::transfer::{Attempt, TransferDirective, Transport};
use remote_edit::remote::RemoteEdit;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct FakeDoc {
    path: Option<PathBuf>,
    buffer: String,
    binding: Option<DocumentBinding>,
    status: String,
}

/// Host adapter whose prompt answers are scripted up front.
#[derive(Default)]
pub struct ScriptedHost {
    answers: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<(String, String)>>,
    docs: Mutex<HashMap<DocumentId, FakeDoc>>,
    next_id: AtomicU64,
    defer_loads: AtomicBool,
    pending_loads: Mutex<Vec<oneshot::Sender<()>>>,
    prompt_gate: Mutex<Option<mpsc::Receiver<()>>>,
    pub messages: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl ScriptedHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue prompt answers; `None` cancels that prompt.
    pub fn answer(&self, answers: &[Option<&str>]) {
        self.answers
            .lock()
            .extend(answers.iter().map(|a| a.map(str::to_string)));
    }

    /// (prompt text, pre-filled value) for every prompt shown.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }

    /// Block each prompt until a value is sent on the returned channel.
    pub fn gate_prompts(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.prompt_gate.lock() = Some(rx);
        tx
    }

    /// Hold load signals until [`ScriptedHost::finish_loads`].
    pub fn defer_loads(&self) {
        self.defer_loads.store(true, Ordering::SeqCst);
    }

    pub fn pending_loads(&self) -> usize {
        self.pending_loads.lock().len()
    }

    pub fn finish_loads(&self) {
        for tx in self.pending_loads.lock().drain(..) {
            let _ = tx.send(());
        }
    }

    /// An unsaved buffer with no file behind it.
    pub fn new_buffer(&self, content: &str) -> DocumentId {
        let id = self.allocate();
        self.docs.lock().insert(
            id,
            FakeDoc {
                buffer: content.to_string(),
                ..Default::default()
            },
        );
        id
    }

    /// Replace the in-memory content without saving it.
    pub fn edit(&self, doc: DocumentId, content: &str) {
        if let Some(d) = self.docs.lock().get_mut(&doc) {
            d.buffer = content.to_string();
        }
    }

    pub fn status(&self, doc: DocumentId) -> String {
        self.docs
            .lock()
            .get(&doc)
            .map(|d| d.status.clone())
            .unwrap_or_default()
    }

    pub fn document_count(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn last_error(&self) -> Option<String> {
        self.errors.lock().last().cloned()
    }

    pub fn last_message(&self) -> Option<String> {
        self.messages.lock().last().cloned()
    }

    fn allocate(&self) -> DocumentId {
        DocumentId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_answer(&self, prompt: &str, initial: &str) -> Option<String> {
        self.prompts
            .lock()
            .push((prompt.to_string(), initial.to_string()));
        if let Some(gate) = self.prompt_gate.lock().as_ref() {
            let _ = gate.recv();
        }
        self.answers.lock().pop_front().flatten()
    }
}

impl EditorHost for ScriptedHost {
    fn prompt_for_host(
        &self,
        purpose: PromptPurpose,
        initial: &str,
    ) -> Result<Option<String>, HostError> {
        Ok(self.next_answer(purpose.host_prompt(), initial))
    }

    fn prompt_for_path(
        &self,
        purpose: PromptPurpose,
        initial: &str,
    ) -> Result<Option<String>, HostError> {
        Ok(self.next_answer(purpose.path_prompt(), initial))
    }

    fn binding(&self, doc: DocumentId) -> Option<DocumentBinding> {
        self.docs.lock().get(&doc).and_then(|d| d.binding.clone())
    }

    fn set_binding(&self, doc: DocumentId, binding: DocumentBinding) {
        if let Some(d) = self.docs.lock().get_mut(&doc) {
            d.binding = Some(binding);
        }
    }

    fn clear_binding(&self, doc: DocumentId) {
        if let Some(d) = self.docs.lock().get_mut(&doc) {
            d.binding = None;
        }
    }

    fn file_name(&self, doc: DocumentId) -> Option<PathBuf> {
        self.docs.lock().get(&doc).and_then(|d| d.path.clone())
    }

    fn contents(&self, doc: DocumentId) -> Result<String, HostError> {
        self.docs
            .lock()
            .get(&doc)
            .map(|d| d.buffer.clone())
            .ok_or(HostError::UnknownDocument(doc))
    }

    fn open_file(&self, path: &Path) -> Result<(DocumentId, LoadSignal), HostError> {
        let buffer = std::fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let existing = self
            .docs
            .lock()
            .iter()
            .find(|(_, d)| d.path.as_deref() == Some(path))
            .map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.allocate();
                self.docs.lock().insert(
                    id,
                    FakeDoc {
                        path: Some(path.to_path_buf()),
                        buffer,
                        ..Default::default()
                    },
                );
                id
            }
        };

        if self.defer_loads.load(Ordering::SeqCst) {
            let (tx, signal) = LoadSignal::pending();
            self.pending_loads.lock().push(tx);
            Ok((id, signal))
        } else {
            Ok((id, LoadSignal::ready()))
        }
    }

    fn set_status(&self, doc: DocumentId, text: &str) {
        if let Some(d) = self.docs.lock().get_mut(&doc) {
            d.status = text.to_string();
        }
    }

    fn status_message(&self, text: &str) {
        self.messages.lock().push(text.to_string());
    }

    fn error_message(&self, text: &str) {
        self.errors.lock().push(text.to_string());
    }
}

/// In-memory stand-in for scp, keyed by `host:path`.
#[derive(Default)]
pub struct MemoryRemote {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fail_next: Mutex<u32>,
    missing_program: AtomicBool,
    attempts: AtomicU64,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, origin: &str, content: &[u8]) {
        self.files.lock().insert(origin.to_string(), content.to_vec());
    }

    pub fn get(&self, origin: &str) -> Option<Vec<u8>> {
        self.files.lock().get(origin).cloned()
    }

    /// Make the next `n` attempts exit non-zero.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock() = n;
    }

    /// Behave as if the scp binary does not exist.
    pub fn remove_program(&self) {
        self.missing_program.store(true, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryRemote {
    fn program(&self) -> &str {
        "memory-scp"
    }

    fn attempt(&self, directive: &TransferDirective) -> io::Result<Attempt> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.missing_program.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "memory-scp missing"));
        }

        {
            let mut fail_next = self.fail_next.lock();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Ok(Attempt::Failed {
                    code: Some(1),
                    stderr: "ssh: connect to host: Connection refused".into(),
                });
            }
        }

        match directive {
            TransferDirective::Download { origin } => match self.get(&origin.spec()) {
                Some(bytes) => Ok(Attempt::Succeeded(bytes)),
                None => Ok(Attempt::Failed {
                    code: Some(1),
                    stderr: format!("scp: {}: No such file or directory", origin.remote_path),
                }),
            },
            TransferDirective::Upload { local_path, origin } => {
                let bytes = std::fs::read(local_path)?;
                self.put(&origin.spec(), &bytes);
                Ok(Attempt::Succeeded(Vec::new()))
            }
        }
    }
}

/// A scripted host, an in-memory remote and a config rooted in a temp dir.
pub struct Harness {
    pub tmp: tempfile::TempDir,
    pub host: Arc<ScriptedHost>,
    pub remote: Arc<MemoryRemote>,
    pub edit: RemoteEdit,
}

impl Harness {
    pub fn new() -> Self {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = RemoteEditConfig {
            cache_root: tmp.path().join("cache"),
            ..Default::default()
        }
        .with_sunetid("alice");
        let host = ScriptedHost::new();
        let remote = MemoryRemote::new();
        let edit = RemoteEdit::new(config, host.clone(), remote.clone());
        Self {
            tmp,
            host,
            remote,
            edit,
        }
    }

    pub fn cache_root(&self) -> PathBuf {
        self.tmp.path().join("cache")
    }
}
