//! Editor lifecycle hooks for remote-backed documents.
//!
//! State transitions for one document:
//! ```text
//! Inactive ──(download / first upload)──> Bound ──(close)──> Terminal
//!                                          │  ▲
//!                                          └──┘ activate: refresh status
//!                                               save: upload, no rewrite
//! ```
//!
//! Documents without a remote binding never reach any of this logic; every
//! hook checks [`LifecycleObserver::is_applicable`] first.

use std::sync::Arc;

use super::origin::DocumentBinding;
use super::push::Pusher;
use super::{RemoteEditContext, RemoteEditError};
use crate::host::DocumentId;

/// Where a document is in the remote lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentState {
    /// Not associated with any remote file.
    Inactive,
    /// Associated with an origin; saves are uploaded.
    Bound(DocumentBinding),
    /// Closed; the cache file is gone and the binding dropped.
    Terminal,
}

impl DocumentState {
    pub fn is_bound(&self) -> bool {
        matches!(self, DocumentState::Bound(_))
    }
}

/// Reacts to activation, save and close events from the host.
pub struct LifecycleObserver {
    ctx: Arc<RemoteEditContext>,
    pusher: Pusher,
}

impl LifecycleObserver {
    pub fn new(ctx: Arc<RemoteEditContext>) -> Self {
        let pusher = Pusher::new(Arc::clone(&ctx));
        Self { ctx, pusher }
    }

    /// Only remote-backed documents are observed.
    pub fn is_applicable(binding: Option<&DocumentBinding>) -> bool {
        binding.is_some_and(|b| b.is_remote_backed)
    }

    /// Current state of `doc` as recorded by the host.
    pub fn state(&self, doc: DocumentId) -> DocumentState {
        match self.ctx.host.binding(doc) {
            Some(binding) if binding.is_remote_backed => DocumentState::Bound(binding),
            _ => DocumentState::Inactive,
        }
    }

    /// Show the document's origin in its status text.
    pub fn on_activated(&self, doc: DocumentId) {
        match self.state(doc) {
            DocumentState::Bound(binding) => {
                self.ctx
                    .host
                    .set_status(doc, &format!("Uploading to {}", binding.origin()));
            }
            _ => self.ctx.host.set_status(doc, ""),
        }
    }

    /// Upload after the editor has written the file to disk.
    ///
    /// A failure leaves the document bound; the next save tries again.
    pub async fn on_saved(&self, doc: DocumentId) -> Result<(), RemoteEditError> {
        if !self.state(doc).is_bound() {
            return Ok(());
        }
        self.pusher.upload(doc, None, false).await
    }

    /// Drop the binding and delete the cached copy.
    pub fn on_closed(&self, doc: DocumentId) -> Result<DocumentState, RemoteEditError> {
        let DocumentState::Bound(binding) = self.state(doc) else {
            return Ok(DocumentState::Inactive);
        };

        self.ctx.host.clear_binding(doc);
        if binding.entry.managed {
            self.ctx.cache.evict(binding.entry.local_path())?;
        }

        tracing::debug!(
            document = %doc,
            origin = %binding.origin(),
            "closed remote document"
        );
        Ok(DocumentState::Terminal)
    }

    /// Drop the binding but leave the local file in place.
    ///
    /// Used on close when the file holds changes that never reached the remote.
    pub fn detach(&self, doc: DocumentId) -> DocumentState {
        let DocumentState::Bound(binding) = self.state(doc) else {
            return DocumentState::Inactive;
        };

        self.ctx.host.clear_binding(doc);
        tracing::debug!(
            document = %doc,
            local_path = %binding.entry.local_path.display(),
            "detached remote document, local file kept"
        );
        DocumentState::Terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::origin::{CacheEntry, RemoteOrigin};

    fn binding(remote: bool) -> DocumentBinding {
        DocumentBinding {
            entry: CacheEntry::managed("/tmp/x/a.txt", RemoteOrigin::new("h", "/x/a.txt")),
            is_remote_backed: remote,
        }
    }

    #[test]
    fn test_is_applicable() {
        assert!(LifecycleObserver::is_applicable(Some(&binding(true))));
        assert!(!LifecycleObserver::is_applicable(Some(&binding(false))));
        assert!(!LifecycleObserver::is_applicable(None));
    }

    #[test]
    fn test_state_is_bound() {
        assert!(DocumentState::Bound(binding(true)).is_bound());
        assert!(!DocumentState::Inactive.is_bound());
        assert!(!DocumentState::Terminal.is_bound());
    }
}
