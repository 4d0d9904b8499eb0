//! Download a remote file into the cache and open it.

use std::sync::Arc;

use super::origin::{CacheEntry, DocumentBinding, RemoteOrigin};
use super::transfer::TransferDirective;
use super::{RemoteEditContext, RemoteEditError};
use crate::host::{DocumentId, PromptPurpose};

/// Pulls remote files into the local cache.
pub struct Fetcher {
    ctx: Arc<RemoteEditContext>,
}

impl Fetcher {
    pub fn new(ctx: Arc<RemoteEditContext>) -> Self {
        Self { ctx }
    }

    /// Download `host:path`, open the cached copy and bind it to its origin.
    ///
    /// Missing arguments are prompted for (host first, then path). Template
    /// variables are expanded in both before use. On transfer failure the
    /// user sees an error dialog and no document is opened.
    pub async fn download(
        &self,
        host: Option<&str>,
        path: Option<&str>,
    ) -> Result<DocumentId, RemoteEditError> {
        let (host, path) = match (host, path) {
            (Some(h), Some(p)) => (h.to_string(), p.to_string()),
            _ => {
                self.ctx
                    .prompt_host_and_path(PromptPurpose::Download)
                    .await?
            }
        };

        let origin = RemoteOrigin::new(
            self.ctx.config.expand(&host)?,
            self.ctx.config.expand(&path)?,
        );
        // Reject directory paths before spending a transfer on them.
        self.ctx.cache.path_for(&origin.remote_path)?;

        let bytes = match self
            .ctx
            .transfer(TransferDirective::download(origin.clone()))
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "download failed");
                self.ctx
                    .host
                    .error_message(&format!("The file at {origin} couldn't be downloaded."));
                return Err(e);
            }
        };

        let local_path = self.ctx.cache.store(&origin.remote_path, &bytes)?;
        let (doc, loaded) = self.ctx.host.open_file(&local_path)?;
        loaded.loaded().await;

        self.ctx.host.set_binding(
            doc,
            DocumentBinding::remote(CacheEntry::managed(&local_path, origin.clone())),
        );
        self.ctx.host.set_status(doc, &format!("Uploading to {origin}"));

        tracing::info!(
            origin = %origin,
            local_path = %local_path.display(),
            document = %doc,
            "downloaded remote file"
        );
        Ok(doc)
    }
}
