//! Upload a document to its remote origin.

use std::path::PathBuf;
use std::sync::Arc;

use super::origin::{CacheEntry, DocumentBinding, RemoteOrigin};
use super::transfer::TransferDirective;
use super::{RemoteEditContext, RemoteEditError};
use crate::host::{DocumentId, PromptPurpose};

/// Where the bytes to upload come from.
struct LocalCopy {
    path: PathBuf,
    managed: bool,
    /// Materialized by this upload, so the document content must be written.
    materialized: bool,
    /// Did not exist before this upload; removed again if the upload fails.
    fresh: bool,
}

/// Pushes documents to their origin.
pub struct Pusher {
    ctx: Arc<RemoteEditContext>,
}

impl Pusher {
    pub fn new(ctx: Arc<RemoteEditContext>) -> Self {
        Self { ctx }
    }

    /// Upload `doc` to `origin`, or to its bound origin, or to a prompted one.
    ///
    /// With `rewrite_local_file` the in-memory content is written to the local
    /// file first. Skip it when the editor has just saved the file itself.
    ///
    /// On success the document is bound to the origin so later saves upload
    /// without prompting. A failed transfer shows an error dialog naming the
    /// origin. Any failure leaves an existing binding exactly as it was.
    pub async fn upload(
        &self,
        doc: DocumentId,
        origin: Option<&str>,
        rewrite_local_file: bool,
    ) -> Result<(), RemoteEditError> {
        let existing = self.ctx.host.binding(doc);
        let origin = self.resolve_origin(origin, existing.as_ref()).await?;
        let local = self.local_copy(doc, existing.as_ref(), &origin)?;

        self.ctx.host.set_status(doc, &format!("Uploading to {origin}"));
        self.ctx.host.status_message("Uploading...");

        let rewrite = rewrite_local_file || local.materialized;
        match self.write_and_transfer(doc, &local, &origin, rewrite).await {
            Ok(()) => {
                let entry = CacheEntry {
                    local_path: local.path.clone(),
                    origin: origin.clone(),
                    managed: local.managed,
                };
                self.ctx.host.set_binding(doc, DocumentBinding::remote(entry));
                self.ctx.host.status_message("Uploaded successfully");
                tracing::info!(
                    origin = %origin,
                    local_path = %local.path.display(),
                    document = %doc,
                    "uploaded document"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "upload failed");
                if local.fresh
                    && let Err(cleanup) = self.ctx.cache.evict(&local.path)
                {
                    tracing::warn!(error = %cleanup, "failed to remove unused cache file");
                }
                // Local failures surface through the returned error alone.
                if matches!(e, RemoteEditError::Transfer(_)) {
                    self.ctx
                        .host
                        .error_message(&format!("The file at {origin} couldn't be uploaded."));
                }
                Err(e)
            }
        }
    }

    async fn resolve_origin(
        &self,
        explicit: Option<&str>,
        existing: Option<&DocumentBinding>,
    ) -> Result<RemoteOrigin, RemoteEditError> {
        if let Some(spec) = explicit {
            return Ok(self.ctx.config.expand(spec)?.parse()?);
        }
        if let Some(binding) = existing {
            return Ok(binding.origin().clone());
        }
        let (host, path) = self
            .ctx
            .prompt_host_and_path(PromptPurpose::Upload)
            .await?;
        Ok(RemoteOrigin::new(
            self.ctx.config.expand(&host)?,
            self.ctx.config.expand(&path)?,
        ))
    }

    fn local_copy(
        &self,
        doc: DocumentId,
        existing: Option<&DocumentBinding>,
        origin: &RemoteOrigin,
    ) -> Result<LocalCopy, RemoteEditError> {
        if let Some(binding) = existing {
            return Ok(LocalCopy {
                path: binding.entry.local_path.clone(),
                managed: binding.entry.managed,
                materialized: false,
                fresh: false,
            });
        }
        if let Some(path) = self.ctx.host.file_name(doc) {
            return Ok(LocalCopy {
                path,
                managed: false,
                materialized: false,
                fresh: false,
            });
        }
        let path = self.ctx.cache.path_for(&origin.remote_path)?;
        let fresh = !path.exists();
        let path = self.ctx.cache.materialize(&origin.remote_path)?;
        Ok(LocalCopy {
            path,
            managed: true,
            materialized: true,
            fresh,
        })
    }

    async fn write_and_transfer(
        &self,
        doc: DocumentId,
        local: &LocalCopy,
        origin: &RemoteOrigin,
        rewrite: bool,
    ) -> Result<(), RemoteEditError> {
        if rewrite {
            let content = self.ctx.host.contents(doc)?;
            tokio::fs::write(&local.path, content)
                .await
                .map_err(|source| RemoteEditError::WriteLocal {
                    path: local.path.clone(),
                    source,
                })?;
        }

        self.ctx
            .transfer(TransferDirective::upload(&local.path, origin.clone()))
            .await?;
        Ok(())
    }
}
