//! Download sessions.
//!
//! Slices land in `<dest>/<session id>/<index>` and are merged into
//! `<dest>/<name>` once all of them are present. The sidecar
//! `<dest>/.<name>.downloading` lets an interrupted download pick up the
//! slices it already has.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use slicebox_protocol::{MissingSlices, TransferMetadata};
use tracing::{debug, info, warn};

use crate::config::TransferConfig;
use crate::engine::{SliceTask, TransferEngine};
use crate::remote::{RemoteFuture, RemoteStore};
use crate::sidecar::{self, Direction};
use crate::{TransferError, merge, planner, validate_file_name};

/// Fetches one slice per unit into the slice directory.
struct DownloadTask {
    store: Arc<dyn RemoteStore>,
    name: String,
    slice_dir: PathBuf,
}

impl SliceTask for DownloadTask {
    type Unit = u32;

    fn index(unit: &u32) -> u32 {
        *unit
    }

    fn run<'a>(&'a self, index: &'a u32) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            let data = self.store.get_slice(&self.name, *index).await?;
            write_slice(&self.slice_dir, *index, &data).await
        })
    }
}

/// Writes a slice under a temporary name first so a partial write is never
/// mistaken for a complete slice.
async fn write_slice(slice_dir: &Path, index: u32, data: &[u8]) -> Result<(), TransferError> {
    let part = slice_dir.join(format!("{index}.part"));
    tokio::fs::write(&part, data).await?;
    tokio::fs::rename(&part, slice_dir.join(index.to_string())).await?;
    Ok(())
}

/// Result of a completed download.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub metadata: TransferMetadata,
    /// Where the merged file was written.
    pub path: PathBuf,
    pub resumed: bool,
    /// Slices fetched during this run.
    pub slices_fetched: u64,
    pub retries: u64,
}

/// Downloads sliced files from a [`RemoteStore`], resuming where a previous
/// attempt left off.
pub struct Downloader {
    store: Arc<dyn RemoteStore>,
    config: TransferConfig,
}

impl Downloader {
    pub fn new(store: Arc<dyn RemoteStore>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    /// Downloads `name` into the existing directory `dest_dir`.
    ///
    /// On [`TransferError::SessionInvalidated`] the stale sidecar and slice
    /// directory have already been removed, so calling again starts fresh.
    /// On [`TransferError::IntegrityError`] the merged file is left in
    /// place and the session state is cleaned up.
    pub async fn download(
        &self,
        name: &str,
        dest_dir: &Path,
    ) -> Result<DownloadOutcome, TransferError> {
        validate_file_name(name)?;
        match tokio::fs::metadata(dest_dir).await {
            Ok(stat) if stat.is_dir() => {}
            _ => {
                return Err(TransferError::InvalidPath(format!(
                    "destination is not a directory: {}",
                    dest_dir.display()
                )));
            }
        }

        let target = dest_dir.join(name);
        let sidecar = sidecar::sidecar_path(&target, Direction::Download);

        let (metadata, missing, resumed) = match sidecar::load(&sidecar) {
            Ok(metadata) => {
                let missing = self.resume(&sidecar, dest_dir, &metadata).await?;
                (metadata, missing, true)
            }
            Err(TransferError::NotFound(_)) => {
                let metadata = self.start_fresh(name, &sidecar, dest_dir).await?;
                (metadata, MissingSlices::all(), false)
            }
            Err(TransferError::CorruptMetadata(reason)) => {
                warn!(%reason, "discarding unreadable download sidecar");
                sidecar::delete(&sidecar);
                let metadata = self.start_fresh(name, &sidecar, dest_dir).await?;
                (metadata, MissingSlices::all(), false)
            }
            Err(e) => return Err(e),
        };

        let slice_dir = dest_dir.join(&metadata.id);
        tokio::fs::create_dir_all(&slice_dir).await?;

        let engine = TransferEngine::new(
            DownloadTask {
                store: self.store.clone(),
                name: metadata.name.clone(),
                slice_dir: slice_dir.clone(),
            },
            &self.config.download,
            metadata.name.clone(),
        );
        for index in missing.indices(metadata.slice_count) {
            engine.dispatch(index).await?;
        }
        let report = engine.finish().await?;

        match merge::merge_and_verify(&metadata, &slice_dir, &target).await {
            Ok(()) => {}
            Err(e @ TransferError::IntegrityError { .. }) => {
                cleanup(&sidecar, &slice_dir).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        cleanup(&sidecar, &slice_dir).await;

        info!(file = %metadata.name, size = metadata.total_size, "download complete");
        Ok(DownloadOutcome {
            metadata,
            path: target,
            resumed,
            slices_fetched: report.dispatched,
            retries: report.retries,
        })
    }

    async fn resume(
        &self,
        sidecar: &Path,
        dest_dir: &Path,
        metadata: &TransferMetadata,
    ) -> Result<MissingSlices, TransferError> {
        validate_file_name(&metadata.id)?;
        let slice_dir = dest_dir.join(&metadata.id);
        match planner::reconcile_download(
            self.store.as_ref(),
            metadata,
            &slice_dir,
            self.config.reconcile,
        )
        .await
        {
            Ok(missing) => {
                info!(
                    file = %metadata.name,
                    session = %metadata.id,
                    missing = missing.count(metadata.slice_count),
                    "resuming download"
                );
                Ok(missing)
            }
            Err(e @ TransferError::SessionInvalidated(_)) => {
                warn!(file = %metadata.name, "store no longer has this session, discarding local state");
                cleanup(sidecar, &slice_dir).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn start_fresh(
        &self,
        name: &str,
        sidecar: &Path,
        dest_dir: &Path,
    ) -> Result<TransferMetadata, TransferError> {
        let metadata = self.store.file_metadata(name).await?;
        if metadata.name != name {
            debug!(requested = name, reported = %metadata.name, "store reports a different name");
        }
        validate_file_name(&metadata.id)?;
        if metadata.total_size == 0 || metadata.slice_count == 0 {
            return Err(TransferError::EmptyFile(dest_dir.join(name)));
        }

        tokio::fs::create_dir_all(dest_dir.join(&metadata.id)).await?;
        sidecar::save(sidecar, &metadata)?;
        info!(
            file = %metadata.name,
            session = %metadata.id,
            slices = metadata.slice_count,
            "download session started"
        );
        Ok(metadata)
    }
}

async fn cleanup(sidecar: &Path, slice_dir: &Path) {
    sidecar::delete(sidecar);
    match tokio::fs::remove_dir_all(slice_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %slice_dir.display(), error = %e, "failed to remove slice directory"),
    }
}
