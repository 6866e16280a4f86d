//! Upload sessions.
//!
//! A fresh upload reads the source front to back, feeding every slice into
//! the whole-file checksum and dispatching each one. A resumed upload
//! already knows the checksum, so it only reads the slices the store says
//! it is missing. Either way the session ends with a single merge request
//! and the sidecar is removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use slicebox_protocol::{MissingSlices, SlicePart, TransferMetadata, slice_count};
use tracing::{debug, info, warn};

use crate::checksum::Checksum;
use crate::config::TransferConfig;
use crate::engine::{EngineReport, SliceTask, TransferEngine};
use crate::reader::SliceReader;
use crate::remote::{RemoteFuture, RemoteStore};
use crate::sidecar::{self, Direction};
use crate::{TransferError, join_error, planner};

/// Uploads one slice per unit.
struct UploadTask {
    store: Arc<dyn RemoteStore>,
}

impl SliceTask for UploadTask {
    type Unit = SlicePart;

    fn index(unit: &SlicePart) -> u32 {
        unit.index
    }

    fn run<'a>(&'a self, unit: &'a SlicePart) -> RemoteFuture<'a, ()> {
        self.store.put_slice(unit)
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub metadata: TransferMetadata,
    /// `true` if an earlier session was picked up from its sidecar.
    pub resumed: bool,
    /// Slices sent during this run.
    pub slices_sent: u64,
    pub retries: u64,
}

/// A session ready to run: its metadata and the slices still to send.
struct UploadSession {
    metadata: TransferMetadata,
    missing: MissingSlices,
    resumed: bool,
}

/// Uploads files to a [`RemoteStore`] in slices, resuming where a previous
/// attempt left off.
pub struct Uploader {
    store: Arc<dyn RemoteStore>,
    config: TransferConfig,
}

impl Uploader {
    pub fn new(store: Arc<dyn RemoteStore>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    /// Uploads the file at `path`.
    ///
    /// Every failure leaves the sidecar in a state the next call can resume
    /// from.
    pub async fn upload(&self, path: &Path) -> Result<UploadOutcome, TransferError> {
        let stat = tokio::fs::metadata(path).await?;
        if !stat.is_file() {
            return Err(TransferError::InvalidPath(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        if stat.len() == 0 {
            return Err(TransferError::EmptyFile(path.to_path_buf()));
        }
        let modified: DateTime<Utc> = stat.modified()?.into();

        let sidecar = sidecar_path_for(path)?;
        let session = match self.resume(&sidecar, stat.len(), modified).await? {
            Some(session) => session,
            None => self.start_fresh(path, &sidecar, stat.len(), modified).await?,
        };

        self.run(path, &sidecar, session).await
    }

    /// Loads the sidecar and asks the store what it still needs. Returns
    /// `None` when there is nothing usable to resume.
    async fn resume(
        &self,
        sidecar: &Path,
        size: u64,
        modified: DateTime<Utc>,
    ) -> Result<Option<UploadSession>, TransferError> {
        let metadata = match sidecar::load(sidecar) {
            Ok(metadata) => metadata,
            Err(TransferError::NotFound(_)) => return Ok(None),
            Err(TransferError::CorruptMetadata(reason)) => {
                warn!(%reason, "discarding unreadable upload sidecar");
                sidecar::delete(sidecar);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if metadata.total_size != size
            || metadata.source_modified_at != modified
            || metadata.slice_count != slice_count(size, self.config.slice_size)
        {
            info!(file = %metadata.name, "source changed since last attempt, starting over");
            sidecar::delete(sidecar);
            return Ok(None);
        }

        let missing = match planner::reconcile_upload(self.store.as_ref(), &metadata).await {
            Ok(missing) => missing,
            Err(TransferError::SessionInvalidated(reason)) => {
                info!(
                    file = %metadata.name,
                    %reason,
                    "store dropped the upload session, starting over"
                );
                sidecar::delete(sidecar);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        info!(
            file = %metadata.name,
            session = %metadata.id,
            missing = missing.count(metadata.slice_count),
            "resuming upload"
        );
        Ok(Some(UploadSession {
            metadata,
            missing,
            resumed: true,
        }))
    }

    async fn start_fresh(
        &self,
        path: &Path,
        sidecar: &Path,
        size: u64,
        modified: DateTime<Utc>,
    ) -> Result<UploadSession, TransferError> {
        let name = file_name(path)?;
        let metadata = TransferMetadata::new(
            uuid::Uuid::new_v4().to_string(),
            name,
            size,
            self.config.slice_size,
            modified,
        );
        sidecar::save(sidecar, &metadata)?;

        if let Err(e) = self.store.start_session(&metadata).await {
            sidecar::delete(sidecar);
            return Err(e);
        }

        info!(
            file = %metadata.name,
            session = %metadata.id,
            slices = metadata.slice_count,
            "upload session started"
        );
        Ok(UploadSession {
            metadata,
            missing: MissingSlices::all(),
            resumed: false,
        })
    }

    async fn run(
        &self,
        path: &Path,
        sidecar: &Path,
        session: UploadSession,
    ) -> Result<UploadOutcome, TransferError> {
        let UploadSession {
            mut metadata,
            missing,
            resumed,
        } = session;

        if missing.is_empty() && metadata.has_checksum() {
            info!(file = %metadata.name, "store already has every slice");
            self.merge(sidecar, &metadata).await?;
            return Ok(UploadOutcome {
                metadata,
                resumed,
                slices_sent: 0,
                retries: 0,
            });
        }

        let engine = TransferEngine::new(
            UploadTask {
                store: self.store.clone(),
            },
            &self.config.upload,
            metadata.name.clone(),
        );

        let source = path.to_path_buf();
        let slice_size = self.config.slice_size;
        let mut reader = tokio::task::spawn_blocking(move || SliceReader::new(&source, slice_size))
            .await
            .map_err(join_error)??;

        if metadata.has_checksum() {
            for index in missing.indices(metadata.slice_count) {
                let (r, data) = read_at(reader, index).await?;
                reader = r;
                let Some(payload) = data else {
                    return Err(short_read(path, index));
                };
                engine.dispatch(part(&metadata, index, payload)).await?;
            }
        } else {
            let mut checksum = Checksum::new();
            loop {
                let (r, next) = read_next(reader).await?;
                reader = r;
                let Some((index, payload)) = next else {
                    break;
                };
                checksum.update(&payload);
                if missing.contains(index) {
                    engine.dispatch(part(&metadata, index, payload)).await?;
                } else {
                    debug!(file = %metadata.name, index, "store already has slice");
                }
            }
            metadata.checksum = checksum.finish();
            sidecar::save(sidecar, &metadata)?;
            debug!(file = %metadata.name, checksum = %metadata.checksum, "checksum recorded");
        }

        let EngineReport {
            dispatched,
            retries,
            ..
        } = engine.finish().await?;

        self.merge(sidecar, &metadata).await?;
        Ok(UploadOutcome {
            metadata,
            resumed,
            slices_sent: dispatched,
            retries,
        })
    }

    /// Sends the merge request; the sidecar goes only once it succeeded.
    async fn merge(&self, sidecar: &Path, metadata: &TransferMetadata) -> Result<(), TransferError> {
        self.store.merge(metadata).await?;
        sidecar::delete(sidecar);
        info!(file = %metadata.name, size = metadata.total_size, "upload complete");
        Ok(())
    }
}

fn part(metadata: &TransferMetadata, index: u32, payload: Vec<u8>) -> SlicePart {
    SlicePart {
        session_id: metadata.id.clone(),
        index,
        payload,
    }
}

fn file_name(path: &Path) -> Result<String, TransferError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| TransferError::InvalidPath(format!("no usable file name: {}", path.display())))
}

fn sidecar_path_for(path: &Path) -> Result<PathBuf, TransferError> {
    file_name(path)?;
    Ok(sidecar::sidecar_path(path, Direction::Upload))
}

fn short_read(path: &Path, index: u32) -> TransferError {
    TransferError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("{} ended before slice {index}", path.display()),
    ))
}

type NextSlice = Option<(u32, Vec<u8>)>;

async fn read_next(mut reader: SliceReader) -> Result<(SliceReader, NextSlice), TransferError> {
    let (reader, result) = tokio::task::spawn_blocking(move || {
        let result = reader.next_slice();
        (reader, result)
    })
    .await
    .map_err(join_error)?;
    Ok((reader, result?))
}

async fn read_at(
    mut reader: SliceReader,
    index: u32,
) -> Result<(SliceReader, Option<Vec<u8>>), TransferError> {
    let (reader, result) = tokio::task::spawn_blocking(move || {
        let result = reader.read_slice(index);
        (reader, result)
    })
    .await
    .map_err(join_error)?;
    Ok((reader, result?))
}
