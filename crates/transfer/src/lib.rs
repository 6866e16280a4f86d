//! Resumable sliced file transfer.
//!
//! Splits large files into fixed-size slices and moves them to or from a
//! [`RemoteStore`] with a bounded pool of concurrent workers. Interrupted
//! transfers leave a hidden sidecar record next to the target file, which
//! the next attempt uses to work out which slices are still missing.
//!
//! # Pipeline
//!
//! 1. **Sidecar**: load the previous session's metadata, or create it
//! 2. **Plan**: reconcile which slices are still missing
//! 3. **Engine**: dispatch slices, retry failures, wait for completion
//! 4. **Merge**: reassemble and verify (download) or request a remote
//!    merge (upload), then remove the sidecar

mod barrier;
pub mod checksum;
pub mod config;
pub mod download;
pub mod engine;
pub mod merge;
pub mod planner;
pub mod reader;
pub mod remote;
pub mod sidecar;
pub mod upload;
mod validation;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::time::Duration;

pub use checksum::{Checksum, checksum_bytes};
pub use config::{EngineLimits, ReconcileMode, TransferConfig};
pub use download::{DownloadOutcome, Downloader};
pub use engine::{EngineReport, SliceTask, TransferEngine};
pub use reader::SliceReader;
pub use remote::{RemoteFuture, RemoteStore};
pub use sidecar::{Direction, sidecar_path};
pub use slicebox_protocol::{MissingSlices, SlicePart, TransferMetadata};
pub use upload::{UploadOutcome, Uploader};
pub use validation::validate_file_name;

/// Default slice size: 1 MiB.
pub const DEFAULT_SLICE_SIZE: u64 = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] slicebox_protocol::ProtocolError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("remote error {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("session invalidated: {0}")]
    SessionInvalidated(String),

    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    IntegrityError { expected: String, actual: String },

    #[error("empty file: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> TransferError {
    TransferError::Io(std::io::Error::other(format!("task join error: {e}")))
}
