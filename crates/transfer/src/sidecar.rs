//! Sidecar records for in-progress sessions.
//!
//! A session that has not finished keeps its [`TransferMetadata`] in a
//! hidden file next to the target: `.<name>.uploading` beside an upload's
//! source, `.<name>.downloading` in a download's destination directory.
//! The record's presence is the only signal that a session can resume.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use slicebox_protocol::TransferMetadata;
use tracing::{debug, warn};

use crate::TransferError;

/// Which way a session moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    fn suffix(self) -> &'static str {
        match self {
            Self::Upload => "uploading",
            Self::Download => "downloading",
        }
    }
}

/// Sidecar location for `target` (the source file for uploads, the
/// destination file for downloads).
pub fn sidecar_path(target: &Path, direction: Direction) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{}", direction.suffix()))
}

/// Reads a sidecar record.
///
/// Returns [`TransferError::NotFound`] if no record exists and
/// [`TransferError::CorruptMetadata`] if it cannot be parsed.
pub fn load(path: &Path) -> Result<TransferMetadata, TransferError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TransferError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map_err(|e| TransferError::CorruptMetadata(format!("{}: {e}", path.display())))
}

/// Writes a sidecar record, replacing any previous one atomically.
pub fn save(path: &Path, metadata: &TransferMetadata) -> Result<(), TransferError> {
    let json = serde_json::to_vec(metadata)?;

    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)?;

    debug!(path = %path.display(), "sidecar saved");
    Ok(())
}

/// Removes a sidecar record. Failures are logged, never returned.
pub fn delete(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "sidecar removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove sidecar"),
    }
}
