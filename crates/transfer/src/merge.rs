//! Reassembly of downloaded slices.

use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use slicebox_protocol::TransferMetadata;
use tracing::{info, warn};

use crate::checksum::Checksum;
use crate::{TransferError, join_error};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Concatenates slice files `0..slice_count` from `slice_dir` into `output`
/// in ascending index order and returns the checksum of what was written.
///
/// `output` is created or truncated. A missing slice file fails with
/// [`TransferError::Io`].
pub fn merge_slices(
    slice_dir: &Path,
    slice_count: u32,
    output: &Path,
) -> Result<String, TransferError> {
    let file = std::fs::File::create(output)?;
    let mut out = BufWriter::new(file);
    let mut checksum = Checksum::new();
    let mut buf = vec![0u8; COPY_BUF_SIZE];

    for index in 0..slice_count {
        let path = slice_dir.join(index.to_string());
        let mut slice = std::fs::File::open(&path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("slice {index} ({}): {e}", path.display()))
        })?;
        loop {
            let n = slice.read(&mut buf)?;
            if n == 0 {
                break;
            }
            checksum.update(&buf[..n]);
            out.write_all(&buf[..n])?;
        }
    }

    out.flush()?;
    out.get_ref().sync_all()?;
    Ok(checksum.finish())
}

/// Merges a completed download into `output` and checks it against the
/// checksum in `metadata`.
pub async fn merge_and_verify(
    metadata: &TransferMetadata,
    slice_dir: &Path,
    output: &Path,
) -> Result<(), TransferError> {
    let dir: PathBuf = slice_dir.to_path_buf();
    let out: PathBuf = output.to_path_buf();
    let count = metadata.slice_count;
    let actual = tokio::task::spawn_blocking(move || merge_slices(&dir, count, &out))
        .await
        .map_err(join_error)??;

    if !actual.eq_ignore_ascii_case(&metadata.checksum) {
        warn!(
            file = %metadata.name,
            expected = %metadata.checksum,
            actual = %actual,
            "merged file failed verification"
        );
        return Err(TransferError::IntegrityError {
            expected: metadata.checksum.clone(),
            actual,
        });
    }

    info!(file = %metadata.name, output = %output.display(), "merged and verified");
    Ok(())
}
