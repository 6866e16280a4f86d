//! Works out which slices a resumed session still has to move.

use std::collections::HashSet;
use std::path::Path;

use slicebox_protocol::{MissingSlices, TransferMetadata};
use tracing::{debug, info, warn};

use crate::config::ReconcileMode;
use crate::remote::RemoteStore;
use crate::TransferError;

/// Builds the missing list for a download from the indices already on disk.
///
/// In [`ReconcileMode::Fast`] the walk over `0..slice_count` stops as soon
/// as every present index has been accounted for. The index where it
/// stopped is listed, and when later indices exist the list ends with an
/// open tail: `{0, 1, 2}` of 5 gives `[3, 4..]`. Indices at or beyond
/// `slice_count` are ignored.
pub fn plan_missing(
    mut present: HashSet<u32>,
    slice_count: u32,
    mode: ReconcileMode,
) -> Result<MissingSlices, TransferError> {
    match mode {
        ReconcileMode::Exact => {
            let listed = (0..slice_count).filter(|i| !present.contains(i)).collect();
            Ok(MissingSlices::from_parts(listed, false)?)
        }
        ReconcileMode::Fast => {
            let mut listed = Vec::new();
            let mut index = 0;
            while index < slice_count && !present.is_empty() {
                if !present.remove(&index) {
                    listed.push(index);
                }
                index += 1;
            }

            let mut open_tail = false;
            if index < slice_count {
                listed.push(index);
                open_tail = index + 1 < slice_count;
            }
            Ok(MissingSlices::from_parts(listed, open_tail)?)
        }
    }
}

/// Collects the slice indices stored in `slice_dir`.
///
/// Entries whose names are not plain decimal indices (such as partially
/// written `.part` files) are skipped. A missing directory holds nothing.
pub async fn scan_slice_dir(slice_dir: &Path) -> Result<HashSet<u32>, TransferError> {
    let mut present = HashSet::new();
    let mut entries = match tokio::fs::read_dir(slice_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(present),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        match name.to_str().and_then(|n| n.parse::<u32>().ok()) {
            Some(index) => {
                present.insert(index);
            }
            None => debug!(entry = ?name, "ignoring non-slice entry"),
        }
    }
    Ok(present)
}

/// Reconciles a resumed download against the store and the slice directory.
///
/// Fails with [`TransferError::SessionInvalidated`] if the store no longer
/// recognises the session.
pub async fn reconcile_download(
    store: &dyn RemoteStore,
    metadata: &TransferMetadata,
    slice_dir: &Path,
    mode: ReconcileMode,
) -> Result<MissingSlices, TransferError> {
    if !store.check_session(&metadata.id, &metadata.name).await? {
        return Err(TransferError::SessionInvalidated(format!(
            "{} ({})",
            metadata.name, metadata.id
        )));
    }

    let present = scan_slice_dir(slice_dir).await?;
    let have = present.len();
    let missing = plan_missing(present, metadata.slice_count, mode)?;
    info!(
        file = %metadata.name,
        present = have,
        missing = %missing,
        "download reconciled"
    );
    Ok(missing)
}

/// Asks the store which slices of an upload it still lacks.
///
/// A client error status (4xx) means the store has forgotten the session and
/// fails with [`TransferError::SessionInvalidated`]. Any other failure to
/// answer treats every slice as missing.
pub async fn reconcile_upload(
    store: &dyn RemoteStore,
    metadata: &TransferMetadata,
) -> Result<MissingSlices, TransferError> {
    match store.missing_slices(&metadata.id, &metadata.name).await {
        Ok(missing) => {
            info!(file = %metadata.name, missing = %missing, "upload reconciled");
            Ok(missing)
        }
        Err(TransferError::Remote { status, body }) if (400..500).contains(&status) => {
            Err(TransferError::SessionInvalidated(format!(
                "{} ({}): {status} {body}",
                metadata.name, metadata.id
            )))
        }
        Err(e) => {
            warn!(
                file = %metadata.name,
                error = %e,
                "could not query upload state, resending every slice"
            );
            Ok(MissingSlices::all())
        }
    }
}
