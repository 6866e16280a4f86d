//! Wire types for the slicebox remote store API.
//!
//! The store speaks JSON with Go-style exported field names (`Fid`,
//! `Filesize`, `SliceNum`, ...), so every type here renames its fields
//! explicitly. Byte payloads are base64 strings, matching Go's `[]byte`
//! encoding.

pub mod slices;
pub mod types;

pub use slices::{MissingSlices, TAIL_SENTINEL};
pub use types::{FileInfo, FileKind, FileListing, SlicePart, TransferMetadata};

/// Errors produced while decoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid slice list: {0}")]
    InvalidSliceList(String),
}

/// Number of slices needed to cover `total_size` bytes.
///
/// Returns 0 for an empty file or a zero `slice_size`.
pub fn slice_count(total_size: u64, slice_size: u64) -> u32 {
    if slice_size == 0 {
        return 0;
    }
    u32::try_from(total_size.div_ceil(slice_size)).unwrap_or(u32::MAX)
}

/// Maps a JSON `null` (Go's nil slice) to an empty vector.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    let value: Option<Vec<T>> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
