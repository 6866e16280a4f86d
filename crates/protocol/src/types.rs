use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::slice_count;

/// Metadata describing one sliced transfer session.
///
/// Fetched from the store before a download, sent to it when an upload
/// session starts and when slices are merged, and persisted locally as the
/// sidecar record while a transfer is incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    /// Opaque session identifier (a UUID when created by this client).
    #[serde(rename = "Fid")]
    pub id: String,
    /// File size in bytes.
    #[serde(rename = "Filesize")]
    pub total_size: u64,
    /// Base file name, no directory components.
    #[serde(rename = "Filename")]
    pub name: String,
    /// Number of slices, `ceil(total_size / slice_size)`.
    #[serde(rename = "SliceNum")]
    pub slice_count: u32,
    /// Hex MD5 of the whole file; empty until computed.
    #[serde(rename = "Md5sum", default)]
    pub checksum: String,
    /// Modification time of the source file when the session started.
    #[serde(rename = "ModifyTime")]
    pub source_modified_at: DateTime<Utc>,
}

impl TransferMetadata {
    /// Builds metadata for a new session with no checksum yet.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        total_size: u64,
        slice_size: u64,
        source_modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            total_size,
            name: name.into(),
            slice_count: slice_count(total_size, slice_size),
            checksum: String::new(),
            source_modified_at,
        }
    }

    /// Returns `true` once the whole-file checksum is known.
    pub fn has_checksum(&self) -> bool {
        !self.checksum.is_empty()
    }
}

/// One slice of a file on its way to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlicePart {
    #[serde(rename = "Fid")]
    pub session_id: String,
    #[serde(rename = "Index")]
    pub index: u32,
    #[serde(rename = "Data", with = "base64_bytes")]
    pub payload: Vec<u8>,
}

/// How the store keeps a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Stored whole; fetched with a single request.
    Normal,
    /// Stored as slices; fetched through a slice session.
    Slice,
    #[serde(other)]
    Unknown,
}

/// Basic information about a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "Filename")]
    pub name: String,
    #[serde(rename = "Filesize")]
    pub size: u64,
    #[serde(rename = "Filetype")]
    pub kind: FileKind,
}

/// Response of the store's file listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    #[serde(
        rename = "Files",
        default,
        deserialize_with = "crate::null_as_empty"
    )]
    pub files: Vec<FileInfo>,
}

/// Base64 encoding for `Vec<u8>` fields, as Go encodes `[]byte`.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
