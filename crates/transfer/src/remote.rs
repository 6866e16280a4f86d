//! Abstraction over the remote file store.
//!
//! The transfer engine only talks to the store through [`RemoteStore`], so
//! sessions can run against the HTTP binding in `slicebox-client` or an
//! in-memory store in tests.

use std::future::Future;
use std::pin::Pin;

use slicebox_protocol::{FileInfo, FileListing, MissingSlices, SlicePart, TransferMetadata};

use crate::TransferError;

/// Boxed future returned by [`RemoteStore`] operations.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransferError>> + Send + 'a>>;

/// Operations the remote store exposes for sliced transfers.
///
/// Network failures should map to [`TransferError::RemoteUnavailable`] and
/// non-success responses to [`TransferError::Remote`].
pub trait RemoteStore: Send + Sync {
    /// Fetches the metadata of a stored file, starting a download session.
    fn file_metadata<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, TransferMetadata>;

    /// Returns `true` if the store still holds `name` under `session_id`.
    fn check_session<'a>(&'a self, session_id: &'a str, name: &'a str) -> RemoteFuture<'a, bool>;

    /// Slices the store has not yet received for an upload session.
    fn missing_slices<'a>(
        &'a self,
        session_id: &'a str,
        name: &'a str,
    ) -> RemoteFuture<'a, MissingSlices>;

    /// Announces a new upload session.
    fn start_session<'a>(&'a self, metadata: &'a TransferMetadata) -> RemoteFuture<'a, ()>;

    /// Uploads one slice.
    fn put_slice<'a>(&'a self, part: &'a SlicePart) -> RemoteFuture<'a, ()>;

    /// Downloads one slice of a stored file.
    fn get_slice<'a>(&'a self, name: &'a str, index: u32) -> RemoteFuture<'a, Vec<u8>>;

    /// Asks the store to reassemble an uploaded file from its slices.
    fn merge<'a>(&'a self, metadata: &'a TransferMetadata) -> RemoteFuture<'a, ()>;

    /// Lists stored files.
    fn list_files(&self) -> RemoteFuture<'_, FileListing>;

    /// Basic information about one stored file.
    fn file_info<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, FileInfo>;
}
