//! In-memory [`RemoteStore`] for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use slicebox_protocol::{
    FileInfo, FileKind, FileListing, MissingSlices, SlicePart, TransferMetadata,
};

use crate::checksum::checksum_bytes;
use crate::remote::{RemoteFuture, RemoteStore};
use crate::TransferError;

pub(crate) fn sample_metadata(
    id: &str,
    name: &str,
    total_size: u64,
    slice_size: u64,
) -> TransferMetadata {
    TransferMetadata::new(
        id,
        name,
        total_size,
        slice_size,
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    )
}

struct StoredFile {
    metadata: TransferMetadata,
    slices: Vec<Vec<u8>>,
}

struct UploadSession {
    metadata: TransferMetadata,
    received: BTreeMap<u32, Vec<u8>>,
}

#[derive(Default)]
struct State {
    files: HashMap<String, StoredFile>,
    sessions: HashMap<String, UploadSession>,
    /// Remaining scripted failures per slice index, for puts and gets.
    failures: HashMap<u32, u32>,
    attempts: HashMap<u32, u32>,
    started: u32,
    merges: u32,
    fail_start: bool,
    fail_merge: bool,
    fail_missing_query: bool,
}

/// Mock store keeping files and upload sessions in memory.
#[derive(Default)]
pub(crate) struct MockStore {
    state: Mutex<State>,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `data` as a sliced file and returns its metadata.
    pub(crate) fn add_file(&self, name: &str, data: &[u8], slice_size: u64) -> TransferMetadata {
        let mut metadata =
            sample_metadata(&format!("fid-{name}"), name, data.len() as u64, slice_size);
        metadata.checksum = checksum_bytes(data);
        let slices = data
            .chunks(slice_size as usize)
            .map(<[u8]>::to_vec)
            .collect();
        self.state.lock().unwrap().files.insert(
            name.to_string(),
            StoredFile {
                metadata: metadata.clone(),
                slices,
            },
        );
        metadata
    }

    pub(crate) fn remove_file(&self, name: &str) {
        self.state.lock().unwrap().files.remove(name);
    }

    /// Overrides the checksum the store reports for `name`.
    pub(crate) fn set_checksum(&self, name: &str, checksum: &str) {
        if let Some(file) = self.state.lock().unwrap().files.get_mut(name) {
            file.metadata.checksum = checksum.to_string();
        }
    }

    /// Makes the next `times` puts or gets of slice `index` fail.
    pub(crate) fn fail_slice(&self, index: u32, times: u32) {
        self.state.lock().unwrap().failures.insert(index, times);
    }

    pub(crate) fn fail_start(&self) {
        self.state.lock().unwrap().fail_start = true;
    }

    pub(crate) fn fail_merge(&self, fail: bool) {
        self.state.lock().unwrap().fail_merge = fail;
    }

    pub(crate) fn fail_missing_query(&self) {
        self.state.lock().unwrap().fail_missing_query = true;
    }

    /// Marks slices of an upload session as already received.
    pub(crate) fn receive(&self, session_id: &str, index: u32, data: &[u8]) {
        if let Some(session) = self.state.lock().unwrap().sessions.get_mut(session_id) {
            session.received.insert(index, data.to_vec());
        }
    }

    pub(crate) fn attempts(&self, index: u32) -> u32 {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_attempts(&self) -> u32 {
        self.state.lock().unwrap().attempts.values().sum()
    }

    pub(crate) fn started(&self) -> u32 {
        self.state.lock().unwrap().started
    }

    pub(crate) fn merges(&self) -> u32 {
        self.state.lock().unwrap().merges
    }

    /// Reassembled content of a stored file.
    pub(crate) fn content(&self, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.files.get(name).map(|f| f.slices.concat())
    }

    pub(crate) fn session(&self, session_id: &str) -> Option<TransferMetadata> {
        let state = self.state.lock().unwrap();
        state.sessions.get(session_id).map(|s| s.metadata.clone())
    }

    fn take_failure(state: &mut State, index: u32) -> Result<(), TransferError> {
        *state.attempts.entry(index).or_default() += 1;
        match state.failures.get_mut(&index) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(TransferError::RemoteUnavailable(format!(
                    "scripted failure for slice {index}"
                )))
            }
            _ => Ok(()),
        }
    }

    fn not_found(what: &str) -> TransferError {
        TransferError::Remote {
            status: 404,
            body: format!("{what} not found"),
        }
    }
}

impl RemoteStore for MockStore {
    fn file_metadata<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, TransferMetadata> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state
                .files
                .get(name)
                .map(|f| f.metadata.clone())
                .ok_or_else(|| Self::not_found(name))
        })
    }

    fn check_session<'a>(&'a self, session_id: &'a str, name: &'a str) -> RemoteFuture<'a, bool> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state
                .files
                .get(name)
                .is_some_and(|f| f.metadata.id == session_id))
        })
    }

    fn missing_slices<'a>(
        &'a self,
        session_id: &'a str,
        _name: &'a str,
    ) -> RemoteFuture<'a, MissingSlices> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            if state.fail_missing_query {
                return Err(TransferError::RemoteUnavailable("connection refused".into()));
            }
            let session = state
                .sessions
                .get(session_id)
                .ok_or_else(|| Self::not_found(session_id))?;
            let listed = (0..session.metadata.slice_count)
                .filter(|i| !session.received.contains_key(i))
                .collect();
            Ok(MissingSlices::from_parts(listed, false)?)
        })
    }

    fn start_session<'a>(&'a self, metadata: &'a TransferMetadata) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.fail_start {
                return Err(TransferError::RemoteUnavailable("connection refused".into()));
            }
            state.started += 1;
            state.sessions.insert(
                metadata.id.clone(),
                UploadSession {
                    metadata: metadata.clone(),
                    received: BTreeMap::new(),
                },
            );
            Ok(())
        })
    }

    fn put_slice<'a>(&'a self, part: &'a SlicePart) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            let mut state = self.state.lock().unwrap();
            Self::take_failure(&mut state, part.index)?;
            let session = state
                .sessions
                .get_mut(&part.session_id)
                .ok_or_else(|| Self::not_found(&part.session_id))?;
            session.received.insert(part.index, part.payload.clone());
            Ok(())
        })
    }

    fn get_slice<'a>(&'a self, name: &'a str, index: u32) -> RemoteFuture<'a, Vec<u8>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            let mut state = self.state.lock().unwrap();
            Self::take_failure(&mut state, index)?;
            state
                .files
                .get(name)
                .and_then(|f| f.slices.get(index as usize).cloned())
                .ok_or_else(|| Self::not_found(&format!("{name} slice {index}")))
        })
    }

    fn merge<'a>(&'a self, metadata: &'a TransferMetadata) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.fail_merge {
                return Err(TransferError::RemoteUnavailable("connection reset".into()));
            }
            let session = state
                .sessions
                .remove(&metadata.id)
                .ok_or_else(|| Self::not_found(&metadata.id))?;
            if session.received.len() != metadata.slice_count as usize {
                return Err(TransferError::Remote {
                    status: 400,
                    body: "slices missing".into(),
                });
            }
            let slices: Vec<Vec<u8>> = session.received.into_values().collect();
            let actual = checksum_bytes(&slices.concat());
            if actual != metadata.checksum {
                return Err(TransferError::Remote {
                    status: 400,
                    body: format!("md5 mismatch: {actual}"),
                });
            }
            state.merges += 1;
            state.files.insert(
                metadata.name.clone(),
                StoredFile {
                    metadata: metadata.clone(),
                    slices,
                },
            );
            Ok(())
        })
    }

    fn list_files(&self) -> RemoteFuture<'_, FileListing> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            let mut files: Vec<FileInfo> = state
                .files
                .values()
                .map(|f| FileInfo {
                    name: f.metadata.name.clone(),
                    size: f.metadata.total_size,
                    kind: FileKind::Slice,
                })
                .collect();
            files.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(FileListing { files })
        })
    }

    fn file_info<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, FileInfo> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            state
                .files
                .get(name)
                .map(|f| FileInfo {
                    name: f.metadata.name.clone(),
                    size: f.metadata.total_size,
                    kind: FileKind::Slice,
                })
                .ok_or_else(|| Self::not_found(name))
        })
    }
}
