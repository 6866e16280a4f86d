//! Store doubles served over real HTTP with axum.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use slicebox_protocol::{FileInfo, FileKind, FileListing, MissingSlices, SlicePart, TransferMetadata};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Query parameters the store endpoints accept.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StoreQuery {
    pub filename: String,
    pub fid: String,
    #[serde(rename = "sliceIndex")]
    pub slice_index: usize,
}

/// Serves `app` on an ephemeral port and returns its base URL (with
/// trailing slash).
pub(crate) async fn serve(app: Router) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (url, handle)
}

type Failure = (StatusCode, String);

fn not_found(what: &str) -> Failure {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

#[derive(Default)]
struct Files {
    whole: HashMap<String, Vec<u8>>,
    sessions: HashMap<String, (TransferMetadata, BTreeMap<u32, Vec<u8>>)>,
    sliced: HashMap<String, (TransferMetadata, Vec<u8>)>,
    slice_size: usize,
}

type Shared = Arc<Mutex<Files>>;

/// A complete store keeping everything in memory.
pub(crate) fn fake_store(slice_size: usize) -> Router {
    let files = Files {
        slice_size,
        ..Files::default()
    };
    Router::new()
        .route("/upload", post(upload))
        .route("/download", get(download))
        .route("/startUploadSlice", post(start_session))
        .route("/uploadBySlice", post(put_slice))
        .route("/getUploadingStat", get(missing_slices))
        .route("/mergeSlice", post(merge))
        .route("/getFileInfo", get(file_info))
        .route("/getFileMetainfo", get(file_metadata))
        .route("/checkFileExist", get(check_session))
        .route("/downloadBySlice", get(get_slice))
        .route("/listFiles", get(list_files))
        .with_state(Arc::new(Mutex::new(files)))
}

async fn upload(State(files): State<Shared>, mut multipart: Multipart) -> Result<StatusCode, Failure> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        files.lock().unwrap().whole.insert(name, data.to_vec());
    }
    Ok(StatusCode::OK)
}

async fn download(State(files): State<Shared>, Query(q): Query<StoreQuery>) -> Result<Vec<u8>, Failure> {
    let files = files.lock().unwrap();
    files.whole.get(&q.filename).cloned().ok_or_else(|| not_found(&q.filename))
}

async fn start_session(State(files): State<Shared>, Json(meta): Json<TransferMetadata>) -> StatusCode {
    files
        .lock()
        .unwrap()
        .sessions
        .insert(meta.id.clone(), (meta, BTreeMap::new()));
    StatusCode::OK
}

async fn put_slice(State(files): State<Shared>, Json(part): Json<SlicePart>) -> Result<StatusCode, Failure> {
    let mut files = files.lock().unwrap();
    let (_, slices) = files
        .sessions
        .get_mut(&part.session_id)
        .ok_or_else(|| not_found("session"))?;
    slices.insert(part.index, part.payload);
    Ok(StatusCode::OK)
}

async fn missing_slices(
    State(files): State<Shared>,
    Query(q): Query<StoreQuery>,
) -> Result<Json<MissingSlices>, Failure> {
    let files = files.lock().unwrap();
    let (meta, slices) = files.sessions.get(&q.fid).ok_or_else(|| not_found("session"))?;
    let listed = (0..meta.slice_count)
        .filter(|i| !slices.contains_key(i))
        .collect();
    MissingSlices::from_parts(listed, false)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn merge(State(files): State<Shared>, Json(meta): Json<TransferMetadata>) -> Result<StatusCode, Failure> {
    let mut files = files.lock().unwrap();
    let (_, slices) = files.sessions.remove(&meta.id).ok_or_else(|| not_found("session"))?;
    let data: Vec<u8> = slices.into_values().flatten().collect();
    if slicebox_transfer::checksum_bytes(&data) != meta.checksum {
        return Err((StatusCode::BAD_REQUEST, "md5 mismatch".into()));
    }
    files.sliced.insert(meta.name.clone(), (meta, data));
    Ok(StatusCode::OK)
}

async fn file_info(State(files): State<Shared>, Query(q): Query<StoreQuery>) -> Result<Json<FileInfo>, Failure> {
    let files = files.lock().unwrap();
    let (size, kind) = if let Some((meta, _)) = files.sliced.get(&q.filename) {
        (meta.total_size, FileKind::Slice)
    } else if let Some(data) = files.whole.get(&q.filename) {
        (data.len() as u64, FileKind::Normal)
    } else {
        return Err(not_found(&q.filename));
    };
    Ok(Json(FileInfo {
        name: q.filename,
        size,
        kind,
    }))
}

async fn file_metadata(
    State(files): State<Shared>,
    Query(q): Query<StoreQuery>,
) -> Result<Json<TransferMetadata>, Failure> {
    let files = files.lock().unwrap();
    files
        .sliced
        .get(&q.filename)
        .map(|(meta, _)| Json(meta.clone()))
        .ok_or_else(|| not_found(&q.filename))
}

async fn check_session(State(files): State<Shared>, Query(q): Query<StoreQuery>) -> Result<StatusCode, Failure> {
    let files = files.lock().unwrap();
    match files.sliced.get(&q.filename) {
        Some((meta, _)) if meta.id == q.fid => Ok(StatusCode::OK),
        _ => Err(not_found("session")),
    }
}

async fn get_slice(State(files): State<Shared>, Query(q): Query<StoreQuery>) -> Result<Vec<u8>, Failure> {
    let files = files.lock().unwrap();
    let (_, data) = files.sliced.get(&q.filename).ok_or_else(|| not_found(&q.filename))?;
    let start = (q.slice_index * files.slice_size).min(data.len());
    let end = (start + files.slice_size).min(data.len());
    Ok(data[start..end].to_vec())
}

async fn list_files(State(files): State<Shared>) -> Json<FileListing> {
    let files = files.lock().unwrap();
    let mut listed: Vec<FileInfo> = files
        .sliced
        .iter()
        .map(|(name, (meta, _))| FileInfo {
            name: name.clone(),
            size: meta.total_size,
            kind: FileKind::Slice,
        })
        .collect();
    listed.sort_by(|a, b| a.name.cmp(&b.name));
    Json(FileListing { files: listed })
}
