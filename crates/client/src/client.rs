//! High-level file operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use slicebox_protocol::{FileInfo, FileKind};
use slicebox_transfer::{
    DownloadOutcome, Downloader, RemoteStore, TransferError, UploadOutcome, Uploader,
};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::{ClientConfig, ClientError, HttpStore};

/// How an upload went.
#[derive(Debug, Clone)]
pub enum UploadReport {
    /// Sent in a single request.
    Whole { name: String, size: u64 },
    /// Sent as a sliced session.
    Sliced(UploadOutcome),
}

/// How a download went.
#[derive(Debug, Clone)]
pub enum DownloadReport {
    /// Fetched in a single request.
    Whole { path: PathBuf, size: u64 },
    /// Fetched as a sliced session.
    Sliced(DownloadOutcome),
}

impl DownloadReport {
    /// Where the downloaded file ended up.
    pub fn path(&self) -> &Path {
        match self {
            Self::Whole { path, .. } => path,
            Self::Sliced(outcome) => &outcome.path,
        }
    }
}

/// Uploads, downloads and lists files on a store.
pub struct FileClient {
    store: Arc<HttpStore>,
    uploader: Uploader,
    downloader: Downloader,
    small_file_threshold: u64,
}

impl FileClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let store = Arc::new(HttpStore::new(&config)?);
        Ok(Self {
            uploader: Uploader::new(store.clone(), config.transfer.clone()),
            downloader: Downloader::new(store.clone(), config.transfer),
            store,
            small_file_threshold: config.small_file_threshold,
        })
    }

    /// Uploads one file. Small files go in a single request; larger ones
    /// use a sliced session that resumes any earlier attempt.
    pub async fn upload(&self, path: &Path) -> Result<UploadReport, ClientError> {
        let size = tokio::fs::metadata(path).await?.len();
        if size <= self.small_file_threshold {
            let size = self.store.upload_file(path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(file = %name, size, "uploaded");
            return Ok(UploadReport::Whole { name, size });
        }

        let outcome = self.uploader.upload(path).await?;
        info!(
            file = %outcome.metadata.name,
            size = outcome.metadata.total_size,
            resumed = outcome.resumed,
            "uploaded"
        );
        Ok(UploadReport::Sliced(outcome))
    }

    /// Downloads one file into `dest_dir`, asking the store first whether
    /// it keeps the file whole or in slices.
    pub async fn download(&self, name: &str, dest_dir: &Path) -> Result<DownloadReport, ClientError> {
        if !tokio::fs::metadata(dest_dir).await.is_ok_and(|m| m.is_dir()) {
            return Err(ClientError::Transfer(TransferError::InvalidPath(format!(
                "destination is not a directory: {}",
                dest_dir.display()
            ))));
        }

        let info = self.store.file_info(name).await?;
        let report = match info.kind {
            FileKind::Normal => {
                let (path, size) = self.store.download_file(name, dest_dir).await?;
                DownloadReport::Whole { path, size }
            }
            FileKind::Slice => DownloadReport::Sliced(self.downloader.download(name, dest_dir).await?),
            FileKind::Unknown => return Err(ClientError::UnknownFileKind(name.to_string())),
        };

        info!(file = %name, path = %report.path().display(), "downloaded");
        Ok(report)
    }

    /// Lists the files on the store.
    pub async fn list(&self) -> Result<Vec<FileInfo>, ClientError> {
        let listing = self.store.list_files().await?;
        Ok(listing.files)
    }

    /// Uploads several files concurrently, one task per file. Results come
    /// back in input order.
    pub async fn upload_many(
        self: &Arc<Self>,
        paths: Vec<PathBuf>,
    ) -> Vec<(PathBuf, Result<UploadReport, ClientError>)> {
        let mut tasks = JoinSet::new();
        for (n, path) in paths.into_iter().enumerate() {
            let client = self.clone();
            tasks.spawn(async move {
                let result = client.upload(&path).await;
                if let Err(e) = &result {
                    error!(path = %path.display(), error = %e, "upload failed");
                }
                (n, path, result)
            });
        }
        collect_in_order(tasks).await
    }

    /// Downloads several files concurrently into `dest_dir`. Results come
    /// back in input order.
    pub async fn download_many(
        self: &Arc<Self>,
        names: Vec<String>,
        dest_dir: &Path,
    ) -> Vec<(String, Result<DownloadReport, ClientError>)> {
        let mut tasks = JoinSet::new();
        for (n, name) in names.into_iter().enumerate() {
            let client = self.clone();
            let dest_dir = dest_dir.to_path_buf();
            tasks.spawn(async move {
                let result = client.download(&name, &dest_dir).await;
                if let Err(e) = &result {
                    error!(file = %name, error = %e, "download failed");
                }
                (n, name, result)
            });
        }
        collect_in_order(tasks).await
    }
}

async fn collect_in_order<K, T>(
    mut tasks: JoinSet<(usize, K, Result<T, ClientError>)>,
) -> Vec<(K, Result<T, ClientError>)>
where
    K: Send + 'static,
    T: Send + 'static,
{
    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => results.push(entry),
            Err(e) => error!(error = %e, "transfer task failed to complete"),
        }
    }
    results.sort_by_key(|(n, _, _)| *n);
    results.into_iter().map(|(_, key, result)| (key, result)).collect()
}
