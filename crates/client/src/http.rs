//! HTTP binding of the store API.
//!
//! Async client using `reqwest`. Query parameters are URL-encoded, request
//! bodies are JSON, and any non-2xx response carries its body back as the
//! error text.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use slicebox_protocol::{FileInfo, FileListing, MissingSlices, SlicePart, TransferMetadata};
use slicebox_transfer::{RemoteFuture, RemoteStore, TransferError, validate_file_name};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{ClientConfig, ClientError};

/// Store client speaking the HTTP API.
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
}

fn unavailable(e: reqwest::Error) -> TransferError {
    TransferError::RemoteUnavailable(e.to_string())
}

/// Body of a failed response. A body that cannot be read comes back empty.
async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(%status, error = %e, "could not read error response body");
            String::new()
        }
    }
}

impl HttpStore {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    /// Sends a request and fails on any non-success status.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, TransferError> {
        let resp = request.send().await.map_err(unavailable)?;
        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(TransferError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_bytes(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, TransferError> {
        let resp = self.send(self.http.get(self.url(endpoint)).query(query)).await?;
        Ok(resp.bytes().await.map_err(unavailable)?.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TransferError> {
        let body = self.get_bytes(endpoint, query).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<(), TransferError> {
        self.send(self.http.post(self.url(endpoint)).json(body)).await?;
        Ok(())
    }

    /// Uploads a whole file in one multipart request.
    pub async fn upload_file(&self, path: &Path) -> Result<u64, ClientError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransferError::InvalidPath(path.display().to_string()))?
            .to_string();
        let data = tokio::fs::read(path).await?;
        let size = data.len() as u64;

        let form = Form::new().part("filename", Part::bytes(data).file_name(name.clone()));
        let resp = self
            .http
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(file = %name, size, "whole file uploaded");
        Ok(size)
    }

    /// Downloads a whole file into `dest_dir`, streaming the body to disk.
    pub async fn download_file(&self, name: &str, dest_dir: &Path) -> Result<(PathBuf, u64), ClientError> {
        validate_file_name(name)?;
        let mut resp = self
            .http
            .get(self.url("download"))
            .query(&[("filename", name)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let path = dest_dir.join(name);
        let mut file = tokio::fs::File::create(&path).await?;
        let mut size = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(file = %name, size, "whole file downloaded");
        Ok((path, size))
    }
}

impl RemoteStore for HttpStore {
    fn file_metadata<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, TransferMetadata> {
        Box::pin(async move { self.get_json("getFileMetainfo", &[("filename", name)]).await })
    }

    fn check_session<'a>(&'a self, session_id: &'a str, name: &'a str) -> RemoteFuture<'a, bool> {
        Box::pin(async move {
            let request = self
                .http
                .get(self.url("checkFileExist"))
                .query(&[("fid", session_id), ("filename", name)]);
            match self.send(request).await {
                Ok(_) => Ok(true),
                Err(TransferError::Remote { status, .. }) if (400..500).contains(&status) => Ok(false),
                Err(e) => Err(e),
            }
        })
    }

    fn missing_slices<'a>(&'a self, session_id: &'a str, name: &'a str) -> RemoteFuture<'a, MissingSlices> {
        Box::pin(async move {
            self.get_json("getUploadingStat", &[("fid", session_id), ("filename", name)])
                .await
        })
    }

    fn start_session<'a>(&'a self, metadata: &'a TransferMetadata) -> RemoteFuture<'a, ()> {
        Box::pin(self.post_json("startUploadSlice", metadata))
    }

    fn put_slice<'a>(&'a self, part: &'a SlicePart) -> RemoteFuture<'a, ()> {
        Box::pin(self.post_json("uploadBySlice", part))
    }

    fn get_slice<'a>(&'a self, name: &'a str, index: u32) -> RemoteFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let index = index.to_string();
            self.get_bytes("downloadBySlice", &[("filename", name), ("sliceIndex", index.as_str())])
                .await
        })
    }

    fn merge<'a>(&'a self, metadata: &'a TransferMetadata) -> RemoteFuture<'a, ()> {
        Box::pin(self.post_json("mergeSlice", metadata))
    }

    fn list_files(&self) -> RemoteFuture<'_, FileListing> {
        Box::pin(async move { self.get_json("listFiles", &[]).await })
    }

    fn file_info<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, FileInfo> {
        Box::pin(async move { self.get_json("getFileInfo", &[("filename", name)]).await })
    }
}
