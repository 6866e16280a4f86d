//! Client for the slicebox file store.
//!
//! [`HttpStore`] binds the store's HTTP API to
//! [`slicebox_transfer::RemoteStore`]; [`FileClient`] picks between a
//! single-request transfer for small files and a resumable sliced session
//! for everything else.

pub mod client;
pub mod config;
pub mod http;

#[cfg(test)]
mod test_server;

pub use client::{DownloadReport, FileClient, UploadReport};
pub use config::ClientConfig;
pub use http::HttpStore;

use slicebox_transfer::TransferError;

/// Errors produced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unknown file type for {0}")]
    UnknownFileKind(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
