use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("output file {0:?} already exists")]
    OutputAlreadyExists(PathBuf),
    #[error("only http and https are supported, got '{0}'")]
    UnsupportedProtocol(String),
    #[error("header format error: '{0}' (expected Name:Value)")]
    BadHeaderFormat(String),
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error("resource not found (status code = {status}, status message = {message})")]
    NotFound { status: u16, message: String },
    #[error("status code = {status}, status message = {message}, download failed")]
    ServerError { status: u16, message: String },
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),
    #[error("an error occurred: {0}")]
    NetworkError(String),
    #[error("connection ({connection}): status code = {status}, status message = {message}, download failed")]
    RangeFetchError {
        connection: usize,
        status: u16,
        message: String,
    },
    #[error("connection ({connection}): expected {expected} bytes, received {received}")]
    IncompletePartition {
        connection: usize,
        expected: u64,
        received: u64,
    },
    #[error("malformed {name} header: '{value}'")]
    MalformedHeader { name: &'static str, value: String },
    #[error("resource length changed: expected {expected} bytes, found {found}")]
    InconsistentResource { expected: u64, found: u64 },
    #[error("server does not support partial content, cannot resume from byte {0}")]
    ResumeUnsupported(u64),
    #[error("hash mismatch: expected {expected}, got {computed}")]
    ChecksumMismatch { expected: String, computed: String },
    #[error("file IO operation failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection ({0}) abandoned after an earlier connection failed")]
    Aborted(usize),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    pub(crate) fn network(err: impl std::fmt::Display) -> Self {
        Self::NetworkError(err.to_string())
    }
}
