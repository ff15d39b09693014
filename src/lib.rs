//! Segmented HTTP/HTTPS downloader.
//!
//! A resource is probed for its length, split into byte ranges, fetched over
//! several connections at once and appended to one output file in range
//! order. See [`Downloader::run`].

pub mod config;
pub mod connection;
pub mod downloader;
pub mod error;
pub mod hashing;
pub mod limit;
pub mod partition;
pub mod probe;
pub mod progress;
pub mod range;
pub mod sink;
pub mod state;
pub mod transport;
pub mod utils;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{DownloadRequest, SessionConfig, DEFAULT_CONNECTIONS, MAX_CONNECTIONS};
pub use downloader::{DownloadResult, Downloader};
pub use error::{DownloadError, Result};
pub use probe::ResourceInfo;
pub use sink::{MessageSink, NullSink, TerminalSink};
pub use transport::{HttpTransport, ReqwestTransport};
