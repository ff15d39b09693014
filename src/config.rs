use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{DownloadError, Result};
use crate::range::parse_header_arg;
use crate::utils::{get_filename_from_url, sanitize_filename};

pub const DEFAULT_CONNECTIONS: usize = 2;
pub const MAX_CONNECTIONS: usize = 50;
pub const MAX_REDIRECTS: usize = 5;
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// What the caller asks for. Nothing here is validated until
/// [`DownloadRequest::validate`] runs at the start of a download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output: Option<PathBuf>,
    pub connections: usize,
    /// Raw `Name:Value` strings as given on the command line.
    pub headers: Vec<String>,
    pub resume: bool,
    pub max_redirects: usize,
    pub progress: bool,
    /// Adds partition bounds and byte counters to every progress row.
    pub verbose: bool,
    pub progress_interval: Duration,
    /// Global cap in bytes per second, shared by every connection.
    pub max_speed: Option<u32>,
    pub expected_sha256: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output: None,
            connections: DEFAULT_CONNECTIONS,
            headers: Vec::new(),
            resume: false,
            max_redirects: MAX_REDIRECTS,
            progress: false,
            verbose: false,
            progress_interval: PROGRESS_INTERVAL,
            max_speed: None,
            expected_sha256: None,
        }
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn connections(mut self, n: usize) -> Self {
        self.connections = n;
        self
    }

    pub fn header(mut self, raw: impl Into<String>) -> Self {
        self.headers.push(raw.into());
        self
    }

    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn max_redirects(mut self, n: usize) -> Self {
        self.max_redirects = n;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_speed(mut self, bytes_per_sec: Option<u32>) -> Self {
        self.max_speed = bytes_per_sec;
        self
    }

    pub fn expected_sha256(mut self, hash: Option<String>) -> Self {
        self.expected_sha256 = hash;
        self
    }

    /// Checks everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<SessionConfig> {
        let url = parse_url(&self.url)?;

        let mut headers = Vec::with_capacity(self.headers.len());
        for raw in &self.headers {
            let (name, value) = parse_header_arg(raw)?;
            // the engine owns the Range header
            if name.eq_ignore_ascii_case("range") {
                continue;
            }
            headers.push((name, value));
        }

        let output = match &self.output {
            Some(path) => path.clone(),
            None => PathBuf::from(".").join(sanitize_filename(&get_filename_from_url(&url))),
        };

        Ok(SessionConfig {
            url,
            output,
            connections: self.connections.clamp(1, MAX_CONNECTIONS),
            headers,
            resume: self.resume,
            max_redirects: self.max_redirects,
            progress: self.progress,
            verbose: self.verbose,
            progress_interval: self.progress_interval,
            max_speed: self.max_speed.and_then(NonZeroU32::new),
            expected_sha256: self
                .expected_sha256
                .as_ref()
                .map(|h| h.trim().to_ascii_lowercase()),
        })
    }
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: Url,
    pub output: PathBuf,
    pub connections: usize,
    pub headers: Vec<(String, String)>,
    pub resume: bool,
    pub max_redirects: usize,
    pub progress: bool,
    pub verbose: bool,
    pub progress_interval: Duration,
    pub max_speed: Option<NonZeroU32>,
    pub expected_sha256: Option<String>,
}

pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|_| DownloadError::InvalidUrl(raw.to_string()))?;
    check_scheme(&url)?;
    Ok(url)
}

pub(crate) fn check_scheme(url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(DownloadError::UnsupportedProtocol(other.to_string())),
    }
}
