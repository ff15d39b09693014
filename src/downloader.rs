use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{DownloadRequest, SessionConfig};
use crate::connection::RangeDownloader;
use crate::error::{DownloadError, Result};
use crate::hashing::verify_sha256;
use crate::limit::SpeedLimit;
use crate::partition::{plan, Partition};
use crate::probe::{probe, ResourceInfo};
use crate::progress::{ProgressReporter, ProgressView};
use crate::sink::MessageSink;
use crate::state::ConnectionState;
use crate::transport::HttpTransport;
use crate::writer::{OutputWriter, WriteQueue};

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub url: String,
    pub output: PathBuf,
    pub total_bytes: u64,
    /// Bytes that were already on disk when the run started.
    pub resumed_from: u64,
    pub connections: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

/// Everything shared by the connections of a single run. One is created
/// per [`Downloader::run`] call, so concurrent runs never see each other.
pub struct EngineSession {
    pub config: SessionConfig,
    pub resource: ResourceInfo,
    pub transport: Arc<dyn HttpTransport>,
    pub output: OutputWriter,
    pub limit: Option<SpeedLimit>,
    failed: AtomicBool,
}

impl EngineSession {
    pub fn new(
        config: SessionConfig,
        resource: ResourceInfo,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            output: OutputWriter::new(&config.output),
            limit: config.max_speed.map(SpeedLimit::new),
            config,
            resource,
            transport,
            failed: AtomicBool::new(false),
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }
}

pub struct Downloader {
    transport: Arc<dyn HttpTransport>,
    sink: Arc<dyn MessageSink>,
}

impl Downloader {
    pub fn new(transport: Arc<dyn HttpTransport>, sink: Arc<dyn MessageSink>) -> Self {
        Self { transport, sink }
    }

    /// Downloads `request.url` into its output path. Either the whole file
    /// materializes or an error is returned; a partial file left behind can
    /// be picked up again with `resume`.
    pub async fn run(&self, request: &DownloadRequest) -> Result<DownloadResult> {
        let result = self.run_session(request).await;
        if let Err(e) = &result {
            warn!(url = %request.url, error = %e, "download failed");
            self.sink.emit(&e.to_string());
        }
        result
    }

    async fn run_session(&self, request: &DownloadRequest) -> Result<DownloadResult> {
        let config = request.validate()?;
        let started_at = Local::now();
        let started = Instant::now();
        debug!(?config, "options information");

        let resume_offset = existing_length(&config.output, config.resume).await?;
        info!(url = %config.url, resume_offset, "initializing download");

        let resource = probe(self.transport.as_ref(), &config, self.sink.as_ref()).await?;

        let partitions = match resource.total_length {
            Some(total) if resume_offset > total => {
                return Err(DownloadError::InconsistentResource {
                    expected: total,
                    found: resume_offset,
                })
            }
            Some(total) if resume_offset == total => {
                self.sink
                    .emit(&format!("{} is already complete", config.output.display()));
                Vec::new()
            }
            Some(total) => plan(resume_offset, total, config.connections),
            None if resume_offset > 0 && !resource.supports_partial_content => {
                return Err(DownloadError::ResumeUnsupported(resume_offset))
            }
            None => vec![Partition {
                index: 1,
                start: resume_offset,
                end: None,
            }],
        };

        let connections = partitions.len();
        let session = Arc::new(EngineSession::new(
            config,
            resource,
            self.transport.clone(),
        ));
        let written = self
            .fetch_partitions(&session, partitions, resume_offset, started)
            .await?;

        if let Some(expected) = &session.config.expected_sha256 {
            verify_sha256(&session.config.output, expected).await?;
        }

        let total_bytes = session
            .resource
            .total_length
            .unwrap_or(resume_offset + written);
        info!(total_bytes, written, "download finished");
        Ok(DownloadResult {
            url: session.config.url.to_string(),
            output: session.config.output.clone(),
            total_bytes,
            resumed_from: resume_offset,
            connections,
            started_at,
            finished_at: Local::now(),
        })
    }

    /// Launches one connection per partition and waits until every write has
    /// landed. The first real failure wins; connections still in flight are
    /// left to finish on their own and their writes are suppressed.
    async fn fetch_partitions(
        &self,
        session: &Arc<EngineSession>,
        partitions: Vec<Partition>,
        resume_offset: u64,
        started: Instant,
    ) -> Result<u64> {
        if partitions.is_empty() {
            return Ok(0);
        }

        let states: Vec<Arc<ConnectionState>> = partitions
            .into_iter()
            .map(|p| Arc::new(ConnectionState::new(p)))
            .collect();

        let reporter = session.config.progress.then(|| {
            ProgressReporter::spawn(
                ProgressView {
                    connections: states.clone(),
                    total: session.resource.total_length,
                    resume_offset,
                    started,
                    verbose: session.config.verbose,
                },
                self.sink.clone(),
                session.config.progress_interval,
            )
        });

        let mut queue = WriteQueue::new();
        let mut tasks = FuturesUnordered::new();
        for state in &states {
            debug!(
                connection = state.partition.index,
                partition = ?state.partition,
                "starting connection"
            );
            let downloader =
                RangeDownloader::new(session.clone(), state.clone(), queue.next_turn());
            tasks.push(tokio::spawn(downloader.run()));
        }

        let mut written = 0u64;
        let mut failure: Option<DownloadError> = None;
        let mut aborted: Option<DownloadError> = None;
        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(Ok(n)) => written += n,
                // a consequence of another connection's failure, keep looking for the cause
                Ok(Err(e @ DownloadError::Aborted(_))) => {
                    session.mark_failed();
                    aborted.get_or_insert(e);
                }
                Ok(Err(e)) => {
                    session.mark_failed();
                    failure = Some(e);
                    break;
                }
                Err(e) => {
                    session.mark_failed();
                    failure = Some(DownloadError::network(e));
                    break;
                }
            }
        }

        if let Some(reporter) = reporter {
            reporter.stop().await;
        }

        match failure.or(aborted) {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}

/// Length of the file already at `path`, or 0 if there is none. An existing
/// file is only acceptable when resuming, and never when it is not a
/// regular file.
async fn existing_length(path: &Path, resume: bool) -> Result<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() && resume => Ok(meta.len()),
        Ok(_) => Err(DownloadError::OutputAlreadyExists(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}
