use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::downloader::EngineSession;
use crate::error::{DownloadError, Result};
use crate::range::{parse_content_range, ByteRange};
use crate::state::{ConnectionState, ConnectionStatus};
use crate::transport::TransportRequest;
use crate::writer::WriteTurn;

/// Drives one connection: fetch the partition into memory, then append it
/// to the output once every earlier partition has been written.
pub struct RangeDownloader {
    session: Arc<EngineSession>,
    state: Arc<ConnectionState>,
    turn: WriteTurn,
}

impl RangeDownloader {
    pub fn new(session: Arc<EngineSession>, state: Arc<ConnectionState>, turn: WriteTurn) -> Self {
        Self {
            session,
            state,
            turn,
        }
    }

    /// Resolves with the number of bytes appended to the output. Any failure
    /// other than being abandoned marks the whole session failed right away,
    /// so no later partition gets to write.
    pub async fn run(self) -> Result<u64> {
        let session = self.session.clone();
        let result = self.fetch_and_write().await;
        if let Err(e) = &result {
            if !matches!(e, DownloadError::Aborted(_)) {
                session.mark_failed();
            }
        }
        result
    }

    async fn fetch_and_write(self) -> Result<u64> {
        let id = self.state.partition.index;
        let chunks = match self.fetch().await {
            Ok(chunks) => chunks,
            Err(e) => {
                self.state.set_status(ConnectionStatus::Error);
                warn!(connection = id, error = %e, "connection failed");
                return Err(e);
            }
        };

        let slot = self.turn.acquire().await?;
        if self.session.has_failed() {
            debug!(connection = id, "run already failed, discarding buffered data");
            return Err(DownloadError::Aborted(id));
        }
        let written = self.session.output.append(&chunks).await?;
        slot.release();
        debug!(
            connection = id,
            written,
            "connection ({}): data has been written to file {:?}",
            id,
            self.session.output.path()
        );
        Ok(written)
    }

    async fn fetch(&self) -> Result<Vec<Bytes>> {
        let partition = self.state.partition;
        let id = partition.index;

        let mut request = TransportRequest::get(self.session.resource.final_url.clone());
        for (name, value) in &self.session.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if partition.start > 0 || partition.end.is_some() {
            let range = ByteRange {
                start: partition.start,
                end: partition.end,
            };
            request = request.header("Range", range.to_header());
        }
        debug!(connection = id, headers = ?request.headers, "request ({}) information", id);

        let response = self.session.transport.request(request).await?;
        debug!(
            connection = id,
            status = response.status,
            message = %response.status_message,
            headers = ?response.headers,
            "response ({}) information",
            id
        );
        if !(200..300).contains(&response.status) {
            return Err(DownloadError::RangeFetchError {
                connection: id,
                status: response.status,
                message: response.status_message,
            });
        }

        if let (Some(value), Some(expected)) = (
            response.header("content-range"),
            self.session.resource.total_length,
        ) {
            if let Some(found) = parse_content_range(value)?.total {
                if found != expected {
                    return Err(DownloadError::InconsistentResource { expected, found });
                }
            }
        }

        self.state.set_declared_length(
            response
                .header("content-length")
                .and_then(|v| v.trim().parse().ok()),
        );
        self.state.set_status(ConnectionStatus::InProgress);

        let mut chunks = Vec::new();
        let mut received = 0u64;
        let mut body = response.body;
        while let Some(item) = body.next().await {
            let chunk = item?;
            if chunk.is_empty() {
                continue;
            }
            if let Some(limit) = &self.session.limit {
                limit.consume(chunk.len()).await;
            }
            received += chunk.len() as u64;
            self.state.add_received(chunk.len() as u64);
            chunks.push(chunk);
        }

        if let Some(expected) = partition.len() {
            if received != expected {
                return Err(DownloadError::IncompletePartition {
                    connection: id,
                    expected,
                    received,
                });
            }
        }

        self.state.set_status(ConnectionStatus::Done);
        Ok(chunks)
    }
}
