//! Scriptable transport and sink used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;

use crate::error::{DownloadError, Result};
use crate::range::parse_range;
use crate::sink::MessageSink;
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};

const CHUNK: usize = 16;

/// A body where every position is distinguishable from its neighbours.
pub(crate) fn marked_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Serves one in-memory resource. Honors `Range` like a well behaved
/// server unless told otherwise.
pub(crate) struct MockTransport {
    body: Bytes,
    honor_ranges: bool,
    redirects: Mutex<VecDeque<String>>,
    redirect_content_range: Option<String>,
    delays: HashMap<String, Duration>,
    statuses: HashMap<String, (u16, String)>,
    truncate: usize,
    fail_at: Option<u64>,
    log: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub(crate) fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            honor_ranges: true,
            redirects: Mutex::new(VecDeque::new()),
            redirect_content_range: None,
            delays: HashMap::new(),
            statuses: HashMap::new(),
            truncate: 0,
            fail_at: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the full body and no `Content-Range`.
    pub(crate) fn without_ranges(mut self) -> Self {
        self.honor_ranges = false;
        self
    }

    /// The first requests are answered with a 302 to each location in turn.
    pub(crate) fn redirects(self, locations: &[&str]) -> Self {
        self.redirects
            .lock()
            .unwrap()
            .extend(locations.iter().map(|l| l.to_string()));
        self
    }

    pub(crate) fn redirect_content_range(mut self, value: &str) -> Self {
        self.redirect_content_range = Some(value.to_string());
        self
    }

    /// Holds back the response to a request with exactly this `Range` value.
    pub(crate) fn delay_for(mut self, range: &str, delay: Duration) -> Self {
        self.delays.insert(range.to_string(), delay);
        self
    }

    pub(crate) fn status_for(mut self, range: &str, status: u16, message: &str) -> Self {
        self.statuses
            .insert(range.to_string(), (status, message.to_string()));
        self
    }

    /// Drops the last `n` bytes of every body.
    pub(crate) fn truncate_bodies(mut self, n: usize) -> Self {
        self.truncate = n;
        self
    }

    /// Any body covering this absolute offset fails with a reset there.
    pub(crate) fn fail_stream_at(mut self, offset: u64) -> Self {
        self.fail_at = Some(offset);
        self
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    fn empty(status: u16, message: &str, headers: Vec<(String, String)>) -> TransportResponse {
        TransportResponse {
            status,
            status_message: message.to_string(),
            headers,
            body: stream::empty().boxed(),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.log.lock().unwrap().push(request.clone());
        let range = request.header_value("range").map(str::to_string);

        if let Some(delay) = range.as_ref().and_then(|r| self.delays.get(r)) {
            tokio::time::sleep(*delay).await;
        }

        let location = self.redirects.lock().unwrap().pop_front();
        if let Some(location) = location {
            let mut headers = vec![("Location".to_string(), location)];
            if let Some(cr) = &self.redirect_content_range {
                headers.push(("Content-Range".to_string(), cr.clone()));
            }
            return Ok(Self::empty(302, "Found", headers));
        }

        if let Some((status, message)) = range.as_ref().and_then(|r| self.statuses.get(r)) {
            return Ok(Self::empty(*status, message, Vec::new()));
        }

        let len = self.body.len() as u64;
        let requested = match (&range, self.honor_ranges) {
            (Some(value), true) => Some(parse_range(value)?),
            _ => None,
        };
        let (status, message, start, end) = match requested {
            Some(r) if r.start >= len => {
                return Ok(Self::empty(
                    416,
                    "Range Not Satisfiable",
                    vec![("Content-Range".to_string(), format!("bytes */{}", len))],
                ))
            }
            Some(r) => (
                206,
                "Partial Content",
                r.start,
                r.end.unwrap_or(len - 1).min(len - 1) + 1,
            ),
            None => (200, "OK", 0, len),
        };

        let mut headers = vec![("Content-Length".to_string(), (end - start).to_string())];
        if status == 206 {
            headers.push((
                "Content-Range".to_string(),
                format!("bytes {}-{}/{}", start, end - 1, len),
            ));
        }

        let served_end = end.saturating_sub(self.truncate as u64).max(start);
        let mut items: Vec<Result<Bytes>> = Vec::new();
        let fail_here = self.fail_at.filter(|at| (start..end).contains(at));
        let data_end = fail_here.unwrap_or(served_end).min(served_end);
        let data = self.body.slice(start as usize..data_end as usize);
        let mut pos = 0;
        while pos < data.len() {
            let next = (pos + CHUNK).min(data.len());
            items.push(Ok(data.slice(pos..next)));
            pos = next;
        }
        if fail_here.is_some() {
            items.push(Err(DownloadError::NetworkError(
                "connection reset by peer".to_string(),
            )));
        }

        Ok(TransportResponse {
            status,
            status_message: message.to_string(),
            headers,
            body: stream::iter(items).boxed(),
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    lines: Mutex<Vec<String>>,
    frames: Mutex<Vec<String>>,
    finished: AtomicBool,
}

impl RecordingSink {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub(crate) fn progress_frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub(crate) fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl MessageSink for RecordingSink {
    fn emit(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn progress(&self, block: &str) {
        self.frames.lock().unwrap().push(block.to_string());
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}
