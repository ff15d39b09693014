//! Periodic progress rendering.
//!
//! The reporter only reads [`ConnectionState`] counters; it never blocks a
//! connection and is stopped by the coordinator once the run resolves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::HumanBytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::sink::MessageSink;
use crate::state::{ConnectionState, ConnectionStatus};
use crate::utils::format_elapsed;

const BAR_WIDTH: usize = 40;

/// Everything the reporter needs to draw one frame.
#[derive(Clone)]
pub struct ProgressView {
    pub connections: Vec<Arc<ConnectionState>>,
    pub total: Option<u64>,
    pub resume_offset: u64,
    pub started: Instant,
    pub verbose: bool,
}

impl ProgressView {
    /// Bytes on disk or in flight, including the resumed prefix.
    pub fn downloaded(&self) -> u64 {
        self.resume_offset
            + self
                .connections
                .iter()
                .map(|c| c.bytes_received())
                .sum::<u64>()
    }

    pub fn render(&self, elapsed: Duration, bytes_per_sec: f64) -> String {
        let mut lines = Vec::with_capacity(self.connections.len() + 1);

        let downloaded = self.downloaded();
        let percent = match self.total {
            Some(0) => "100.00%".to_string(),
            Some(total) => format!("{:.2}%", downloaded as f64 / total as f64 * 100.0),
            None => "--".to_string(),
        };
        let size = match self.total {
            Some(total) => format!("{} / {}", HumanBytes(downloaded), HumanBytes(total)),
            None => format!("{}", HumanBytes(downloaded)),
        };
        lines.push(format!(
            "progress {} | {} | time used {} | {}/s",
            percent,
            size,
            format_elapsed(elapsed),
            HumanBytes(bytes_per_sec as u64)
        ));

        for conn in &self.connections {
            lines.push(render_connection(conn, self.verbose));
        }
        lines.join("\n")
    }
}

fn render_connection(conn: &ConnectionState, verbose: bool) -> String {
    let received = conn.bytes_received();
    let fraction = match conn.expected_length() {
        Some(0) => 1.0,
        Some(len) => (received as f64 / len as f64).min(1.0),
        None if conn.status() == ConnectionStatus::Done => 1.0,
        None => 0.0,
    };
    let filled = (fraction * BAR_WIDTH as f64).round() as usize;
    let id = conn.partition.index;
    let status = match conn.status() {
        ConnectionStatus::Opened => " opened",
        ConnectionStatus::InProgress => "",
        ConnectionStatus::Done => " done",
        ConnectionStatus::Error => " error",
    };
    let mut row = format!(
        "connection({}){}[{}{}] ({:.2}%)",
        id,
        if id >= 10 { " " } else { "  " },
        ">".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        fraction * 100.0,
    );
    if verbose {
        let end = conn
            .partition
            .end
            .map_or_else(|| "?".to_string(), |e| e.to_string());
        let total = conn
            .expected_length()
            .map_or_else(|| "?".to_string(), |t| t.to_string());
        row.push_str(&format!(
            " (start={},end={},total={},current={})",
            conn.partition.start, end, total, received
        ));
    }
    row.push_str(status);
    row
}

pub struct ProgressReporter {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(view: ProgressView, sink: Arc<dyn MessageSink>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_bytes = view.downloaded();
            let mut last_tick = Instant::now();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let bytes = view.downloaded();
                        let secs = now.duration_since(last_tick).as_secs_f64();
                        let speed = if secs > 0.0 {
                            bytes.saturating_sub(last_bytes) as f64 / secs
                        } else {
                            0.0
                        };
                        last_bytes = bytes;
                        last_tick = now;
                        sink.progress(&view.render(view.started.elapsed(), speed));
                    }
                }
            }
            let elapsed = view.started.elapsed();
            let average = if elapsed.as_secs_f64() > 0.0 {
                (view.downloaded() - view.resume_offset) as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            };
            sink.progress(&view.render(elapsed, average));
            sink.finish();
        });
        Self { cancel, handle }
    }

    /// Stops the timer and waits for the final frame to be drawn.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Partition;
    use crate::test_utils::RecordingSink;

    fn view() -> ProgressView {
        let a = Arc::new(ConnectionState::new(Partition {
            index: 1,
            start: 0,
            end: Some(99),
        }));
        let b = Arc::new(ConnectionState::new(Partition {
            index: 2,
            start: 100,
            end: Some(199),
        }));
        a.set_status(ConnectionStatus::Done);
        a.add_received(100);
        b.set_status(ConnectionStatus::InProgress);
        b.add_received(50);
        ProgressView {
            connections: vec![a, b],
            total: Some(200),
            resume_offset: 0,
            started: Instant::now(),
            verbose: false,
        }
    }

    #[test]
    fn renders_aggregate_and_connection_lines() {
        let block = view().render(Duration::from_secs(61), 2048.0);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("progress 75.00%"), "{}", lines[0]);
        assert!(lines[0].contains("time used 1m1s"));
        assert!(lines[0].contains("2.00 KiB/s"));
        assert!(lines[1].starts_with("connection(1)  ["));
        assert!(lines[1].contains(&">".repeat(BAR_WIDTH)));
        assert!(lines[1].ends_with("(100.00%) done"));
        assert!(lines[2].contains("(50.00%)"));
    }

    #[test]
    fn verbose_rows_show_bounds_and_counters() {
        let mut v = view();
        v.verbose = true;
        let block = v.render(Duration::from_secs(1), 0.0);
        let lines: Vec<&str> = block.lines().collect();
        assert!(
            lines[1].ends_with("(100.00%) (start=0,end=99,total=100,current=100) done"),
            "{}",
            lines[1]
        );
        assert!(
            lines[2].ends_with("(50.00%) (start=100,end=199,total=100,current=50)"),
            "{}",
            lines[2]
        );
    }

    #[test]
    fn quiet_rows_have_no_counters() {
        let block = view().render(Duration::from_secs(1), 0.0);
        assert!(!block.contains("start="));
    }

    #[test]
    fn unknown_total_has_no_percentage() {
        let mut v = view();
        v.total = None;
        let block = v.render(Duration::from_secs(1), 0.0);
        assert!(block.starts_with("progress -- |"));
    }

    #[tokio::test]
    async fn stop_draws_a_final_frame() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::spawn(view(), sink.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        reporter.stop().await;

        let frames = sink.progress_frames();
        assert!(frames.len() >= 2);
        assert!(frames.last().unwrap().starts_with("progress 75.00%"));
        assert!(sink.finished());
    }
}
