//! The output file and the queue that orders writes into it.
//!
//! The file is only ever appended to, so partitions must land in index
//! order. Each partition takes a [`WriteTurn`] from the [`WriteQueue`] up
//! front; a turn can only be acquired once the previous turn's slot has
//! been released. Dropping a slot without releasing it breaks the chain and
//! every later turn resolves to [`DownloadError::Aborted`].

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;

use crate::error::{DownloadError, Result};

#[derive(Debug, Clone)]
pub struct OutputWriter {
    path: PathBuf,
}

impl OutputWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file in append mode, writes every chunk and closes it again.
    /// The handle never outlives the call.
    pub async fn append(&self, chunks: &[Bytes]) -> Result<u64> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut written = 0u64;
        for chunk in chunks {
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

pub struct WriteQueue {
    next_index: usize,
    previous: Option<oneshot::Receiver<()>>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            next_index: 1,
            previous: None,
        }
    }

    pub fn next_turn(&mut self) -> WriteTurn {
        let (done, released) = oneshot::channel();
        let turn = WriteTurn {
            index: self.next_index,
            wait: self.previous.replace(released),
            done,
        };
        self.next_index += 1;
        turn
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WriteTurn {
    index: usize,
    wait: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

impl WriteTurn {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Waits until every earlier turn has released its slot.
    pub async fn acquire(self) -> Result<WriteSlot> {
        if let Some(wait) = self.wait {
            wait.await.map_err(|_| DownloadError::Aborted(self.index))?;
        }
        Ok(WriteSlot { done: self.done })
    }
}

/// Exclusive right to append. Release after a successful write.
pub struct WriteSlot {
    done: oneshot::Sender<()>,
}

impl WriteSlot {
    pub fn release(self) {
        let _ = self.done.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn append_creates_and_extends() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path().join("out.bin"));

        writer.append(&[Bytes::from_static(b"abc")]).await.unwrap();
        let n = writer
            .append(&[Bytes::from_static(b"de"), Bytes::from_static(b"f")])
            .await
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(std::fs::read(writer.path()).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn turns_acquire_in_queue_order() {
        let mut queue = WriteQueue::new();
        let turns: Vec<WriteTurn> = (0..4).map(|_| queue.next_turn()).collect();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        // later turns get going first
        for (i, turn) in turns.into_iter().enumerate().rev() {
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis((4 - i as u64) * 5)).await;
                let index = turn.index();
                let slot = turn.acquire().await.unwrap();
                order.lock().unwrap().push(index);
                slot.release();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn dropped_slot_aborts_later_turns() {
        let mut queue = WriteQueue::new();
        let first = queue.next_turn();
        let second = queue.next_turn();
        let third = queue.next_turn();

        drop(first.acquire().await.unwrap());
        assert!(matches!(second.acquire().await, Err(DownloadError::Aborted(2))));
        assert!(matches!(third.acquire().await, Err(DownloadError::Aborted(3))));
    }
}
