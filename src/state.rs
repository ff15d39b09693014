use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};

use crate::partition::Partition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Opened,
    InProgress,
    Done,
    Error,
}

impl ConnectionStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::InProgress,
            2 => Self::Done,
            3 => Self::Error,
            _ => Self::Opened,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Opened => 0,
            Self::InProgress => 1,
            Self::Done => 2,
            Self::Error => 3,
        }
    }
}

/// Live counters for one connection. Only the owning `RangeDownloader`
/// writes; the progress reporter and coordinator only read.
#[derive(Debug)]
pub struct ConnectionState {
    pub partition: Partition,
    status: AtomicU8,
    bytes_received: AtomicU64,
    declared_length: AtomicI64,
}

impl ConnectionState {
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            status: AtomicU8::new(ConnectionStatus::Opened.as_u8()),
            bytes_received: AtomicU64::new(0),
            declared_length: AtomicI64::new(-1),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn add_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    /// The response's `Content-Length`, if it sent one.
    pub fn declared_length(&self) -> Option<u64> {
        u64::try_from(self.declared_length.load(Ordering::Relaxed)).ok()
    }

    pub fn set_declared_length(&self, len: Option<u64>) {
        let raw = len.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1);
        self.declared_length.store(raw, Ordering::Relaxed);
    }

    /// Bytes this connection is expected to deliver, from the partition
    /// bounds or failing that the declared length.
    pub fn expected_length(&self) -> Option<u64> {
        self.partition.len().or_else(|| self.declared_length())
    }
}
