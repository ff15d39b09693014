/// A contiguous byte range of the resource owned by one connection.
/// `index` is 1-based and fixes the order in which partitions hit the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub index: usize,
    pub start: u64,
    /// Inclusive. `None` when the resource length is unknown.
    pub end: Option<u64>,
}

impl Partition {
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start + 1)
    }
}

/// Splits `[offset, total - 1]` into `connections` partitions. Every partition
/// but the last gets `floor(remaining / connections)` bytes; the last takes
/// the rest. Fewer bytes than connections collapses to one partition.
pub fn plan(offset: u64, total: u64, connections: usize) -> Vec<Partition> {
    if offset >= total {
        return Vec::new();
    }
    let remaining = total - offset;
    let connections = if connections as u64 > remaining {
        1
    } else {
        connections.max(1)
    };

    let average = remaining / connections as u64;
    let mut partitions = Vec::with_capacity(connections);
    let mut start = offset;
    for index in 1..connections {
        let end = start + average - 1;
        partitions.push(Partition {
            index,
            start,
            end: Some(end),
        });
        start = end + 1;
    }
    partitions.push(Partition {
        index: connections,
        start,
        end: Some(total - 1),
    });
    partitions
}
