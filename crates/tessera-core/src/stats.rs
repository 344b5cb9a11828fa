//! Statistics for compression layer calls.

/// Append-only record of payload sizes, one entry per successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeLog {
    sizes: Vec<usize>,
}

impl SizeLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one payload size.
    pub fn record(&mut self, size: usize) {
        self.sizes.push(size);
    }

    /// All recorded sizes, oldest first.
    pub fn as_slice(&self) -> &[usize] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<usize> {
        self.sizes.last().copied()
    }

    /// Sum of all recorded sizes.
    pub fn total_bytes(&self) -> u64 {
        self.sizes.iter().map(|&s| s as u64).sum()
    }

    /// Mean payload size, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.sizes.is_empty() {
            return 0.0;
        }
        self.total_bytes() as f64 / self.sizes.len() as f64
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.sizes.clear();
    }

    /// Get log summary as string.
    pub fn summary(&self) -> String {
        format!(
            "Calls: {}, Total: {} bytes, Mean: {:.1} bytes",
            self.len(),
            self.total_bytes(),
            self.mean()
        )
    }
}

/// Counters for host/accelerator copies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Accelerator → host copies.
    pub to_host: u64,
    /// Host → accelerator copies.
    pub to_accelerator: u64,
    /// Bytes copied accelerator → host.
    pub bytes_to_host: u64,
    /// Bytes copied host → accelerator.
    pub bytes_to_accelerator: u64,
}

impl TransferStats {
    /// Total number of copies in either direction.
    pub fn total_transfers(&self) -> u64 {
        self.to_host + self.to_accelerator
    }

    /// Record an accelerator → host copy.
    pub fn record_to_host(&mut self, bytes: usize) {
        self.to_host += 1;
        self.bytes_to_host += bytes as u64;
    }

    /// Record a host → accelerator copy.
    pub fn record_to_accelerator(&mut self, bytes: usize) {
        self.to_accelerator += 1;
        self.bytes_to_accelerator += bytes as u64;
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
