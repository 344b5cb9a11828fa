//! Host-backed accelerator for CPU-only runs and tests.
//!
//! [`SimulatedAccelerator`] keeps "device" allocations in memory that is
//! separate from any host tensor, so every residency change is a real copy
//! and shows up in the transfer counters exactly as it would on a GPU.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tessera_core::{Accelerator, DeviceMemory, Error, Result};

#[derive(Debug, Default)]
struct Shared {
    allocated: AtomicUsize,
    live_allocations: AtomicUsize,
    fail_copies: AtomicBool,
}

/// An accelerator whose memory lives on the host.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAccelerator {
    shared: Arc<Shared>,
}

impl SimulatedAccelerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent copy on memory from this accelerator fail.
    ///
    /// Allocations made before the call are affected too.
    pub fn fail_copies(&self, fail: bool) {
        self.shared.fail_copies.store(fail, Ordering::SeqCst);
    }

    /// Bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.shared.allocated.load(Ordering::SeqCst)
    }

    /// Number of live allocations.
    pub fn live_allocations(&self) -> usize {
        self.shared.live_allocations.load(Ordering::SeqCst)
    }
}

impl Accelerator for SimulatedAccelerator {
    fn name(&self) -> &str {
        "simulated"
    }

    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceMemory>> {
        self.shared.allocated.fetch_add(len, Ordering::SeqCst);
        self.shared.live_allocations.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedMemory {
            data: vec![0u8; len],
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// An allocation owned by a [`SimulatedAccelerator`].
#[derive(Debug)]
pub struct SimulatedMemory {
    data: Vec<u8>,
    shared: Arc<Shared>,
}

impl SimulatedMemory {
    fn check(&self, requested: usize) -> Result<()> {
        if self.shared.fail_copies.load(Ordering::SeqCst) {
            return Err(Error::device_transfer("simulated copy failure"));
        }
        if requested > self.data.len() {
            return Err(Error::device_transfer(format!(
                "copy of {} bytes exceeds {}-byte allocation",
                requested,
                self.data.len()
            )));
        }
        Ok(())
    }
}

impl DeviceMemory for SimulatedMemory {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        self.check(dst.len())?;
        dst.copy_from_slice(&self.data[..dst.len()]);
        Ok(())
    }

    fn copy_from_host(&mut self, src: &[u8]) -> Result<()> {
        self.check(src.len())?;
        self.data[..src.len()].copy_from_slice(src);
        Ok(())
    }
}

impl Drop for SimulatedMemory {
    fn drop(&mut self) {
        self.shared
            .allocated
            .fetch_sub(self.data.len(), Ordering::SeqCst);
        self.shared.live_allocations.fetch_sub(1, Ordering::SeqCst);
    }
}
