//! Host/accelerator residency handling.
//!
//! Codecs only ever see host memory. The [`TransferManager`] stages device
//! tensors into a host scratch buffer before encoding and places decoded bytes
//! at the requested residency afterwards. When residency already matches,
//! nothing is copied and no counter moves.
//!
//! ```text
//!   device tensor ──dtoh──► staging (host scratch) ──► encoder
//!   decoder ──► host scratch ──htod──► device tensor
//! ```

use std::fmt;
use std::sync::Arc;

use tessera_core::{
    Accelerator, Error, Residency, Result, Storage, Tensor, TensorLayout, TransferStats,
};
use tracing::trace;

use crate::scratch::ScratchBuffer;

/// Moves tensor contents between host and accelerator memory.
pub struct TransferManager {
    accelerator: Option<Arc<dyn Accelerator>>,
    stats: TransferStats,
}

impl TransferManager {
    /// A manager with no accelerator. Any accelerator target fails with
    /// `DeviceTransfer`.
    pub fn host_only() -> Self {
        TransferManager {
            accelerator: None,
            stats: TransferStats::default(),
        }
    }

    /// A manager that allocates device memory from `accelerator`.
    pub fn with_accelerator(accelerator: Arc<dyn Accelerator>) -> Self {
        TransferManager {
            accelerator: Some(accelerator),
            stats: TransferStats::default(),
        }
    }

    pub fn has_accelerator(&self) -> bool {
        self.accelerator.is_some()
    }

    /// Name of the attached accelerator, if any.
    pub fn accelerator_name(&self) -> Option<&str> {
        self.accelerator.as_deref().map(|a| a.name())
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    fn accelerator(&self) -> Result<&Arc<dyn Accelerator>> {
        self.accelerator
            .as_ref()
            .ok_or_else(|| Error::device_transfer("no accelerator attached"))
    }

    /// Host view of `tensor`'s bytes.
    ///
    /// Host tensors are borrowed as-is. Device tensors are copied into the
    /// front of `staging`, which must be large enough.
    pub fn move_in<'a>(
        &mut self,
        tensor: &'a Tensor,
        staging: &'a mut ScratchBuffer,
    ) -> Result<&'a [u8]> {
        match tensor.storage() {
            Storage::Host(bytes) => Ok(bytes),
            Storage::Device(memory) => {
                let len = tensor.byte_len();
                let dst = staging.prefix_mut(len)?;
                memory.copy_to_host(dst)?;
                self.stats.record_to_host(len);
                trace!(bytes = len, "staged accelerator tensor on host");
                Ok(dst)
            }
        }
    }

    /// Write `host` into `out` at residency `target`.
    ///
    /// `out`'s allocation is reused when its layout and residency already
    /// match; otherwise it is replaced.
    pub fn move_out(
        &mut self,
        host: &[u8],
        layout: &TensorLayout,
        target: Residency,
        out: &mut Tensor,
    ) -> Result<()> {
        layout.check_len(host.len())?;
        let reusable = out.layout() == layout && out.residency() == target;
        if !reusable {
            *out = self.materialize(host, layout, target)?;
            return Ok(());
        }
        match out.storage_mut() {
            Storage::Host(bytes) => bytes.copy_from_slice(host),
            Storage::Device(memory) => {
                memory.copy_from_host(host)?;
                self.stats.record_to_accelerator(host.len());
                trace!(bytes = host.len(), "wrote decoded tensor to accelerator");
            }
        }
        Ok(())
    }

    /// Build a new tensor at residency `target` holding `host`.
    pub fn materialize(
        &mut self,
        host: &[u8],
        layout: &TensorLayout,
        target: Residency,
    ) -> Result<Tensor> {
        match target {
            Residency::Host => Tensor::from_host(layout.clone(), host.to_vec()),
            Residency::Accelerator => {
                let mut memory = self.accelerator()?.allocate(host.len())?;
                memory.copy_from_host(host)?;
                self.stats.record_to_accelerator(host.len());
                trace!(bytes = host.len(), "allocated accelerator tensor");
                Tensor::from_device(layout.clone(), memory)
            }
        }
    }

    /// Copy `tensor` to residency `target`.
    ///
    /// Always returns a new tensor, even when residency already matches.
    pub fn convert(&mut self, tensor: &Tensor, target: Residency) -> Result<Tensor> {
        match tensor.storage() {
            Storage::Host(bytes) => self.materialize(bytes, tensor.layout(), target),
            Storage::Device(memory) => {
                let mut host = vec![0u8; tensor.byte_len()];
                memory.copy_to_host(&mut host)?;
                self.stats.record_to_host(host.len());
                match target {
                    Residency::Host => Tensor::from_host(tensor.layout().clone(), host),
                    Residency::Accelerator => self.materialize(&host, tensor.layout(), target),
                }
            }
        }
    }
}

impl Default for TransferManager {
    fn default() -> Self {
        Self::host_only()
    }
}

impl fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferManager")
            .field("accelerator", &self.accelerator_name())
            .field("stats", &self.stats)
            .finish()
    }
}
