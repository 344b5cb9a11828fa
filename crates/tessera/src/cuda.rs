//! CUDA accelerator backed by `cudarc`.
//!
//! Copies are synchronous (`htod_sync_copy_into` / `dtoh_sync_copy_into`), so
//! the layer's stage boundaries are also device synchronization points.

use std::fmt;
use std::sync::Arc;

use cudarc::driver::{CudaDevice, CudaSlice, DriverError};
use tessera_core::{Accelerator, DeviceMemory, Error, Result};
use tracing::info;

fn driver_error(e: DriverError) -> Error {
    Error::device_transfer(format!("CUDA driver error: {}", e))
}

/// A CUDA device.
#[derive(Clone)]
pub struct CudaAccelerator {
    device: Arc<CudaDevice>,
    name: String,
}

impl CudaAccelerator {
    /// Open device `ordinal`.
    pub fn new(ordinal: usize) -> Result<Self> {
        let device = CudaDevice::new(ordinal).map_err(driver_error)?;
        let name = format!("cuda:{}", ordinal);
        info!(ordinal, "opened CUDA device");
        Ok(CudaAccelerator { device, name })
    }

    /// Check if a CUDA device is usable.
    pub fn is_available() -> bool {
        CudaDevice::new(0).is_ok()
    }

    pub fn device(&self) -> &Arc<CudaDevice> {
        &self.device
    }
}

impl fmt::Debug for CudaAccelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaAccelerator")
            .field("name", &self.name)
            .finish()
    }
}

impl Accelerator for CudaAccelerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceMemory>> {
        let data = self.device.alloc_zeros::<u8>(len).map_err(driver_error)?;
        Ok(Box::new(CudaMemory {
            device: Arc::clone(&self.device),
            data,
        }))
    }

    fn synchronize(&self) -> Result<()> {
        self.device.synchronize().map_err(driver_error)
    }
}

/// A device allocation.
pub struct CudaMemory {
    device: Arc<CudaDevice>,
    data: CudaSlice<u8>,
}

// SAFETY: the allocation is only touched through `&self`/`&mut self` methods
// that issue synchronous copies on the owning device's default stream.
unsafe impl Send for CudaMemory {}

// SAFETY: shared access only performs device-to-host reads.
unsafe impl Sync for CudaMemory {}

impl fmt::Debug for CudaMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaMemory")
            .field("len", &self.data.len())
            .finish()
    }
}

impl DeviceMemory for CudaMemory {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.data.len() {
            return Err(Error::device_transfer(format!(
                "copy of {} bytes exceeds {}-byte allocation",
                dst.len(),
                self.data.len()
            )));
        }
        let src = self.data.slice(0..dst.len());
        self.device
            .dtoh_sync_copy_into(&src, dst)
            .map_err(driver_error)
    }

    fn copy_from_host(&mut self, src: &[u8]) -> Result<()> {
        if src.len() > self.data.len() {
            return Err(Error::device_transfer(format!(
                "copy of {} bytes exceeds {}-byte allocation",
                src.len(),
                self.data.len()
            )));
        }
        let mut dst = self.data.slice_mut(0..src.len());
        self.device
            .htod_sync_copy_into(src, &mut dst)
            .map_err(driver_error)
    }
}
