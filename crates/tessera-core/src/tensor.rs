//! Tensor storage and residency.
//!
//! A [`Tensor`] is a dense row-major buffer described by a [`TensorLayout`].
//! Its residency follows from where the bytes live: a host `Vec<u8>` or a
//! [`DeviceMemory`] allocation owned by some accelerator backend.

use core::fmt;

use crate::error::{Error, Result};
use crate::types::{DType, Residency, Shape, TensorLayout};

/// A contiguous allocation in accelerator memory.
///
/// Copies are blocking: when a method returns, the data is in place.
pub trait DeviceMemory: Send + Sync + fmt::Debug {
    /// Size of the allocation in bytes.
    fn len(&self) -> usize;

    /// Check if the allocation is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the first `dst.len()` bytes of the allocation to host memory.
    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()>;

    /// Copy `src` into the start of the allocation.
    fn copy_from_host(&mut self, src: &[u8]) -> Result<()>;
}

/// Backing storage of a tensor.
#[derive(Debug)]
pub enum Storage {
    Host(Vec<u8>),
    Device(Box<dyn DeviceMemory>),
}

impl Storage {
    /// Residency implied by the storage variant.
    pub fn residency(&self) -> Residency {
        match self {
            Storage::Host(_) => Residency::Host,
            Storage::Device(_) => Residency::Accelerator,
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Storage::Host(bytes) => bytes.len(),
            Storage::Device(mem) => mem.len(),
        }
    }

    /// Check if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A tensor: layout plus storage.
#[derive(Debug)]
pub struct Tensor {
    layout: TensorLayout,
    storage: Storage,
}

impl Tensor {
    /// Wrap host bytes. The length must match the layout exactly.
    pub fn from_host(layout: TensorLayout, bytes: Vec<u8>) -> Result<Self> {
        layout.check_len(bytes.len())?;
        Ok(Tensor {
            layout,
            storage: Storage::Host(bytes),
        })
    }

    /// Wrap a device allocation. The length must match the layout exactly.
    pub fn from_device(layout: TensorLayout, memory: Box<dyn DeviceMemory>) -> Result<Self> {
        layout.check_len(memory.len())?;
        Ok(Tensor {
            layout,
            storage: Storage::Device(memory),
        })
    }

    /// Host tensor of f32 values.
    pub fn from_f32(shape: impl Into<Shape>, values: &[f32]) -> Result<Self> {
        let layout = TensorLayout::new(shape, DType::F32);
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Tensor::from_host(layout, bytes)
    }

    /// Zero-filled host tensor.
    pub fn zeros(layout: TensorLayout) -> Result<Self> {
        let bytes = vec![0u8; layout.checked_byte_len()?];
        Ok(Tensor {
            layout,
            storage: Storage::Host(bytes),
        })
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub fn shape(&self) -> &Shape {
        &self.layout.shape
    }

    pub fn dtype(&self) -> DType {
        self.layout.dtype
    }

    pub fn residency(&self) -> Residency {
        self.storage.residency()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.layout.numel()
    }

    /// Size in bytes.
    pub fn byte_len(&self) -> usize {
        self.layout.byte_len()
    }

    /// Host bytes, or `None` for device tensors.
    pub fn host_bytes(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Host(bytes) => Some(bytes),
            Storage::Device(_) => None,
        }
    }

    /// Mutable host bytes, or `None` for device tensors.
    pub fn host_bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.storage {
            Storage::Host(bytes) => Some(bytes),
            Storage::Device(_) => None,
        }
    }

    /// Borrow the tensor as a host view, or `None` for device tensors.
    pub fn as_host(&self) -> Option<HostTensor<'_>> {
        self.host_bytes().map(|data| HostTensor {
            layout: &self.layout,
            data,
        })
    }

    /// Decode host elements to f32.
    ///
    /// Supports F32, F16 and BF16. Device tensors must be moved to the host
    /// first.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        let bytes = self.host_bytes().ok_or_else(|| {
            Error::device_transfer("tensor is accelerator-resident; move it to host first")
        })?;
        bytes_to_f32(bytes, self.dtype())
    }
}

/// Decode little-endian bytes of a float dtype into f32 values.
pub fn bytes_to_f32(bytes: &[u8], dtype: DType) -> Result<Vec<f32>> {
    match dtype {
        DType::F32 => Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()),
        DType::F16 => Ok(bytes
            .chunks_exact(2)
            .map(|c| half::f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect()),
        DType::BF16 => Ok(bytes
            .chunks_exact(2)
            .map(|c| half::bf16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect()),
        other => Err(Error::codec(
            "tensor",
            format!("cannot convert {} elements to f32", other),
        )),
    }
}

/// Borrowed host-resident tensor handed to encoders.
#[derive(Debug, Clone, Copy)]
pub struct HostTensor<'a> {
    pub layout: &'a TensorLayout,
    pub data: &'a [u8],
}

impl<'a> HostTensor<'a> {
    /// Create a view, checking the byte length against the layout.
    pub fn new(layout: &'a TensorLayout, data: &'a [u8]) -> Result<Self> {
        layout.check_len(data.len())?;
        Ok(HostTensor { layout, data })
    }
}
