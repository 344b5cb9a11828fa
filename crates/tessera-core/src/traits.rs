//! Core traits for codecs and accelerator backends.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! TensorEncoder / TensorDecoder   (codec capability, write into caller buffers)
//!       ↓
//! CodecRegistry factories        (construct from name + CodecConfig)
//!
//! Accelerator → DeviceMemory      (residency backends)
//! ```

use crate::error::Result;
use crate::tensor::{DeviceMemory, HostTensor};
use crate::types::TensorLayout;

/// Encoding half of a codec.
///
/// Implementations are immutable after construction. `encode` must never
/// write past `output.len()`: when the payload does not fit it returns
/// [`Error::BufferOverflow`](crate::Error::BufferOverflow) instead.
pub trait TensorEncoder: Send {
    /// Registered codec name.
    fn name(&self) -> &'static str;

    /// Encode a host tensor into existing buffer.
    ///
    /// # Arguments
    /// * `input` - Host-resident tensor to encode
    /// * `output` - Buffer to write the payload
    ///
    /// # Returns
    /// Number of bytes written to output.
    fn encode(&self, input: HostTensor<'_>, output: &mut [u8]) -> Result<usize>;

    /// Upper bound on the payload size for `layout`.
    /// Useful for sizing scratch buffers.
    fn max_encoded_size(&self, layout: &TensorLayout) -> usize;

    /// Whether decode(encode(x)) reproduces x bit-exactly.
    fn is_lossless(&self) -> bool {
        false
    }
}

/// Decoding half of a codec.
pub trait TensorDecoder: Send {
    /// Registered codec name.
    fn name(&self) -> &'static str;

    /// Decode a payload into existing buffer.
    ///
    /// # Arguments
    /// * `input` - Payload bytes produced by the matching encoder
    /// * `layout` - Layout of the tensor being reconstructed
    /// * `output` - Buffer for the reconstructed tensor bytes
    ///
    /// # Returns
    /// Number of bytes written to output.
    fn decode(&self, input: &[u8], layout: &TensorLayout, output: &mut [u8]) -> Result<usize>;

    /// Whether decoding the matching encoder's payload reproduces the
    /// original bit-exactly.
    fn is_lossless(&self) -> bool {
        false
    }
}

/// An accelerator that can hold tensor memory.
pub trait Accelerator: Send + Sync {
    /// Human readable backend name.
    fn name(&self) -> &str;

    /// Allocate `len` bytes of device memory.
    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceMemory>>;

    /// Block until all outstanding device work has finished.
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: TensorEncoder + ?Sized> TensorEncoder for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn encode(&self, input: HostTensor<'_>, output: &mut [u8]) -> Result<usize> {
        (**self).encode(input, output)
    }

    fn max_encoded_size(&self, layout: &TensorLayout) -> usize {
        (**self).max_encoded_size(layout)
    }

    fn is_lossless(&self) -> bool {
        (**self).is_lossless()
    }
}

impl<T: TensorDecoder + ?Sized> TensorDecoder for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn decode(&self, input: &[u8], layout: &TensorLayout, output: &mut [u8]) -> Result<usize> {
        (**self).decode(input, layout, output)
    }

    fn is_lossless(&self) -> bool {
        (**self).is_lossless()
    }
}
