//! Preallocated scratch buffers.

use tessera_core::{Error, Result};

/// Fixed-capacity byte buffer owned by one layer.
///
/// Allocated once and never resized. Contents are only meaningful between
/// the write that produced them and the next write.
#[derive(Debug)]
pub struct ScratchBuffer {
    data: Box<[u8]>,
}

impl ScratchBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        ScratchBuffer {
            data: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whole buffer, for codecs to write into.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The first `len` bytes, or `BufferOverflow` if `len` exceeds capacity.
    pub fn prefix(&self, len: usize) -> Result<&[u8]> {
        self.range(0, len)
    }

    /// Mutable view of the first `len` bytes.
    pub fn prefix_mut(&mut self, len: usize) -> Result<&mut [u8]> {
        let capacity = self.capacity();
        self.data
            .get_mut(..len)
            .ok_or_else(|| Error::buffer_overflow(len, capacity))
    }

    /// `len` bytes starting at `offset`.
    pub fn range(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::buffer_overflow(usize::MAX, self.capacity()))?;
        self.data
            .get(offset..end)
            .ok_or_else(|| Error::buffer_overflow(end, self.capacity()))
    }

    /// Fail with `BufferOverflow` unless `required` bytes fit.
    pub fn ensure_fits(&self, required: usize) -> Result<()> {
        if required > self.capacity() {
            return Err(Error::buffer_overflow(required, self.capacity()));
        }
        Ok(())
    }
}
