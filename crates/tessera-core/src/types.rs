//! Core type definitions for tensors crossing the compression boundary.

use core::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Where a tensor's contents live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Residency {
    /// Host (CPU) memory.
    #[default]
    Host,
    /// Accelerator (GPU) memory.
    Accelerator,
}

impl Residency {
    /// Get residency name as string.
    pub fn name(self) -> &'static str {
        match self {
            Residency::Host => "host",
            Residency::Accelerator => "accelerator",
        }
    }
}

impl fmt::Display for Residency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F16,
    BF16,
    U8,
    I8,
    I32,
}

impl DType {
    /// Returns the size of one element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F16 | DType::BF16 => 2,
            DType::U8 | DType::I8 => 1,
        }
    }

    /// Get dtype name as string.
    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::U8 => "u8",
            DType::I8 => "i8",
            DType::I32 => "i32",
        }
    }

    /// Whether the dtype holds floating point values.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F16 | DType::BF16)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tensor dimensions, outermost first (row-major).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(SmallVec<[usize; 4]>);

impl Shape {
    /// Create a shape from its dimensions.
    pub fn new(dims: &[usize]) -> Self {
        Shape(SmallVec::from_slice(dims))
    }

    /// Dimensions as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements. A rank-0 shape holds one element.
    ///
    /// Saturates at `usize::MAX`; use [`checked_numel`](Self::checked_numel)
    /// for shapes that did not come from an existing tensor.
    pub fn numel(&self) -> usize {
        self.checked_numel().unwrap_or(usize::MAX)
    }

    /// Total number of elements, or `None` if the product overflows.
    pub fn checked_numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(&dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(SmallVec::from_vec(dims))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Shape plus element type: everything needed to interpret a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorLayout {
    pub shape: Shape,
    pub dtype: DType,
}

impl TensorLayout {
    /// Create a new layout.
    pub fn new(shape: impl Into<Shape>, dtype: DType) -> Self {
        TensorLayout {
            shape: shape.into(),
            dtype,
        }
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Size of the dense row-major buffer in bytes. Saturates at
    /// `usize::MAX`.
    pub fn byte_len(&self) -> usize {
        self.checked_byte_len().unwrap_or(usize::MAX)
    }

    /// Size in bytes, or `InvalidConfig` if it does not fit in `usize`.
    pub fn checked_byte_len(&self) -> Result<usize> {
        self.shape
            .checked_numel()
            .and_then(|n| n.checked_mul(self.dtype.size_bytes()))
            .ok_or_else(|| {
                Error::invalid_config("layout", format!("{} overflows the address space", self))
            })
    }

    /// Fail with `ShapeMismatch` unless `len` equals the layout byte length.
    /// An overflowing layout fails with `InvalidConfig`.
    pub fn check_len(&self, len: usize) -> Result<()> {
        let expected = self.checked_byte_len()?;
        if len != expected {
            return Err(Error::shape_mismatch(expected, len));
        }
        Ok(())
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.dtype, self.shape)
    }
}
