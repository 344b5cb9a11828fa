//! # Tessera Core
//!
//! Core traits, types and errors for the Tessera tensor compression layer.
//!
//! A compression layer sits between two stages of a computation graph. It
//! squeezes an intermediate tensor through a codec before a bandwidth- or
//! storage-constrained boundary and reconstructs it on the other side. This
//! crate holds the vocabulary shared by the codecs and the layer itself.
//!
//! ## Core Traits
//!
//! - [`TensorEncoder`] - Encode a host tensor into a caller-provided buffer
//! - [`TensorDecoder`] - Decode a payload into a caller-provided buffer
//! - [`Accelerator`] - Allocate accelerator memory for device-resident tensors
//! - [`DeviceMemory`] - Blocking host/device copies for one allocation
//!
//! ## Example
//!
//! ```ignore
//! use tessera_core::{CodecConfig, Tensor, TensorEncoder};
//! use tessera_codecs::NoopEncoder;
//!
//! let tensor = Tensor::from_f32([1, 3, 4, 4], &values)?;
//! let mut payload = vec![0u8; 4096];
//! let written = NoopEncoder.encode(tensor.as_host().unwrap(), &mut payload)?;
//! ```

pub mod config;
pub mod error;
pub mod stats;
pub mod tensor;
pub mod traits;
pub mod types;

pub use config::{validate, CodecConfig, ParamKind, ParamSpec, ParamValue};
pub use error::{Error, Result};
pub use stats::{SizeLog, TransferStats};
pub use tensor::{bytes_to_f32, DeviceMemory, HostTensor, Storage, Tensor};
pub use traits::{Accelerator, TensorDecoder, TensorEncoder};
pub use types::{DType, Residency, Shape, TensorLayout};
