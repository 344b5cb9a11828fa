//! # Tessera
//!
//! A tensor compression layer: compress an intermediate tensor before it
//! crosses a bandwidth- or storage-constrained boundary, decompress it on the
//! other side, and stay invisible to gradients.
//!
//! ```text
//!  input ─► TransferIn ─► Encode ─► payload ─► Decode ─► TransferOut ─► output
//!           (dev→host)      │    (size logged)           (host→dev)
//!                           └──── d(output)/d(input) = I ────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tessera::{CompressionLayer, LayerConfig};
//! use tessera_core::Tensor;
//!
//! let input = Tensor::from_f32([1, 3, 4, 4], &[0.5; 48])?;
//! let config = LayerConfig::new("noop_encoder", "noop_decoder").sized_for(input.layout())?;
//! let mut layer = CompressionLayer::new(config)?;
//!
//! let output = layer.forward(&input)?;
//! assert_eq!(layer.compressed_sizes(), &[192]);
//! ```
//!
//! ## Feature Flags
//!
//! - `cuda` - [`CudaAccelerator`] backed by `cudarc`

pub mod autograd;
pub mod config;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod device;
pub mod layer;
pub mod metrics;
pub mod registry;
pub mod scratch;
pub mod stage;
pub mod telemetry;
pub mod transfer;

pub use autograd::{BackwardNode, Gradients, NodeId, StraightThrough, Tape};
pub use config::LayerConfig;
#[cfg(feature = "cuda")]
pub use cuda::{CudaAccelerator, CudaMemory};
pub use device::{SimulatedAccelerator, SimulatedMemory};
pub use layer::CompressionLayer;
pub use metrics::{compare, compute_quality, QualityReport};
pub use registry::{CodecPair, CodecRegistry, DecoderFactory, EncoderFactory};
pub use scratch::ScratchBuffer;
pub use stage::{CompressedPayload, DecodeStage, EncodeStage};
pub use telemetry::{
    CallTimings, Stage, Telemetry, TelemetryConfig, TelemetryMode, TelemetrySink, TracingSink,
};
pub use transfer::TransferManager;

pub use tessera_core::{Error, Residency, Result, Tensor};
