//! # Tessera Codecs
//!
//! Built-in tensor codecs for the Tessera compression layer.
//!
//! Every codec is split into an encoder and a decoder that write into
//! caller-provided buffers and refuse, rather than truncate, when a buffer is
//! too small. Heavyweight image and video codecs (JPEG, H.264, H.265) live
//! outside this crate and plug into the same traits.
//!
//! ## Codecs
//!
//! | Encoder / Decoder | Lossless | Parameters | Payload |
//! |-------------------|----------|------------|---------|
//! | `noop_encoder` / `noop_decoder` | yes | - | raw bytes |
//! | `swizzle_encoder` / `swizzle_decoder` | yes | - | `[.., H, W, C]` bytes |
//! | `quantize_encoder` / `quantize_decoder` | no | `bits` (1-8) | header + packed codes |
//! | `lz4_encoder` / `lz4_decoder` | yes | - | LZ4 block |
//!
//! ## Example
//!
//! ```ignore
//! use tessera_codecs::{QuantizeDecoder, QuantizeEncoder};
//! use tessera_core::{TensorDecoder, TensorEncoder};
//!
//! let encoder = QuantizeEncoder::new(4)?;
//! let n = encoder.encode(tensor.as_host().unwrap(), &mut payload)?;
//! QuantizeDecoder.decode(&payload[..n], tensor.layout(), &mut decoded)?;
//! ```

pub mod lz4;
pub mod noop;
pub mod quantize;
pub mod swizzle;

pub use lz4::{Lz4Decoder, Lz4Encoder, LZ4_DECODER, LZ4_ENCODER};
pub use noop::{NoopDecoder, NoopEncoder, NOOP_DECODER, NOOP_ENCODER};
pub use quantize::{QuantizeDecoder, QuantizeEncoder, QUANTIZE_DECODER, QUANTIZE_ENCODER};
pub use swizzle::{SwizzleDecoder, SwizzleEncoder, SWIZZLE_DECODER, SWIZZLE_ENCODER};
