//! Pass-through codec.
//!
//! The payload is the tensor's raw bytes. Useful as a lossless baseline and
//! for measuring the layer's own overhead.

use tessera_core::{Error, HostTensor, ParamSpec, Result, TensorDecoder, TensorEncoder, TensorLayout};

/// Registered name of the encoder.
pub const NOOP_ENCODER: &str = "noop_encoder";
/// Registered name of the decoder.
pub const NOOP_DECODER: &str = "noop_decoder";

/// Copies the tensor bytes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEncoder;

impl NoopEncoder {
    /// Accepted parameters (none).
    pub const PARAMS: &'static [ParamSpec] = &[];
}

impl TensorEncoder for NoopEncoder {
    fn name(&self) -> &'static str {
        NOOP_ENCODER
    }

    fn encode(&self, input: HostTensor<'_>, output: &mut [u8]) -> Result<usize> {
        copy_into(input.data, output)
    }

    fn max_encoded_size(&self, layout: &TensorLayout) -> usize {
        layout.byte_len()
    }

    fn is_lossless(&self) -> bool {
        true
    }
}

/// Copies the payload bytes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDecoder;

impl NoopDecoder {
    /// Accepted parameters (none).
    pub const PARAMS: &'static [ParamSpec] = &[];
}

impl TensorDecoder for NoopDecoder {
    fn name(&self) -> &'static str {
        NOOP_DECODER
    }

    fn decode(&self, input: &[u8], _layout: &TensorLayout, output: &mut [u8]) -> Result<usize> {
        copy_into(input, output)
    }

    fn is_lossless(&self) -> bool {
        true
    }
}

fn copy_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    if src.len() > dst.len() {
        return Err(Error::buffer_overflow(src.len(), dst.len()));
    }
    dst[..src.len()].copy_from_slice(src);
    Ok(src.len())
}
