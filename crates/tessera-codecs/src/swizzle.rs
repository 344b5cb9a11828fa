//! Channel interleaving codec.
//!
//! Rearranges planar `[.., C, H, W]` activations into interleaved
//! `[.., H, W, C]` order, the pixel layout image and video codecs expect.
//! Lossless and size-preserving; any leading dimensions are treated as batch.

use tessera_core::{Error, HostTensor, ParamSpec, Result, TensorDecoder, TensorEncoder, TensorLayout};

/// Registered name of the encoder.
pub const SWIZZLE_ENCODER: &str = "swizzle_encoder";
/// Registered name of the decoder.
pub const SWIZZLE_DECODER: &str = "swizzle_decoder";

/// Planar → interleaved.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwizzleEncoder;

impl SwizzleEncoder {
    /// Accepted parameters (none).
    pub const PARAMS: &'static [ParamSpec] = &[];
}

impl TensorEncoder for SwizzleEncoder {
    fn name(&self) -> &'static str {
        SWIZZLE_ENCODER
    }

    fn encode(&self, input: HostTensor<'_>, output: &mut [u8]) -> Result<usize> {
        let dims = PlaneDims::from_layout(SWIZZLE_ENCODER, input.layout)?;
        let len = input.data.len();
        if len > output.len() {
            return Err(Error::buffer_overflow(len, output.len()));
        }
        dims.permute(input.data, &mut output[..len], Direction::Interleave);
        Ok(len)
    }

    fn max_encoded_size(&self, layout: &TensorLayout) -> usize {
        layout.byte_len()
    }

    fn is_lossless(&self) -> bool {
        true
    }
}

/// Interleaved → planar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwizzleDecoder;

impl SwizzleDecoder {
    /// Accepted parameters (none).
    pub const PARAMS: &'static [ParamSpec] = &[];
}

impl TensorDecoder for SwizzleDecoder {
    fn name(&self) -> &'static str {
        SWIZZLE_DECODER
    }

    fn decode(&self, input: &[u8], layout: &TensorLayout, output: &mut [u8]) -> Result<usize> {
        let dims = PlaneDims::from_layout(SWIZZLE_DECODER, layout)?;
        let len = layout.byte_len();
        if input.len() != len {
            return Err(Error::codec(
                SWIZZLE_DECODER,
                format!("payload is {} bytes, layout {} needs {}", input.len(), layout, len),
            ));
        }
        if len > output.len() {
            return Err(Error::buffer_overflow(len, output.len()));
        }
        dims.permute(input, &mut output[..len], Direction::Planarize);
        Ok(len)
    }

    fn is_lossless(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Interleave,
    Planarize,
}

#[derive(Debug, Clone, Copy)]
struct PlaneDims {
    batch: usize,
    channels: usize,
    pixels: usize,
    elem: usize,
}

impl PlaneDims {
    fn from_layout(codec: &'static str, layout: &TensorLayout) -> Result<Self> {
        let dims = layout.shape.dims();
        if dims.len() < 3 {
            return Err(Error::codec(
                codec,
                format!("needs a [.., C, H, W] tensor, got {}", layout.shape),
            ));
        }
        let (lead, tail) = dims.split_at(dims.len() - 3);
        Ok(PlaneDims {
            batch: lead.iter().product(),
            channels: tail[0],
            pixels: tail[1] * tail[2],
            elem: layout.dtype.size_bytes(),
        })
    }

    fn permute(&self, src: &[u8], dst: &mut [u8], direction: Direction) {
        let plane = self.channels * self.pixels;
        let e = self.elem;
        for b in 0..self.batch {
            let base = b * plane;
            for c in 0..self.channels {
                for p in 0..self.pixels {
                    let planar = (base + c * self.pixels + p) * e;
                    let packed = (base + p * self.channels + c) * e;
                    let (from, to) = match direction {
                        Direction::Interleave => (planar, packed),
                        Direction::Planarize => (packed, planar),
                    };
                    dst[to..to + e].copy_from_slice(&src[from..from + e]);
                }
            }
        }
    }
}
