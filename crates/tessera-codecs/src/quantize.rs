//! Uniform scalar quantizer (lossy).
//!
//! Maps each f32 element onto `2^bits - 1` evenly spaced levels between the
//! tensor's finite minimum and maximum, then bit-packs the codes LSB first.
//!
//! ## Payload Format
//!
//! ```text
//! ┌──────┬───────────┬───────────┬──────────────────────────────┐
//! │ bits │ min (f32) │ max (f32) │ codes, ceil(n * bits / 8) B  │
//! │  1B  │  4B (LE)  │  4B (LE)  │                              │
//! └──────┴───────────┴───────────┴──────────────────────────────┘
//! ```
//!
//! Non-finite inputs encode as code 0.

use tessera_core::{
    DType, Error, HostTensor, ParamSpec, Result, TensorDecoder, TensorEncoder, TensorLayout,
};

/// Registered name of the encoder.
pub const QUANTIZE_ENCODER: &str = "quantize_encoder";
/// Registered name of the decoder.
pub const QUANTIZE_DECODER: &str = "quantize_decoder";

/// Header size in bytes.
pub const HEADER_LEN: usize = 9;

/// Widest supported code.
pub const MAX_BITS: u8 = 8;

/// Quantizes f32 tensors to `bits` bits per element.
#[derive(Debug, Clone, Copy)]
pub struct QuantizeEncoder {
    bits: u8,
}

impl QuantizeEncoder {
    /// Accepted parameters.
    pub const PARAMS: &'static [ParamSpec] =
        &[ParamSpec::int("bits").required().range(1.0, MAX_BITS as f64)];

    /// Create an encoder producing `bits`-bit codes.
    pub fn new(bits: u8) -> Result<Self> {
        if bits == 0 || bits > MAX_BITS {
            return Err(Error::invalid_config(
                QUANTIZE_ENCODER,
                format!("bits must be in [1, {}], got {}", MAX_BITS, bits),
            ));
        }
        Ok(QuantizeEncoder { bits })
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }
}

impl TensorEncoder for QuantizeEncoder {
    fn name(&self) -> &'static str {
        QUANTIZE_ENCODER
    }

    fn encode(&self, input: HostTensor<'_>, output: &mut [u8]) -> Result<usize> {
        if input.layout.dtype != DType::F32 {
            return Err(Error::codec(
                QUANTIZE_ENCODER,
                format!("only f32 tensors are supported, got {}", input.layout.dtype),
            ));
        }

        let n = input.layout.numel();
        let required = encoded_len(n, self.bits);
        if required > output.len() {
            return Err(Error::buffer_overflow(required, output.len()));
        }

        let values = input
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));

        let (min, max) = finite_range(values.clone());
        let levels = ((1u32 << self.bits) - 1) as f64;
        // f64 so that max - min stays finite near f32::MAX
        let span = max as f64 - min as f64;

        output[0] = self.bits;
        output[1..5].copy_from_slice(&min.to_le_bytes());
        output[5..9].copy_from_slice(&max.to_le_bytes());

        let packed = &mut output[HEADER_LEN..required];
        packed.fill(0);
        let mut writer = BitWriter::new(packed);
        for v in values {
            let code = if v.is_finite() && span > 0.0 {
                (((v as f64 - min as f64) / span) * levels)
                    .round()
                    .clamp(0.0, levels) as u32
            } else {
                0
            };
            writer.put(code, self.bits);
        }

        Ok(required)
    }

    fn max_encoded_size(&self, layout: &TensorLayout) -> usize {
        encoded_len(layout.numel(), self.bits)
    }
}

/// Reconstructs f32 tensors from quantizer payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantizeDecoder;

impl QuantizeDecoder {
    /// Accepted parameters (none, the bit width travels in the header).
    pub const PARAMS: &'static [ParamSpec] = &[];
}

impl TensorDecoder for QuantizeDecoder {
    fn name(&self) -> &'static str {
        QUANTIZE_DECODER
    }

    fn decode(&self, input: &[u8], layout: &TensorLayout, output: &mut [u8]) -> Result<usize> {
        if layout.dtype != DType::F32 {
            return Err(Error::codec(
                QUANTIZE_DECODER,
                format!("only f32 tensors are supported, got {}", layout.dtype),
            ));
        }
        if input.len() < HEADER_LEN {
            return Err(Error::codec(QUANTIZE_DECODER, "payload shorter than header"));
        }

        let bits = input[0];
        if bits == 0 || bits > MAX_BITS {
            return Err(Error::codec(
                QUANTIZE_DECODER,
                format!("corrupt header: bit width {}", bits),
            ));
        }
        let min = f32::from_le_bytes([input[1], input[2], input[3], input[4]]);
        let max = f32::from_le_bytes([input[5], input[6], input[7], input[8]]);

        let n = layout.numel();
        let expected = encoded_len(n, bits);
        if input.len() != expected {
            return Err(Error::codec(
                QUANTIZE_DECODER,
                format!("payload is {} bytes, expected {}", input.len(), expected),
            ));
        }

        let out_len = layout.byte_len();
        if out_len > output.len() {
            return Err(Error::buffer_overflow(out_len, output.len()));
        }

        let levels = ((1u32 << bits) - 1) as f64;
        let step = (max as f64 - min as f64) / levels;
        let mut reader = BitReader::new(&input[HEADER_LEN..]);
        for chunk in output[..out_len].chunks_exact_mut(4) {
            let code = reader.take(bits);
            let v = (min as f64 + code as f64 * step) as f32;
            chunk.copy_from_slice(&v.to_le_bytes());
        }

        Ok(out_len)
    }
}

/// Payload length for `n` elements at `bits` bits each. Saturates at
/// `usize::MAX`.
pub fn encoded_len(n: usize, bits: u8) -> usize {
    n.saturating_mul(bits as usize)
        .div_ceil(8)
        .saturating_add(HEADER_LEN)
}

fn finite_range(values: impl Iterator<Item = f32>) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

struct BitWriter<'a> {
    buf: &'a mut [u8],
    bit: usize,
}

impl<'a> BitWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        BitWriter { buf, bit: 0 }
    }

    fn put(&mut self, code: u32, bits: u8) {
        for i in 0..bits as usize {
            if (code >> i) & 1 == 1 {
                let pos = self.bit + i;
                self.buf[pos / 8] |= 1 << (pos % 8);
            }
        }
        self.bit += bits as usize;
    }
}

struct BitReader<'a> {
    buf: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        BitReader { buf, bit: 0 }
    }

    fn take(&mut self, bits: u8) -> u32 {
        let mut code = 0u32;
        for i in 0..bits as usize {
            let pos = self.bit + i;
            if (self.buf[pos / 8] >> (pos % 8)) & 1 == 1 {
                code |= 1 << i;
            }
        }
        self.bit += bits as usize;
        code
    }
}
