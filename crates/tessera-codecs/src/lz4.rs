//! LZ4 block codec over the raw tensor bytes (lossless).
//!
//! Backed by `lz4_flex`. Activations after a ReLU are often sparse, which LZ4
//! compresses well at very high speed.

use tessera_core::{Error, HostTensor, ParamSpec, Result, TensorDecoder, TensorEncoder, TensorLayout};

/// Registered name of the encoder.
pub const LZ4_ENCODER: &str = "lz4_encoder";
/// Registered name of the decoder.
pub const LZ4_DECODER: &str = "lz4_decoder";

/// LZ4 block encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Encoder;

impl Lz4Encoder {
    /// Accepted parameters (none).
    pub const PARAMS: &'static [ParamSpec] = &[];
}

impl TensorEncoder for Lz4Encoder {
    fn name(&self) -> &'static str {
        LZ4_ENCODER
    }

    /// Writes straight into `output` when it holds the worst case. Smaller
    /// buffers are still accepted: the block is compressed aside and copied
    /// in if the actual payload fits, so `BufferOverflow` always reports the
    /// real payload length.
    fn encode(&self, input: HostTensor<'_>, output: &mut [u8]) -> Result<usize> {
        let bound = lz4_flex::block::get_maximum_output_size(input.data.len());
        if output.len() >= bound {
            return lz4_flex::block::compress_into(input.data, output)
                .map_err(|e| Error::codec(LZ4_ENCODER, e.to_string()));
        }

        // compress_into refuses anything below the bound
        let compressed = lz4_flex::block::compress(input.data);
        if compressed.len() > output.len() {
            return Err(Error::buffer_overflow(compressed.len(), output.len()));
        }
        output[..compressed.len()].copy_from_slice(&compressed);
        Ok(compressed.len())
    }

    fn max_encoded_size(&self, layout: &TensorLayout) -> usize {
        lz4_flex::block::get_maximum_output_size(layout.byte_len())
    }

    fn is_lossless(&self) -> bool {
        true
    }
}

/// LZ4 block decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Decoder;

impl Lz4Decoder {
    /// Accepted parameters (none).
    pub const PARAMS: &'static [ParamSpec] = &[];
}

impl TensorDecoder for Lz4Decoder {
    fn name(&self) -> &'static str {
        LZ4_DECODER
    }

    fn decode(&self, input: &[u8], layout: &TensorLayout, output: &mut [u8]) -> Result<usize> {
        let len = layout.byte_len();
        if len > output.len() {
            return Err(Error::buffer_overflow(len, output.len()));
        }
        lz4_flex::block::decompress_into(input, &mut output[..len])
            .map_err(|e| Error::codec(LZ4_DECODER, e.to_string()))
    }

    fn is_lossless(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Tensor;

    fn sparse_activations(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| if i % 7 == 0 { i as f32 * 0.25 } else { 0.0 })
            .collect()
    }

    #[test]
    fn test_roundtrip_compresses_sparse() {
        let values = sparse_activations(1024);
        let tensor = Tensor::from_f32([4, 16, 16], &values).unwrap();

        let mut payload = vec![0u8; Lz4Encoder.max_encoded_size(tensor.layout())];
        let n = Lz4Encoder
            .encode(tensor.as_host().unwrap(), &mut payload)
            .unwrap();
        assert!(n < tensor.byte_len(), "sparse data should shrink: {}", n);

        let mut decoded = vec![0u8; tensor.byte_len()];
        let written = Lz4Decoder
            .decode(&payload[..n], tensor.layout(), &mut decoded)
            .unwrap();
        assert_eq!(written, tensor.byte_len());
        assert_eq!(decoded, tensor.host_bytes().unwrap());
    }

    #[test]
    fn test_buffer_below_worst_case() {
        let tensor = Tensor::from_f32([1, 16, 16, 16], &[0.0; 4096]).unwrap();
        let bound = Lz4Encoder.max_encoded_size(tensor.layout());
        let actual = lz4_flex::block::compress(tensor.host_bytes().unwrap()).len();
        assert!(actual < 1024 && 1024 < bound);

        let mut payload = vec![0u8; 1024];
        let n = Lz4Encoder
            .encode(tensor.as_host().unwrap(), &mut payload)
            .unwrap();
        assert_eq!(n, actual);

        let mut decoded = vec![0u8; tensor.byte_len()];
        Lz4Decoder
            .decode(&payload[..n], tensor.layout(), &mut decoded)
            .unwrap();
        assert_eq!(decoded, tensor.host_bytes().unwrap());
    }

    #[test]
    fn test_encode_overflow_reports_payload_len() {
        let tensor = Tensor::from_f32([1, 16, 16, 16], &[0.0; 4096]).unwrap();
        let actual = lz4_flex::block::compress(tensor.host_bytes().unwrap()).len();

        let mut payload = vec![0u8; 8];
        let err = Lz4Encoder
            .encode(tensor.as_host().unwrap(), &mut payload)
            .unwrap_err();
        match err {
            Error::BufferOverflow { required, capacity } => {
                assert_eq!(required, actual);
                assert_eq!(capacity, 8);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_decode_overflow() {
        let tensor = Tensor::from_f32([8], &[0.0; 8]).unwrap();
        let mut decoded = vec![0u8; 16];
        let err = Lz4Decoder
            .decode(&[0u8; 4], tensor.layout(), &mut decoded)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::BufferOverflow {
                required: 32,
                capacity: 16
            }
        ));
    }

    #[test]
    fn test_corrupt_payload() {
        let tensor = Tensor::from_f32([8], &[0.0; 8]).unwrap();
        let mut decoded = vec![0u8; 32];
        let result = Lz4Decoder.decode(&[0xff, 0xff, 0xff], tensor.layout(), &mut decoded);
        assert!(result.is_err());
    }
}
