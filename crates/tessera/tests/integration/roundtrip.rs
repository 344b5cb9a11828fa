//! Forward-pass results and the size log.

use tessera::{CodecRegistry, CompressionLayer, Error, LayerConfig, TransferManager};
use tessera_core::{CodecConfig, HostTensor, Result, Tensor, TensorDecoder, TensorEncoder, TensorLayout};

use super::activations;

#[test]
fn test_noop_scenario_1x3x4x4() {
    let input = activations(&[1, 3, 4, 4], 7);
    let config = LayerConfig::new("noop_encoder", "noop_decoder")
        .sized_for(input.layout())
        .unwrap();
    let mut layer = CompressionLayer::new(config).unwrap();

    let output = layer.forward(&input).unwrap();

    assert_eq!(output.layout(), input.layout());
    assert_eq!(output.host_bytes(), input.host_bytes());
    assert_eq!(layer.compressed_sizes(), &[192]);
}

#[test]
fn test_lossless_codecs_are_bit_exact() {
    let input = activations(&[2, 3, 8, 8], 11);

    for (encoder, decoder) in [
        ("noop_encoder", "noop_decoder"),
        ("swizzle_encoder", "swizzle_decoder"),
        ("lz4_encoder", "lz4_decoder"),
    ] {
        let config = LayerConfig::new(encoder, decoder)
            .sized_for(input.layout())
            .unwrap();
        let mut layer = CompressionLayer::new(config).unwrap();
        assert!(layer.is_lossless(), "{} should be lossless", encoder);

        let output = layer.forward(&input).unwrap();
        assert_eq!(
            output.host_bytes(),
            input.host_bytes(),
            "{} / {} changed the tensor",
            encoder,
            decoder
        );
    }
}

#[test]
fn test_lz4_shrinks_sparse_activations() {
    let input = Tensor::from_f32([1, 16, 16, 16], &[0.0; 4096]).unwrap();
    let config = LayerConfig::new("lz4_encoder", "lz4_decoder")
        .sized_for(input.layout())
        .unwrap();
    let mut layer = CompressionLayer::new(config).unwrap();

    layer.forward(&input).unwrap();
    assert!(layer.compressed_sizes()[0] < input.byte_len() / 10);
}

#[test]
fn test_lz4_fits_below_worst_case_capacity() {
    let input = Tensor::from_f32([1, 16, 16, 16], &[0.0; 4096]).unwrap();
    let config =
        LayerConfig::new("lz4_encoder", "lz4_decoder").with_capacities(1024, input.byte_len());
    let mut layer = CompressionLayer::new(config).unwrap();
    assert!(layer.encode_capacity() < tessera_codecs::Lz4Encoder.max_encoded_size(input.layout()));

    let output = layer.forward(&input).unwrap();
    assert_eq!(output.host_bytes(), input.host_bytes());
    assert!(layer.compressed_sizes()[0] <= 1024);
}

#[test]
fn test_mismatched_lossless_pair_is_not_lossless() {
    let input = activations(&[1, 3, 2, 4], 5);
    let config = LayerConfig::new("swizzle_encoder", "noop_decoder")
        .sized_for(input.layout())
        .unwrap();
    let mut layer = CompressionLayer::new(config).unwrap();
    assert!(!layer.is_lossless());

    let output = layer.forward(&input).unwrap();
    assert_ne!(output.host_bytes(), input.host_bytes());
}

#[test]
fn test_quantize_quality_and_size() {
    let input = activations(&[1, 8, 16, 16], 3);

    let mut sizes = Vec::new();
    for bits in [2, 8] {
        let config = LayerConfig::new("quantize_encoder", "quantize_decoder")
            .with_encoder_params(CodecConfig::new().with("bits", bits))
            .sized_for(input.layout())
            .unwrap();
        let mut layer = CompressionLayer::new(config).unwrap();
        assert!(!layer.is_lossless());

        let output = layer.forward(&input).unwrap();
        let report = tessera::compare(&input, &output).unwrap();
        if bits == 8 {
            assert!(report.cosine_similarity > 0.999, "{}", report);
            assert!(report.max_error < 0.01, "{}", report);
        }
        sizes.push(layer.compressed_sizes()[0]);
    }

    // 9-byte header plus packed codes
    assert_eq!(sizes, vec![9 + 2048 / 4, 9 + 2048]);
}

#[test]
fn test_size_log_counts_calls_until_reset() {
    let input = activations(&[1, 3, 4, 4], 1);
    let config = LayerConfig::new("noop_encoder", "noop_decoder")
        .sized_for(input.layout())
        .unwrap();
    let mut layer = CompressionLayer::new(config).unwrap();

    for n in 1..=5 {
        layer.forward(&input).unwrap();
        assert_eq!(layer.compressed_sizes().len(), n);
    }
    assert_eq!(layer.size_log().mean(), 192.0);
    assert_eq!(layer.size_log().total_bytes(), 960);

    layer.reset();
    assert!(layer.compressed_sizes().is_empty());

    layer.forward(&input).unwrap();
    assert_eq!(layer.compressed_sizes(), &[192]);
}

#[test]
fn test_overflow_is_fatal_and_unlogged() {
    let big = activations(&[1, 3, 4, 4], 2);
    let small = activations(&[1, 3, 2, 4], 2);
    let config = LayerConfig::new("noop_encoder", "noop_decoder").with_capacities(100, 192);
    let mut layer = CompressionLayer::new(config).unwrap();

    for _ in 0..3 {
        let err = layer.forward(&big).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferOverflow {
                required: 192,
                capacity: 100
            }
        ));
    }
    assert!(layer.compressed_sizes().is_empty());
    assert_eq!(layer.encode_capacity(), 100);

    let output = layer.forward(&small).unwrap();
    assert_eq!(output.host_bytes(), small.host_bytes());
    assert_eq!(layer.compressed_sizes(), &[96]);
}

#[test]
fn test_mixed_shapes_share_buffers() {
    let config = LayerConfig::new("swizzle_encoder", "swizzle_decoder").with_capacities(4096, 4096);
    let mut layer = CompressionLayer::new(config).unwrap();

    for shape in [[1, 3, 8, 8], [2, 4, 4, 4], [1, 1, 16, 16]] {
        let input = activations(&shape, 5);
        let output = layer.forward(&input).unwrap();
        assert_eq!(output.host_bytes(), input.host_bytes());
    }
    assert_eq!(layer.compressed_sizes(), &[768, 512, 1024]);
    assert_eq!(layer.decode_capacity(), 4096);
}

#[test]
fn test_codec_error_propagates() {
    // swizzle needs at least [C, H, W]
    let input = Tensor::from_f32([4], &[1.0; 4]).unwrap();
    let mut layer =
        CompressionLayer::new(LayerConfig::new("swizzle_encoder", "swizzle_decoder")).unwrap();
    let err = layer.forward(&input).unwrap_err();
    assert!(matches!(err, Error::Codec { .. }));
    assert!(layer.compressed_sizes().is_empty());
}

/// XORs every byte with a fixed key.
struct Xor;

impl TensorEncoder for Xor {
    fn name(&self) -> &'static str {
        "xor_encoder"
    }

    fn encode(&self, input: HostTensor<'_>, output: &mut [u8]) -> Result<usize> {
        if input.data.len() > output.len() {
            return Err(Error::buffer_overflow(input.data.len(), output.len()));
        }
        for (o, i) in output.iter_mut().zip(input.data) {
            *o = i ^ 0x5a;
        }
        Ok(input.data.len())
    }

    fn max_encoded_size(&self, layout: &TensorLayout) -> usize {
        layout.byte_len()
    }
}

impl TensorDecoder for Xor {
    fn name(&self) -> &'static str {
        "xor_decoder"
    }

    fn decode(&self, input: &[u8], _layout: &TensorLayout, output: &mut [u8]) -> Result<usize> {
        if input.len() > output.len() {
            return Err(Error::buffer_overflow(input.len(), output.len()));
        }
        for (o, i) in output.iter_mut().zip(input) {
            *o = i ^ 0x5a;
        }
        Ok(input.len())
    }
}

#[test]
fn test_externally_registered_codec() {
    let mut registry = CodecRegistry::with_builtin();
    registry
        .register_encoder("xor_encoder", &[], |_| Ok(Box::new(Xor)))
        .register_decoder("xor_decoder", &[], |_| Ok(Box::new(Xor)));

    let input = activations(&[1, 2, 3, 3], 9);
    let config = LayerConfig::new("xor_encoder", "xor_decoder")
        .sized_for_in(&registry, input.layout())
        .unwrap();
    let mut layer =
        CompressionLayer::with_parts(config, &registry, TransferManager::host_only()).unwrap();

    let output = layer.forward(&input).unwrap();
    assert_eq!(output.host_bytes(), input.host_bytes());

    // the global registry is untouched
    assert!(CompressionLayer::new(LayerConfig::new("xor_encoder", "xor_decoder")).is_err());
}

#[test]
fn test_layer_from_json() {
    let config = LayerConfig::from_json_str(
        r#"{
            "encoder_name": "quantize_encoder",
            "encoder_params": {"bits": 4},
            "decoder_name": "quantize_decoder",
            "encode_buffer_capacity": 1024,
            "decode_buffer_capacity": 1024
        }"#,
    )
    .unwrap();
    let mut layer = CompressionLayer::new(config).unwrap();

    let input = activations(&[1, 4, 8, 8], 4);
    let output = layer.forward(&input).unwrap();
    assert_eq!(output.layout(), input.layout());
    assert_eq!(layer.compressed_sizes(), &[9 + 128]);
}
