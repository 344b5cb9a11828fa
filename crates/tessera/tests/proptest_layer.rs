//! Property-based tests for the compression layer.
//!
//! These check invariants that must hold for any input:
//! - Lossless codecs reproduce the input bit for bit
//! - The gradient through the layer is the identity, even for lossy codecs
//! - Oversized payloads fail identically every time and are never logged
//!
//! Run with: cargo test -p tessera --test proptest_layer

use proptest::prelude::*;

use tessera::{CompressionLayer, Error, LayerConfig, Tape, Tensor};
use tessera_core::CodecConfig;

/// Shapes `[N, C, H, W]` small enough to keep cases fast.
fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    (1usize..3, 1usize..5, 1usize..9, 1usize..9).prop_map(|(n, c, h, w)| vec![n, c, h, w])
}

/// A shape plus matching element values.
fn tensor_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<f32>)> {
    shape_strategy().prop_flat_map(|shape| {
        let numel: usize = shape.iter().product();
        (Just(shape), prop::collection::vec(-8.0f32..8.0, numel))
    })
}

fn lossless_pair() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop_oneof![
        Just(("noop_encoder", "noop_decoder")),
        Just(("swizzle_encoder", "swizzle_decoder")),
        Just(("lz4_encoder", "lz4_decoder")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    })]

    /// Property: lossless codecs round-trip exactly, and each call logs one size.
    #[test]
    fn prop_lossless_roundtrip(
        (shape, values) in tensor_strategy(),
        (encoder, decoder) in lossless_pair(),
        calls in 1usize..4,
    ) {
        let input = Tensor::from_f32(shape.as_slice(), &values).unwrap();
        let config = LayerConfig::new(encoder, decoder).sized_for(input.layout()).unwrap();
        let mut layer = CompressionLayer::new(config).unwrap();

        for _ in 0..calls {
            let output = layer.forward(&input).unwrap();
            prop_assert_eq!(output.host_bytes(), input.host_bytes());
        }
        prop_assert_eq!(layer.compressed_sizes().len(), calls);
        prop_assert_eq!(layer.transfer_stats().total_transfers(), 0);
    }

    /// Property: d(output)/d(input) is the identity for every bit width.
    #[test]
    fn prop_gradient_is_identity(
        (shape, values) in tensor_strategy(),
        bits in 1i64..=8,
        seed_scale in -4.0f32..4.0,
    ) {
        let input = Tensor::from_f32(shape.as_slice(), &values).unwrap();
        let config = LayerConfig::new("quantize_encoder", "quantize_decoder")
            .with_encoder_params(CodecConfig::new().with("bits", bits))
            .sized_for(input.layout())
            .unwrap();
        let mut layer = CompressionLayer::new(config).unwrap();

        let mut tape = Tape::new();
        let x = tape.leaf(input.layout().clone());
        let (output, y) = layer.forward_traced(&mut tape, &input, x).unwrap();
        prop_assert_eq!(output.layout(), input.layout());

        let seed: Vec<f32> = (0..input.numel()).map(|i| (i as f32 + 1.0) * seed_scale).collect();
        let grads = tape.backward(y, seed.clone()).unwrap();
        prop_assert_eq!(grads.wrt(x), Some(seed.as_slice()));
    }

    /// Property: a payload larger than the encode buffer fails the same way on
    /// every attempt and leaves the size log empty.
    #[test]
    fn prop_overflow_is_deterministic(
        (shape, values) in tensor_strategy(),
        shortfall in 1usize..64,
        attempts in 1usize..4,
    ) {
        let input = Tensor::from_f32(shape.as_slice(), &values).unwrap();
        let required = input.byte_len();
        let capacity = required.saturating_sub(shortfall);
        prop_assume!(capacity > 0);

        let config = LayerConfig::new("noop_encoder", "noop_decoder")
            .with_capacities(capacity, required);
        let mut layer = CompressionLayer::new(config).unwrap();

        for _ in 0..attempts {
            let err = layer.forward(&input).unwrap_err();
            let is_expected_overflow = matches!(
                err,
                Error::BufferOverflow { required: r, capacity: c } if r == required && c == capacity
            );
            prop_assert!(is_expected_overflow, "unexpected error: {}", err);
        }
        prop_assert!(layer.compressed_sizes().is_empty());
    }
}
