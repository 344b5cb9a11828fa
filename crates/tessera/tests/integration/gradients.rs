//! Straight-through gradients across the layer.

use tessera::{CompressionLayer, Error, LayerConfig, Tape};
use tessera_core::CodecConfig;

use super::activations;

fn quantize_layer(bits: i64, capacity: usize) -> CompressionLayer {
    let config = LayerConfig::new("quantize_encoder", "quantize_decoder")
        .with_encoder_params(CodecConfig::new().with("bits", bits))
        .with_capacities(capacity, capacity);
    CompressionLayer::new(config).unwrap()
}

#[test]
fn test_lossy_layer_passes_gradient_unchanged() {
    let input = activations(&[1, 2, 4, 4], 8);
    let mut layer = quantize_layer(1, 256);

    let mut tape = Tape::new();
    let x = tape.leaf(input.layout().clone());
    let (output, y) = layer.forward_traced(&mut tape, &input, x).unwrap();

    // one bit per element is far from the identity
    assert_ne!(output.host_bytes(), input.host_bytes());

    let seed: Vec<f32> = (0..input.numel()).map(|i| i as f32 - 7.5).collect();
    let grads = tape.backward(y, seed.clone()).unwrap();
    assert_eq!(grads.wrt(x), Some(seed.as_slice()));
    assert_eq!(tape.op_name(y), Some("decode"));
    assert_eq!(tape.len(), 3);
}

#[test]
fn test_stacked_layers_share_a_tape() {
    let input = activations(&[1, 2, 4, 4], 9);
    let mut first = quantize_layer(4, 256);
    let mut second = quantize_layer(2, 256);

    let mut tape = Tape::new();
    let x = tape.leaf(input.layout().clone());
    let (hidden, h) = first.forward_traced(&mut tape, &input, x).unwrap();
    let (_, y) = second.forward_traced(&mut tape, &hidden, h).unwrap();

    let grads = tape.backward(y, vec![1.0; input.numel()]).unwrap();
    assert_eq!(grads.wrt(x), Some(&vec![1.0; input.numel()][..]));
    assert_eq!(grads.wrt(h), Some(&vec![1.0; input.numel()][..]));
}

#[test]
fn test_failed_forward_records_nothing() {
    let input = activations(&[1, 2, 4, 4], 10);
    let mut layer = quantize_layer(4, 16);

    let mut tape = Tape::new();
    let x = tape.leaf(input.layout().clone());
    let err = layer.forward_traced(&mut tape, &input, x).unwrap_err();
    assert!(matches!(err, Error::BufferOverflow { .. }));
    assert_eq!(tape.len(), 1);
}

#[test]
fn test_node_must_match_input() {
    let input = activations(&[1, 2, 4, 4], 11);
    let mut layer = quantize_layer(4, 256);

    let mut tape = Tape::new();
    let wrong = tape.leaf(activations(&[1, 2, 2, 2], 0).layout().clone());
    let err = layer.forward_traced(&mut tape, &input, wrong).unwrap_err();
    assert!(matches!(
        err,
        Error::ShapeMismatch {
            expected: 8,
            actual: 32
        }
    ));
}
