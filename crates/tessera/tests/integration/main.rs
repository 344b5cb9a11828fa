//! Integration tests for the compression layer.
//!
//! These drive whole forward calls through [`CompressionLayer`] and check what
//! callers can observe: outputs, the size log, transfer counters, stage
//! transitions and gradients.

mod gradients;
mod residency;
mod roundtrip;
mod telemetry;

use tessera::Tensor;

/// Deterministic post-ReLU activations: about a third of the elements are
/// zero, the rest lie in `[0, 4)`.
pub fn activations(shape: &[usize], seed: u32) -> Tensor {
    let numel: usize = shape.iter().product();
    let values: Vec<f32> = (0..numel)
        .map(|i| {
            let h = (i as u32).wrapping_mul(2_654_435_761).wrapping_add(seed.wrapping_mul(40_503));
            if h % 3 == 0 {
                0.0
            } else {
                (h % 4000) as f32 / 1000.0
            }
        })
        .collect();
    Tensor::from_f32(shape, &values).unwrap()
}
