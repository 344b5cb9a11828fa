//! Reconstruction quality of lossy codecs.
//!
//! Compares a tensor with what came back out of the layer. Sums are
//! accumulated in `f64`, so large activations do not lose precision.

use std::fmt;

use tessera_core::{Error, Result, Tensor};

/// Quality of one reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityReport {
    pub mse: f64,
    /// Peak signal-to-noise ratio in dB, relative to the largest magnitude in
    /// the original. Infinite for an exact reconstruction.
    pub psnr: f64,
    pub cosine_similarity: f64,
    pub max_error: f64,
    pub num_elements: usize,
}

impl QualityReport {
    /// True when every element came back unchanged.
    pub fn is_exact(&self) -> bool {
        self.max_error == 0.0
    }

    pub fn grade(&self) -> &'static str {
        match self.cosine_similarity {
            c if self.is_exact() || c >= 0.999 => "excellent",
            c if c >= 0.99 => "good",
            c if c >= 0.95 => "degraded",
            _ => "poor",
        }
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mse={:.3e} psnr={:.2}dB cosine={:.5} max_err={:.3e} ({})",
            self.mse,
            self.psnr,
            self.cosine_similarity,
            self.max_error,
            self.grade()
        )
    }
}

/// Compare two host tensors of a float dtype.
pub fn compare(original: &Tensor, reconstructed: &Tensor) -> Result<QualityReport> {
    if original.layout() != reconstructed.layout() {
        return Err(Error::codec(
            "metrics",
            format!(
                "cannot compare {} with {}",
                original.layout(),
                reconstructed.layout()
            ),
        ));
    }
    compute_quality(&original.to_f32_vec()?, &reconstructed.to_f32_vec()?)
}

/// Compare two element slices.
pub fn compute_quality(original: &[f32], reconstructed: &[f32]) -> Result<QualityReport> {
    if original.len() != reconstructed.len() {
        return Err(Error::shape_mismatch(original.len(), reconstructed.len()));
    }
    if original.is_empty() {
        return Ok(QualityReport {
            psnr: f64::INFINITY,
            cosine_similarity: 1.0,
            ..Default::default()
        });
    }

    let mse = mse(original, reconstructed);
    Ok(QualityReport {
        mse,
        psnr: psnr_from_mse(mse, original),
        cosine_similarity: cosine_similarity(original, reconstructed),
        max_error: max_error(original, reconstructed),
        num_elements: original.len(),
    })
}

/// Mean squared error. Zero for empty or mismatched inputs.
pub fn mse(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (x as f64 - y as f64).powi(2))
        .sum();
    sum / a.len() as f64
}

/// `10 log10(peak² / mse)` where `peak` is the largest magnitude in
/// `original`.
pub fn psnr_from_mse(mse: f64, original: &[f32]) -> f64 {
    if mse <= 0.0 {
        return f64::INFINITY;
    }
    let peak = original.iter().fold(0.0f64, |m, v| m.max(v.abs() as f64));
    if peak == 0.0 {
        return 0.0;
    }
    10.0 * (peak * peak / mse).log10()
}

/// Cosine of the angle between `a` and `b`. Two all-zero vectors count as
/// identical; one all-zero vector against a non-zero one gives 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    match (norm_a == 0.0, norm_b == 0.0) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0),
    }
}

/// Largest elementwise absolute difference.
pub fn max_error(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x as f64 - y as f64).abs())
        .fold(0.0, f64::max)
}
