//! Shared inference utilities.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use image::RgbImage;

/// Numerically stable softmax.
///
/// The maximum is subtracted before exponentiation. A zero or non-finite sum
/// yields all zeros instead of NaNs.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    if sum > 0.0 && sum.is_finite() {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

/// Converts an RGB image to a `(1, 3, H, W)` f32 tensor scaled to `[0, 1]`.
///
/// # Errors
///
/// Returns an error if tensor creation fails.
pub fn rgb_to_tensor(image: &RgbImage, device: &Device) -> Result<Tensor> {
    let (width, height) = image.dimensions();
    let data = image.as_raw().clone();

    Tensor::from_vec(data, (height as usize, width as usize, 3), device)?
        .permute((2, 0, 1))?
        .unsqueeze(0)?
        .to_dtype(DType::F32)
        .and_then(|t| t * (1.0 / 255.0))
        .context("Failed to convert image to tensor")
}
