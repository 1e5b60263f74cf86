//! Face attribute prediction on top of an [`AttributeEngine`].
//!
//! Attribute models do not agree on output names or ordering, so outputs are
//! recognised by shape:
//!
//! - two values for one batch element are gender logits (index 1 = female),
//! - one value is the age,
//! - any other single-batch output falls back to "first value is the age".
//!
//! A missing kind leaves its field at zero.

use std::sync::Arc;

use anyhow::{Context, Result};
use candle_core::Device;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::domain::AttributeEstimate;
use crate::inference::{rgb_to_tensor, softmax};
use crate::ports::{AttributeEngine, RawOutput};

/// Default square input resolution.
pub const DEFAULT_INPUT_SIZE: u32 = 112;

/// Runs face crops through an attribute engine and interprets its outputs.
#[derive(Clone)]
pub struct AttributePredictor {
    engine: Arc<dyn AttributeEngine>,
    input_size: u32,
}

impl std::fmt::Debug for AttributePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributePredictor")
            .field("engine", &self.engine.name())
            .field("input_size", &self.input_size)
            .finish()
    }
}

impl AttributePredictor {
    /// Creates a predictor with the default 112×112 input.
    #[must_use]
    pub fn new(engine: Arc<dyn AttributeEngine>) -> Self {
        Self {
            engine,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }

    /// Overrides the square input resolution.
    #[must_use]
    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size.max(1);
        self
    }

    /// Input resolution in pixels.
    #[must_use]
    pub const fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Predicts attributes for one face crop.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or the engine fails. Unrecognised
    /// outputs are not an error.
    pub fn predict(&self, face: &DynamicImage) -> Result<AttributeEstimate> {
        let resized = face
            .resize_exact(self.input_size, self.input_size, FilterType::Lanczos3)
            .to_rgb8();
        let input = rgb_to_tensor(&resized, &Device::Cpu)?;

        let outputs = self
            .engine
            .infer(&input)
            .with_context(|| format!("Attribute engine '{}' failed", self.engine.name()))?;
        let estimate = interpret_outputs(&outputs);
        debug!(
            "female={:.3} age={:.1}",
            estimate.female_probability, estimate.age
        );
        Ok(estimate)
    }
}

/// Interprets raw engine outputs into an estimate.
#[must_use]
pub fn interpret_outputs(outputs: &[RawOutput]) -> AttributeEstimate {
    let mut gender: Option<&[f32]> = None;
    let mut age: Option<f32> = None;
    let mut fallback_age: Option<f32> = None;

    for output in outputs.iter().filter(|o| o.is_single_batch()) {
        match output.data.len() {
            0 => {}
            1 => {
                age.get_or_insert(output.data[0]);
            }
            2 => {
                gender.get_or_insert(&output.data);
            }
            _ => {
                fallback_age.get_or_insert(output.data[0]);
            }
        }
    }

    let female_probability = gender.map_or(0.0, |logits| softmax(logits)[1]);
    AttributeEstimate::new(female_probability, age.or(fallback_age).unwrap_or(0.0))
}
