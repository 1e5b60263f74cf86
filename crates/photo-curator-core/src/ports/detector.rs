//! Inference engine ports.

use candle_core::Tensor;
use image::DynamicImage;

use crate::domain::DetectionRecord;

/// Port for an object detector.
///
/// Implementations are shared read-only across a run.
pub trait ObjectDetector: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Detects objects in an image.
    ///
    /// `confidence` is the minimum score a result must have and `iou` the
    /// overlap above which lower-scored boxes of the same class are suppressed.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect(
        &self,
        image: &DynamicImage,
        confidence: f32,
        iou: f32,
    ) -> anyhow::Result<Vec<Box<dyn DetectionRecord>>>;
}

/// One named output of an attribute model.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    /// Output name as declared by the model.
    pub name: String,
    /// Output shape.
    pub shape: Vec<usize>,
    /// Row-major output values.
    pub data: Vec<f32>,
}

impl RawOutput {
    /// Creates an output.
    #[must_use]
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
        }
    }

    /// True when the output holds a single batch element: rank ≤ 1 or a
    /// leading dimension of 1.
    #[must_use]
    pub fn is_single_batch(&self) -> bool {
        self.shape.len() <= 1 || self.shape[0] == 1
    }
}

/// Port for the face attribute inference runtime.
pub trait AttributeEngine: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Runs the model on a `(1, 3, H, W)` f32 input and returns every output.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn infer(&self, input: &Tensor) -> anyhow::Result<Vec<RawOutput>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_batch_detection() {
        assert!(RawOutput::new("a", vec![], vec![1.0]).is_single_batch());
        assert!(RawOutput::new("a", vec![2], vec![1.0, 2.0]).is_single_batch());
        assert!(RawOutput::new("a", vec![1, 2], vec![1.0, 2.0]).is_single_batch());
        assert!(!RawOutput::new("a", vec![2, 2], vec![0.0; 4]).is_single_batch());
    }
}
