//! Run configuration for the curation pipeline.

use std::time::Duration;

/// Minimum detector confidence; also the presence threshold.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.50;
/// IoU above which overlapping detections are suppressed.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.70;
/// Female probability at which a face counts as female.
pub const DEFAULT_FEMALE_THRESHOLD: f32 = 0.5;

/// Settings for one curation run.
#[derive(Debug, Clone, PartialEq)]
pub struct CurationConfig {
    /// Try the GPU backend first, falling back to CPU.
    pub use_accelerator: bool,
    /// Recurse into subfolders when enumerating.
    pub include_subfolders: bool,
    /// Delete images without a person.
    pub delete_non_human: bool,
    /// Delete images whose people are all estimated not female.
    /// Needs an attribute predictor; inert without one.
    pub only_keep_female: bool,
    /// Detector confidence threshold.
    pub confidence_threshold: f32,
    /// Detector IoU (non-maximum suppression) threshold.
    pub iou_threshold: f32,
    /// Female probability threshold used by `only_keep_female`.
    pub female_threshold: f32,
    /// Delay after each file. Zero only yields the thread.
    pub pacing: Duration,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            use_accelerator: false,
            include_subfolders: false,
            delete_non_human: false,
            only_keep_female: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            female_threshold: DEFAULT_FEMALE_THRESHOLD,
            pacing: Duration::ZERO,
        }
    }
}

impl CurationConfig {
    /// Enables or disables deletion of images without people.
    #[must_use]
    pub const fn with_delete_non_human(mut self, enabled: bool) -> Self {
        self.delete_non_human = enabled;
        self
    }

    /// Enables or disables recursion into subfolders.
    #[must_use]
    pub const fn with_subfolders(mut self, enabled: bool) -> Self {
        self.include_subfolders = enabled;
        self
    }

    /// Enables or disables the female-only policy.
    #[must_use]
    pub const fn with_only_keep_female(mut self, enabled: bool) -> Self {
        self.only_keep_female = enabled;
        self
    }

    /// Sets the detector confidence threshold.
    #[must_use]
    pub const fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Sets the delay after each file.
    #[must_use]
    pub const fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CurationConfig::default();
        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.7).abs() < f32::EPSILON);
        assert!(!config.delete_non_human);
        assert!(!config.only_keep_female);
        assert!(config.pacing.is_zero());
    }

    #[test]
    fn test_builders() {
        let config = CurationConfig::default()
            .with_delete_non_human(true)
            .with_subfolders(true)
            .with_confidence_threshold(0.25);
        assert!(config.delete_non_human);
        assert!(config.include_subfolders);
        assert!((config.confidence_threshold - 0.25).abs() < f32::EPSILON);
    }
}
