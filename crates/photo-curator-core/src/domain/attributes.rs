//! Face attribute estimates.

use serde::{Deserialize, Serialize};

/// Gender/age estimate for one face crop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeEstimate {
    /// Probability that the face is female, in `[0, 1]`.
    pub female_probability: f32,
    /// Estimated age in years, never negative.
    pub age: f32,
}

impl AttributeEstimate {
    /// Creates an estimate, clamping both fields into their valid ranges.
    #[must_use]
    pub fn new(female_probability: f32, age: f32) -> Self {
        let female_probability = if female_probability.is_finite() {
            female_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let age = if age.is_finite() { age.max(0.0) } else { 0.0 };
        Self {
            female_probability,
            age,
        }
    }

    /// Whether the female probability reaches `threshold`.
    #[must_use]
    pub fn is_female(&self, threshold: f32) -> bool {
        self.female_probability >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_ranges() {
        let est = AttributeEstimate::new(1.5, -3.0);
        assert!((est.female_probability - 1.0).abs() < f32::EPSILON);
        assert!(est.age.abs() < f32::EPSILON);

        let est = AttributeEstimate::new(f32::NAN, f32::INFINITY);
        assert_eq!(est, AttributeEstimate::default());
    }

    #[test]
    fn test_is_female() {
        assert!(AttributeEstimate::new(0.5, 30.0).is_female(0.5));
        assert!(!AttributeEstimate::new(0.49, 30.0).is_female(0.5));
    }
}
