//! Presence classification: is a human in the picture?

use crate::domain::{BoundingBox, NormalizedDetection};

/// Label signalling a human subject.
pub const PERSON_LABEL: &str = "person";

/// True iff some detection is labelled person (any case) with a score of at
/// least `min_score`.
#[must_use]
pub fn has_person(detections: &[NormalizedDetection], min_score: f32) -> bool {
    detections
        .iter()
        .any(|d| d.has_label(PERSON_LABEL) && d.score >= min_score)
}

/// Boxes of the person detections scoring at least `min_score`.
#[must_use]
pub fn person_boxes(detections: &[NormalizedDetection], min_score: f32) -> Vec<BoundingBox> {
    detections
        .iter()
        .filter(|d| d.has_label(PERSON_LABEL) && d.score >= min_score)
        .filter_map(|d| d.bbox)
        .collect()
}
