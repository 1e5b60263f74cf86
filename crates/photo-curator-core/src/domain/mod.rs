//! Core domain types for photo curation.

mod attributes;
mod config;
mod decision;
mod detection;
mod error;

pub use attributes::AttributeEstimate;
pub use config::{
    CurationConfig, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_FEMALE_THRESHOLD, DEFAULT_IOU_THRESHOLD,
};
pub use decision::{CurationDecision, Outcome, RunProgress, RunSummary};
pub use detection::{
    canonical_field_name, BoundingBox, DetectionRecord, FieldValue, NormalizedDetection,
};
pub use error::CurationError;
