//! Photo Curator Core - decision pipeline for photo folder curation
//!
//! This crate contains the domain types, the detection normalizer and presence
//! classifier, the attribute predictor adapter, the batch curator, the ports
//! adapters plug into, and the candle-based `YOLOv8` detector.

pub mod attributes;
pub mod curator;
pub mod detection;
pub mod domain;
pub mod inference;
pub mod ports;

pub use attributes::AttributePredictor;
pub use curator::{BatchCurator, CancellationToken, RunState};
pub use domain::{
    AttributeEstimate, BoundingBox, CurationConfig, CurationDecision, CurationError,
    DetectionRecord, FieldValue, NormalizedDetection, Outcome, RunProgress, RunSummary,
};
pub use ports::{
    AttributeEngine, ImageStore, ObjectDetector, ProgressEvent, ProgressSink, RawOutput,
    ResultOutput,
};
