//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the curation core and external adapters.

mod detector;
mod image_store;
mod progress;
mod result_output;

pub use detector::{AttributeEngine, ObjectDetector, RawOutput};
pub use image_store::ImageStore;
pub use progress::{ProgressEvent, ProgressSink};
pub use result_output::ResultOutput;
