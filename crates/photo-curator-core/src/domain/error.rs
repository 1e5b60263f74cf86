//! Error taxonomy of the curation pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while curating.
///
/// `Configuration` and `Enumeration` abort a run before any file is touched;
/// every other variant is caught at the file boundary and recorded in that
/// file's decision.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum CurationError {
    /// A required model is missing or cannot be loaded.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The root folder could not be listed.
    #[error("cannot enumerate images: {0}")]
    Enumeration(String),
    /// The image bytes are corrupt or in an unsupported format.
    #[error("cannot decode image: {0}")]
    Decode(String),
    /// The detector or attribute predictor failed.
    #[error("inference failed: {0}")]
    Inference(String),
    /// The filesystem refused the deletion.
    #[error("cannot delete file: {0}")]
    Deletion(String),
}

impl CurationError {
    /// Whether the error stops the whole run rather than a single file.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Enumeration(_))
    }
}
