//! Per-file decisions, run progress and run summaries.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AttributeEstimate, CurationError};

/// What happened to one file.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Processed and left in place.
    Kept,
    /// Processed and deleted.
    Deleted,
    /// Vanished between enumeration and processing.
    Skipped,
    /// Processing or deletion failed; the file was left in place.
    Failed,
}

/// The recorded outcome for one file. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationDecision {
    /// Path of the file.
    pub path: String,
    /// Time the decision was made (RFC 3339).
    pub timestamp: String,
    /// Overall outcome.
    pub outcome: Outcome,
    /// Whether a person was detected.
    pub has_person: bool,
    /// Whether the file was deleted.
    pub deleted: bool,
    /// Attribute estimates, one per person crop; empty when the predictor did not run.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attributes: Vec<AttributeEstimate>,
    /// Error that caused a `failed` outcome.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<CurationError>,
}

impl CurationDecision {
    fn new(path: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            path: path.into(),
            timestamp: iso_timestamp(),
            outcome,
            has_person: false,
            deleted: outcome == Outcome::Deleted,
            attributes: Vec::new(),
            error: None,
        }
    }

    /// File was processed and kept.
    #[must_use]
    pub fn kept(path: impl Into<String>, has_person: bool) -> Self {
        Self::new(path, Outcome::Kept).with_person(has_person)
    }

    /// File was processed and deleted.
    #[must_use]
    pub fn deleted(path: impl Into<String>, has_person: bool) -> Self {
        Self::new(path, Outcome::Deleted).with_person(has_person)
    }

    /// File disappeared before it could be processed.
    #[must_use]
    pub fn skipped(path: impl Into<String>) -> Self {
        Self::new(path, Outcome::Skipped)
    }

    /// File could not be processed or deleted.
    #[must_use]
    pub fn failed(path: impl Into<String>, error: CurationError) -> Self {
        let mut decision = Self::new(path, Outcome::Failed);
        decision.error = Some(error);
        decision
    }

    /// Sets the person flag.
    #[must_use]
    pub const fn with_person(mut self, has_person: bool) -> Self {
        self.has_person = has_person;
        self
    }

    /// Attaches attribute estimates.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<AttributeEstimate>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Progress after one file, emitted whatever the file's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunProgress {
    /// Files processed so far, including this one.
    pub processed: usize,
    /// Files enumerated for the run.
    pub total: usize,
    /// Name of the file just processed.
    pub current_file: String,
}

impl RunProgress {
    /// Creates a progress snapshot.
    #[must_use]
    pub fn new(processed: usize, total: usize, current_file: impl Into<String>) -> Self {
        Self {
            processed,
            total,
            current_file: current_file.into(),
        }
    }

    /// Completed fraction in `[0, 1]`. An empty run counts as complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    /// Human-readable status line.
    #[must_use]
    pub fn status(&self) -> String {
        format!(
            "Processed {}/{}: {}",
            self.processed, self.total, self.current_file
        )
    }
}

/// Aggregate of all decisions of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Files enumerated.
    pub total_files: usize,
    /// Files that reached a decision.
    pub processed: usize,
    /// Files deleted.
    pub deleted: usize,
    /// Files that vanished before processing.
    pub skipped: usize,
    /// Files whose processing or deletion failed.
    pub failed: usize,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

impl RunSummary {
    /// Creates an empty summary for `total_files` candidates.
    #[must_use]
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    /// Folds one decision into the summary.
    pub fn record(&mut self, decision: &CurationDecision) {
        self.processed += 1;
        match decision.outcome {
            Outcome::Deleted => self.deleted += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Kept => {}
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total files: {}, deleted: {}",
            self.total_files, self.deleted
        )?;
        if self.failed > 0 {
            write!(f, ", failed: {}", self.failed)?;
        }
        if self.skipped > 0 {
            write!(f, ", skipped: {}", self.skipped)?;
        }
        if self.cancelled {
            write!(f, " (cancelled after {} files)", self.processed)?;
        }
        Ok(())
    }
}

/// ISO 8601 UTC timestamp (RFC 3339).
fn iso_timestamp() -> String {
    match time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339) {
        Ok(ts) => ts,
        Err(e) => {
            debug!("Timestamp format failed: {e}");
            String::from("1970-01-01T00:00:00Z")
        }
    }
}
