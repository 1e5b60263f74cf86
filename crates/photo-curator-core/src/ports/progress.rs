//! Progress reporting port for UI integration.

use std::path::PathBuf;

use crate::domain::{CurationDecision, RunProgress, RunSummary};

/// Events emitted during a curation run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Candidate files have been enumerated.
    Enumerated {
        /// Root that was scanned.
        root: PathBuf,
        /// Number of candidate files.
        total: usize,
    },
    /// A file reached its decision.
    FileProcessed {
        /// Progress after this file.
        progress: RunProgress,
        /// The decision for the file.
        decision: CurationDecision,
    },
    /// The run has ended, either completed or cancelled.
    Finished {
        /// Aggregate of the run.
        summary: RunSummary,
    },
}

/// Port for receiving progress events.
pub trait ProgressSink: Send + Sync {
    /// Called when a progress event occurs.
    fn on_event(&self, event: ProgressEvent);
}
