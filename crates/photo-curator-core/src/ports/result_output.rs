//! Result output port for writing curation decisions.

use crate::domain::CurationDecision;

/// Port for outputting per-file decisions.
pub trait ResultOutput: Send + Sync {
    /// Writes a single decision.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write(&self, decision: &CurationDecision) -> anyhow::Result<()>;

    /// Flushes any buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&self) -> anyhow::Result<()>;
}
