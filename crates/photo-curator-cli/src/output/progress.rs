//! Progress reporting adapter using indicatif.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use photo_curator_core::{CurationDecision, Outcome, ProgressEvent, ProgressSink, RunProgress};

/// Progress bar adapter for CLI output.
///
/// With a bar, each processed file advances it. Without one, deletions and
/// failures are reported as lines on stderr, prefixed with the run's
/// completion percentage.
pub struct ProgressBar {
    bar: Option<IndicatifBar>,
    quiet: bool,
}

impl ProgressBar {
    /// Creates a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, suppress all output
    /// * `show_bar` - If true, show progress bar; otherwise show per-file status
    #[must_use]
    pub fn new(quiet: bool, show_bar: bool) -> Self {
        if quiet {
            return Self {
                bar: None,
                quiet: true,
            };
        }

        let bar = show_bar.then(|| {
            let bar = IndicatifBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] ({eta}) {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        });

        Self { bar, quiet }
    }
}

/// Stderr line for a deleted or failed file; other outcomes stay silent.
fn status_line(progress: &RunProgress, decision: &CurationDecision) -> Option<String> {
    let percent = (progress.fraction() * 100.0).round();
    match decision.outcome {
        Outcome::Deleted => Some(format!("[{percent:>3}%] deleted {}", decision.path)),
        Outcome::Failed => {
            let reason = decision
                .error
                .as_ref()
                .map_or_else(String::new, ToString::to_string);
            Some(format!("[{percent:>3}%] WARN: {}: {reason}", decision.path))
        }
        _ => None,
    }
}

impl ProgressSink for ProgressBar {
    fn on_event(&self, event: ProgressEvent) {
        if self.quiet {
            return;
        }

        match event {
            ProgressEvent::Enumerated { total, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_length(total as u64);
                }
            }
            ProgressEvent::FileProcessed { progress, decision } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(progress.processed as u64);
                    bar.set_message(progress.status());
                } else if let Some(line) = status_line(&progress, &decision) {
                    eprintln!("{line}");
                }
            }
            ProgressEvent::Finished { .. } => {
                if let Some(bar) = &self.bar {
                    bar.finish_and_clear();
                }
            }
        }
    }
}
