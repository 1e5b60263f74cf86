//! Batch curation: detection, policy and deletion over a folder of images.
//!
//! Files are handled strictly one after another. Every per-file failure is
//! turned into a `failed` decision; only enumeration problems abort a run.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::attributes::AttributePredictor;
use crate::detection::{has_person, normalize, person_boxes};
use crate::domain::{
    AttributeEstimate, CurationConfig, CurationDecision, CurationError, RunProgress, RunSummary,
};
use crate::ports::{ImageStore, ObjectDetector, ProgressEvent, ProgressSink, ResultOutput};

/// Cooperative cancellation signal, checked before each file.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Files already decided keep their decisions.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a curator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run started yet, or the last run failed before processing.
    Idle,
    /// Listing candidate files.
    Enumerating,
    /// Processing the file at this index.
    Processing(usize),
    /// All files processed.
    Completed,
    /// Stopped early on cancellation.
    Cancelled,
}

/// What the pipeline concluded about one image, before deletion is attempted.
struct Verdict {
    has_person: bool,
    delete: bool,
    attributes: Vec<AttributeEstimate>,
}

/// Runs the curation pipeline over the images of a folder.
pub struct BatchCurator {
    detector: Arc<dyn ObjectDetector>,
    predictor: Option<AttributePredictor>,
    store: Arc<dyn ImageStore>,
    config: CurationConfig,
    state: Mutex<RunState>,
}

impl BatchCurator {
    /// Creates a curator without an attribute predictor.
    #[must_use]
    pub fn new(
        detector: Arc<dyn ObjectDetector>,
        store: Arc<dyn ImageStore>,
        config: CurationConfig,
    ) -> Self {
        Self {
            detector,
            predictor: None,
            store,
            config,
            state: Mutex::new(RunState::Idle),
        }
    }

    /// Attaches an attribute predictor, enabling the female-only policy.
    #[must_use]
    pub fn with_attribute_predictor(mut self, predictor: AttributePredictor) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Run configuration.
    #[must_use]
    pub const fn config(&self) -> &CurationConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: RunState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Curates every candidate image under `root`.
    ///
    /// Each decision goes to `output` and, with a [`RunProgress`], to
    /// `progress`. The summary is returned and also emitted as the final
    /// progress event.
    ///
    /// # Errors
    ///
    /// Returns [`CurationError::Enumeration`] if the root cannot be listed.
    /// Per-file failures never abort the run.
    pub fn run(
        &self,
        root: &Path,
        progress: &dyn ProgressSink,
        output: &dyn ResultOutput,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, CurationError> {
        if self.config.only_keep_female && self.predictor.is_none() {
            warn!("Female-only policy requested without an attribute model; ignoring it");
        }

        self.set_state(RunState::Enumerating);
        let files = match self.store.enumerate(root, self.config.include_subfolders) {
            Ok(files) => files,
            Err(e) => {
                self.set_state(RunState::Idle);
                return Err(CurationError::Enumeration(format!("{e:#}")));
            }
        };

        let total = files.len();
        info!("Found {total} images under {}", root.display());
        progress.on_event(ProgressEvent::Enumerated {
            root: root.to_path_buf(),
            total,
        });

        let mut summary = RunSummary::new(total);
        for (index, path) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Run cancelled after {index} of {total} files");
                summary.cancelled = true;
                break;
            }
            self.set_state(RunState::Processing(index));

            let decision = self.process_file(path);
            summary.record(&decision);

            if let Err(e) = output.write(&decision) {
                warn!("Failed to write decision for {}: {e:#}", path.display());
            }
            progress.on_event(ProgressEvent::FileProcessed {
                progress: RunProgress::new(index + 1, total, file_name(path)),
                decision,
            });

            self.pace();
        }

        if let Err(e) = output.flush() {
            warn!("Failed to flush output: {e:#}");
        }
        self.set_state(if summary.cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        });

        info!("{summary}");
        progress.on_event(ProgressEvent::Finished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Processes one file to its decision. Never fails.
    pub fn process_file(&self, path: &Path) -> CurationDecision {
        let shown = path.display().to_string();

        if !self.store.exists(path) {
            debug!("{shown} vanished, skipping");
            return CurationDecision::skipped(shown);
        }

        let verdict = match self.evaluate(path) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("{shown}: {e}");
                return CurationDecision::failed(shown, e);
            }
        };

        if !verdict.delete {
            debug!("{shown}: kept (person: {})", verdict.has_person);
            return CurationDecision::kept(shown, verdict.has_person)
                .with_attributes(verdict.attributes);
        }

        match self.store.delete(path) {
            Ok(()) => {
                info!("Deleted {shown}");
                CurationDecision::deleted(shown, verdict.has_person)
                    .with_attributes(verdict.attributes)
            }
            Err(e) => {
                let error = CurationError::Deletion(format!("{e:#}"));
                warn!("{shown}: {error}");
                CurationDecision::failed(shown, error)
                    .with_person(verdict.has_person)
                    .with_attributes(verdict.attributes)
            }
        }
    }

    fn evaluate(&self, path: &Path) -> Result<Verdict, CurationError> {
        let image = self
            .store
            .decode(path)
            .map_err(|e| CurationError::Decode(format!("{e:#}")))?;

        let records = self
            .detector
            .detect(
                &image,
                self.config.confidence_threshold,
                self.config.iou_threshold,
            )
            .map_err(|e| CurationError::Inference(format!("{e:#}")))?;
        let detections = normalize(&records);
        let has_person = has_person(&detections, self.config.confidence_threshold);
        debug!(
            "{}: {} detections, person: {has_person}",
            path.display(),
            detections.len()
        );

        if !has_person {
            return Ok(Verdict {
                has_person,
                delete: self.config.delete_non_human,
                attributes: Vec::new(),
            });
        }

        let Some(predictor) = self.predictor.as_ref().filter(|_| self.config.only_keep_female)
        else {
            return Ok(Verdict {
                has_person,
                delete: false,
                attributes: Vec::new(),
            });
        };

        let boxes = person_boxes(&detections, self.config.confidence_threshold);
        let attributes = boxes
            .iter()
            .filter_map(|bbox| bbox.pixel_rect(image.width(), image.height()))
            .map(|rect| predict_crop(predictor, &image, rect))
            .collect::<Result<Vec<_>, _>>()?;

        // Without any usable crop there is nothing to judge; keep the image.
        let delete = !attributes.is_empty()
            && !attributes
                .iter()
                .any(|a| a.is_female(self.config.female_threshold));
        Ok(Verdict {
            has_person,
            delete,
            attributes,
        })
    }

    fn pace(&self) {
        if self.config.pacing.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.config.pacing);
        }
    }
}

fn predict_crop(
    predictor: &AttributePredictor,
    image: &DynamicImage,
    (x, y, width, height): (u32, u32, u32, u32),
) -> Result<AttributeEstimate, CurationError> {
    let crop = image.crop_imm(x, y, width, height);
    predictor
        .predict(&crop)
        .map_err(|e| CurationError::Inference(format!("{e:#}")))
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/photos/a.jpg")), "a.jpg");
        assert_eq!(file_name(Path::new("/")), "/");
    }
}
