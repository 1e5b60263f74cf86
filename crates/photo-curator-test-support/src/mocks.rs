//! Mock implementations of core port traits.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, bail, Result};
use candle_core::{IndexOp, Tensor};
use image::DynamicImage;
use serde_json::{json, Value};

use photo_curator_core::domain::{CurationDecision, DetectionRecord, RunSummary};
use photo_curator_core::ports::{
    AttributeEngine, ImageStore, ObjectDetector, ProgressEvent, ProgressSink, RawOutput,
    ResultOutput,
};

type DetectFn = dyn Fn(&DynamicImage) -> Result<Vec<Value>> + Send + Sync;
type InferFn = dyn Fn(&Tensor) -> Result<Vec<RawOutput>> + Send + Sync;

/// Mock implementation of `ObjectDetector` for testing.
///
/// Produces JSON detection records from a closure and counts calls.
pub struct MockDetector {
    detect_fn: Box<DetectFn>,
    calls: Mutex<usize>,
}

impl MockDetector {
    /// Creates a detector from a closure.
    pub fn new(f: impl Fn(&DynamicImage) -> Result<Vec<Value>> + Send + Sync + 'static) -> Self {
        Self {
            detect_fn: Box::new(f),
            calls: Mutex::new(0),
        }
    }

    /// Always returns the same records.
    #[must_use]
    pub fn always(records: Vec<Value>) -> Self {
        Self::new(move |_| Ok(records.clone()))
    }

    /// Never detects anything.
    #[must_use]
    pub fn empty() -> Self {
        Self::always(Vec::new())
    }

    /// Always fails.
    #[must_use]
    pub fn failing(message: &'static str) -> Self {
        Self::new(move |_| Err(anyhow!(message)))
    }

    /// Reports a full-frame person (score 0.9) when the center pixel is
    /// red-dominant, nothing otherwise.
    #[must_use]
    pub fn red_means_person() -> Self {
        Self::new(|image| {
            let rgb = image.to_rgb8();
            let (w, h) = rgb.dimensions();
            if w == 0 || h == 0 {
                return Ok(Vec::new());
            }
            let [r, g, b] = rgb.get_pixel(w / 2, h / 2).0;
            if r > 128 && b < 128 && r > g / 2 {
                Ok(vec![json!({
                    "label": "person",
                    "score": 0.9,
                    "bbox": [0.0, 0.0, w, h],
                })])
            } else {
                Ok(Vec::new())
            }
        })
    }

    /// Number of `detect` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectDetector for MockDetector {
    fn name(&self) -> &str {
        "mock"
    }

    fn detect(
        &self,
        image: &DynamicImage,
        _confidence: f32,
        _iou: f32,
    ) -> Result<Vec<Box<dyn DetectionRecord>>> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        let records = (self.detect_fn)(image)?;
        Ok(records
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn DetectionRecord>)
            .collect())
    }
}

/// Mock implementation of `AttributeEngine` for testing.
pub struct MockAttributeEngine {
    infer_fn: Box<InferFn>,
    input_dims: Mutex<Vec<Vec<usize>>>,
}

impl MockAttributeEngine {
    /// Creates an engine from a closure.
    pub fn new(
        f: impl Fn(&Tensor) -> Result<Vec<RawOutput>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            infer_fn: Box::new(f),
            input_dims: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the same outputs.
    #[must_use]
    pub fn with_outputs(outputs: Vec<RawOutput>) -> Self {
        Self::new(move |_| Ok(outputs.clone()))
    }

    /// Always fails.
    #[must_use]
    pub fn failing(message: &'static str) -> Self {
        Self::new(move |_| Err(anyhow!(message)))
    }

    /// Female (logits `[-4, 4]`) when the mean green channel exceeds 0.5,
    /// male (`[4, -4]`) otherwise; age output fixed at 30.
    #[must_use]
    pub fn green_means_female() -> Self {
        Self::new(|input| {
            let green = input.i((0, 1))?.mean_all()?.to_scalar::<f32>()?;
            let logits = if green > 0.5 {
                vec![-4.0, 4.0]
            } else {
                vec![4.0, -4.0]
            };
            Ok(vec![
                RawOutput::new("gender", vec![1, 2], logits),
                RawOutput::new("age", vec![1, 1], vec![30.0]),
            ])
        })
    }

    /// Shapes of every input seen so far.
    #[must_use]
    pub fn input_dims(&self) -> Vec<Vec<usize>> {
        self.input_dims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AttributeEngine for MockAttributeEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn infer(&self, input: &Tensor) -> Result<Vec<RawOutput>> {
        self.input_dims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(input.dims().to_vec());
        (self.infer_fn)(input)
    }
}

#[derive(Clone)]
enum Entry {
    Image(DynamicImage),
    Corrupt,
    Vanished,
    Locked(DynamicImage),
}

/// In-memory implementation of `ImageStore` for testing.
///
/// Paths are kept sorted. Deletions remove entries and are recorded.
#[derive(Default)]
pub struct MockImageStore {
    entries: Mutex<BTreeMap<PathBuf, Entry>>,
    deleted: Mutex<Vec<PathBuf>>,
    fail_enumeration: bool,
}

impl MockImageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entry(self, path: impl Into<PathBuf>, entry: Entry) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), entry);
        self
    }

    /// Adds a decodable image.
    #[must_use]
    pub fn with_image(self, path: impl Into<PathBuf>, image: DynamicImage) -> Self {
        self.with_entry(path, Entry::Image(image))
    }

    /// Adds a file that fails to decode.
    #[must_use]
    pub fn with_corrupt(self, path: impl Into<PathBuf>) -> Self {
        self.with_entry(path, Entry::Corrupt)
    }

    /// Adds a file that is enumerated but gone by the time it is processed.
    #[must_use]
    pub fn with_vanished(self, path: impl Into<PathBuf>) -> Self {
        self.with_entry(path, Entry::Vanished)
    }

    /// Adds a decodable image that refuses deletion.
    #[must_use]
    pub fn with_locked(self, path: impl Into<PathBuf>, image: DynamicImage) -> Self {
        self.with_entry(path, Entry::Locked(image))
    }

    /// Makes `enumerate` fail.
    #[must_use]
    pub fn failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    /// Paths deleted so far, in order.
    #[must_use]
    pub fn deleted(&self) -> Vec<PathBuf> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of files still present.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| !matches!(e, Entry::Vanished))
            .count()
    }

    fn entry(&self, path: &Path) -> Option<Entry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

impl ImageStore for MockImageStore {
    fn enumerate(&self, root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        if self.fail_enumeration {
            bail!("Root not found: {}", root.display());
        }
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut seen = BTreeSet::new();
        Ok(entries
            .keys()
            .filter(|p| {
                if recursive {
                    p.starts_with(root)
                } else {
                    p.parent() == Some(root)
                }
            })
            .filter(|p| seen.insert(p.to_string_lossy().to_lowercase()))
            .cloned()
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        matches!(
            self.entry(path),
            Some(Entry::Image(_) | Entry::Corrupt | Entry::Locked(_))
        )
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        match self.entry(path) {
            Some(Entry::Image(img) | Entry::Locked(img)) => Ok(img),
            Some(Entry::Corrupt) => bail!("Invalid image data in {}", path.display()),
            Some(Entry::Vanished) | None => bail!("No such file: {}", path.display()),
        }
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(path) {
            Some(Entry::Locked(_)) => bail!("Permission denied: {}", path.display()),
            Some(Entry::Vanished) | None => bail!("No such file: {}", path.display()),
            Some(_) => {
                entries.remove(path);
                self.deleted
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(path.to_path_buf());
                Ok(())
            }
        }
    }
}

/// Mock implementation of `ResultOutput` for testing.
///
/// Captures decisions for later assertions.
pub struct MockResultOutput {
    decisions: Arc<Mutex<Vec<CurationDecision>>>,
    flush_count: Arc<Mutex<usize>>,
}

impl MockResultOutput {
    /// Creates a new mock output.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decisions: Arc::new(Mutex::new(Vec::new())),
            flush_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Returns all captured decisions.
    #[must_use]
    pub fn decisions(&self) -> Vec<CurationDecision> {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of times `flush()` was called.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        *self
            .flush_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockResultOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultOutput for MockResultOutput {
    fn write(&self, decision: &CurationDecision) -> Result<()> {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Ok(mut c) = self.flush_count.lock() {
            *c += 1;
        }
        Ok(())
    }
}

/// Mock implementation of `ProgressSink` for testing.
///
/// Captures events for later assertions.
pub struct MockProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MockProgressSink {
    /// Creates a new mock progress sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the total from the `Enumerated` event, if any.
    #[must_use]
    pub fn enumerated_total(&self) -> Option<usize> {
        self.events().iter().find_map(|e| match e {
            ProgressEvent::Enumerated { total, .. } => Some(*total),
            _ => None,
        })
    }

    /// Returns `(processed, total)` of every `FileProcessed` event, in order.
    #[must_use]
    pub fn progress_counts(&self) -> Vec<(usize, usize)> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::FileProcessed { progress, .. } => {
                    Some((progress.processed, progress.total))
                }
                _ => None,
            })
            .collect()
    }

    /// Returns the summary from the `Finished` event, if any.
    #[must_use]
    pub fn summary(&self) -> Option<RunSummary> {
        self.events().into_iter().find_map(|e| match e {
            ProgressEvent::Finished { summary } => Some(summary),
            _ => None,
        })
    }
}

impl Default for MockProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for MockProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
