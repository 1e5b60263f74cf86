//! Run command - curate a folder of photos.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use photo_curator_adapters::{
    find_detector_in, model_path, models_dir, set_models_dir, FsImageStore, ModelInfo,
    TractAttributeEngine,
};
use photo_curator_core::attributes::DEFAULT_INPUT_SIZE;
use photo_curator_core::domain::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_FEMALE_THRESHOLD, DEFAULT_IOU_THRESHOLD,
};
use photo_curator_core::inference::{backend_name, select_device, YoloDetector, YoloSize};
use photo_curator_core::{
    AttributePredictor, BatchCurator, CancellationToken, CurationConfig, CurationError,
    RunSummary,
};
use tracing::{debug, info, warn};

use super::ExitCode;
use crate::config::{in_unit_range, AppConfig};
use crate::output::{JsonOutput, ProgressBar};

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON Lines (one JSON object per line)
    #[default]
    Jsonl,
    /// Single JSON array
    Json,
}

/// Parse and validate a threshold value (0.0-1.0).
fn parse_threshold(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0.0..=1.0"))
    }
}

/// Shared arguments for a curation run.
#[derive(Args, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Folder (or single image) to curate
    pub root: Option<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Delete images without a person
    #[arg(long)]
    pub delete: bool,

    /// Delete images whose people are all estimated not female
    #[arg(long)]
    pub only_female: bool,

    /// Detector confidence threshold (0.0-1.0)
    #[arg(long, value_parser = parse_threshold)]
    pub confidence: Option<f32>,

    /// Non-maximum suppression IoU threshold (0.0-1.0)
    #[arg(long, value_parser = parse_threshold)]
    pub iou: Option<f32>,

    /// Try the GPU backend first, falling back to CPU
    #[arg(long)]
    pub gpu: bool,

    /// ONNX face attribute model (enables --only-female)
    #[arg(long, value_name = "PATH")]
    pub attribute_model: Option<PathBuf>,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress and summary output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output (only affects --format json)
    #[arg(long)]
    pub pretty: bool,

    /// Models directory (populated by `with_config`, not from this struct's flags).
    #[arg(skip)]
    pub models_dir: Option<PathBuf>,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: AppConfig,
}

impl RunArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    ///
    /// Boolean flags can only be switched on from the command line, so a
    /// config `true` applies whenever the flag was not passed.
    pub fn with_config(mut args: Self, config: &AppConfig, models_dir: Option<PathBuf>) -> Self {
        args.recursive |= config.general.recursive.unwrap_or(false);
        args.delete |= config.policy.delete_non_human.unwrap_or(false);
        args.only_female |= config.policy.only_keep_female.unwrap_or(false);
        args.gpu |= config.detection.accelerator.unwrap_or(false);

        // Out-of-range file values fall back to the defaults
        args.confidence = args
            .confidence
            .or(config.detection.confidence_threshold.filter(|t| in_unit_range(*t)));
        args.iou = args
            .iou
            .or(config.detection.iou_threshold.filter(|t| in_unit_range(*t)));
        args.attribute_model = args
            .attribute_model
            .or_else(|| config.attributes.model.clone());

        if args.format.is_none() {
            args.format = config
                .output
                .format
                .as_deref()
                .and_then(|s| OutputFormat::from_str(s, true).ok());
        }
        args.pretty |= config.output.pretty.unwrap_or(false);
        args.progress |= config.output.progress.unwrap_or(false);

        args.models_dir = models_dir.or_else(|| config.models.dir.clone());
        args.config = config.clone();
        args
    }

    fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    fn female_threshold(&self) -> f32 {
        self.config
            .policy
            .female_threshold
            .filter(|t| in_unit_range(*t))
            .unwrap_or(DEFAULT_FEMALE_THRESHOLD)
    }

    fn attribute_input_size(&self) -> u32 {
        self.config
            .attributes
            .input_size
            .unwrap_or(DEFAULT_INPUT_SIZE)
    }

    fn pacing(&self) -> Duration {
        Duration::from_millis(self.config.run.pacing_ms.unwrap_or(0))
    }

    /// Builds the core run configuration.
    pub fn curation_config(&self) -> CurationConfig {
        CurationConfig {
            use_accelerator: self.gpu,
            include_subfolders: self.recursive,
            delete_non_human: self.delete,
            only_keep_female: self.only_female,
            confidence_threshold: self.confidence.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: self.iou.unwrap_or(DEFAULT_IOU_THRESHOLD),
            female_threshold: self.female_threshold(),
            pacing: self.pacing(),
        }
    }
}

/// Run the curation command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &RunArgs) -> Result<(RunSummary, ExitCode)> {
    let root = args
        .root
        .as_ref()
        .context("No root folder specified. Use --help for usage information.")?;
    anyhow::ensure!(root.exists(), "Path does not exist: {}", root.display());

    if let Some(ref dir) = args.models_dir {
        debug!("Using custom models directory: {}", dir.display());
        set_models_dir(dir.clone());
    }

    let config = args.curation_config();
    let (model, detector) = load_detector(&models_dir(), config.use_accelerator)?;
    info!("Detector: {}", model.name);

    let mut curator = BatchCurator::new(Arc::new(detector), Arc::new(FsImageStore::new()), config);
    if args.only_female {
        if let Some(predictor) = build_predictor(args) {
            curator = curator.with_attribute_predictor(predictor);
        }
    }

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress = ProgressBar::new(args.quiet, show_progress);
    let output = JsonOutput::stdout(args.format(), args.pretty);

    let summary = curator.run(root, &progress, &output, &CancellationToken::new())?;

    if !args.quiet {
        eprintln!("{summary}");
    }

    let exit_code = if summary.failed > 0 {
        ExitCode::FilesFailed
    } else {
        ExitCode::Success
    };
    Ok((summary, exit_code))
}

/// Finds and loads the first installed detector in `dir`.
///
/// # Errors
///
/// Returns [`CurationError::Configuration`] when no detector is installed
/// or the installed one cannot be loaded.
fn load_detector(
    dir: &Path,
    use_accelerator: bool,
) -> Result<(&'static ModelInfo, YoloDetector), CurationError> {
    let (model, path) = find_detector_in(dir).ok_or_else(|| {
        CurationError::Configuration(format!(
            "No detector model found in {}. Run `photo-curator models fetch`.",
            dir.display()
        ))
    })?;
    let size = YoloSize::from_file_name(&path).ok_or_else(|| {
        CurationError::Configuration(format!(
            "Cannot tell the YOLOv8 size of {}",
            path.display()
        ))
    })?;

    let device = select_device(use_accelerator);
    info!("Inference backend: {}", backend_name(&device));
    let detector = YoloDetector::load(&path, size, device).map_err(|e| {
        CurationError::Configuration(format!("Failed to load detector {}: {e:#}", model.name))
    })?;
    debug!("Detector weights: {}", path.display());
    Ok((model, detector))
}

/// Loads the attribute predictor, degrading to detection-only on failure.
///
/// An explicit model path wins over the registry model, which is only used
/// when `[attributes] enabled` is not false.
fn build_predictor(args: &RunArgs) -> Option<AttributePredictor> {
    let path = args.attribute_model.clone().or_else(|| {
        if args.config.attributes.enabled == Some(false) {
            return None;
        }
        model_path("attributes").filter(|p| p.is_file())
    });
    let Some(path) = path else {
        info!("No attribute model found");
        return None;
    };

    let input_size = args.attribute_input_size();
    match TractAttributeEngine::load(&path, input_size) {
        Ok(engine) => Some(AttributePredictor::new(Arc::new(engine)).with_input_size(input_size)),
        Err(e) => {
            warn!("Attribute model unavailable, continuing with detection only: {e:#}");
            None
        }
    }
}
