//! Configuration file support for photo-curator.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/photo-curator/config.toml` (lowest priority)
//! - Project-local: `.photo-curator.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

/// File name searched for in the working directory and its parents.
pub const PROJECT_CONFIG_NAME: &str = ".photo-curator.toml";

const INPUT_SIZE_RANGE: std::ops::RangeInclusive<u32> = 16..=1024;
const MAX_PACING_MS: u64 = 60_000;

/// Whether a threshold lies in `0.0..=1.0`. NaN does not.
#[must_use]
pub fn in_unit_range(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Detector settings.
    pub detection: DetectionConfig,
    /// Keep/delete policy.
    pub policy: PolicyConfig,
    /// Attribute predictor settings.
    pub attributes: AttributesConfig,
    /// Model settings.
    pub models: ModelsConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
    /// Run pacing.
    pub run: RunConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Recurse into subdirectories by default.
    pub recursive: Option<bool>,
}

/// Detector configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum detection confidence (0.0-1.0).
    pub confidence_threshold: Option<f32>,
    /// Non-maximum suppression IoU threshold (0.0-1.0).
    pub iou_threshold: Option<f32>,
    /// Try the GPU backend first.
    pub accelerator: Option<bool>,
}

/// Keep/delete policy configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Delete images without a person.
    pub delete_non_human: Option<bool>,
    /// Delete images whose people are all estimated not female.
    pub only_keep_female: Option<bool>,
    /// Female probability threshold (0.0-1.0).
    pub female_threshold: Option<f32>,
}

/// Attribute predictor configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AttributesConfig {
    /// Use the registry attribute model when present.
    pub enabled: Option<bool>,
    /// Square input side in pixels.
    pub input_size: Option<u32>,
    /// Explicit ONNX model path.
    pub model: Option<PathBuf>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "json" or "jsonl".
    pub format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

/// Run configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Delay after each file, in milliseconds.
    pub pacing_ms: Option<u64>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let project = std::env::current_dir()
            .ok()
            .and_then(|cwd| find_config_in_parents(&cwd));
        Self::load_from(xdg_config_path().as_deref(), project.as_deref())
    }

    /// Load and merge the given files, lowest priority first.
    pub fn load_from(xdg: Option<&Path>, project: Option<&Path>) -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = project {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(project_path) {
                config.merge(project_config);
            }
        }

        for problem in config.validate() {
            warn!("{problem}; using the default");
        }
        config.discard_invalid();

        config
    }

    /// Resets every out-of-range value to `None`, so defaults apply instead.
    pub fn discard_invalid(&mut self) {
        for threshold in [
            &mut self.detection.confidence_threshold,
            &mut self.detection.iou_threshold,
            &mut self.policy.female_threshold,
        ] {
            *threshold = threshold.filter(|t| in_unit_range(*t));
        }
        self.attributes.input_size = self
            .attributes
            .input_size
            .filter(|size| INPUT_SIZE_RANGE.contains(size));
        if self
            .output
            .format
            .as_deref()
            .is_some_and(|f| f != "json" && f != "jsonl")
        {
            self.output.format = None;
        }
        self.run.pacing_ms = self.run.pacing_ms.filter(|ms| *ms <= MAX_PACING_MS);
    }

    /// Lists values outside their acceptable ranges.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let unit = [
            ("detection.confidence_threshold", self.detection.confidence_threshold),
            ("detection.iou_threshold", self.detection.iou_threshold),
            ("policy.female_threshold", self.policy.female_threshold),
        ];
        for (key, value) in unit {
            if let Some(t) = value {
                if !in_unit_range(t) {
                    problems.push(format!("{key} must be 0.0-1.0, got {t}"));
                }
            }
        }

        if let Some(size) = self.attributes.input_size {
            if !INPUT_SIZE_RANGE.contains(&size) {
                problems.push(format!("attributes.input_size must be 16-1024, got {size}"));
            }
        }

        if let Some(ref f) = self.output.format {
            if f != "json" && f != "jsonl" {
                problems.push(format!("output.format must be 'json' or 'jsonl', got '{f}'"));
            }
        }

        if let Some(ms) = self.run.pacing_ms {
            if ms > MAX_PACING_MS {
                problems.push(format!("run.pacing_ms must be at most 60000, got {ms}"));
            }
        }

        problems
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        self.detection.confidence_threshold = other
            .detection
            .confidence_threshold
            .or(self.detection.confidence_threshold);
        self.detection.iou_threshold = other.detection.iou_threshold.or(self.detection.iou_threshold);
        self.detection.accelerator = other.detection.accelerator.or(self.detection.accelerator);

        self.policy.delete_non_human = other
            .policy
            .delete_non_human
            .or(self.policy.delete_non_human);
        self.policy.only_keep_female = other
            .policy
            .only_keep_female
            .or(self.policy.only_keep_female);
        self.policy.female_threshold = other
            .policy
            .female_threshold
            .or(self.policy.female_threshold);

        self.attributes.enabled = other.attributes.enabled.or(self.attributes.enabled);
        self.attributes.input_size = other.attributes.input_size.or(self.attributes.input_size);
        self.attributes.model = other.attributes.model.or_else(|| self.attributes.model.take());

        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());

        self.output.format = other.output.format.or_else(|| self.output.format.take());
        self.output.pretty = other.output.pretty.or(self.output.pretty);
        self.output.progress = other.output.progress.or(self.output.progress);

        self.run.pacing_ms = other.run.pacing_ms.or(self.run.pacing_ms);
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("photo-curator").join("config.toml"))
}

/// Search for [`PROJECT_CONFIG_NAME`] in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_NAME))
        .find(|path| path.exists())
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.detection.confidence_threshold.is_none());
        assert!(config.policy.delete_non_human.is_none());
        assert!(config.run.pacing_ms.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r"
[general]
recursive = true

[detection]
confidence_threshold = 0.6
iou_threshold = 0.5
accelerator = true

[policy]
delete_non_human = true
only_keep_female = true
female_threshold = 0.7

[attributes]
enabled = false
input_size = 96
model = '/opt/models/faces.onnx'

[models]
dir = '/opt/models'

[output]
format = 'json'
pretty = true
progress = false

[run]
pacing_ms = 5
";
        let config: AppConfig = toml::from_str(toml).expect("parse full config");

        assert_eq!(config.general.recursive, Some(true));
        assert_eq!(config.detection.confidence_threshold, Some(0.6));
        assert_eq!(config.detection.accelerator, Some(true));
        assert_eq!(config.policy.only_keep_female, Some(true));
        assert_eq!(config.policy.female_threshold, Some(0.7));
        assert_eq!(config.attributes.input_size, Some(96));
        assert_eq!(
            config.attributes.model,
            Some(PathBuf::from("/opt/models/faces.onnx"))
        );
        assert_eq!(config.models.dir, Some(PathBuf::from("/opt/models")));
        assert_eq!(config.output.format, Some("json".to_string()));
        assert_eq!(config.run.pacing_ms, Some(5));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_merge_preserves_base_when_override_is_none() {
        let mut base: AppConfig = toml::from_str(
            r"
[detection]
confidence_threshold = 0.5
iou_threshold = 0.6

[policy]
delete_non_human = true
",
        )
        .expect("parse base");

        let override_config: AppConfig = toml::from_str(
            r"
[detection]
confidence_threshold = 0.8

[output]
format = 'json'
",
        )
        .expect("parse override");

        base.merge(override_config);

        assert_eq!(base.detection.confidence_threshold, Some(0.8));
        assert_eq!(base.detection.iou_threshold, Some(0.6));
        assert_eq!(base.policy.delete_non_human, Some(true));
        assert_eq!(base.output.format, Some("json".to_string()));
    }

    #[test]
    fn test_merge_empty_override_preserves_base() {
        let mut base: AppConfig = toml::from_str("[run]\npacing_ms = 10\n").expect("parse base");
        base.merge(AppConfig::default());
        assert_eq!(base.run.pacing_ms, Some(10));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(toml::from_str::<AppConfig>("[policy\ndelete_non_human = true").is_err());
        assert!(toml::from_str::<AppConfig>("[detection]\niou_threshold = 'high'").is_err());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = AppConfig::default();
        config.detection.confidence_threshold = Some(1.5);
        config.policy.female_threshold = Some(-0.1);
        config.output.format = Some("xml".to_string());
        config.attributes.input_size = Some(4);

        let problems = config.validate();
        assert_eq!(problems.len(), 4);
        assert!(problems[0].contains("detection.confidence_threshold"));
        assert!(problems[1].contains("policy.female_threshold"));
        assert!(problems.iter().any(|p| p.contains("attributes.input_size")));
        assert!(problems.iter().any(|p| p.contains("output.format")));
    }

    #[test]
    fn test_discard_invalid_falls_back_to_defaults() {
        let mut config: AppConfig = toml::from_str(
            r"
[detection]
confidence_threshold = 50.0
iou_threshold = 0.4

[policy]
delete_non_human = true
female_threshold = -1.0

[attributes]
input_size = 4

[output]
format = 'xml'

[run]
pacing_ms = 10
",
        )
        .expect("parse config");

        config.discard_invalid();

        assert!(config.detection.confidence_threshold.is_none());
        assert_eq!(config.detection.iou_threshold, Some(0.4));
        assert!(config.policy.female_threshold.is_none());
        assert_eq!(config.policy.delete_non_human, Some(true));
        assert!(config.attributes.input_size.is_none());
        assert!(config.output.format.is_none());
        assert_eq!(config.run.pacing_ms, Some(10));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_load_from_drops_out_of_range_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join(PROJECT_CONFIG_NAME);
        std::fs::write(
            &project,
            "[detection]\nconfidence_threshold = 50\n[policy]\ndelete_non_human = true\n",
        )
        .unwrap();

        let config = AppConfig::load_from(None, Some(&project));
        assert!(config.detection.confidence_threshold.is_none());
        assert_eq!(config.policy.delete_non_human, Some(true));
    }

    #[test]
    fn test_load_from_layers_project_over_xdg() {
        let dir = tempfile::tempdir().unwrap();
        let xdg = dir.path().join("config.toml");
        let project = dir.path().join(PROJECT_CONFIG_NAME);
        std::fs::write(&xdg, "[general]\nrecursive = true\n[output]\nformat = 'json'\n").unwrap();
        std::fs::write(&project, "[output]\nformat = 'jsonl'\n").unwrap();

        let config = AppConfig::load_from(Some(&xdg), Some(&project));
        assert_eq!(config.general.recursive, Some(true));
        assert_eq!(config.output.format, Some("jsonl".to_string()));
    }

    #[test]
    fn test_load_from_ignores_unparsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join(PROJECT_CONFIG_NAME);
        std::fs::write(&project, "not = [valid").unwrap();

        let config = AppConfig::load_from(None, Some(&project));
        assert!(config.output.format.is_none());
    }

    #[test]
    fn test_find_config_in_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("a").join(PROJECT_CONFIG_NAME), "").unwrap();

        let found = find_config_in_parents(&nested).unwrap();
        assert_eq!(found, dir.path().join("a").join(PROJECT_CONFIG_NAME));
    }
}
