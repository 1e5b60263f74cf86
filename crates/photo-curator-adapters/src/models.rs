//! Model registry: where model files live, and how to fetch them.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// What a model is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// YOLOv8 object detector weights (safetensors).
    Detector,
    /// Face attribute network (ONNX).
    Attributes,
}

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// Download URL, if the model is publicly fetchable.
    pub url: Option<&'static str>,
    /// Expected SHA256 hash. `None` skips verification.
    pub sha256: Option<&'static str>,
    /// Filename in models directory.
    pub filename: &'static str,
    /// What the model is used for.
    pub kind: ModelKind,
    /// One-line description for `models list`.
    pub description: &'static str,
}

/// Known models, detectors in order of preference.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "yolov8n",
        url: Some("https://huggingface.co/lmz/candle-yolo-v8/resolve/main/yolov8n.safetensors"),
        sha256: None,
        filename: "yolov8n.safetensors",
        kind: ModelKind::Detector,
        description: "YOLOv8 nano detector",
    },
    ModelInfo {
        name: "yolov8s",
        url: Some("https://huggingface.co/lmz/candle-yolo-v8/resolve/main/yolov8s.safetensors"),
        sha256: None,
        filename: "yolov8s.safetensors",
        kind: ModelKind::Detector,
        description: "YOLOv8 small detector",
    },
    ModelInfo {
        name: "yolov8m",
        url: Some("https://huggingface.co/lmz/candle-yolo-v8/resolve/main/yolov8m.safetensors"),
        sha256: None,
        filename: "yolov8m.safetensors",
        kind: ModelKind::Detector,
        description: "YOLOv8 medium detector",
    },
    ModelInfo {
        name: "attributes",
        url: None,
        sha256: None,
        filename: "attributes.onnx",
        kind: ModelKind::Attributes,
        description: "Face age/gender network (user supplied)",
    },
];

/// Model fetched by `models fetch` without arguments.
pub const DEFAULT_DETECTOR: &str = "yolov8n";

/// Download progress callback: `(model name, bytes so far, total bytes)`.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

static MODELS_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Overrides the models directory for the rest of the process.
pub fn set_models_dir(dir: impl Into<PathBuf>) {
    let dir = dir.into();
    debug!("Models directory set to {}", dir.display());
    *MODELS_DIR_OVERRIDE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(dir);
}

/// Returns the models directory path.
///
/// The directory set by [`set_models_dir`] if any, otherwise
/// `XDG_DATA_HOME/photo-curator/models` or `~/.local/share/photo-curator/models`.
#[must_use]
pub fn models_dir() -> PathBuf {
    if let Some(dir) = MODELS_DIR_OVERRIDE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
    {
        return dir;
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photo-curator")
        .join("models")
}

/// Looks up a registry entry by name.
#[must_use]
pub fn model_info(name: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.name == name)
}

/// Returns the path to a specific model file.
#[must_use]
pub fn model_path(name: &str) -> Option<PathBuf> {
    model_info(name).map(|m| models_dir().join(m.filename))
}

/// Lists registry models with their installed status.
#[must_use]
pub fn list_models() -> Vec<(&'static ModelInfo, bool)> {
    list_models_in(&models_dir())
}

/// Lists registry models with their installed status in `dir`.
#[must_use]
pub fn list_models_in(dir: &Path) -> Vec<(&'static ModelInfo, bool)> {
    MODELS
        .iter()
        .map(|m| (m, dir.join(m.filename).is_file()))
        .collect()
}

/// Returns the first installed detector, in registry order.
#[must_use]
pub fn find_detector() -> Option<(&'static ModelInfo, PathBuf)> {
    find_detector_in(&models_dir())
}

/// Returns the first installed detector in `dir`, in registry order.
#[must_use]
pub fn find_detector_in(dir: &Path) -> Option<(&'static ModelInfo, PathBuf)> {
    MODELS
        .iter()
        .filter(|m| m.kind == ModelKind::Detector)
        .map(|m| (m, dir.join(m.filename)))
        .find(|(_, path)| path.is_file())
}

/// Ensures the named models are present, downloading missing ones.
///
/// # Errors
///
/// Returns an error if:
/// - A name is not in the registry
/// - A missing model has no download URL
/// - A download fails or its checksum doesn't match
pub fn ensure_models_with_progress(
    names: &[&str],
    progress: Option<&ProgressCallback>,
) -> Result<Vec<PathBuf>> {
    ensure_models_in(&models_dir(), names, progress)
}

/// [`ensure_models_with_progress`] against an explicit directory.
///
/// # Errors
///
/// See [`ensure_models_with_progress`].
pub fn ensure_models_in(
    dir: &Path,
    names: &[&str],
    progress: Option<&ProgressCallback>,
) -> Result<Vec<PathBuf>> {
    let models = names
        .iter()
        .map(|name| model_info(name).with_context(|| format!("Unknown model: {name}")))
        .collect::<Result<Vec<_>>>()?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create models directory {}", dir.display()))?;

    let mut paths = Vec::with_capacity(models.len());
    for model in models {
        let path = dir.join(model.filename);
        if path.is_file() {
            debug!("Model {} already exists", model.name);
        } else {
            download_model(model, &path, progress)?;
        }
        paths.push(path);
    }
    Ok(paths)
}

/// Streams a model to `<path>.part`, verifies it, then moves it into place.
fn download_model(model: &ModelInfo, path: &Path, progress: Option<&ProgressCallback>) -> Result<()> {
    let Some(url) = model.url else {
        anyhow::bail!(
            "Model {} has no download URL; place it at {}",
            model.name,
            path.display()
        );
    };
    info!("Downloading model {} from {url}", model.name);

    let mut response =
        reqwest::blocking::get(url).with_context(|| format!("Failed to download {}", model.name))?;
    if !response.status().is_success() {
        anyhow::bail!("Download failed with status: {}", response.status());
    }
    let total = response.content_length();

    let part = path.with_extension("part");
    let mut file =
        File::create(&part).with_context(|| format!("Failed to create {}", part.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut downloaded = 0u64;
    loop {
        let n = response
            .read(&mut buf)
            .with_context(|| format!("Failed to read response for {}", model.name))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])
            .with_context(|| format!("Failed to write {}", part.display()))?;
        downloaded += n as u64;
        if let Some(cb) = progress {
            cb(model.name, downloaded, total);
        }
    }
    file.flush()?;
    drop(file);

    let hash = format!("{:x}", hasher.finalize());
    if let Some(expected) = model.sha256 {
        if hash != expected {
            let _ = fs::remove_file(&part);
            anyhow::bail!(
                "Checksum mismatch for {}: expected {expected}, got {hash}",
                model.name
            );
        }
    } else {
        debug!("No checksum registered for {} (sha256 {hash})", model.name);
    }

    fs::rename(&part, path).with_context(|| format!("Failed to install {}", path.display()))?;
    info!("Downloaded {} ({downloaded} bytes)", model.name);
    Ok(())
}

/// SHA256 of a file, hex encoded.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_hex(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
