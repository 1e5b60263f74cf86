//! Photo Curator Adapters - External adapters for photo-curator.
//!
//! This crate provides adapters for:
//! - Filesystem image enumeration, decoding and deletion
//! - Model registry, downloading and caching
//! - ONNX attribute inference

pub mod fs;
pub mod models;
pub mod onnx;

pub use fs::{enumerate_images, is_supported_image, FsImageStore, IMAGE_PATTERNS};
pub use models::{
    ensure_models_with_progress, find_detector, find_detector_in, list_models, model_path, models_dir,
    set_models_dir, ModelInfo, ModelKind, ProgressCallback, DEFAULT_DETECTOR, MODELS,
};
pub use onnx::TractAttributeEngine;
