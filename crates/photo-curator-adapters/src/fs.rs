//! Filesystem adapter: image enumeration, decoding and deletion.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use photo_curator_core::ImageStore;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Patterns of the files considered candidate images, matched case-insensitively.
pub const IMAGE_PATTERNS: [&str; 8] = [
    "*.jpg", "*.jpeg", "*.png", "*.bmp", "*.gif", "*.webp", "*.tif", "*.tiff",
];

/// Checks if a path matches one of [`IMAGE_PATTERNS`].
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| {
            IMAGE_PATTERNS
                .iter()
                .any(|pattern| pattern.strip_prefix("*.") == Some(ext.as_str()))
        })
}

/// Lists the candidate images under `root`.
///
/// Without `recursive` only the direct children of `root` are considered. A
/// `root` that is itself an image yields just that file. Paths that differ only
/// in case are reported once. The result is sorted.
///
/// # Errors
///
/// Returns an error if `root` does not exist.
pub fn enumerate_images(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        anyhow::bail!("Path does not exist: {}", root.display());
    }

    if root.is_file() {
        if is_supported_image(root) {
            return Ok(vec![root.to_path_buf()]);
        }
        warn!("Unsupported file type: {}", root.display());
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(root).follow_links(false).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if is_supported_image(entry.path()) {
                    files.push(entry.into_path());
                } else {
                    debug!("Skipping non-image file {}", entry.path().display());
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry: {e}"),
        }
    }

    files.sort();
    let mut seen = HashSet::with_capacity(files.len());
    files.retain(|p| seen.insert(p.to_string_lossy().to_lowercase()));
    Ok(files)
}

/// Image store backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageStore;

impl FsImageStore {
    /// Creates a filesystem store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ImageStore for FsImageStore {
    fn enumerate(&self, root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        enumerate_images(root, recursive)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        // Content sniffing first, so a PNG saved as .jpg still decodes
        ImageReader::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("Failed to read image: {}", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("Failed to delete {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("test.jpg")));
        assert!(is_supported_image(Path::new("test.JPEG")));
        assert!(is_supported_image(Path::new("test.png")));
        assert!(is_supported_image(Path::new("test.Tiff")));
        assert!(is_supported_image(Path::new("test.webp")));
        assert!(!is_supported_image(Path::new("test.cr2")));
        assert!(!is_supported_image(Path::new("test.txt")));
        assert!(!is_supported_image(Path::new("test")));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(enumerate_images(Path::new("/nonexistent/photos"), true).is_err());
    }
}
