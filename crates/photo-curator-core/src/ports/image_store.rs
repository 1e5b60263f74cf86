//! Image store port for enumerating, decoding and deleting candidate files.

use std::path::{Path, PathBuf};

use image::DynamicImage;

/// Port for the storage holding the photos being curated.
pub trait ImageStore: Send + Sync {
    /// Lists candidate images under `root`, descending into subfolders when
    /// `recursive` is set. The result is free of case-insensitive duplicates
    /// and sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or cannot be read.
    fn enumerate(&self, root: &Path, recursive: bool) -> anyhow::Result<Vec<PathBuf>>;

    /// Whether the file still exists.
    fn exists(&self, path: &Path) -> bool;

    /// Decodes the file into an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    fn decode(&self, path: &Path) -> anyhow::Result<DynamicImage>;

    /// Deletes the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    fn delete(&self, path: &Path) -> anyhow::Result<()>;
}
