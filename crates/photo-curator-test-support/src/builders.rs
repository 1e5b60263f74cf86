//! Synthetic image builders for testing.
//!
//! Colors carry meaning for the mocks: a red-dominant image is what
//! [`MockDetector::red_means_person`](crate::MockDetector::red_means_person)
//! reports as a person, and a strong green channel is what
//! [`MockAttributeEngine::green_means_female`](crate::MockAttributeEngine::green_means_female)
//! reports as female.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Builder for creating synthetic test images.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// Creates a uniformly colored RGB image.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    /// Red image: a person to the mock detector, not female to the mock engine.
    #[must_use]
    pub fn person(width: u32, height: u32) -> DynamicImage {
        Self::solid(width, height, [255, 0, 0])
    }

    /// Yellow image: a person to the mock detector, female to the mock engine.
    #[must_use]
    pub fn female_person(width: u32, height: u32) -> DynamicImage {
        Self::solid(width, height, [255, 255, 0])
    }

    /// Blue image: nothing the mock detector recognises.
    #[must_use]
    pub fn scenery(width: u32, height: u32) -> DynamicImage {
        Self::solid(width, height, [0, 0, 255])
    }

    /// Red square on a blue background, occupying the given rect.
    #[must_use]
    pub fn person_in_scene(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> DynamicImage {
        let (rx, ry, rw, rh) = rect;
        let img = RgbImage::from_fn(width, height, |x, y| {
            if x >= rx && x < rx + rw && y >= ry && y < ry + rh {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    /// Encodes `image` into `dir/name`, with the format taken from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unknown or writing fails.
    pub fn write(dir: &Path, name: &str, image: &DynamicImage) -> Result<PathBuf> {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let format = ImageFormat::from_path(&path)
            .with_context(|| format!("Unknown image format for {name}"))?;
        // JPEG cannot hold alpha and the builders only produce RGB
        image
            .write_to(&mut fs::File::create(&path)?, format)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Writes a file with an image extension but undecodable contents.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_corrupt(dir: &Path, name: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, b"\xff\xd8\xff\xe0 this is not really a jpeg")?;
        Ok(path)
    }
}
