//! `YOLOv8` object detector behind the [`ObjectDetector`] port.

// Allow common ML code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::borrow::Cow;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use candle_core::{Device, Module};
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info};

use super::coco::{NAMES, NUM_CLASSES};
use super::yolo::{Multiples, YoloV8};
use super::{backend_name, load_safetensors, rgb_to_tensor};
use crate::domain::{canonical_field_name, BoundingBox, DetectionRecord, FieldValue};
use crate::ports::ObjectDetector;

/// Longest side of the network input.
pub const INPUT_SIZE: u32 = 640;

/// Input sides must be multiples of the largest feature stride.
const STRIDE: u32 = 32;

/// Weight tensor every `YOLOv8` export carries; used to reject foreign files early.
const MARKER_TENSOR: &str = "net.b1.0.conv.weight";

/// `YOLOv8` model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoloSize {
    /// yolov8n
    Nano,
    /// yolov8s
    Small,
    /// yolov8m
    Medium,
    /// yolov8l
    Large,
    /// yolov8x
    XLarge,
}

impl YoloSize {
    const fn multiples(self) -> Multiples {
        match self {
            Self::Nano => Multiples::n(),
            Self::Small => Multiples::s(),
            Self::Medium => Multiples::m(),
            Self::Large => Multiples::l(),
            Self::XLarge => Multiples::x(),
        }
    }

    /// Suffix letter used in model file names.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Nano => "n",
            Self::Small => "s",
            Self::Medium => "m",
            Self::Large => "l",
            Self::XLarge => "x",
        }
    }

    /// Infers the size from a weights file name such as `yolov8s.safetensors`.
    #[must_use]
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?.to_ascii_lowercase();
        stem.strip_prefix("yolov8")?.parse().ok()
    }
}

impl FromStr for YoloSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "n" | "nano" => Ok(Self::Nano),
            "s" | "small" => Ok(Self::Small),
            "m" | "medium" => Ok(Self::Medium),
            "l" | "large" => Ok(Self::Large),
            "x" | "xlarge" => Ok(Self::XLarge),
            other => anyhow::bail!("Unknown YOLOv8 size: {other}"),
        }
    }
}

/// Class of a detection; exposed to the normalizer as a nested record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
    /// COCO class id.
    pub index: usize,
    /// COCO class name.
    pub name: &'static str,
}

impl DetectionRecord for ClassLabel {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match canonical_field_name(name).as_str() {
            "name" => Some(FieldValue::Text(Cow::Borrowed(self.name))),
            "index" | "id" => Some(FieldValue::Number(self.index as f64)),
            _ => None,
        }
    }
}

/// One box produced by the detector, in source-image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct YoloDetection {
    /// Detected class.
    pub class: ClassLabel,
    /// Class confidence.
    pub confidence: f32,
    /// Box in source-image pixels.
    pub bbox: BoundingBox,
}

impl DetectionRecord for YoloDetection {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match canonical_field_name(name).as_str() {
            "label" => Some(FieldValue::Record(&self.class)),
            "confidence" => Some(FieldValue::Number(f64::from(self.confidence))),
            _ => None,
        }
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        Some(self.bbox)
    }
}

/// `YOLOv8` detector running on candle.
pub struct YoloDetector {
    model: YoloV8,
    device: Device,
    size: YoloSize,
}

impl YoloDetector {
    /// Loads a detector from safetensors weights.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or does not hold
    /// `YOLOv8` weights of the given size.
    pub fn load(path: impl AsRef<Path>, size: YoloSize, device: Device) -> Result<Self> {
        let path = path.as_ref();
        let vb = load_safetensors(path, &device)?;
        if !vb.contains_tensor(MARKER_TENSOR) {
            anyhow::bail!("{} does not contain YOLOv8 weights", path.display());
        }
        let model = YoloV8::new(&vb, size.multiples(), NUM_CLASSES)
            .with_context(|| format!("Failed to build yolov8{} from {}", size.suffix(), path.display()))?;

        info!(
            "Loaded yolov8{} detector on {}",
            size.suffix(),
            backend_name(&device)
        );
        Ok(Self {
            model,
            device,
            size,
        })
    }

    /// Model size.
    #[must_use]
    pub const fn size(&self) -> YoloSize {
        self.size
    }

    fn run(&self, image: &DynamicImage, confidence: f32, iou: f32) -> Result<Vec<YoloDetection>> {
        let (width, height) = input_dims(image.width(), image.height());
        let resized = image
            .resize_exact(width, height, FilterType::CatmullRom)
            .to_rgb8();
        let input = rgb_to_tensor(&resized, &self.device)?;

        let pred = self
            .model
            .forward(&input)
            .context("YOLOv8 forward pass failed")?
            .squeeze(0)?
            .to_device(&Device::Cpu)?;
        // (4 + classes, anchors) -> one row per anchor
        let rows = pred.t()?.to_vec2::<f32>()?;

        let scale = (
            image.width() as f32 / width as f32,
            image.height() as f32 / height as f32,
        );
        Ok(decode_predictions(&rows, confidence, iou, scale))
    }
}

impl ObjectDetector for YoloDetector {
    fn name(&self) -> &str {
        "yolov8"
    }

    fn detect(
        &self,
        image: &DynamicImage,
        confidence: f32,
        iou: f32,
    ) -> Result<Vec<Box<dyn DetectionRecord>>> {
        let detections = self.run(image, confidence, iou)?;
        debug!("{} detections", detections.len());
        Ok(detections
            .into_iter()
            .map(|d| Box::new(d) as Box<dyn DetectionRecord>)
            .collect())
    }
}

/// Network input size: longest side [`INPUT_SIZE`], both sides rounded down
/// to a multiple of 32 and at least 32.
fn input_dims(width: u32, height: u32) -> (u32, u32) {
    let round = |v: u32| (v / STRIDE * STRIDE).max(STRIDE);
    let (width, height) = (width.max(1), height.max(1));
    if width < height {
        let w = (u64::from(width) * u64::from(INPUT_SIZE) / u64::from(height)) as u32;
        (round(w), INPUT_SIZE)
    } else {
        let h = (u64::from(height) * u64::from(INPUT_SIZE) / u64::from(width)) as u32;
        (INPUT_SIZE, round(h))
    }
}

/// Decodes per-anchor rows `[cx, cy, w, h, class scores...]` into detections
/// in source-image pixels, with per-class non-maximum suppression.
fn decode_predictions(
    rows: &[Vec<f32>],
    confidence: f32,
    iou: f32,
    (scale_x, scale_y): (f32, f32),
) -> Vec<YoloDetection> {
    let mut per_class: Vec<Vec<YoloDetection>> = vec![Vec::new(); NUM_CLASSES];

    for row in rows {
        let Some((class, score)) = row
            .iter()
            .skip(4)
            .take(NUM_CLASSES)
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        if score < confidence {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        per_class[class].push(YoloDetection {
            class: ClassLabel {
                index: class,
                name: NAMES[class],
            },
            confidence: score,
            bbox: BoundingBox::new(
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                w * scale_x,
                h * scale_y,
            ),
        });
    }

    per_class
        .into_iter()
        .flat_map(|detections| nms(detections, iou))
        .collect()
}

/// Greedy non-maximum suppression over detections of one class.
fn nms(mut detections: Vec<YoloDetection>, iou_threshold: f32) -> Vec<YoloDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<YoloDetection> = Vec::with_capacity(detections.len());
    for det in detections {
        if keep.iter().all(|k| k.bbox.iou(&det.bbox) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}
