//! ML inference using Candle.
//!
//! Provides device selection, safetensors weight loading and the `YOLOv8`
//! person detector used by the curation pipeline.

mod coco;
mod detector;
mod device;
mod loader;
mod utils;
mod yolo;

pub use coco::{NAMES as COCO_NAMES, NUM_CLASSES as COCO_CLASSES};
pub use detector::{ClassLabel, YoloDetection, YoloDetector, YoloSize, INPUT_SIZE};
pub use device::{backend_name, select_device};
pub use loader::load_safetensors;
pub use utils::{rgb_to_tensor, softmax};
pub use yolo::{Multiples, YoloV8};
