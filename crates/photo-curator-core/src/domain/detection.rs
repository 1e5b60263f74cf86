//! Detection records emitted by object detectors and their normalized form.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A value exposed by a [`DetectionRecord`] field.
#[derive(Clone)]
pub enum FieldValue<'a> {
    /// Text value. Numeric text is accepted wherever a number is expected.
    Text(Cow<'a, str>),
    /// Numeric value.
    Number(f64),
    /// Nested record, e.g. a label object carrying its own `name`.
    Record(&'a dyn DetectionRecord),
}

impl std::fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Record(_) => f.write_str("Record(..)"),
        }
    }
}

/// A labeled, scored result produced by an object detector.
///
/// The concrete result type differs between detector libraries, so the
/// pipeline only looks fields up by name. Implementations compare names with
/// [`canonical_field_name`], which makes `class_name`, `ClassName` and
/// `class-name` equivalent.
pub trait DetectionRecord {
    /// Looks up a field by name.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;

    /// Bounding box in source-image pixels, if the detector reports one.
    fn bounding_box(&self) -> Option<BoundingBox> {
        None
    }
}

impl<T: DetectionRecord + ?Sized> DetectionRecord for Box<T> {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        (**self).field(name)
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        (**self).bounding_box()
    }
}

/// Folds a field name to its comparison form: ASCII lowercase with `_`, `-`
/// and spaces removed.
#[must_use]
pub fn canonical_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// JSON objects are records; used by detectors that report loosely-typed
/// results and throughout the tests.
impl DetectionRecord for Value {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = find_json_field(self, name)?;
        match value {
            Value::String(text) => Some(FieldValue::Text(Cow::Borrowed(text))),
            Value::Number(n) => n.as_f64().map(FieldValue::Number),
            Value::Object(_) => Some(FieldValue::Record(value)),
            Value::Null | Value::Bool(_) | Value::Array(_) => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bounding_box(&self) -> Option<BoundingBox> {
        let coords = ["bbox", "box", "bounding_box"]
            .iter()
            .find_map(|name| find_json_field(self, name))?
            .as_array()?;
        if coords.len() != 4 {
            return None;
        }
        let mut values = [0f32; 4];
        for (slot, coord) in values.iter_mut().zip(coords) {
            *slot = coord.as_f64()? as f32;
        }
        Some(BoundingBox::new(values[0], values[1], values[2], values[3]))
    }
}

fn find_json_field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    let wanted = canonical_field_name(name);
    value
        .as_object()?
        .iter()
        .find(|(key, _)| canonical_field_name(key) == wanted)
        .map(|(_, v)| v)
}

/// Axis-aligned box in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box area; zero for degenerate boxes.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another box.
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clips the box to an image and converts it to an integer pixel rect
    /// `(x, y, width, height)`. Returns `None` when nothing of the box remains.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn pixel_rect(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x.max(0.0).floor();
        let y1 = self.y.max(0.0).floor();
        let x2 = (self.x + self.width).min(image_width as f32).ceil();
        let y2 = (self.y + self.height).min(image_height as f32).ceil();

        if !(x2 > x1 && y2 > y1) {
            return None;
        }
        Some((x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
    }
}

/// A detection reduced to what the decision pipeline needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDetection {
    /// Lowercased class label.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f32,
    /// Box in source-image pixels, when the detector reports one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bbox: Option<BoundingBox>,
}

impl NormalizedDetection {
    /// Creates a detection, case-folding the label and clamping the score.
    #[must_use]
    pub fn new(label: &str, score: f32) -> Self {
        Self {
            label: label.to_lowercase(),
            score: score.clamp(0.0, 1.0),
            bbox: None,
        }
    }

    /// Attaches a bounding box.
    #[must_use]
    pub const fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Case-insensitive label comparison.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.label.eq_ignore_ascii_case(label)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_field_name() {
        assert_eq!(canonical_field_name("Class_Name"), "classname");
        assert_eq!(canonical_field_name("label-name"), "labelname");
        assert_eq!(canonical_field_name("Category"), "category");
    }

    #[test]
    fn test_json_field_lookup_ignores_case_and_separators() {
        let record = json!({"Class_Name": "dog", "CONFIDENCE": 0.5});
        assert!(matches!(record.field("class-name"), Some(FieldValue::Text(t)) if t == "dog"));
        assert!(matches!(record.field("confidence"), Some(FieldValue::Number(n)) if (n - 0.5).abs() < 1e-9));
        assert!(record.field("score").is_none());
    }

    #[test]
    fn test_json_nested_record() {
        let record = json!({"label": {"name": "person", "index": 0}});
        let Some(FieldValue::Record(nested)) = record.field("label") else {
            panic!("label should resolve to a nested record");
        };
        assert!(matches!(nested.field("name"), Some(FieldValue::Text(t)) if t == "person"));
    }

    #[test]
    fn test_json_bounding_box() {
        let record = json!({"label": "person", "bbox": [1.0, 2.0, 3.0, 4.0]});
        assert_eq!(
            record.bounding_box(),
            Some(BoundingBox::new(1.0, 2.0, 3.0, 4.0))
        );
        assert!(json!({"bbox": [1, 2]}).bounding_box().is_none());
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert!(a.iou(&BoundingBox::new(20.0, 20.0, 5.0, 5.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_pixel_rect_clips_to_image() {
        let bbox = BoundingBox::new(-5.0, 10.0, 50.0, 200.0);
        assert_eq!(bbox.pixel_rect(40, 100), Some((0, 10, 40, 90)));
        assert!(BoundingBox::new(50.0, 50.0, 10.0, 10.0)
            .pixel_rect(40, 40)
            .is_none());
    }

    #[test]
    fn test_normalized_detection_folds_label() {
        let det = NormalizedDetection::new("PERSON", 1.7);
        assert_eq!(det.label, "person");
        assert!((det.score - 1.0).abs() < f32::EPSILON);
        assert!(det.has_label("Person"));
    }
}
