//! Detection result normalization.
//!
//! Detector libraries disagree on what a result looks like. Each record is
//! searched for a label and a score through ordered lists of candidate field
//! names; the first usable value wins.

use std::borrow::Cow;

use crate::domain::{DetectionRecord, FieldValue, NormalizedDetection};

/// Candidate label fields, in preference order.
pub const LABEL_FIELDS: [&str; 5] = ["label", "label_name", "name", "class_name", "category"];

/// Candidate score fields, in preference order.
pub const SCORE_FIELDS: [&str; 5] = ["score", "confidence", "probability", "prob", "conf"];

/// Field consulted when a label resolves to a nested record.
const NESTED_LABEL_FIELD: &str = "name";

/// Score assumed when a record has no score field at all.
const DEFAULT_SCORE: f32 = 1.0;

/// Normalizes a collection of detection records.
///
/// Records without a usable label are skipped.
pub fn normalize<'a, R, I>(records: I) -> Vec<NormalizedDetection>
where
    R: DetectionRecord + ?Sized + 'a,
    I: IntoIterator<Item = &'a R>,
{
    records
        .into_iter()
        .filter_map(normalize_record)
        .collect()
}

/// Normalizes a single record, or `None` when it has no usable label.
pub fn normalize_record<R: DetectionRecord + ?Sized>(record: &R) -> Option<NormalizedDetection> {
    let label = resolve_label(record)?;
    let score = resolve_score(record);

    let detection = NormalizedDetection::new(&label, score);
    Some(match record.bounding_box() {
        Some(bbox) => detection.with_bbox(bbox),
        None => detection,
    })
}

fn resolve_label<R: DetectionRecord + ?Sized>(record: &R) -> Option<String> {
    LABEL_FIELDS.iter().find_map(|&name| match record.field(name)? {
        FieldValue::Text(text) => non_empty(text),
        FieldValue::Number(_) => None,
        FieldValue::Record(nested) => match nested.field(NESTED_LABEL_FIELD)? {
            FieldValue::Text(text) => non_empty(text),
            FieldValue::Number(_) | FieldValue::Record(_) => None,
        },
    })
}

fn non_empty(text: Cow<'_, str>) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// First score field that parses to a finite number, else [`DEFAULT_SCORE`].
#[allow(clippy::cast_possible_truncation)]
fn resolve_score<R: DetectionRecord + ?Sized>(record: &R) -> f32 {
    SCORE_FIELDS
        .iter()
        .find_map(|&name| {
            let value = match record.field(name)? {
                FieldValue::Number(n) => n,
                FieldValue::Text(text) => text.trim().parse::<f64>().ok()?,
                FieldValue::Record(_) => return None,
            };
            value.is_finite().then_some(value as f32)
        })
        .unwrap_or(DEFAULT_SCORE)
}
