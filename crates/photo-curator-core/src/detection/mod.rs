//! Turning detector output into the "human present" signal.

mod normalizer;
mod presence;

pub use normalizer::{normalize, normalize_record, LABEL_FIELDS, SCORE_FIELDS};
pub use presence::{has_person, person_boxes, PERSON_LABEL};
