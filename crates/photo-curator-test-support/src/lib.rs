//! Test support utilities for photo-curator.
//!
//! Provides mocks for every core port and synthetic image builders for
//! testing the curation pipeline without real models.
//!
//! # Example
//!
//! ```
//! use photo_curator_test_support::{MockDetector, MockImageStore, SyntheticImageBuilder};
//!
//! let store = MockImageStore::new()
//!     .with_image("/photos/person.png", SyntheticImageBuilder::person(64, 64))
//!     .with_image("/photos/beach.png", SyntheticImageBuilder::scenery(64, 64));
//! let detector = MockDetector::red_means_person();
//! # let _ = (store, detector);
//! ```

mod builders;
mod mocks;

pub use builders::SyntheticImageBuilder;
pub use mocks::{
    MockAttributeEngine, MockDetector, MockImageStore, MockProgressSink, MockResultOutput,
};
