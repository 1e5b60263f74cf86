//! Batch curator behaviour against mock ports.

#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use photo_curator_core::ports::{ProgressEvent, ProgressSink, RawOutput};
use photo_curator_core::{
    AttributePredictor, BatchCurator, CancellationToken, CurationConfig, CurationError, Outcome,
    RunState,
};
use photo_curator_test_support::{
    MockAttributeEngine, MockDetector, MockImageStore, MockProgressSink, MockResultOutput,
    SyntheticImageBuilder,
};
use serde_json::json;

fn root() -> &'static Path {
    Path::new("/photos")
}

fn three_file_store() -> MockImageStore {
    MockImageStore::new()
        .with_image("/photos/a_person.png", SyntheticImageBuilder::person(32, 32))
        .with_corrupt("/photos/b_corrupt.jpg")
        .with_image("/photos/c_empty.png", SyntheticImageBuilder::scenery(32, 32))
}

fn curator(store: &Arc<MockImageStore>, config: CurationConfig) -> BatchCurator {
    BatchCurator::new(
        Arc::new(MockDetector::red_means_person()),
        Arc::<MockImageStore>::clone(store),
        config,
    )
}

#[test]
fn test_person_empty_corrupt_with_deletion() {
    let store = Arc::new(three_file_store());
    let curator = curator(&store, CurationConfig::default().with_delete_non_human(true));
    let sink = MockProgressSink::new();
    let output = MockResultOutput::new();

    let summary = curator
        .run(root(), &sink, &output, &CancellationToken::new())
        .unwrap();

    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 3);
    assert_eq!(store.deleted(), vec![PathBuf::from("/photos/c_empty.png")]);

    let decisions = output.decisions();
    assert_eq!(decisions.len(), 3);
    assert_eq!(decisions[0].outcome, Outcome::Kept);
    assert!(decisions[0].has_person);
    // The corrupt file in the middle does not stop the file after it
    assert_eq!(decisions[1].outcome, Outcome::Failed);
    assert!(!decisions[1].deleted);
    assert!(matches!(decisions[1].error, Some(CurationError::Decode(_))));
    assert_eq!(decisions[2].path, "/photos/c_empty.png");
    assert_eq!(decisions[2].outcome, Outcome::Deleted);
    assert!(decisions[2].deleted);

    assert_eq!(output.flush_count(), 1);
    assert_eq!(curator.state(), RunState::Completed);
}

#[test]
fn test_run_without_deletion_keeps_every_file() {
    let store = Arc::new(three_file_store());
    let curator = curator(&store, CurationConfig::default());

    for _ in 0..2 {
        let summary = curator
            .run(
                root(),
                &MockProgressSink::new(),
                &MockResultOutput::new(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(summary.deleted, 0);
        assert_eq!(store.file_count(), 3);
    }
    assert!(store.deleted().is_empty());
}

#[test]
fn test_progress_is_monotonic_and_complete() {
    let store = Arc::new(three_file_store());
    let curator = curator(&store, CurationConfig::default().with_delete_non_human(true));
    let sink = MockProgressSink::new();

    curator
        .run(
            root(),
            &sink,
            &MockResultOutput::new(),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(sink.enumerated_total(), Some(3));
    assert_eq!(sink.progress_counts(), vec![(1, 3), (2, 3), (3, 3)]);

    let summary = sink.summary().unwrap();
    assert_eq!(summary.to_string(), "Total files: 3, deleted: 1, failed: 1");
    assert!(matches!(
        sink.events().last(),
        Some(ProgressEvent::Finished { .. })
    ));
}

#[test]
fn test_empty_folder() {
    let store = Arc::new(MockImageStore::new());
    let curator = curator(&store, CurationConfig::default());
    let sink = MockProgressSink::new();

    let summary = curator
        .run(
            root(),
            &sink,
            &MockResultOutput::new(),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(summary.total_files, 0);
    assert!(sink.progress_counts().is_empty());
    assert!(sink.summary().is_some());
}

#[test]
fn test_enumeration_failure_is_fatal() {
    let store = Arc::new(MockImageStore::new().failing_enumeration());
    let curator = curator(&store, CurationConfig::default());

    let err = curator
        .run(
            root(),
            &MockProgressSink::new(),
            &MockResultOutput::new(),
            &CancellationToken::new(),
        )
        .unwrap_err();

    assert!(matches!(err, CurationError::Enumeration(_)));
    assert!(err.is_fatal());
    assert_eq!(curator.state(), RunState::Idle);
}

#[test]
fn test_vanished_file_is_skipped() {
    let store = Arc::new(
        MockImageStore::new()
            .with_vanished("/photos/gone.png")
            .with_image("/photos/here.png", SyntheticImageBuilder::scenery(8, 8)),
    );
    let curator = curator(&store, CurationConfig::default().with_delete_non_human(true));
    let output = MockResultOutput::new();

    let summary = curator
        .run(
            root(),
            &MockProgressSink::new(),
            &output,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(output.decisions()[0].outcome, Outcome::Skipped);
}

#[test]
fn test_deletion_failure_does_not_stop_the_run() {
    let store = Arc::new(
        MockImageStore::new()
            .with_locked("/photos/a.png", SyntheticImageBuilder::scenery(8, 8))
            .with_image("/photos/b.png", SyntheticImageBuilder::scenery(8, 8)),
    );
    let curator = curator(&store, CurationConfig::default().with_delete_non_human(true));
    let output = MockResultOutput::new();

    let summary = curator
        .run(
            root(),
            &MockProgressSink::new(),
            &output,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.deleted, 1);
    let decisions = output.decisions();
    assert!(!decisions[0].deleted);
    assert!(matches!(decisions[0].error, Some(CurationError::Deletion(_))));
    assert!(decisions[1].deleted);
}

#[test]
fn test_detector_failure_is_an_inference_error() {
    let store = Arc::new(three_file_store());
    let curator = BatchCurator::new(
        Arc::new(MockDetector::failing("model exploded")),
        Arc::<MockImageStore>::clone(&store),
        CurationConfig::default().with_delete_non_human(true),
    );
    let output = MockResultOutput::new();

    let summary = curator
        .run(
            root(),
            &MockProgressSink::new(),
            &output,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(summary.failed, 3);
    assert_eq!(summary.deleted, 0);
    assert!(matches!(
        output.decisions()[0].error,
        Some(CurationError::Inference(_))
    ));
}

#[test]
fn test_low_confidence_person_counts_as_absent() {
    let store = Arc::new(
        MockImageStore::new().with_image("/photos/a.png", SyntheticImageBuilder::scenery(8, 8)),
    );
    let curator = BatchCurator::new(
        Arc::new(MockDetector::always(vec![
            json!({"Category": "PERSON", "Confidence": "0.3"}),
        ])),
        Arc::<MockImageStore>::clone(&store),
        CurationConfig::default().with_delete_non_human(true),
    );

    let summary = curator
        .run(
            root(),
            &MockProgressSink::new(),
            &MockResultOutput::new(),
            &CancellationToken::new(),
        )
        .unwrap();
    assert_eq!(summary.deleted, 1);
}

/// Cancels the run as soon as the first file is reported.
struct CancelAfterFirst(CancellationToken);

impl ProgressSink for CancelAfterFirst {
    fn on_event(&self, event: ProgressEvent) {
        if matches!(event, ProgressEvent::FileProcessed { .. }) {
            self.0.cancel();
        }
    }
}

#[test]
fn test_cancellation_preserves_completed_work() {
    let store = Arc::new(three_file_store());
    let curator = curator(&store, CurationConfig::default().with_delete_non_human(true));
    let token = CancellationToken::new();
    let output = MockResultOutput::new();

    let summary = curator
        .run(root(), &CancelAfterFirst(token.clone()), &output, &token)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.total_files, 3);
    assert_eq!(output.decisions().len(), 1);
    assert_eq!(output.flush_count(), 1);
    assert_eq!(curator.state(), RunState::Cancelled);
    assert!(summary.to_string().contains("cancelled"));
}

#[test]
fn test_cancelled_before_start_touches_nothing() {
    let store = Arc::new(three_file_store());
    let curator = curator(&store, CurationConfig::default().with_delete_non_human(true));
    let token = CancellationToken::new();
    token.cancel();

    let summary = curator
        .run(root(), &MockProgressSink::new(), &MockResultOutput::new(), &token)
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert!(store.deleted().is_empty());
}

#[test]
fn test_subfolders_only_when_enabled() {
    let store = Arc::new(
        MockImageStore::new()
            .with_image("/photos/a.png", SyntheticImageBuilder::person(8, 8))
            .with_image("/photos/2023/b.png", SyntheticImageBuilder::person(8, 8)),
    );

    let flat = curator(&store, CurationConfig::default());
    let deep = curator(&store, CurationConfig::default().with_subfolders(true));
    let run = |c: &BatchCurator| {
        c.run(
            root(),
            &MockProgressSink::new(),
            &MockResultOutput::new(),
            &CancellationToken::new(),
        )
        .unwrap()
        .total_files
    };

    assert_eq!(run(&flat), 1);
    assert_eq!(run(&deep), 2);
}

fn female_store() -> MockImageStore {
    MockImageStore::new()
        .with_image("/photos/a_male.png", SyntheticImageBuilder::person(32, 32))
        .with_image(
            "/photos/b_female.png",
            SyntheticImageBuilder::female_person(32, 32),
        )
        .with_image("/photos/c_scenery.png", SyntheticImageBuilder::scenery(32, 32))
}

#[test]
fn test_only_keep_female_deletes_non_female_people() {
    let store = Arc::new(female_store());
    let engine = Arc::new(MockAttributeEngine::green_means_female());
    let curator = curator(&store, CurationConfig::default().with_only_keep_female(true))
        .with_attribute_predictor(AttributePredictor::new(
            Arc::<MockAttributeEngine>::clone(&engine),
        ));
    let output = MockResultOutput::new();

    let summary = curator
        .run(
            root(),
            &MockProgressSink::new(),
            &output,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(store.deleted(), vec![PathBuf::from("/photos/a_male.png")]);

    let decisions = output.decisions();
    assert_eq!(decisions[0].attributes.len(), 1);
    assert!(decisions[0].attributes[0].female_probability < 0.5);
    assert!(decisions[1].attributes[0].female_probability > 0.5);
    assert!((decisions[1].attributes[0].age - 30.0).abs() < f32::EPSILON);
    // No person: the predictor does not run and deleteNonHuman is off
    assert_eq!(decisions[2].outcome, Outcome::Kept);
    assert!(decisions[2].attributes.is_empty());

    // Crops go through the 112x112 CHW preprocessing
    assert!(engine
        .input_dims()
        .iter()
        .all(|dims| dims == &vec![1, 3, 112, 112]));
}

#[test]
fn test_only_keep_female_is_inert_without_predictor() {
    let store = Arc::new(female_store());
    let curator = curator(&store, CurationConfig::default().with_only_keep_female(true));

    let summary = curator
        .run(
            root(),
            &MockProgressSink::new(),
            &MockResultOutput::new(),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(summary.deleted, 0);
}

#[test]
fn test_attribute_failure_is_an_inference_error() {
    let store = Arc::new(
        MockImageStore::new().with_image("/photos/a.png", SyntheticImageBuilder::person(16, 16)),
    );
    let curator = curator(&store, CurationConfig::default().with_only_keep_female(true))
        .with_attribute_predictor(AttributePredictor::new(Arc::new(
            MockAttributeEngine::failing("no face"),
        )));
    let output = MockResultOutput::new();

    curator
        .run(
            root(),
            &MockProgressSink::new(),
            &output,
            &CancellationToken::new(),
        )
        .unwrap();

    let decision = &output.decisions()[0];
    assert_eq!(decision.outcome, Outcome::Failed);
    assert!(matches!(decision.error, Some(CurationError::Inference(_))));
    assert!(store.deleted().is_empty());
}

#[test]
fn test_unrecognised_attribute_outputs_do_not_fail() {
    let store = Arc::new(
        MockImageStore::new().with_image("/photos/a.png", SyntheticImageBuilder::person(16, 16)),
    );
    let engine = MockAttributeEngine::with_outputs(vec![RawOutput::new(
        "embedding",
        vec![4, 8],
        vec![0.0; 32],
    )]);
    let curator = curator(&store, CurationConfig::default().with_only_keep_female(true))
        .with_attribute_predictor(AttributePredictor::new(Arc::new(engine)));
    let output = MockResultOutput::new();

    curator
        .run(
            root(),
            &MockProgressSink::new(),
            &output,
            &CancellationToken::new(),
        )
        .unwrap();

    // Female probability defaults to zero, so the single person is not female
    let decision = &output.decisions()[0];
    assert_eq!(decision.outcome, Outcome::Deleted);
    assert!(decision.attributes[0].female_probability.abs() < f32::EPSILON);
}
