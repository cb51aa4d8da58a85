//! Text lifetime test
//!
//! Kept in its own test binary: `SensitiveText::live_count()` is process
//! wide, so no other test may create text concurrently.

mod common;

use common::{default_specs, pipeline_with, small_config, MockLoader, RecordingReporter};
use cybersafe_core::SensitiveText;
use cybersafe_pipeline::IngestStatus;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_text_is_gone_before_scoring_and_reporting() {
    let reporter = Arc::new(RecordingReporter::default());
    let (pipeline, encoder) = pipeline_with(small_config(), reporter.clone());

    let loader = MockLoader::scenario();
    let stats = Arc::clone(&loader.stats);
    pipeline.initialize(&loader, &default_specs()).unwrap();
    assert_eq!(SensitiveText::live_count(), 0);

    assert_eq!(
        pipeline.ingest("e1", "pkgA", "you are terrible"),
        IngestStatus::Queued
    );
    pipeline.shutdown().await;

    assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.count(), 1);

    // No text, not even the encoder's lowered copy, was alive during scoring.
    let live_at_score = stats.live_texts.lock().clone();
    assert_eq!(live_at_score, vec![0, 0, 0]);

    assert_eq!(SensitiveText::live_count(), 0);
    assert_eq!(pipeline.buffered(), 0);
    assert!(reporter.payloads.lock().iter().all(|p| !p.contains("terrible")));
}
