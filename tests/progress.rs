//! Progress and cancellation integration tests.
//!
//! Frame folders are used so these run without an FFmpeg encoder.

mod common;

use std::sync::{Arc, Mutex};

use framebatch::{
    CancellationToken, DatasetOptions, FrameBatchError, OperationType, ProgressCallback,
    ProgressInfo, SequenceDataset,
};

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl RecordingProgress {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            infos: Mutex::new(Vec::new()),
        })
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

/// Cancels its token as soon as the first processing report arrives.
struct CancelOnProcessing {
    token: CancellationToken,
}

impl ProgressCallback for CancelOnProcessing {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.operation == OperationType::FrameProcessing {
            self.token.cancel();
        }
    }
}

fn scene_with_frames(count: usize) -> tempfile::TempDir {
    let scene = tempfile::tempdir().expect("Failed to create temp dir");
    for index in 0..count {
        common::write_u8_frame(&scene.path().join(format!("frame_{index}.npy")), &[8, 8], 3);
    }
    scene
}

#[test]
fn stages_are_reported_in_order() {
    let scene = scene_with_frames(4);
    let recorder = RecordingProgress::new();
    let options = DatasetOptions::new()
        .with_progress(recorder.clone())
        .with_batch_size(1);

    SequenceDataset::open_with_options(scene.path(), options)
        .expect("Failed to open")
        .get(0)
        .expect("Failed to load sample");

    let infos = recorder.infos.lock().unwrap();
    let first_processing = infos
        .iter()
        .position(|info| info.operation == OperationType::FrameProcessing)
        .expect("Expected processing reports");
    assert!(
        infos[..first_processing]
            .iter()
            .all(|info| info.operation == OperationType::ArrayConversion)
    );
    assert!(first_processing > 0, "Expected conversion reports first");

    let last = infos.last().expect("Expected progress callbacks");
    assert_eq!(last.current, 4);
    assert_eq!(last.total, Some(4));
    assert_eq!(last.percentage, Some(100.0));
}

#[test]
fn batch_size_reduces_callbacks() {
    let scene = scene_with_frames(6);
    let recorder = RecordingProgress::new();
    let options = DatasetOptions::new()
        .with_progress(recorder.clone())
        .with_batch_size(3);

    SequenceDataset::open_with_options(scene.path(), options)
        .expect("Failed to open")
        .get(0)
        .expect("Failed to load sample");

    // Two batched reports plus the final report, per stage.
    let infos = recorder.infos.lock().unwrap();
    assert_eq!(infos.len(), 6);
    for window in infos.windows(2) {
        if window[0].operation == window[1].operation {
            assert!(window[1].current >= window[0].current);
        }
    }
}

#[test]
fn cancellation_mid_sample() {
    let scene = scene_with_frames(5);
    let scratch_root = tempfile::tempdir().expect("Failed to create temp dir");
    let token = CancellationToken::new();
    let options = DatasetOptions::new()
        .with_progress(Arc::new(CancelOnProcessing {
            token: token.clone(),
        }))
        .with_cancellation(token)
        .with_scratch_root(scratch_root.path());

    let result = SequenceDataset::open_with_options(scene.path(), options)
        .expect("Failed to open")
        .get(0);

    match result {
        Err(FrameBatchError::Cancelled) => {}
        other => panic!("Expected Cancelled, got: {other:?}"),
    }
    assert_eq!(common::entry_count(scratch_root.path()), 0);
}
