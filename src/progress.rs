//! Observing and stopping sample loading.
//!
//! Loading one sample runs up to three stages (see [`OperationType`]), each
//! a loop over frames. A [`ProgressCallback`] attached through
//! [`DatasetOptions::with_progress`](crate::DatasetOptions::with_progress)
//! receives a [`ProgressInfo`] snapshot as each loop advances, and a
//! [`CancellationToken`] stops the loop between frames.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framebatch::{
//!     DatasetOptions, FrameBatchError, ProgressCallback, ProgressInfo, SequenceDataset,
//! };
//!
//! struct Printer;
//!
//! impl ProgressCallback for Printer {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         match info.percentage {
//!             Some(percent) => eprintln!("{:?}: {percent:.0}%", info.operation),
//!             None => eprintln!("{:?}: {} frames", info.operation, info.current),
//!         }
//!     }
//! }
//!
//! let options = DatasetOptions::new().with_progress(Arc::new(Printer));
//! let sample = SequenceDataset::open_with_options("clips/", options)?.get(0)?;
//! # Ok::<(), FrameBatchError>(())
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Stage of sample loading a report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OperationType {
    /// Decoding video frames into scratch storage.
    FrameExtraction,
    /// Converting `.npy` arrays into scratch images.
    ArrayConversion,
    /// Running scratch images through the image processor.
    FrameProcessing,
}

/// Snapshot passed to [`ProgressCallback::on_progress`].
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Stage being reported.
    pub operation: OperationType,
    /// Frames finished so far in this stage.
    pub current: u64,
    /// Frames this stage expects to handle, when known. Video extraction
    /// uses the container's frame count.
    pub total: Option<u64>,
    /// `current / total` as a percentage, when `total` is known and non-zero.
    pub percentage: Option<f32>,
    /// Time since the stage started.
    pub elapsed: Duration,
    /// Linear extrapolation of the time left in this stage.
    pub estimated_remaining: Option<Duration>,
    /// Index of the frame that triggered the report. `None` for the final
    /// report of a stage.
    pub current_frame: Option<u64>,
}

/// Receiver of progress snapshots.
///
/// Samples may be loaded on worker threads, hence the `Send + Sync` bound.
/// Callbacks cannot fail or stop loading; pair them with a
/// [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Handle one snapshot.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Callback used when none is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Shared flag that asks in-flight loading to stop.
///
/// Clones share the flag, so one clone can be handed to the options and
/// another kept by whoever decides to cancel. Loading returns
/// [`FrameBatchError::Cancelled`](crate::FrameBatchError::Cancelled) at the
/// next frame boundary and its scratch directory is removed.
///
/// ```
/// use framebatch::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// `true` once [`cancel`](CancellationToken::cancel) has been called on
    /// any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Counts frames through one stage and calls the callback every
/// `batch_size` frames.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    batch_size: u64,
    done: u64,
    reported_at: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            batch_size: batch_size.max(1),
            done: 0,
            reported_at: 0,
            started: Instant::now(),
        }
    }

    /// Count one finished frame.
    pub(crate) fn advance(&mut self, frame: Option<u64>) {
        self.done += 1;
        if self.done - self.reported_at >= self.batch_size {
            self.reported_at = self.done;
            self.emit(frame);
        }
    }

    /// Send the closing report of the stage.
    pub(crate) fn finish(&mut self) {
        self.reported_at = self.done;
        self.emit(None);
    }

    fn emit(&self, frame: Option<u64>) {
        let elapsed = self.started.elapsed();
        let total = self.total.filter(|&total| total > 0);

        let percentage = total.map(|total| self.done as f32 * 100.0 / total as f32);
        let estimated_remaining = match total {
            Some(total) if self.done > 0 => {
                let left = total.saturating_sub(self.done) as f64;
                Some(elapsed.mul_f64(left / self.done as f64))
            }
            _ => None,
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.done,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        reports: Mutex<Vec<ProgressInfo>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.reports.lock().unwrap().push(info.clone());
        }
    }

    #[test]
    fn reports_every_batch() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::FrameProcessing, Some(4), 2);
        for frame in 0..4 {
            tracker.advance(Some(frame));
        }

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].current_frame, Some(1));
        assert_eq!(reports[1].current, 4);
        assert_eq!(reports[1].percentage, Some(100.0));
        assert_eq!(reports[1].estimated_remaining, Some(Duration::ZERO));
    }

    #[test]
    fn finish_always_reports() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::FrameExtraction, None, 10);
        tracker.advance(None);
        tracker.finish();

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].current, 1);
        assert_eq!(reports[0].percentage, None);
        assert_eq!(reports[0].current_frame, None);
    }

    #[test]
    fn zero_total_has_no_percentage() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::ArrayConversion, Some(0), 0);
        tracker.advance(Some(0));

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].percentage, None);
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
