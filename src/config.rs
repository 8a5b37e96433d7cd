//! Dataset configuration.
//!
//! [`DatasetOptions`] is a builder that threads the resolution limit, crop
//! mode, scratch-storage settings, progress callbacks and cancellation
//! tokens through sample loading without polluting every function
//! signature.
//!
//! # Example
//!
//! ```no_run
//! use framebatch::{CancellationToken, CropMode, DatasetOptions, ScratchFormat};
//!
//! let token = CancellationToken::new();
//! let options = DatasetOptions::new()
//!     .with_max_long_side(1022)
//!     .with_crop_mode(CropMode::Center)
//!     .with_scratch_root("/mnt/scratch")
//!     .with_scratch_format(ScratchFormat::Jpeg)
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    processor::CropMode,
    progress::{CancellationToken, NoOpProgress, ProgressCallback},
    resolution::DEFAULT_MAX_LONG_SIDE,
    scratch::ScratchFormat,
};

/// Extension identifying array frame files.
pub const ARRAY_EXTENSION: &str = "npy";

/// Video extensions recognized by default.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4"];

/// Configuration for a [`SequenceDataset`](crate::SequenceDataset).
///
/// All fields have defaults matching the plain [`open`](crate::SequenceDataset::open)
/// behaviour: 2044 px long-side limit, no cropping, PNG scratch frames under
/// the system temp directory, `.mp4` videos only.
#[derive(Clone)]
pub struct DatasetOptions {
    pub(crate) max_long_side: u32,
    pub(crate) crop_mode: CropMode,
    pub(crate) scratch_root: Option<PathBuf>,
    pub(crate) scratch_format: ScratchFormat,
    pub(crate) video_extensions: Vec<String>,
    /// Receives per-stage frame counts; silent unless replaced.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Checked between frames. Loading never stops when unset.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
}

impl Debug for DatasetOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DatasetOptions")
            .field("max_long_side", &self.max_long_side)
            .field("crop_mode", &self.crop_mode)
            .field("scratch_root", &self.scratch_root)
            .field("scratch_format", &self.scratch_format)
            .field("video_extensions", &self.video_extensions)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            max_long_side: DEFAULT_MAX_LONG_SIDE,
            crop_mode: CropMode::None,
            scratch_root: None,
            scratch_format: ScratchFormat::Png,
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|extension| extension.to_string())
                .collect(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set the upper bound for the long side of processed frames.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_max_long_side(mut self, max_long_side: u32) -> Self {
        self.max_long_side = max_long_side.max(1);
        self
    }

    /// Set the crop mode passed to the image processor.
    #[must_use]
    pub fn with_crop_mode(mut self, crop_mode: CropMode) -> Self {
        self.crop_mode = crop_mode;
        self
    }

    /// Create scratch directories under `root` instead of the system temp
    /// directory. Useful when frames of long videos would not fit in `/tmp`.
    #[must_use]
    pub fn with_scratch_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.scratch_root = Some(root.as_ref().to_path_buf());
        self
    }

    /// Set the image format of intermediate frame files.
    #[must_use]
    pub fn with_scratch_format(mut self, format: ScratchFormat) -> Self {
        self.scratch_format = format;
        self
    }

    /// Replace the recognized video extensions (without the leading dot,
    /// matched case-insensitively).
    ///
    /// An empty list is ignored.
    #[must_use]
    pub fn with_video_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: Vec<String> = extensions
            .into_iter()
            .map(|extension| {
                extension
                    .as_ref()
                    .trim_start_matches('.')
                    .to_ascii_lowercase()
            })
            .filter(|extension| !extension.is_empty())
            .collect();
        if !extensions.is_empty() {
            self.video_extensions = extensions;
        }
        self
    }

    /// Report stage progress to `callback`, once per
    /// [`batch_size`](DatasetOptions::with_batch_size) frames.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Stop loading at the next frame once `token` is cancelled. The
    /// interrupted call returns
    /// [`FrameBatchError::Cancelled`](crate::FrameBatchError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Report progress every `size` frames. Zero is treated as 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured long-side limit.
    pub fn max_long_side(&self) -> u32 {
        self.max_long_side
    }

    /// The configured crop mode.
    pub fn crop_mode(&self) -> CropMode {
        self.crop_mode
    }

    /// Returns `true` if `path` has one of the configured video extensions.
    pub fn is_video(&self, path: &Path) -> bool {
        has_extension(path, self.video_extensions.as_slice())
    }

    /// Returns `true` if `path` has the array frame extension.
    pub fn is_array(&self, path: &Path) -> bool {
        has_extension(path, &[ARRAY_EXTENSION])
    }

    /// Whether the attached token, if any, has been cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            extensions
                .iter()
                .any(|candidate| extension.eq_ignore_ascii_case(candidate.as_ref()))
        })
}
