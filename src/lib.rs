//! # framebatch
//!
//! Turn videos and folders of `.npy` frames into batched image tensors.
//!
//! A [`SequenceDataset`] is rooted at one of three kinds of input:
//!
//! - a single video file: one sequence,
//! - a directory of video files: one sequence per video,
//! - a directory of `.npy` frames: the directory is one sequence.
//!
//! Each sequence becomes a [`Sample`]: every frame, in the order given by the
//! number in its file name, resized to a common resolution (the first
//! frame's, with the long side capped at 2044 px) and stacked into an
//! [`ndarray::Array4<f32>`] of shape `(frames, channels, height, width)`.
//! Video decoding goes through FFmpeg via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next).
//!
//! ## Quick Start
//!
//! ```no_run
//! use framebatch::SequenceDataset;
//!
//! let dataset = SequenceDataset::open("clips/")?;
//! for sample in &dataset {
//!     let sample = sample?;
//!     println!("{}: {:?}", sample.scene_name, sample.shape());
//! }
//! # Ok::<(), framebatch::FrameBatchError>(())
//! ```
//!
//! ### Options
//!
//! ```no_run
//! use framebatch::{CropMode, DatasetOptions, ResizeProcessor, SequenceDataset};
//!
//! let options = DatasetOptions::new()
//!     .with_max_long_side(1022)
//!     .with_crop_mode(CropMode::Center)
//!     .with_scratch_root("/mnt/large");
//! let dataset = SequenceDataset::open_with_options("scene_042/", options)?
//!     .with_processor(ResizeProcessor::new().with_imagenet_normalization());
//! let sample = dataset.get(0)?;
//! # Ok::<(), framebatch::FrameBatchError>(())
//! ```
//!
//! ## Intermediate frames
//!
//! Frames are written to a per-sample scratch directory before processing
//! and the directory is removed before `get` returns, on success or failure.
//! Point [`DatasetOptions::with_scratch_root`] at a large disk when videos
//! are long.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | `samples_parallel()` loads every sample on the rayon pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build this crate.

mod conversion;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ffmpeg;
pub mod metadata;
pub mod normalize;
pub mod npy;
pub mod ordering;
pub mod processor;
pub mod progress;
#[cfg(feature = "rayon")]
mod rayon;
pub mod resolution;
pub mod scratch;
pub mod source;
pub mod video;

pub use config::{ARRAY_EXTENSION, DEFAULT_VIDEO_EXTENSIONS, DatasetOptions};
pub use dataset::{Sample, SampleIter, SequenceDataset};
pub use error::FrameBatchError;
pub use ffmpeg::{DecoderLogLevel, set_decoder_log_level};
pub use metadata::VideoMetadata;
pub use normalize::{load_frame_image, to_channel_last, to_image, to_u8};
pub use npy::NpyArray;
pub use ordering::{numeric_key, sort_numerically};
pub use processor::{
    CropMode, IMAGENET_MEAN, IMAGENET_STD, ImageMetadata, ImageProcessor, ResizeProcessor,
};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use resolution::{DEFAULT_MAX_LONG_SIDE, Resolution};
pub use scratch::{ScratchDir, ScratchFormat};
pub use source::{SequenceKind, SequenceSource};
pub use video::{ExtractionReport, VideoReader};
