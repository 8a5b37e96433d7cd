//! Error types for the `framebatch` crate.
//!
//! This module defines [`FrameBatchError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry the offending path or
//! file name so a training loop can decide to skip or abort without extra
//! logging at the call site.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use ndarray::ShapeError;
use thiserror::Error;

/// The unified error type for all `framebatch` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameBatchError {
    /// The dataset root is neither a video file nor a directory holding
    /// video or array files.
    #[error("Invalid input {path}: provide a video file or a directory of video/.npy files")]
    InvalidInput {
        /// Root path passed to [`crate::SequenceDataset::open`].
        path: PathBuf,
    },

    /// A video could not be opened or decoded.
    #[error("Failed to decode video {path}: {reason}")]
    DecodeError {
        /// Path of the video file.
        path: PathBuf,
        /// Underlying reason the decode failed.
        reason: String,
    },

    /// A sequence yielded no frames.
    #[error("No frames found in {path}")]
    NoFramesFound {
        /// Directory or video that produced no frames.
        path: PathBuf,
    },

    /// A frame file name carries no digits to order it by.
    #[error("Frame file name {name:?} contains no digits")]
    MissingDigits {
        /// The offending file name.
        name: String,
    },

    /// The digits of a frame file name do not fit a frame index.
    #[error("Frame file name {name:?} has an unusable frame index")]
    InvalidFrameName {
        /// The offending file name.
        name: String,
    },

    /// An `.npy` file is malformed or uses an unsupported dtype.
    #[error("Invalid .npy file {path}: {reason}")]
    NpyFormat {
        /// Path of the array file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// An array cannot be interpreted as an image.
    #[error("Array {path} has unsupported shape {shape:?}")]
    UnsupportedArray {
        /// Path of the array file.
        path: PathBuf,
        /// Shape as stored in the file.
        shape: Vec<usize>,
    },

    /// Per-frame tensors of one sequence disagree in shape.
    #[error("Frame tensors cannot be stacked: {0}")]
    ShapeMismatch(String),

    /// The requested sample index exceeds the sequence count.
    #[error("Sample {index} is out of range (dataset has {len} sequences)")]
    IndexOutOfRange {
        /// The index that was requested.
        index: usize,
        /// Number of sequences in the dataset.
        len: usize,
    },

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while reading or writing frames.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for FrameBatchError {
    fn from(error: FfmpegError) -> Self {
        FrameBatchError::FfmpegError(error.to_string())
    }
}

impl From<ShapeError> for FrameBatchError {
    fn from(error: ShapeError) -> Self {
        FrameBatchError::ShapeMismatch(error.to_string())
    }
}
