//! Video metadata types.
//!
//! [`VideoMetadata`] is read once when a [`VideoReader`](crate::VideoReader)
//! opens a file and cached for the lifetime of the reader.

use std::time::Duration;

/// Metadata for the best video stream of a file.
///
/// # Example
///
/// ```no_run
/// use framebatch::VideoReader;
///
/// let reader = VideoReader::open("clip.mp4")?;
/// let metadata = reader.metadata();
/// println!("{}x{} @ {:.2} fps", metadata.width, metadata.height, metadata.frames_per_second);
/// # Ok::<(), framebatch::FrameBatchError>(())
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Frame count reported by the container, or estimated from duration and
    /// frame rate when the container does not store one. `0` when unknown.
    pub frame_count: u64,
    /// Total duration of the file.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"mpeg4"`, `"vp9"`).
    pub codec: String,
}
