//! Video frame extraction.
//!
//! [`VideoReader`] opens a video through FFmpeg and decodes every frame, in
//! order and without skipping, into a [`ScratchDir`] as numbered image
//! files. The files are then fed through the same per-image pipeline as
//! every other frame source.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    util::error::EAGAIN,
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::{
    config::DatasetOptions,
    conversion::{frame_to_rgb_buffer, stream_frame_rate},
    error::FrameBatchError,
    metadata::VideoMetadata,
    progress::{OperationType, ProgressTracker},
    scratch::ScratchDir,
};

/// Outcome of decoding a video into scratch storage.
///
/// A decode failure before the reported frame count ends extraction early
/// without an error; `dropped` records how many frames were lost that way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Frame count reported by the container, if it reported one.
    pub expected: Option<u64>,
    /// Frames written to scratch storage.
    pub extracted: u64,
    /// Frames missing relative to `expected` because decoding stopped early.
    pub dropped: u64,
}

impl ExtractionReport {
    /// `true` if decoding stopped before the reported frame count.
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// An opened video file.
///
/// Created via [`VideoReader::open`]. Holds the demuxer and the cached
/// [`VideoMetadata`] of the best video stream.
pub struct VideoReader {
    input_context: Input,
    stream_index: usize,
    metadata: VideoMetadata,
    /// Frame count stored in the container. `None` when `metadata` holds an
    /// estimate from duration and frame rate.
    stored_frame_count: Option<u64>,
    path: PathBuf,
}

impl Debug for VideoReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoReader")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl VideoReader {
    /// Open a video file.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, and locates the best
    /// video stream.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::DecodeError`] if the file cannot be opened,
    /// has no video stream, or reports a frame rate of zero.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FrameBatchError> {
        let path = path.as_ref().to_path_buf();
        let decode_error = |reason: String| FrameBatchError::DecodeError {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video: {}", path.display());

        ffmpeg_next::init()
            .map_err(|error| decode_error(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context = ffmpeg_next::format::input(&path)
            .map_err(|error| decode_error(format!("cannot open video file: {error}")))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| decode_error("no video stream found".to_string()))?;
        let stream_index = stream.index();

        let decoder_context = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| decode_error(format!("cannot read codec parameters: {error}")))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| decode_error(format!("cannot create video decoder: {error}")))?;

        let frames_per_second = stream_frame_rate(stream.avg_frame_rate(), stream.rate())
            .ok_or_else(|| decode_error("video reports a frame rate of 0".to_string()))?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let stored_frame_count = (stream.frames() > 0).then(|| stream.frames() as u64);
        let frame_count = stored_frame_count
            .unwrap_or_else(|| (duration.as_secs_f64() * frames_per_second) as u64);

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
        };

        log::info!(
            "Opened video {} ({}x{}, {:.2} fps, {} frames, codec={})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
            metadata.codec,
        );

        Ok(Self {
            input_context,
            stream_index,
            metadata,
            stored_frame_count,
            path,
        })
    }

    /// Get a reference to the cached video metadata.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode every frame into `scratch` as `frame_<n>` image files.
    ///
    /// Frames are written in decode order starting at `frame_0`. Extraction
    /// stops at the frame count stored in the container when there is one;
    /// an estimated count only sizes progress reports. If the decoder
    /// rejects a packet before that count is reached, extraction stops
    /// early: the frames written so far are kept, a warning is logged, and
    /// the shortfall is recorded in the returned [`ExtractionReport`].
    ///
    /// # Errors
    ///
    /// - [`FrameBatchError::Cancelled`] if the options' cancellation token
    ///   fires.
    /// - [`FrameBatchError::ImageError`] if a frame cannot be written.
    /// - [`FrameBatchError::FfmpegError`] if the decoder cannot be set up.
    pub fn extract_frames(
        &mut self,
        scratch: &ScratchDir,
        options: &DatasetOptions,
    ) -> Result<(Vec<PathBuf>, ExtractionReport), FrameBatchError> {
        let expected = self.stored_frame_count;
        let estimated = (self.metadata.frame_count > 0).then_some(self.metadata.frame_count);

        let stream = self
            .input_context
            .stream(self.stream_index)
            .ok_or_else(|| FrameBatchError::DecodeError {
                path: self.path.clone(),
                reason: "video stream disappeared".to_string(),
            })?;
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video()?;

        let mut sink = FrameSink {
            path: &self.path,
            scratch,
            options,
            decoder,
            scaler: None,
            written: Vec::new(),
            limit: expected,
            tracker: ProgressTracker::new(
                options.progress.clone(),
                OperationType::FrameExtraction,
                expected.or(estimated),
                options.batch_size,
            ),
        };

        let mut truncated = false;
        for (stream, packet) in self.input_context.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            if sink.is_full() {
                break;
            }

            if let Err(error) = sink.decoder.send_packet(&packet) {
                log::warn!(
                    "Decoding {} failed after {} frames: {error}",
                    self.path.display(),
                    sink.written.len(),
                );
                truncated = true;
                break;
            }
            sink.drain()?;
        }

        if !truncated && !sink.is_full() && sink.decoder.send_eof().is_ok() {
            sink.drain()?;
        }
        sink.tracker.finish();

        let extracted = sink.written.len() as u64;
        let dropped = expected.map_or(0, |expected| expected.saturating_sub(extracted));
        if dropped > 0 {
            log::warn!(
                "Dropped {dropped} of {} frames from {}",
                expected.unwrap_or_default(),
                self.path.display(),
            );
        }

        log::debug!(
            "Extracted {extracted} frames from {} into {}",
            self.path.display(),
            scratch.path().display(),
        );

        Ok((
            sink.written,
            ExtractionReport {
                expected,
                extracted,
                dropped,
            },
        ))
    }
}

/// Receives decoded frames, converts them to RGB and writes them out.
struct FrameSink<'a> {
    path: &'a Path,
    scratch: &'a ScratchDir,
    options: &'a DatasetOptions,
    decoder: VideoDecoder,
    scaler: Option<ScalingContext>,
    written: Vec<PathBuf>,
    limit: Option<u64>,
    tracker: ProgressTracker,
}

impl FrameSink<'_> {
    fn is_full(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.written.len() as u64 >= limit)
    }

    /// Pull every frame the decoder has ready.
    fn drain(&mut self) -> Result<(), FrameBatchError> {
        let mut decoded_frame = VideoFrame::empty();
        while !self.is_full() {
            match self.decoder.receive_frame(&mut decoded_frame) {
                Ok(()) => {}
                Err(FfmpegError::Eof) => break,
                Err(FfmpegError::Other { errno }) if errno == EAGAIN => break,
                Err(error) => {
                    log::debug!(
                        "Decoder rejected frame {} of {}: {error}",
                        self.written.len(),
                        self.path.display(),
                    );
                    break;
                }
            }
            if self.options.is_cancelled() {
                return Err(FrameBatchError::Cancelled);
            }
            let image = self.convert(&decoded_frame)?;
            let frame_number = self.written.len() as u64;
            let path = self
                .scratch
                .write_frame(&format!("frame_{frame_number}"), &image)?;
            self.written.push(path);
            self.tracker.advance(Some(frame_number));
        }
        Ok(())
    }

    /// Convert a decoded frame of any pixel format to RGB8 at native size.
    fn convert(&mut self, decoded_frame: &VideoFrame) -> Result<DynamicImage, FrameBatchError> {
        let (width, height, format) = (
            decoded_frame.width(),
            decoded_frame.height(),
            decoded_frame.format(),
        );

        let stale = self.scaler.as_ref().is_none_or(|scaler| {
            scaler.input().width != width
                || scaler.input().height != height
                || scaler.input().format != format
        });
        if stale {
            self.scaler = Some(ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?);
        }

        let mut rgb_frame = VideoFrame::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(decoded_frame, &mut rgb_frame)?;
        }

        let buffer = frame_to_rgb_buffer(&rgb_frame, width, height);
        let rgb_image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            FrameBatchError::FfmpegError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(rgb_image))
    }
}
