//! Per-image processing into tensors.
//!
//! Every frame of a sequence, whatever its source, ends up as an image file
//! that is handed to an [`ImageProcessor`] together with the sequence's
//! target [`Resolution`] and a [`CropMode`]. The processor returns a
//! channel-first `(C, H, W)` tensor plus [`ImageMetadata`].
//!
//! [`ResizeProcessor`] is the built-in implementation; model-specific
//! pipelines plug in by implementing the trait.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use framebatch::{CropMode, ImageProcessor, Resolution, ResizeProcessor};
//!
//! let processor = ResizeProcessor::new().with_imagenet_normalization();
//! let (tensor, metadata) =
//!     processor.process(Path::new("frame_0.png"), Resolution::new(518, 392), CropMode::None)?;
//! assert_eq!(tensor.dim(), (3, 392, 518));
//! println!("original size {}", metadata.original);
//! # Ok::<(), framebatch::FrameBatchError>(())
//! ```

use std::path::Path;

use image::imageops::FilterType;
use ndarray::Array3;

use crate::{error::FrameBatchError, resolution::Resolution};

/// How a frame is fitted to the target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    /// Resize to exactly the target resolution. This is the default.
    #[default]
    None,
    /// Resize to cover the target resolution, preserving aspect ratio, then
    /// crop the center.
    Center,
}

/// Information about how one image was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Size of the image file before processing.
    pub original: Resolution,
    /// Size of the returned tensor's spatial dimensions.
    pub processed: Resolution,
    /// Crop mode that was applied.
    pub crop: CropMode,
}

/// Turns one image file into a `(C, H, W)` tensor.
///
/// Implementations must return tensors of identical shape for every frame
/// of a sequence given the same resolution and crop mode, so that the
/// frames can be stacked into a batch.
pub trait ImageProcessor: Send + Sync {
    /// Load and process the image at `path`.
    ///
    /// # Errors
    ///
    /// Implementations report unreadable images as
    /// [`FrameBatchError::ImageError`].
    fn process(
        &self,
        path: &Path,
        resolution: Resolution,
        crop: CropMode,
    ) -> Result<(Array3<f32>, ImageMetadata), FrameBatchError>;
}

/// Mean of the ImageNet training set, per RGB channel.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Standard deviation of the ImageNet training set, per RGB channel.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Built-in processor: resize, optionally center-crop, scale to `[0, 1]`,
/// and optionally standardize per channel.
///
/// Output tensors always have three (RGB) channels.
#[derive(Debug, Clone)]
pub struct ResizeProcessor {
    filter: FilterType,
    normalization: Option<([f32; 3], [f32; 3])>,
}

impl Default for ResizeProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResizeProcessor {
    /// Create a processor with a triangle (bilinear) filter and no
    /// standardization.
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
            normalization: None,
        }
    }

    /// Set the resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Standardize each channel as `(value - mean) / std` after scaling to
    /// `[0, 1]`.
    #[must_use]
    pub fn with_normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.normalization = Some((mean, std));
        self
    }

    /// Standardize with [`IMAGENET_MEAN`] and [`IMAGENET_STD`].
    #[must_use]
    pub fn with_imagenet_normalization(self) -> Self {
        self.with_normalization(IMAGENET_MEAN, IMAGENET_STD)
    }
}

impl ImageProcessor for ResizeProcessor {
    fn process(
        &self,
        path: &Path,
        resolution: Resolution,
        crop: CropMode,
    ) -> Result<(Array3<f32>, ImageMetadata), FrameBatchError> {
        let image = image::open(path)?;
        let original = Resolution::new(image.width(), image.height());
        let Resolution { width, height } = resolution;

        let resized = if original == resolution {
            image
        } else {
            match crop {
                CropMode::None => image.resize_exact(width, height, self.filter),
                CropMode::Center => image.resize_to_fill(width, height, self.filter),
            }
        };
        let rgb = resized.to_rgb8();

        let mut tensor = Array3::from_shape_fn(
            (3, rgb.height() as usize, rgb.width() as usize),
            |(channel, y, x)| f32::from(rgb.get_pixel(x as u32, y as u32).0[channel]) / 255.0,
        );

        if let Some((mean, std)) = self.normalization {
            for (channel, mut plane) in tensor.outer_iter_mut().enumerate() {
                let (mean, std) = (mean[channel], std[channel]);
                plane.mapv_inplace(|value| (value - mean) / std);
            }
        }

        let processed = Resolution::new(rgb.width(), rgb.height());
        Ok((
            tensor,
            ImageMetadata {
                original,
                processed,
                crop,
            },
        ))
    }
}
