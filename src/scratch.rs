//! Scoped scratch storage for intermediate frame images.
//!
//! A [`ScratchDir`] is created when a sample starts extracting frames and is
//! removed when it is dropped, whether the sample finished or an error
//! propagated out of the extraction.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use tempfile::{Builder as TempBuilder, TempDir};

use crate::error::FrameBatchError;

/// Image format used for intermediate frame files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScratchFormat {
    /// Lossless PNG. This is the default.
    #[default]
    Png,
    /// JPEG. Smaller and faster to write, but lossy.
    Jpeg,
}

impl ScratchFormat {
    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            ScratchFormat::Png => "png",
            ScratchFormat::Jpeg => "jpg",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ScratchFormat::Png => ImageFormat::Png,
            ScratchFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// A temporary directory owned by one in-flight sample.
///
/// The directory and everything in it is deleted on drop.
#[derive(Debug)]
pub struct ScratchDir {
    directory: TempDir,
    format: ScratchFormat,
}

impl ScratchDir {
    /// Create a scratch directory under `root`, or under the system temp
    /// directory when `root` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::IoError`] if the directory cannot be
    /// created.
    pub fn create(root: Option<&Path>, format: ScratchFormat) -> Result<Self, FrameBatchError> {
        let mut builder = TempBuilder::new();
        builder.prefix("framebatch-");
        let directory = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        log::debug!("Created scratch directory {}", directory.path().display());
        Ok(Self { directory, format })
    }

    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        self.directory.path()
    }

    /// Path a frame with the given stem would be written to.
    pub fn frame_path(&self, stem: &str) -> PathBuf {
        self.path()
            .join(format!("{stem}.{}", self.format.extension()))
    }

    /// Write `image` as `<stem>.<ext>` and return the written path.
    ///
    /// JPEG cannot store alpha, so RGBA images are flattened to RGB first.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::ImageError`] if encoding or writing fails.
    pub fn write_frame(
        &self,
        stem: &str,
        image: &DynamicImage,
    ) -> Result<PathBuf, FrameBatchError> {
        let path = self.frame_path(stem);
        match (self.format, image) {
            (ScratchFormat::Jpeg, DynamicImage::ImageRgba8(_)) => {
                DynamicImage::ImageRgb8(image.to_rgb8())
                    .save_with_format(&path, self.format.image_format())?;
            }
            _ => image.save_with_format(&path, self.format.image_format())?,
        }
        Ok(path)
    }

    /// Remove the directory now, reporting any failure.
    ///
    /// Dropping a `ScratchDir` also removes it but ignores errors.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::IoError`] if removal fails.
    pub fn close(self) -> Result<(), FrameBatchError> {
        let path = self.path().to_path_buf();
        self.directory.close()?;
        log::debug!("Removed scratch directory {}", path.display());
        Ok(())
    }
}
