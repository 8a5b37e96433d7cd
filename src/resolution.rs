//! Target resolution for a sequence.
//!
//! Every frame of a sequence is processed at one resolution, chosen from the
//! sequence's first frame. Frames whose long side exceeds a limit (2044 px by
//! default) are scaled down with their aspect ratio preserved.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use crate::error::FrameBatchError;

/// Default upper bound for the long side of processed frames, in pixels.
pub const DEFAULT_MAX_LONG_SIDE: u32 = 2044;

/// A frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Create a resolution from a width and height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The larger of width and height.
    pub fn long_side(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Clamp this resolution so its long side is at most `max_long_side`.
    ///
    /// When the long side exceeds the limit it becomes exactly
    /// `max_long_side` and the short side is scaled by the same ratio,
    /// rounded down (never below 1). Resolutions within the limit are
    /// returned unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use framebatch::Resolution;
    ///
    /// assert_eq!(Resolution::new(4000, 2000).clamp_long_side(2044), Resolution::new(2044, 1022));
    /// assert_eq!(Resolution::new(1000, 500).clamp_long_side(2044), Resolution::new(1000, 500));
    /// ```
    #[must_use]
    pub fn clamp_long_side(self, max_long_side: u32) -> Self {
        let long_side = self.long_side();
        if long_side <= max_long_side || max_long_side == 0 {
            return self;
        }

        let scale = |side: u32| -> u32 {
            let scaled = u64::from(side) * u64::from(max_long_side) / u64::from(long_side);
            (scaled as u32).max(1)
        };

        if self.width >= self.height {
            Self::new(max_long_side, scale(self.height))
        } else {
            Self::new(scale(self.width), max_long_side)
        }
    }

    /// Read the size of an image file and clamp it with
    /// [`clamp_long_side`](Resolution::clamp_long_side).
    ///
    /// Only the image header is read.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::ImageError`] if the file is not a readable
    /// image.
    pub fn of_first_frame<P: AsRef<Path>>(
        path: P,
        max_long_side: u32,
    ) -> Result<Self, FrameBatchError> {
        let (width, height) = image::image_dimensions(path.as_ref())?;
        let native = Self::new(width, height);
        let target = native.clamp_long_side(max_long_side);

        if target != native {
            log::info!("resizing long side to {max_long_side}");
            log::info!("new resolution: {target}");
        }

        Ok(target)
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}
