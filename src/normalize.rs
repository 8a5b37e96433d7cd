//! Conversion of loaded arrays into 8-bit images.
//!
//! Arrays in a frame folder come in whatever layout the producer used:
//! `uint8` or float, channel-first `(3, H, W)` or channel-last `(H, W, C)`,
//! or single-channel `(H, W)`. Everything is brought to channel-last `u8`
//! before being handed to the image pipeline.

use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use ndarray::{Array3, ArrayD, Axis, Ix3};

use crate::{error::FrameBatchError, npy::NpyArray};

/// Bring array values into `u8`.
///
/// `uint8` arrays pass through untouched. Other arrays whose maximum is at
/// most `1.0` are treated as unit-normalized and multiplied by 255; larger
/// values are cast directly. Both paths truncate toward zero and wrap
/// modulo 256, the way a C cast to `uint8` does.
pub fn to_u8(array: NpyArray) -> ArrayD<u8> {
    match array {
        NpyArray::U8(array) => array,
        NpyArray::F64(array) => {
            let max = array.fold(f64::NEG_INFINITY, |max, &value| max.max(value));
            let unit_range = max <= 1.0;
            array.mapv(|value| wrap_u8(if unit_range { value * 255.0 } else { value }))
        }
    }
}

fn wrap_u8(value: f64) -> u8 {
    if value.is_finite() {
        (value.trunc() as i64) as u8
    } else {
        0
    }
}

/// Reorder a `u8` array into `(H, W, C)`.
///
/// - `(3, H, W)` is transposed to `(H, W, 3)`.
/// - `(H, W)` gains a trailing channel axis.
/// - `(H, W, C)` with `C` of 1, 3 or 4 is kept.
///
/// # Errors
///
/// Returns [`FrameBatchError::UnsupportedArray`] for any other shape or for
/// a zero-sized image.
pub fn to_channel_last(array: ArrayD<u8>, path: &Path) -> Result<Array3<u8>, FrameBatchError> {
    let unsupported = || FrameBatchError::UnsupportedArray {
        path: path.to_path_buf(),
        shape: array.shape().to_vec(),
    };

    let shape = array.shape().to_vec();
    let array = match shape.as_slice() {
        [_, _] => array.clone().insert_axis(Axis(2)),
        [3, _, _] => array.clone().permuted_axes(vec![1, 2, 0]),
        [_, _, 1 | 3 | 4] => array.clone(),
        _ => return Err(unsupported()),
    };

    let array = array
        .as_standard_layout()
        .into_owned()
        .into_dimensionality::<Ix3>()?;

    let (height, width, _) = array.dim();
    if height == 0 || width == 0 {
        return Err(unsupported());
    }
    Ok(array)
}

/// Wrap a `(H, W, C)` array as an image: Luma8, Rgb8 or Rgba8 by channel
/// count.
///
/// # Errors
///
/// Returns [`FrameBatchError::ShapeMismatch`] if the channel count is not
/// 1, 3 or 4.
pub fn to_image(array: &Array3<u8>) -> Result<DynamicImage, FrameBatchError> {
    let (height, width, channels) = array.dim();
    let raw: Vec<u8> = array.iter().copied().collect();
    let (width, height) = (width as u32, height as u32);

    let image = match channels {
        1 => GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, raw).map(DynamicImage::ImageRgba8),
        _ => None,
    };

    image.ok_or_else(|| {
        FrameBatchError::ShapeMismatch(format!(
            "cannot build an image from a {height}x{width}x{channels} array"
        ))
    })
}

/// Load an `.npy` frame and convert it to an 8-bit image.
///
/// # Errors
///
/// Propagates loading errors, plus
/// [`FrameBatchError::UnsupportedArray`] for shapes that are not images.
pub fn load_frame_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, FrameBatchError> {
    let path = path.as_ref();
    let array = NpyArray::load(path)?;
    log::trace!("Loaded {} with shape {:?}", path.display(), array.shape());
    let array = to_channel_last(to_u8(array), path)?;
    to_image(&array)
}
