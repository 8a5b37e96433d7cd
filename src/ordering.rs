//! Frame ordering by the number embedded in a file name.
//!
//! Extracted and saved frames are named like `frame_12.png`. Sorting such
//! names lexicographically puts `frame_10` before `frame_2`; these helpers
//! sort by the integer formed from every digit in the file name instead.

use std::path::{Path, PathBuf};

use crate::error::FrameBatchError;

/// Extract the numeric ordering key of a frame path.
///
/// All ASCII digits of the file name (the directory part is ignored) are
/// concatenated and parsed, so `frame_0012.png` yields `12` and
/// `clip3_frame7.npy` yields `37`.
///
/// # Errors
///
/// - [`FrameBatchError::MissingDigits`] if the file name has no digits.
/// - [`FrameBatchError::InvalidFrameName`] if the digits overflow a `u64`.
///
/// # Example
///
/// ```
/// use framebatch::numeric_key;
///
/// assert_eq!(numeric_key("/tmp/x/frame_10.jpg").unwrap(), 10);
/// assert!(numeric_key("cover.jpg").is_err());
/// ```
pub fn numeric_key<P: AsRef<Path>>(path: P) -> Result<u64, FrameBatchError> {
    let name = path
        .as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(FrameBatchError::MissingDigits { name });
    }

    digits
        .parse::<u64>()
        .map_err(|_| FrameBatchError::InvalidFrameName { name })
}

/// Sort frame paths by [`numeric_key`].
///
/// Keys are computed once up front, then the paths are stable-sorted, so two
/// names with the same key keep their listing order.
///
/// # Errors
///
/// Returns the error of the first path whose key cannot be extracted.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
///
/// use framebatch::sort_numerically;
///
/// let sorted = sort_numerically(vec![
///     PathBuf::from("frame_2.jpg"),
///     PathBuf::from("frame_10.jpg"),
///     PathBuf::from("frame_1.jpg"),
/// ])?;
/// assert_eq!(sorted[2], PathBuf::from("frame_10.jpg"));
/// # Ok::<(), framebatch::FrameBatchError>(())
/// ```
pub fn sort_numerically(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>, FrameBatchError> {
    let mut keyed = paths
        .into_iter()
        .map(|path| numeric_key(&path).map(|key| (key, path)))
        .collect::<Result<Vec<_>, _>>()?;

    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_file_name_only() {
        assert_eq!(numeric_key("run42/frame_7.png").unwrap(), 7);
    }

    #[test]
    fn key_concatenates_every_digit() {
        assert_eq!(numeric_key("clip3_frame7.npy").unwrap(), 37);
        assert_eq!(numeric_key("frame_000012.jpg").unwrap(), 12);
    }

    #[test]
    fn key_without_digits_is_an_error() {
        let error = numeric_key("cover.jpg").unwrap_err();
        assert!(matches!(error, FrameBatchError::MissingDigits { ref name } if name == "cover.jpg"));
    }

    #[test]
    fn key_overflow_is_an_error() {
        let error = numeric_key("frame_99999999999999999999999.png").unwrap_err();
        assert!(matches!(error, FrameBatchError::InvalidFrameName { .. }));
    }

    #[test]
    fn sorts_numbers_not_strings() {
        let sorted = sort_numerically(vec![
            PathBuf::from("frame_2.jpg"),
            PathBuf::from("frame_10.jpg"),
            PathBuf::from("frame_1.jpg"),
        ])
        .unwrap();

        assert_eq!(
            sorted,
            vec![
                PathBuf::from("frame_1.jpg"),
                PathBuf::from("frame_2.jpg"),
                PathBuf::from("frame_10.jpg"),
            ]
        );
    }

    #[test]
    fn equal_keys_keep_listing_order() {
        let sorted = sort_numerically(vec![
            PathBuf::from("b_01.npy"),
            PathBuf::from("a_1.npy"),
            PathBuf::from("c_0.npy"),
        ])
        .unwrap();

        assert_eq!(
            sorted,
            vec![
                PathBuf::from("c_0.npy"),
                PathBuf::from("b_01.npy"),
                PathBuf::from("a_1.npy"),
            ]
        );
    }

    #[test]
    fn sort_fails_on_name_without_digits() {
        let result = sort_numerically(vec![PathBuf::from("frame_1.jpg"), PathBuf::from("x.jpg")]);
        assert!(result.is_err());
    }
}
