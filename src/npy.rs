//! Reader for NumPy `.npy` array files.
//!
//! Frame folders store one image per `.npy` file, usually as `uint8` or
//! `float32`. Only what is needed to recover an image is parsed: the format
//! header (`descr`, `fortran_order`, `shape`) and a plain little- or
//! big-endian numeric payload. Object arrays and structured dtypes are
//! rejected.

use std::path::Path;

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::error::FrameBatchError;

const MAGIC: &[u8] = b"\x93NUMPY";

/// Array data loaded from an `.npy` file, in C (row-major) order.
///
/// `uint8` arrays are kept as bytes; every other supported dtype is widened
/// to `f64`, which holds all of them exactly except 64-bit integers beyond
/// 2^53.
#[derive(Debug, Clone, PartialEq)]
pub enum NpyArray {
    /// An array stored with dtype `uint8`.
    U8(ArrayD<u8>),
    /// An array of any other supported dtype, widened to `f64`.
    F64(ArrayD<f64>),
}

impl NpyArray {
    /// Shape of the array as stored in the file.
    pub fn shape(&self) -> &[usize] {
        match self {
            NpyArray::U8(array) => array.shape(),
            NpyArray::F64(array) => array.shape(),
        }
    }

    /// Read and parse an `.npy` file.
    ///
    /// # Errors
    ///
    /// - [`FrameBatchError::IoError`] if the file cannot be read.
    /// - [`FrameBatchError::NpyFormat`] if it is not a supported `.npy` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FrameBatchError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes).map_err(|reason| FrameBatchError::NpyFormat {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse the bytes of an `.npy` file.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < 10 || &bytes[..6] != MAGIC {
            return Err("missing \\x93NUMPY magic bytes".to_string());
        }

        let major = bytes[6];
        let (header_len, header_start) = match major {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 => {
                if bytes.len() < 12 {
                    return Err("truncated header length".to_string());
                }
                let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
                (len as usize, 12)
            }
            other => return Err(format!("unsupported format version {other}")),
        };

        let data_start = header_start + header_len;
        if bytes.len() < data_start {
            return Err("truncated header".to_string());
        }
        let header = std::str::from_utf8(&bytes[header_start..data_start])
            .map_err(|_| "header is not valid text".to_string())?;
        let header = Header::parse(header)?;

        let payload = &bytes[data_start..];
        let needed = header
            .shape
            .iter()
            .try_fold(header.dtype.size, |total, &dim| total.checked_mul(dim))
            .ok_or_else(|| "array size overflows".to_string())?;
        if payload.len() < needed {
            return Err(format!(
                "payload holds {} bytes, shape {:?} needs {needed}",
                payload.len(),
                header.shape
            ));
        }
        let payload = &payload[..needed];

        let shape = IxDyn(&header.shape).set_f(header.fortran_order);

        let array = match header.dtype.kind {
            Kind::Unsigned if header.dtype.size == 1 => NpyArray::U8(
                ArrayD::from_shape_vec(shape, payload.to_vec())
                    .map_err(|error| error.to_string())?
                    .as_standard_layout()
                    .into_owned(),
            ),
            _ => NpyArray::F64(
                ArrayD::from_shape_vec(shape, header.dtype.widen(payload)?)
                    .map_err(|error| error.to_string())?
                    .as_standard_layout()
                    .into_owned(),
            ),
        };

        Ok(array)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Signed,
    Unsigned,
    Float,
}

#[derive(Debug, Clone, Copy)]
struct Dtype {
    kind: Kind,
    size: usize,
    big_endian: bool,
}

impl Dtype {
    fn parse(descr: &str) -> Result<Self, String> {
        let mut chars = descr.chars();
        let big_endian = match chars.next() {
            Some('>') => true,
            Some('<' | '|') => false,
            Some('=') => cfg!(target_endian = "big"),
            _ => return Err(format!("unsupported dtype {descr:?}")),
        };
        let kind = match chars.next() {
            Some('b') => Kind::Bool,
            Some('i') => Kind::Signed,
            Some('u') => Kind::Unsigned,
            Some('f') => Kind::Float,
            _ => return Err(format!("unsupported dtype {descr:?}")),
        };
        let size: usize = chars
            .as_str()
            .parse()
            .map_err(|_| format!("unsupported dtype {descr:?}"))?;

        let supported = match kind {
            Kind::Bool => size == 1,
            Kind::Signed | Kind::Unsigned => matches!(size, 1 | 2 | 4 | 8),
            Kind::Float => matches!(size, 4 | 8),
        };
        if !supported {
            return Err(format!("unsupported dtype {descr:?}"));
        }

        Ok(Self {
            kind,
            size,
            big_endian,
        })
    }

    /// Decode `payload` element by element into `f64`.
    fn widen(&self, payload: &[u8]) -> Result<Vec<f64>, String> {
        let big = self.big_endian;
        let values: Vec<f64> = match (self.kind, self.size) {
            (Kind::Bool, 1) => payload.iter().map(|&b| f64::from(u8::from(b != 0))).collect(),
            (Kind::Unsigned, 1) => payload.iter().map(|&b| f64::from(b)).collect(),
            (Kind::Signed, 1) => payload.iter().map(|&b| f64::from(b as i8)).collect(),
            (Kind::Unsigned, 2) => decode(payload, |c: [u8; 2]| {
                f64::from(if big { u16::from_be_bytes(c) } else { u16::from_le_bytes(c) })
            }),
            (Kind::Signed, 2) => decode(payload, |c: [u8; 2]| {
                f64::from(if big { i16::from_be_bytes(c) } else { i16::from_le_bytes(c) })
            }),
            (Kind::Unsigned, 4) => decode(payload, |c: [u8; 4]| {
                f64::from(if big { u32::from_be_bytes(c) } else { u32::from_le_bytes(c) })
            }),
            (Kind::Signed, 4) => decode(payload, |c: [u8; 4]| {
                f64::from(if big { i32::from_be_bytes(c) } else { i32::from_le_bytes(c) })
            }),
            (Kind::Unsigned, 8) => decode(payload, |c: [u8; 8]| {
                (if big { u64::from_be_bytes(c) } else { u64::from_le_bytes(c) }) as f64
            }),
            (Kind::Signed, 8) => decode(payload, |c: [u8; 8]| {
                (if big { i64::from_be_bytes(c) } else { i64::from_le_bytes(c) }) as f64
            }),
            (Kind::Float, 4) => decode(payload, |c: [u8; 4]| {
                f64::from(if big { f32::from_be_bytes(c) } else { f32::from_le_bytes(c) })
            }),
            (Kind::Float, 8) => decode(payload, |c: [u8; 8]| {
                if big { f64::from_be_bytes(c) } else { f64::from_le_bytes(c) }
            }),
            (kind, size) => return Err(format!("unsupported dtype {kind:?}{size}")),
        };
        Ok(values)
    }
}

fn decode<const N: usize>(payload: &[u8], convert: impl Fn([u8; N]) -> f64) -> Vec<f64> {
    payload
        .chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            convert(bytes)
        })
        .collect()
}

#[derive(Debug)]
struct Header {
    dtype: Dtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl Header {
    /// Parse the Python dict literal, e.g.
    /// `{'descr': '<f4', 'fortran_order': False, 'shape': (3, 64, 64), }`.
    fn parse(text: &str) -> Result<Self, String> {
        let descr = value_after(text, "descr")?;
        let descr = descr
            .strip_prefix(['\'', '"'])
            .and_then(|rest| rest.split(['\'', '"']).next())
            .ok_or_else(|| "malformed 'descr' entry".to_string())?;
        let dtype = Dtype::parse(descr)?;

        let fortran = value_after(text, "fortran_order")?;
        let fortran_order = if fortran.starts_with("True") {
            true
        } else if fortran.starts_with("False") {
            false
        } else {
            return Err("malformed 'fortran_order' entry".to_string());
        };

        let shape_text = value_after(text, "shape")?;
        let shape_text = shape_text
            .strip_prefix('(')
            .and_then(|rest| rest.split(')').next())
            .ok_or_else(|| "malformed 'shape' entry".to_string())?;
        let shape = shape_text
            .split(',')
            .map(str::trim)
            .filter(|dim| !dim.is_empty())
            .map(|dim| {
                dim.trim_end_matches('L')
                    .parse::<usize>()
                    .map_err(|_| format!("malformed dimension {dim:?}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dtype,
            fortran_order,
            shape,
        })
    }
}

/// Return the text following `'key':`, with leading whitespace removed.
fn value_after<'a>(text: &'a str, key: &str) -> Result<&'a str, String> {
    let quoted = [format!("'{key}'"), format!("\"{key}\"")];
    let start = quoted
        .iter()
        .find_map(|needle| text.find(needle.as_str()).map(|at| at + needle.len()))
        .ok_or_else(|| format!("header has no '{key}' entry"))?;
    let rest = text[start..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| format!("malformed '{key}' entry"))?;
    Ok(rest.trim_start())
}
