//! NumPy `.npy` array codec.
//!
//! Arrays are kept as raw little-endian bytes plus a parsed header, so members we do not
//! interpret (`slice_info`, pickled objects) survive a rewrite byte-for-byte. Typed views are
//! produced on demand.
//!
//! Layout: `\x93NUMPY` magic, two version bytes, header length (`u16` for 1.0, `u32` for 2.0
//! and 3.0), then a Python dict literal padded with spaces to a 64 byte boundary and
//! terminated by `\n`.
#![allow(clippy::cast_possible_truncation)]

use ndarray::{Array2, ShapeBuilder};

use crate::error::{ProjectError, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;
const V1_PREAMBLE: usize = 10;
const V2_PREAMBLE: usize = 12;

/// Element type of an array, decoded from its `descr` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// Fixed-width UTF-32 string holding up to `n` code points.
    Unicode(usize),
    /// Pickled Python objects. Carried opaquely, never decoded.
    Object,
}

impl DType {
    fn parse(descr: &str) -> Result<Self> {
        let mut chars = descr.chars();
        let order = chars.next().unwrap_or('|');
        let (order, body) = if matches!(order, '<' | '>' | '|' | '=') {
            (order, chars.as_str())
        } else {
            ('|', descr)
        };

        let dtype = match body {
            "b1" => Self::Bool,
            "u1" => Self::U8,
            "i1" => Self::I8,
            "u2" => Self::U16,
            "i2" => Self::I16,
            "u4" => Self::U32,
            "i4" => Self::I32,
            "u8" => Self::U64,
            "i8" => Self::I64,
            "f4" => Self::F32,
            "f8" => Self::F64,
            "O" => Self::Object,
            other if other.starts_with('U') => {
                let width = other[1..].parse::<usize>().map_err(|_| {
                    ProjectError::invalid_array(format!("bad unicode width in descr {descr:?}"))
                })?;
                Self::Unicode(width)
            }
            _ => {
                return Err(ProjectError::invalid_array(format!(
                    "unsupported dtype descr {descr:?}"
                )));
            }
        };

        if order == '>' && dtype.item_size().is_some_and(|size| size > 1) {
            return Err(ProjectError::invalid_array(format!(
                "big-endian dtype {descr:?} is not supported"
            )));
        }
        Ok(dtype)
    }

    fn descr(self) -> String {
        match self {
            Self::Bool => "|b1".into(),
            Self::U8 => "|u1".into(),
            Self::I8 => "|i1".into(),
            Self::U16 => "<u2".into(),
            Self::I16 => "<i2".into(),
            Self::U32 => "<u4".into(),
            Self::I32 => "<i4".into(),
            Self::U64 => "<u8".into(),
            Self::I64 => "<i8".into(),
            Self::F32 => "<f4".into(),
            Self::F64 => "<f8".into(),
            Self::Unicode(width) => format!("<U{width}"),
            Self::Object => "|O".into(),
        }
    }

    /// Bytes per element, `None` for pickled objects.
    #[must_use]
    pub fn item_size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::Unicode(width) => Some(width * 4),
            Self::Object => None,
        }
    }

    fn is_numeric(self) -> bool {
        !matches!(self, Self::Unicode(_) | Self::Object)
    }
}

/// Rust scalar types that can be written into an `.npy` payload.
pub trait NpyElement: Copy {
    const DTYPE: DType;
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! numeric_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl NpyElement for $ty {
                const DTYPE: DType = DType::$dtype;
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

numeric_element!(u8 => U8, i16 => I16, i32 => I32, i64 => I64, f32 => F32, f64 => F64);

impl NpyElement for bool {
    const DTYPE: DType = DType::Bool;
    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

/// One `.npy` array: header fields plus the raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    dtype: DType,
    shape: Vec<usize>,
    fortran_order: bool,
    data: Vec<u8>,
}

impl NpyArray {
    /// Decode an array from the bytes of a `.npy` file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < V1_PREAMBLE || &bytes[..MAGIC.len()] != MAGIC {
            return Err(ProjectError::invalid_array("missing .npy magic"));
        }
        let major = bytes[6];
        let (header_len, header_start) = match major {
            1 => (
                u16::from_le_bytes([bytes[8], bytes[9]]) as usize,
                V1_PREAMBLE,
            ),
            2 | 3 => {
                if bytes.len() < V2_PREAMBLE {
                    return Err(ProjectError::invalid_array("truncated .npy preamble"));
                }
                (
                    u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                    V2_PREAMBLE,
                )
            }
            other => {
                return Err(ProjectError::invalid_array(format!(
                    "unsupported .npy format version {other}"
                )));
            }
        };

        let data_start = header_start + header_len;
        if bytes.len() < data_start {
            return Err(ProjectError::invalid_array("truncated .npy header"));
        }
        let header = std::str::from_utf8(&bytes[header_start..data_start])
            .map_err(|_| ProjectError::invalid_array(".npy header is not text"))?;

        let descr = quoted_value(header, "descr")?;
        let dtype = DType::parse(descr)?;
        let fortran_order = match raw_value(header, "fortran_order")? {
            value if value.starts_with("True") => true,
            value if value.starts_with("False") => false,
            value => {
                return Err(ProjectError::invalid_array(format!(
                    "bad fortran_order value {value:?}"
                )));
            }
        };
        let shape = parse_shape(raw_value(header, "shape")?)?;

        let payload = &bytes[data_start..];
        let data = match dtype.item_size() {
            Some(item_size) => {
                let expected = shape
                    .iter()
                    .try_fold(item_size, |bytes, &dim| bytes.checked_mul(dim))
                    .ok_or_else(|| {
                        ProjectError::invalid_array(format!(
                            "shape {shape:?} overflows the addressable size"
                        ))
                    })?;
                if payload.len() < expected {
                    return Err(ProjectError::invalid_array(format!(
                        "payload holds {} bytes, shape {shape:?} needs {expected}",
                        payload.len()
                    )));
                }
                payload[..expected].to_vec()
            }
            None => payload.to_vec(),
        };

        Ok(Self {
            dtype,
            shape,
            fortran_order,
            data,
        })
    }

    /// Encode as a `.npy` file, format 1.0 unless the header needs more room.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}",
            self.dtype.descr(),
            if self.fortran_order { "True" } else { "False" },
            format_shape(&self.shape),
        );

        let mut preamble = V1_PREAMBLE;
        let mut unpadded = preamble + header.len() + 1;
        let mut padded = unpadded.div_ceil(HEADER_ALIGN) * HEADER_ALIGN;
        if padded - preamble > usize::from(u16::MAX) {
            preamble = V2_PREAMBLE;
            unpadded = preamble + header.len() + 1;
            padded = unpadded.div_ceil(HEADER_ALIGN) * HEADER_ALIGN;
        }
        header.extend(std::iter::repeat_n(' ', padded - unpadded));
        header.push('\n');

        let mut out = Vec::with_capacity(padded + self.data.len());
        out.extend_from_slice(MAGIC);
        if preamble == V1_PREAMBLE {
            out.extend_from_slice(&[1, 0]);
            out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        } else {
            out.extend_from_slice(&[2, 0]);
            out.extend_from_slice(&(header.len() as u32).to_le_bytes());
        }
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Row-major 2-D array.
    #[must_use]
    pub fn from_matrix<T: NpyElement>(matrix: &Array2<T>) -> Self {
        let mut data = Vec::with_capacity(matrix.len() * T::DTYPE.item_size().unwrap_or(1));
        for value in matrix {
            value.write_le(&mut data);
        }
        Self {
            dtype: T::DTYPE,
            shape: matrix.shape().to_vec(),
            fortran_order: false,
            data,
        }
    }

    /// One-dimensional array.
    #[must_use]
    pub fn from_values<T: NpyElement>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.item_size().unwrap_or(1));
        for value in values {
            value.write_le(&mut data);
        }
        Self {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            fortran_order: false,
            data,
        }
    }

    /// Mask stored as `uint8` zeros and ones.
    #[must_use]
    pub fn from_mask(mask: &Array2<bool>) -> Self {
        Self::from_matrix(&mask.mapv(u8::from))
    }

    /// One-dimensional fixed-width unicode array.
    #[must_use]
    pub fn from_strings<S: AsRef<str>>(values: &[S]) -> Self {
        let width = values
            .iter()
            .map(|value| value.as_ref().chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        let mut data = Vec::with_capacity(values.len() * width * 4);
        for value in values {
            let mut written = 0;
            for ch in value.as_ref().chars() {
                data.extend_from_slice(&u32::from(ch).to_le_bytes());
                written += 1;
            }
            data.extend(std::iter::repeat_n(0u8, (width - written) * 4));
        }
        Self {
            dtype: DType::Unicode(width),
            shape: vec![values.len()],
            fortran_order: false,
            data,
        }
    }

    /// Zero-dimensional placeholder. A current mask with this shape means "unchanged from the
    /// prediction".
    #[must_use]
    pub fn empty_sentinel() -> Self {
        Self {
            dtype: DType::U8,
            shape: Vec::new(),
            fortran_order: false,
            data: vec![0],
        }
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements (1 for a zero-dimensional array).
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn is_empty_sentinel(&self) -> bool {
        self.shape.is_empty()
    }

    /// Numeric elements widened to `f64`, in storage order.
    pub fn to_f64_values(&self) -> Result<Vec<f64>> {
        if !self.dtype.is_numeric() {
            return Err(ProjectError::invalid_array(format!(
                "expected a numeric array, found {}",
                self.dtype.descr()
            )));
        }
        let values = match self.dtype {
            DType::Bool | DType::U8 => self.data.iter().map(|&b| f64::from(b)).collect(),
            DType::I8 => self
                .data
                .iter()
                .map(|&b| f64::from(i8::from_le_bytes([b])))
                .collect(),
            DType::U16 => decode(&self.data, |b: [u8; 2]| f64::from(u16::from_le_bytes(b))),
            DType::I16 => decode(&self.data, |b: [u8; 2]| f64::from(i16::from_le_bytes(b))),
            DType::U32 => decode(&self.data, |b: [u8; 4]| f64::from(u32::from_le_bytes(b))),
            DType::I32 => decode(&self.data, |b: [u8; 4]| f64::from(i32::from_le_bytes(b))),
            DType::F32 => decode(&self.data, |b: [u8; 4]| f64::from(f32::from_le_bytes(b))),
            DType::U64 => decode(&self.data, |b: [u8; 8]| u64::from_le_bytes(b) as f64),
            DType::I64 => decode(&self.data, |b: [u8; 8]| i64::from_le_bytes(b) as f64),
            DType::F64 => decode(&self.data, f64::from_le_bytes),
            DType::Unicode(_) | DType::Object => Vec::new(),
        };
        Ok(values)
    }

    /// Two-dimensional numeric array widened to `f64`.
    pub fn to_matrix_f64(&self) -> Result<Array2<f64>> {
        let (rows, cols) = self.dims2()?;
        let values = self.to_f64_values()?;
        let matrix = if self.fortran_order {
            Array2::from_shape_vec((rows, cols).f(), values)
        } else {
            Array2::from_shape_vec((rows, cols), values)
        };
        matrix.map_err(|err| ProjectError::invalid_array(err.to_string()))
    }

    /// Two-dimensional array read as a mask: any non-zero element is set.
    pub fn to_mask(&self) -> Result<Array2<bool>> {
        Ok(self.to_matrix_f64()?.mapv(|value| value != 0.0))
    }

    /// Fixed-width unicode elements with trailing NULs stripped.
    pub fn to_strings(&self) -> Result<Vec<String>> {
        let DType::Unicode(width) = self.dtype else {
            return Err(ProjectError::invalid_array(format!(
                "expected a unicode array, found {}",
                self.dtype.descr()
            )));
        };
        if width == 0 {
            return Ok(vec![String::new(); self.len()]);
        }
        self.data
            .chunks_exact(width * 4)
            .map(|item| {
                item.chunks_exact(4)
                    .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .take_while(|&code| code != 0)
                    .map(|code| {
                        char::from_u32(code).ok_or_else(|| {
                            ProjectError::invalid_array(format!("invalid code point {code:#x}"))
                        })
                    })
                    .collect::<Result<String>>()
            })
            .collect()
    }

    fn dims2(&self) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            other => Err(ProjectError::invalid_array(format!(
                "expected a 2-D array, found shape {other:?}"
            ))),
        }
    }
}

fn decode<const N: usize>(data: &[u8], convert: impl Fn([u8; N]) -> f64) -> Vec<f64> {
    data.chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            convert(bytes)
        })
        .collect()
}

/// Text following `'key':` in the header dict, left-trimmed.
fn raw_value<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let needle = format!("'{key}':");
    let start = header.find(&needle).ok_or_else(|| {
        ProjectError::invalid_array(format!(".npy header has no {key:?} entry"))
    })?;
    Ok(header[start + needle.len()..].trim_start())
}

fn quoted_value<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let value = raw_value(header, key)?;
    let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"');
    let Some(quote) = quote else {
        return Err(ProjectError::invalid_array(format!(
            "structured dtypes are not supported ({key} = {value:.32})"
        )));
    };
    let body = &value[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| ProjectError::invalid_array(format!("unterminated {key} string")))?;
    Ok(&body[..end])
}

fn parse_shape(value: &str) -> Result<Vec<usize>> {
    let inner = value
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(inner, _)| inner)
        .ok_or_else(|| ProjectError::invalid_array(format!("bad shape {value:.32}")))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| ProjectError::invalid_array(format!("bad shape dimension {dim:?}")))
        })
        .collect()
}

fn format_shape(shape: &[usize]) -> String {
    match shape {
        [] => "()".into(),
        [single] => format!("({single},)"),
        dims => format!(
            "({})",
            dims.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
