//! Predictor filters for Flate streams.
//!
//! Xref and object streams are commonly written with PNG "Up" prediction
//! (`/Predictor 12`); TIFF predictor 2 is accepted too.

use crate::error::{Error, Result};
use crate::object::Dict;

/// Decode parameters for stream decoders.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample (default 1)
    pub colors: usize,
    /// Bits per component (default 8)
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1, // No prediction
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Row length in the encoded data, including the PNG tag byte.
    pub fn bytes_per_row(&self) -> usize {
        self.pixel_bytes_per_row() + usize::from(self.predictor >= 10)
    }

    /// Row length in the decoded data.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete pixel, at least one.
    pub fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }

    /// Read `/Predictor`, `/Columns`, `/Colors` and `/BitsPerComponent`,
    /// defaulting whatever is missing or out of range.
    pub fn from_dict(dict: &Dict) -> Self {
        let defaults = Self::default();
        let positive = |key: &str, default: usize| {
            dict.get(key)
                .and_then(|v| v.as_integer())
                .filter(|&v| v > 0)
                .map_or(default, |v| v as usize)
        };
        Self {
            predictor: dict
                .get("Predictor")
                .and_then(|v| v.as_integer())
                .unwrap_or(defaults.predictor),
            columns: positive("Columns", defaults.columns),
            colors: positive("Colors", defaults.colors),
            bits_per_component: positive("BitsPerComponent", defaults.bits_per_component),
        }
    }
}

/// Reverse the predictor named by `params`.
///
/// # Errors
///
/// Unknown predictors, data that is not a whole number of rows, and PNG
/// tags above 4.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        p => Err(Error::Decode(format!("Unsupported predictor: {}", p))),
    }
}

/// TIFF predictor 2: each sample is stored as the difference from the
/// sample one pixel to the left.
fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let bytes_per_row = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();

    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component is not supported",
            params.bits_per_component
        )));
    }

    if data.len() % bytes_per_row != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            bytes_per_row
        )));
    }

    let mut output = Vec::with_capacity(data.len());
    for row in data.chunks(bytes_per_row) {
        let start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { output[start + i - bpp] } else { 0 };
            output.push(byte.wrapping_add(left));
        }
    }
    Ok(output)
}

/// Undo PNG row filters. The tag byte of each row picks the filter; the
/// `/Predictor` value itself only says that the rows are tagged.
fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let stride = params.bytes_per_row();
    let pixel_bytes = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();

    if data.len() % stride != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            stride
        )));
    }

    let mut output = Vec::with_capacity(data.len() / stride * pixel_bytes);
    let mut above = vec![0u8; pixel_bytes];

    for (row_idx, row) in data.chunks(stride).enumerate() {
        let tag = row[0];
        if tag > 4 {
            return Err(Error::Decode(format!(
                "Invalid PNG predictor tag {} in row {}",
                tag, row_idx
            )));
        }
        let start = output.len();
        for (i, &byte) in row[1..].iter().enumerate() {
            let left = if i >= bpp { output[start + i - bpp] } else { 0 };
            let up_left = if i >= bpp { above[i - bpp] } else { 0 };
            output.push(byte.wrapping_add(predict(tag, left, above[i], up_left)));
        }
        above.copy_from_slice(&output[start..]);
    }

    Ok(output)
}

/// Predicted value of one byte under PNG filter `tag`.
fn predict(tag: u8, left: u8, up: u8, up_left: u8) -> u8 {
    match tag {
        0 => 0,
        1 => left,
        2 => up,
        3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
        _ => paeth_predictor(i16::from(left), i16::from(up), i16::from(up_left)) as u8,
    }
}

/// Apply predictor encoding, the inverse of [`decode_predictor`].
///
/// PNG predictors 10-14 tag every row with the matching algorithm;
/// predictor 15 ("optimum") uses Up for every row.
pub fn encode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => encode_tiff_predictor(data, params),
        10..=15 => encode_png_predictor(data, params),
        _ => Err(Error::Decode(format!("Unsupported predictor: {}", params.predictor))),
    }
}

fn encode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let bytes_per_row = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    if params.bits_per_component != 8 || data.len() % bytes_per_row != 0 {
        return Err(Error::Decode(format!(
            "Cannot apply TIFF predictor to {} bytes with row size {}",
            data.len(),
            bytes_per_row
        )));
    }

    let mut output = Vec::with_capacity(data.len());
    for row in data.chunks(bytes_per_row) {
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            output.push(byte.wrapping_sub(left));
        }
    }
    Ok(output)
}

fn encode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let pixel_bytes = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    if data.len() % pixel_bytes != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            pixel_bytes
        )));
    }

    let tag = match params.predictor {
        15 => 2,
        p => (p - 10) as u8,
    };
    let zero_row = vec![0u8; pixel_bytes];
    let mut output = Vec::with_capacity(data.len() + data.len() / pixel_bytes);

    for (row_idx, row) in data.chunks(pixel_bytes).enumerate() {
        let above = if row_idx > 0 {
            &data[(row_idx - 1) * pixel_bytes..row_idx * pixel_bytes]
        } else {
            &zero_row[..]
        };
        output.push(tag);
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up_left = if i >= bpp { above[i - bpp] } else { 0 };
            output.push(byte.wrapping_sub(predict(tag, left, above[i], up_left)));
        }
    }
    Ok(output)
}

/// PNG Paeth: whichever of left, up and up-left is closest to `a + b - c`.
fn paeth_predictor(a: i16, b: i16, c: i16) -> i16 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
