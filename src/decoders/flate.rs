//! FlateDecode (zlib/deflate) implementation.
//!
//! This is the most common PDF compression filter and the one object
//! streams and cross-reference streams are written with.
//! Uses the flate2 crate for zlib compression.

use super::predictor::{decode_predictor, encode_predictor, DecodeParams};
use super::StreamEncoder;
use crate::error::{Error, Result};
use crate::object::Dict;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// FlateDecode filter implementation.
///
/// Decompresses data using the zlib/deflate algorithm, then reverses any
/// predictor named in `/DecodeParms`.
pub struct FlateEncoder;

impl FlateEncoder {
    fn inflate(input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };

        // Partial recovery: if we got ANY data before the error, use it
        if !output.is_empty() {
            log::warn!(
                "FlateDecode partial recovery: extracted {} bytes before corruption: {}",
                output.len(),
                zlib_err
            );
            return Ok(output);
        }

        // Some files carry raw deflate data with a corrupt or missing zlib header
        log::info!("Zlib decode failed, trying raw deflate");
        for skip in [0usize, 2] {
            if input.len() <= skip {
                break;
            }
            output.clear();
            match DeflateDecoder::new(&input[skip..]).read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => {
                    log::info!("Raw deflate recovery succeeded: {} bytes", output.len());
                    return Ok(output);
                },
                Err(_) if !output.is_empty() => {
                    log::warn!(
                        "Raw deflate partial recovery: extracted {} bytes before error",
                        output.len()
                    );
                    return Ok(output);
                },
                _ => {},
            }
        }

        log::debug!("All FlateDecode recovery strategies failed: {}", zlib_err);
        Err(Error::Decode(format!(
            "FlateDecode decompression failed: {}. Compressed size: {} bytes.",
            zlib_err,
            input.len()
        )))
    }
}

impl StreamEncoder for FlateEncoder {
    fn decode(&self, input: &[u8], params: Option<&Dict>) -> Result<Vec<u8>> {
        let inflated = Self::inflate(input)?;
        match params.map(DecodeParams::from_dict) {
            Some(p) if p.predictor > 1 => decode_predictor(&inflated, &p),
            _ => Ok(inflated),
        }
    }

    fn encode(&self, input: &[u8], params: Option<&Dict>) -> Result<Vec<u8>> {
        let predicted = match params.map(DecodeParams::from_dict) {
            Some(p) if p.predictor > 1 => encode_predictor(input, &p)?,
            _ => input.to_vec(),
        };
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&predicted)?;
        Ok(encoder.finish()?)
    }

    fn filter_name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_flate_decode_simple() {
        let decoded = FlateEncoder
            .decode(&compress(b"Hello, FlateDecode!"), None)
            .unwrap();
        assert_eq!(decoded, b"Hello, FlateDecode!");
    }

    #[test]
    fn test_flate_decode_empty() {
        let decoded = FlateEncoder.decode(&compress(b""), None).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_flate_encode_round_trip() {
        let original = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(1000);
        let encoded = FlateEncoder.encode(&original, None).unwrap();
        assert!(encoded.len() < original.len());
        assert_eq!(FlateEncoder.decode(&encoded, None).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_raw_deflate() {
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"no zlib header").unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(FlateEncoder.decode(&raw, None).unwrap(), b"no zlib header");
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        let result = FlateEncoder.decode(b"This is not zlib compressed data", None);
        let msg = format!("{}", result.unwrap_err());
        assert!(msg.contains("FlateDecode decompression failed"));
    }

    #[test]
    fn test_flate_with_png_predictor() {
        let mut parms = Dict::new();
        parms.insert("Predictor".to_string(), Object::Integer(12));
        parms.insert("Columns".to_string(), Object::Integer(4));

        let rows = [1u8, 0, 0, 7, 1, 0, 0, 8, 1, 0, 1, 0];
        let encoded = FlateEncoder.encode(&rows, Some(&parms)).unwrap();
        assert_eq!(FlateEncoder.decode(&encoded, Some(&parms)).unwrap(), rows);
    }

    #[test]
    fn test_flate_name() {
        assert_eq!(FlateEncoder.filter_name(), "FlateDecode");
    }
}
