//! Stream filters.
//!
//! Stream data is encoded through one or more filters named by the stream's
//! `/Filter` entry, each optionally parameterised by the matching
//! `/DecodeParms` entry. Decoding applies the filters in order; encoding
//! applies them in reverse.
//!
//! The object layer only needs a name-keyed lookup of codecs, so filters
//! live behind the [`StreamEncoder`] trait and are collected in a
//! [`CodecRegistry`]. `FlateDecode` is registered by default.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use crate::parser_config::ParserOptions;
use std::collections::HashMap;
use std::fmt;

mod flate;
mod predictor;

pub use flate::FlateEncoder;
pub use predictor::{decode_predictor, encode_predictor, DecodeParams};

/// A named stream codec.
pub trait StreamEncoder: Send + Sync {
    /// Decode `input`, using the filter's `/DecodeParms` when present.
    fn decode(&self, input: &[u8], params: Option<&Dict>) -> Result<Vec<u8>>;

    /// Encode `input` so that [`decode`](Self::decode) with the same
    /// parameters returns it.
    fn encode(&self, input: &[u8], params: Option<&Dict>) -> Result<Vec<u8>>;

    /// The `/Filter` name this codec handles (e.g. `"FlateDecode"`).
    fn filter_name(&self) -> &str;
}

/// Filter name that marks a crypt filter entry in a `/Filter` array.
///
/// Crypt filters are applied by the decryption layer, so the codec chain
/// passes them through.
pub const CRYPT_FILTER: &str = "Crypt";

/// Codecs keyed by filter name.
pub struct CodecRegistry {
    codecs: HashMap<String, Box<dyn StreamEncoder>>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.codecs.keys().collect();
        names.sort();
        f.debug_struct("CodecRegistry").field("codecs", &names).finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CodecRegistry {
    /// A registry with no codecs.
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// A registry with the built-in codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(FlateEncoder));
        registry
    }

    /// Add `codec`, replacing any codec registered under the same name.
    pub fn register(&mut self, codec: Box<dyn StreamEncoder>) {
        self.codecs.insert(codec.filter_name().to_string(), codec);
    }

    /// Look up the codec for `name`.
    pub fn get(&self, name: &str) -> Option<&dyn StreamEncoder> {
        self.codecs.get(name).map(|c| c.as_ref())
    }

    /// Decode stream `data` through the filters named in `dict`.
    ///
    /// A stream without `/Filter` is returned unchanged. Unknown filter
    /// names fail with [`Error::UnsupportedFilter`]. Each stage is checked
    /// against the decompression limits in `options`.
    pub fn decode_stream(
        &self,
        dict: &Dict,
        data: &[u8],
        options: &ParserOptions,
    ) -> Result<Vec<u8>> {
        let names = filter_names(dict)?;
        let params = decode_params(dict, names.len());

        let mut current = data.to_vec();
        for (name, parms) in names.iter().zip(params.iter()) {
            if name == CRYPT_FILTER {
                continue;
            }
            let codec = self
                .get(name)
                .ok_or_else(|| Error::UnsupportedFilter(name.clone()))?;

            let input_len = current.len();
            let decoded = codec.decode(&current, *parms)?;
            check_limits(name, input_len, decoded.len(), options)?;
            log::trace!("{}: {} -> {} bytes", name, input_len, decoded.len());
            current = decoded;
        }
        Ok(current)
    }

    /// Encode `data` so that [`decode_stream`](Self::decode_stream) with the
    /// same dictionary returns it.
    pub fn encode_stream(&self, dict: &Dict, data: &[u8]) -> Result<Vec<u8>> {
        let names = filter_names(dict)?;
        let params = decode_params(dict, names.len());

        let mut current = data.to_vec();
        for (name, parms) in names.iter().zip(params.iter()).rev() {
            if name == CRYPT_FILTER {
                continue;
            }
            let codec = self
                .get(name)
                .ok_or_else(|| Error::UnsupportedFilter(name.clone()))?;
            current = codec.encode(&current, *parms)?;
        }
        Ok(current)
    }
}

/// Guard against decompression bombs.
fn check_limits(
    name: &str,
    input_len: usize,
    output_len: usize,
    options: &ParserOptions,
) -> Result<()> {
    if options.max_decompression_ratio > 0 && input_len > 0 {
        let ratio = output_len / input_len;
        if ratio > options.max_decompression_ratio as usize {
            log::warn!(
                "{} ratio {}:1 exceeds limit {}:1 ({} -> {} bytes)",
                name,
                ratio,
                options.max_decompression_ratio,
                input_len,
                output_len
            );
            return Err(Error::Decode(format!(
                "{}: decompression ratio {}:1 exceeds limit of {}:1",
                name, ratio, options.max_decompression_ratio
            )));
        }
    }

    if options.max_decompressed_size > 0 && output_len > options.max_decompressed_size {
        return Err(Error::Decode(format!(
            "{}: decompressed size {} exceeds limit of {} bytes",
            name, output_len, options.max_decompressed_size
        )));
    }

    Ok(())
}

/// The `/Filter` entry as a list of names.
///
/// Accepts a single name or an array of names; a missing entry is an empty
/// list.
pub fn filter_names(dict: &Dict) -> Result<Vec<String>> {
    match dict.get("Filter") {
        None | Some(Object::Null) => Ok(Vec::new()),
        Some(Object::Name(name)) => Ok(vec![name.clone()]),
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_name().map(str::to_string).ok_or_else(|| {
                    Error::InvalidObjectType {
                        expected: "Name".to_string(),
                        found: item.type_name().to_string(),
                    }
                })
            })
            .collect(),
        Some(other) => Err(Error::InvalidObjectType {
            expected: "Name or Array".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

/// The `/DecodeParms` entry aligned with `count` filters.
///
/// A single dictionary applies to the first filter. Array entries that are
/// not dictionaries (usually `null`) mean "no parameters".
pub fn decode_params(dict: &Dict, count: usize) -> Vec<Option<&Dict>> {
    let mut params: Vec<Option<&Dict>> = match dict.get("DecodeParms") {
        Some(Object::Dictionary(d)) => vec![Some(d)],
        Some(Object::Array(items)) => items.iter().map(Object::as_dict).collect(),
        _ => Vec::new(),
    };
    params.resize(count, None);
    params
}
