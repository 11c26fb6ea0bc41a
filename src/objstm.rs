//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) allow multiple objects to be compressed together
//! in a single stream for better compression ratios. This module handles parsing
//! their offset tables and extracting individual objects on demand.
//!
//! # Format
//!
//! An object stream has this structure:
//! ```text
//! N 0 obj
//! << /Type /ObjStm
//!    /N 5              % Number of objects in stream
//!    /First 30         % Byte offset to first object's data
//!    /Filter /FlateDecode
//! >>
//! stream
//! 10 0 11 15 12 28 13 42 14 55    % Pairs: (obj_num, offset)
//! <dict>                           % Object 10 at offset 0
//! <array>                          % Object 11 at offset 15
//! ...
//! endstream
//! endobj
//! ```
//!
//! The first part contains N pairs of integers (object number, byte offset relative
//! to /First). The second part contains the actual object data.

use crate::error::{Error, Result};
use crate::lexer::skip_ws;
use crate::object::{Dict, Object};
use crate::parser::{parse_object_with_limit, to_error};
use std::collections::HashMap;

/// A decoded object stream with its offset table.
///
/// The session keeps one per container object number so that repeated
/// lookups into the same stream only decode it once.
#[derive(Debug, Clone)]
pub struct ObjectStream {
    /// Object number -> absolute offset into `data`
    offsets: HashMap<u32, usize>,
    /// Object numbers in table order, for lookups by index
    order: Vec<u32>,
    data: Vec<u8>,
}

impl ObjectStream {
    /// Validate the stream dictionary and read the offset table from the
    /// decoded stream bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `/Type` is missing or is not `ObjStm`
    /// - `/N` or `/First` is missing or out of range
    /// - The offset table is malformed
    pub fn parse(dict: &Dict, data: Vec<u8>) -> Result<Self> {
        match dict.get("Type").and_then(Object::as_name) {
            Some(name) if name.eq_ignore_ascii_case("ObjStm") => {},
            Some(name) => {
                return Err(Error::InvalidObjectType {
                    expected: "ObjStm".to_string(),
                    found: name.to_string(),
                })
            },
            None => return Err(Error::MissingKey("Type")),
        }

        let n = dict
            .get("N")
            .and_then(Object::as_integer)
            .ok_or(Error::MissingKey("N"))?;
        let first = dict
            .get("First")
            .and_then(Object::as_integer)
            .ok_or(Error::MissingKey("First"))?;

        // Validate parameters
        if !(0..=1_000_000).contains(&n) {
            return Err(Error::ParseError {
                offset: 0,
                reason: format!("invalid object stream /N value: {}", n),
            });
        }
        if !(0..=10_000_000).contains(&first) {
            return Err(Error::ParseError {
                offset: 0,
                reason: format!("invalid object stream /First value: {}", first),
            });
        }
        let first = first as usize;

        if data.len() < first {
            return Err(Error::ParseError {
                offset: data.len(),
                reason: format!(
                    "object stream data too short: {} bytes, expected at least {}",
                    data.len(),
                    first
                ),
            });
        }

        let pairs = parse_object_number_pairs(&data[..first], n as usize)?;
        let mut offsets = HashMap::with_capacity(pairs.len());
        let mut order = Vec::with_capacity(pairs.len());
        for (num, offset) in pairs {
            log::trace!("objstm member {} at {}", num, first + offset);
            offsets.entry(num).or_insert(first + offset);
            order.push(num);
        }

        Ok(Self {
            offsets,
            order,
            data,
        })
    }

    /// Number of entries in the offset table.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when the stream holds no objects.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Parse member `number`.
    ///
    /// The offset table is searched by object number first; `index` (the
    /// position recorded in the cross-reference entry) is only used when the
    /// number is absent.
    pub fn get(&self, number: u32, index: u32, max_nesting: u32) -> Result<Object> {
        let offset = match self.offsets.get(&number) {
            Some(&offset) => offset,
            None => {
                let by_index = self
                    .order
                    .get(index as usize)
                    .and_then(|num| self.offsets.get(num));
                match by_index {
                    Some(&offset) => {
                        log::debug!(
                            "Object {} not in object stream table; using index {}",
                            number,
                            index
                        );
                        offset
                    },
                    None => {
                        return Err(Error::InvalidXref(format!(
                            "object {} not found in object stream",
                            number
                        )))
                    },
                }
            },
        };

        if offset >= self.data.len() {
            return Err(Error::ParseError {
                offset,
                reason: format!(
                    "object {} offset is beyond stream data length {}",
                    number,
                    self.data.len()
                ),
            });
        }

        let input = &self.data[offset..];
        let (_, object) = parse_object_with_limit(input, max_nesting)
            .map_err(|e| to_error(input, offset as u64, e))?;
        Ok(object)
    }
}

/// Parse the pairs section of an object stream.
///
/// The pairs section contains N pairs of integers: (object_number, offset).
/// The offset is relative to the start of the objects data section.
fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count.min(data.len() / 4 + 1));
    let mut remaining = data;

    for i in 0..count {
        let (rest, obj_num) = read_unsigned(remaining).ok_or_else(|| Error::ParseError {
            offset: data.len() - remaining.len(),
            reason: format!("failed to parse object number for pair {}", i),
        })?;
        let (rest, offset) = read_unsigned(rest).ok_or_else(|| Error::ParseError {
            offset: data.len() - rest.len(),
            reason: format!("failed to parse offset for pair {}", i),
        })?;

        let obj_num = u32::try_from(obj_num).map_err(|_| Error::ParseError {
            offset: 0,
            reason: format!("invalid object number: {}", obj_num),
        })?;
        pairs.push((obj_num, offset as usize));
        remaining = rest;
    }

    Ok(pairs)
}

/// Skip whitespace and read an unsigned decimal integer.
fn read_unsigned(data: &[u8]) -> Option<(&[u8], u64)> {
    let data = match skip_ws(data) {
        Ok((rest, ())) => rest,
        Err(_) => return None,
    };
    let digits = data.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let value = std::str::from_utf8(&data[..digits]).ok()?.parse().ok()?;
    Some((&data[digits..], value))
}
