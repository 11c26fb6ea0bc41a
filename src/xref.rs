//! Cross-reference table parser.
//!
//! The xref table maps object numbers to byte offsets in the PDF file,
//! enabling random access to PDF objects.
//!
//! Supports both traditional xref tables (PDF 1.0-1.4) and
//! cross-reference streams (PDF 1.5+). The parsers here are pure functions
//! over bytes; locating the sections and following `/Prev` chains is done
//! by the [`Session`](crate::document::Session).

use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use crate::parser::{parse_object, to_error};
use byteorder::{BigEndian, ByteOrder};
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::collections::HashMap;

/// Largest `/Size` accepted for a cross-reference stream.
pub const MAX_XREF_STREAM_SIZE: i64 = 8_388_607;

lazy_static! {
    static ref RE_STARTXREF: Regex = Regex::new(r"startx?ref\s*(\d+)").unwrap();
    static ref RE_INDIRECT_OBJECT: Regex = Regex::new(r"(\d+)\s+(\d+)\s+obj").unwrap();
    static ref RE_XREF_KEYWORD: Regex = Regex::new(r"\s*xref\s*").unwrap();
    static ref RE_SUBSECTION: Regex = Regex::new(r"^(\d+)\s+(\d+)\s*$").unwrap();
    static ref RE_ENTRY: Regex = Regex::new(r"^(\d+)\s+(\d+)\s+([nf])\s*$").unwrap();
}

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryKind {
    /// Byte offset of an `N G obj` header
    Offset(u64),
    /// Inside the object stream `container`, at position `index`
    Compressed {
        /// Object number of the object stream
        container: u32,
        /// Index of the object inside the stream
        index: u32,
    },
}

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Generation number (always 0 for compressed objects)
    pub generation: u16,
    /// Location of the object
    pub kind: XRefEntryKind,
}

impl XRefEntry {
    /// An uncompressed object at `offset`.
    pub fn offset(offset: u64, generation: u16) -> Self {
        Self {
            generation,
            kind: XRefEntryKind::Offset(offset),
        }
    }

    /// An object packed in an object stream.
    pub fn compressed(container: u32, index: u32) -> Self {
        Self {
            generation: 0,
            kind: XRefEntryKind::Compressed { container, index },
        }
    }

    /// The byte offset of an uncompressed entry.
    pub fn byte_offset(&self) -> Option<u64> {
        match self.kind {
            XRefEntryKind::Offset(o) => Some(o),
            XRefEntryKind::Compressed { .. } => None,
        }
    }
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    pub(crate) entries: HashMap<u32, XRefEntry>,
    trailer: Dict,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trailer dictionary (for xref streams, the stream dictionary).
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dict) {
        self.trailer = trailer;
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Check if an object exists in the xref table.
    pub fn contains(&self, object_number: u32) -> bool {
        self.entries.contains_key(&object_number)
    }

    /// Insert or replace an entry unconditionally.
    pub fn insert(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Insert when the object is absent or `entry` has a higher generation.
    pub fn insert_if_newer(&mut self, object_number: u32, entry: XRefEntry) -> bool {
        match self.entries.get(&object_number) {
            Some(existing) if existing.generation >= entry.generation => false,
            _ => {
                self.entries.insert(object_number, entry);
                true
            },
        }
    }

    /// Insert only when the object is absent.
    pub fn fill_gap(&mut self, object_number: u32, entry: XRefEntry) -> bool {
        if self.entries.contains_key(&object_number) {
            return false;
        }
        self.entries.insert(object_number, entry);
        true
    }

    /// Merge a table from an older section (reached through `/Prev` or
    /// `/XRefStm`).
    ///
    /// Entries already present win, except that a classic entry with a
    /// higher generation replaces a lower one. The trailer of `self` is kept.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (num, entry) in older.entries {
            match entry.kind {
                XRefEntryKind::Offset(_) => self.insert_if_newer(num, entry),
                XRefEntryKind::Compressed { .. } => self.fill_gap(num, entry),
            };
        }
        if self.trailer.is_empty() {
            self.trailer = older.trailer;
        }
    }

    /// Iterate over `(object number, entry)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(n, e)| (*n, e))
    }

    /// Sorted byte offsets of all uncompressed objects (non-zero only).
    pub fn sorted_offsets(&self) -> Vec<u64> {
        let mut offsets: Vec<u64> = self
            .entries
            .values()
            .filter_map(|e| match e.kind {
                XRefEntryKind::Offset(o) if o > 0 => Some(o),
                _ => None,
            })
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// First offset in `sorted` that is at or after `start`.
pub fn next_object_offset(sorted: &[u64], start: u64) -> Option<u64> {
    let idx = sorted.partition_point(|&o| o < start);
    sorted.get(idx).copied()
}

/// What a cross-reference section at some offset looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    /// `N G obj` - a cross-reference stream
    Stream,
    /// `xref` keyword - a classic table
    Table,
}

/// Classify the bytes peeked at an xref offset, returning where the
/// section starts within `peek`.
pub fn classify_xref(peek: &[u8]) -> Option<(usize, XrefKind)> {
    if let Some(m) = RE_INDIRECT_OBJECT.find(peek) {
        return Some((m.start(), XrefKind::Stream));
    }
    RE_XREF_KEYWORD.find(peek).map(|m| {
        let lead = m.as_bytes().iter().take_while(|b| b.is_ascii_whitespace()).count();
        (m.start() + lead, XrefKind::Table)
    })
}

/// Extract the offset from a `startxref` clause (the bytes just before
/// `%%EOF`). The last clause wins.
pub fn parse_startxref(tail: &[u8]) -> Option<u64> {
    RE_STARTXREF
        .captures_iter(tail)
        .last()
        .and_then(|caps| std::str::from_utf8(&caps[1]).ok()?.parse().ok())
}

/// Split `buf` into lines on CR, LF or CRLF, yielding each line's start offset.
fn lines_with_offsets(buf: &[u8]) -> Vec<(usize, &[u8])> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < buf.len() {
        match buf[i] {
            b'\r' | b'\n' => {
                lines.push((start, &buf[start..i]));
                if buf[i] == b'\r' && buf.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                i += 1;
                start = i;
            },
            _ => i += 1,
        }
    }
    if start < buf.len() {
        lines.push((start, &buf[start..]));
    }
    lines
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(line.len());
    let end = line.iter().rposition(|c| !c.is_ascii_whitespace()).map_or(start, |p| p + 1);
    &line[start..end]
}

fn parse_num<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Find the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Find the last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Parse a classic cross-reference table (PDF 1.0-1.4).
///
/// `buf` starts at (or just before) the `xref` keyword and `base` is its
/// absolute offset, used in error messages. The format is:
/// ```text
/// xref
/// 0 6
/// 0000000000 65535 f
/// 0000000018 00000 n
/// ...
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
///
/// An in-use entry counts only when its offset is greater than 1: some
/// producers write object 1 at offset 0 for a slot they never filled. For a
/// repeated object number the higher generation wins.
///
/// # Errors
///
/// * `UnexpectedEof` if `buf` ends before the trailer dictionary does.
/// * `InvalidXref` for a missing keyword, an entry before any subsection
///   header, or `%%EOF` before the trailer.
pub fn parse_xref_table(buf: &[u8], base: u64) -> Result<CrossRefTable> {
    let start = buf
        .iter()
        .position(|c| !c.is_ascii_whitespace())
        .ok_or(Error::UnexpectedEof)?;
    if !buf[start..].starts_with(b"xref") {
        return Err(Error::InvalidXref(format!("no xref keyword at offset {}", base)));
    }
    let body = start + 4;

    let mut table = CrossRefTable::new();
    let mut current: Option<u32> = None;

    for (line_start, line) in lines_with_offsets(&buf[body..]) {
        let line = trim(line);
        if line.is_empty() || (line.starts_with(b"%") && !line.starts_with(b"%%EOF")) {
            continue;
        }
        if line.starts_with(b"%%EOF") {
            return Err(Error::InvalidXref("end of file marker before trailer".to_string()));
        }
        if line.starts_with(b"trailer") {
            let line_at = body + line_start;
            let at = line_at + find(&buf[line_at..], b"trailer").unwrap_or(0) + 7;
            let input = &buf[at..];
            let (_, trailer) =
                parse_object(input).map_err(|e| to_error(input, base + at as u64, e))?;
            match trailer {
                Object::Dictionary(dict) => table.set_trailer(dict),
                other => {
                    return Err(Error::InvalidXref(format!(
                        "trailer is a {}, not a dictionary",
                        other.type_name()
                    )))
                },
            }
            return Ok(table);
        }

        if let Some(caps) = RE_SUBSECTION.captures(line) {
            current = parse_num(&caps[1]);
            if current.is_none() {
                return Err(Error::InvalidXref(format!(
                    "bad subsection header {:?}",
                    String::from_utf8_lossy(line)
                )));
            }
            continue;
        }

        if let Some(caps) = RE_ENTRY.captures(line) {
            let Some(num) = current else {
                return Err(Error::InvalidXref("entry before subsection header".to_string()));
            };
            let offset: u64 = parse_num(&caps[1]).unwrap_or(0);
            let generation: u16 = parse_num(&caps[2]).unwrap_or(u16::MAX);
            if &caps[3] == b"n" && offset > 1 {
                table.insert_if_newer(num, XRefEntry::offset(offset, generation));
            }
            current = Some(num.saturating_add(1));
            continue;
        }

        log::debug!("Skipping xref line {:?}", String::from_utf8_lossy(line));
    }

    Err(Error::UnexpectedEof)
}

/// Read a big-endian unsigned field of up to 8 bytes.
fn read_field(bytes: &[u8]) -> u64 {
    if bytes.is_empty() {
        return 0;
    }
    BigEndian::read_uint(bytes, bytes.len())
}

/// Decode the entries of a cross-reference stream (PDF 1.5+).
///
/// `data` is the stream payload after filters. `own_offset`/`own_number`
/// identify the xref stream itself: a type 1 entry pointing at the stream's
/// own offset is recorded under the stream's own object number.
///
/// The stream dictionary becomes the trailer.
pub fn parse_xref_stream(
    dict: &Dict,
    data: &[u8],
    own_offset: u64,
    own_number: u32,
) -> Result<CrossRefTable> {
    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .ok_or(Error::MissingKey("Size"))?;
    if !(0..=MAX_XREF_STREAM_SIZE).contains(&size) {
        return Err(Error::InvalidXref(format!("xref stream /Size {} out of range", size)));
    }

    let widths = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or(Error::MissingKey("W"))?;
    if widths.len() != 3 {
        return Err(Error::InvalidWidths(format!("expected 3 entries, found {}", widths.len())));
    }
    let mut w = [0usize; 3];
    for (slot, obj) in w.iter_mut().zip(widths) {
        let value = obj
            .as_integer()
            .ok_or_else(|| Error::InvalidWidths(format!("non-integer width {}", obj)))?;
        if !(0..=8).contains(&value) {
            return Err(Error::InvalidWidths(format!("width {} out of range", value)));
        }
        *slot = value as usize;
    }

    let mut table = CrossRefTable::new();
    table.set_trailer(dict.clone());

    let row = w[0] + w[1] + w[2];
    if row == 0 {
        return Ok(table);
    }

    let ranges: Vec<(i64, i64)> = match dict.get("Index") {
        Some(Object::Array(items)) => {
            if items.len() % 2 != 0 {
                return Err(Error::InvalidXref("odd-length /Index".to_string()));
            }
            items
                .chunks(2)
                .map(|pair| match (pair[0].as_integer(), pair[1].as_integer()) {
                    (Some(s), Some(c)) if s >= 0 && c >= 0 => Ok((s, c)),
                    _ => Err(Error::InvalidXref("non-integer /Index entry".to_string())),
                })
                .collect::<Result<_>>()?
        },
        Some(other) => {
            return Err(Error::InvalidXref(format!("/Index is a {}", other.type_name())));
        },
        None => vec![(0, size)],
    };

    let mut numbers: Vec<u32> = Vec::new();
    for (start, count) in ranges {
        if count > MAX_XREF_STREAM_SIZE {
            return Err(Error::InvalidXref(format!("/Index count {} out of range", count)));
        }
        let end = start
            .checked_add(count)
            .filter(|&end| end <= i64::from(u32::MAX) + 1)
            .ok_or_else(|| {
                Error::InvalidXref(format!("/Index range {} {} out of range", start, count))
            })?;
        numbers.extend((start..end).map(|n| n as u32));
    }

    let rows = data.len() / row;
    if rows == numbers.len() + 1 {
        // One record more than /Index declares
        if let Some(next) = numbers.iter().max().map_or(Some(0), |m| m.checked_add(1)) {
            numbers.push(next);
        }
    }
    if rows != numbers.len() {
        return Err(Error::InvalidXref(format!(
            "xref stream has {} records for {} objects",
            rows,
            numbers.len()
        )));
    }

    for (record, &num) in data.chunks_exact(row).zip(&numbers) {
        let entry_type = if w[0] == 0 { 1 } else { read_field(&record[..w[0]]) };
        let field2 = read_field(&record[w[0]..w[0] + w[1]]);
        let field3 = read_field(&record[w[0] + w[1]..]);

        match entry_type {
            0 => {},
            1 => {
                let num = if field2 == own_offset { own_number } else { num };
                let generation = u16::try_from(field3).unwrap_or(u16::MAX);
                table.insert_if_newer(num, XRefEntry::offset(field2, generation));
            },
            2 => {
                let container = u32::try_from(field2)
                    .map_err(|_| Error::InvalidXref(format!("container {} out of range", field2)))?;
                let index = u32::try_from(field3).unwrap_or(u32::MAX);
                table.fill_gap(num, XRefEntry::compressed(container, index));
            },
            other => log::debug!("Ignoring xref stream entry type {} for object {}", other, num),
        }
    }

    Ok(table)
}
