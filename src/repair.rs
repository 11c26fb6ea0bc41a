//! Cross-reference repair for damaged files.
//!
//! When the xref table is corrupted, missing, or points at the wrong place,
//! these scanners recover enough structure to keep reading. They work on the
//! raw file bytes and have no access to the session, so each one can be
//! tested on its own.
//!
//! They are fallbacks: the session only calls them after the structured
//! lookup has failed, and only when repairs are allowed.

use crate::error::{Error, Result};
use crate::lexer::is_whitespace;
use crate::object::{Dict, Object, ObjectRef};
use crate::parser::parse_object;
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    /// An `xref` keyword on a line of its own.
    static ref RE_XREF_LINE: Regex = Regex::new(r"[\r\n]\s*(xref)\s*[\r\n]").unwrap();

    /// An `xref` keyword preceded by whitespace.
    static ref RE_XREF_MARKER: Regex = Regex::new(r"\sxref\s*").unwrap();

    /// `N G obj` at the start of the file or after whitespace.
    static ref RE_OBJ_HEADER: Regex =
        Regex::new(r"(?:^|[\x00\t\n\x0c\r ])(\d{1,10})[\x00\t\n\x0c\r ]+(\d{1,5})[\x00\t\n\x0c\r ]+obj").unwrap();

    /// `trailer` followed by a dictionary.
    static ref RE_TRAILER: Regex = Regex::new(r"trailer\s*<<").unwrap();

    /// A catalog's type entry.
    static ref RE_CATALOG: Regex = Regex::new(r"/Type\s*/Catalog\b").unwrap();

    /// A version header, with or without its leading `%`.
    static ref RE_VERSION: Regex = Regex::new(r"%?PDF-(\d)\.(\d)").unwrap();
}

/// Window size for the backward scans.
const SCAN_WINDOW: usize = 1000;

/// Shortest match of the backward `xref` marker: one whitespace byte and
/// the keyword.
const MARKER_LEN: usize = b" xref".len();

/// Find the last `xref` keyword on a line of its own within the
/// [`SCAN_WINDOW`] bytes before `end`.
///
/// Used when `startxref` names an offset past the end of the file. Returns
/// the offset of the line break that precedes the keyword.
pub fn locate_xref_near(data: &[u8], end: usize) -> Result<u64> {
    let end = end.min(data.len());
    let start = end.saturating_sub(SCAN_WINDOW);

    match RE_XREF_LINE.find_iter(&data[start..end]).last() {
        Some(m) => {
            let offset = (start + m.start()) as u64;
            log::warn!("Repair: located xref at {} near end of file", offset);
            Ok(offset)
        },
        None => {
            log::debug!("Repair: xref not found in last {} bytes", end - start);
            Err(Error::InvalidXref("repair: xref not found".to_string()))
        },
    }
}

/// Search backward from the end of the file, [`SCAN_WINDOW`] bytes at a
/// time, for the last `xref` keyword preceded by whitespace.
///
/// Returns the offset of the keyword itself with leading whitespace
/// skipped, ready for classic table parsing.
pub fn seek_xref_marker(data: &[u8]) -> Result<u64> {
    let mut end = data.len();
    while end > 0 {
        let start = end.saturating_sub(SCAN_WINDOW);
        if let Some(m) = RE_XREF_MARKER.find_iter(&data[start..end]).last() {
            let mut pos = start + m.start();
            while pos < data.len() && is_whitespace(data[pos]) {
                pos += 1;
            }
            log::warn!("Repair: found xref marker at {}", pos);
            return Ok(pos as u64);
        }
        log::debug!("xref marker not in window {}..{}; continuing", start, end);
        if start == 0 {
            break;
        }
        // Overlap so a marker split across two windows is still seen
        end = start + MARKER_LEN - 1;
    }

    Err(Error::InvalidXref("xref table marker was not found".to_string()))
}

/// Rebuild the cross-reference table by scanning the whole file for
/// `N G obj` headers.
///
/// Each object number keeps the header with the highest generation; the
/// recorded offset is where the object number starts. The trailer comes
/// from the last `trailer` dictionary in the file; when that is missing
/// or has no `/Root`, the catalog is found by scanning for
/// `/Type /Catalog`.
pub fn rebuild_top_down(data: &[u8]) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref table by scanning {} bytes", data.len());

    let mut table = CrossRefTable::new();
    for caps in RE_OBJ_HEADER.captures_iter(data) {
        let (num_match, gen_match) = match (caps.get(1), caps.get(2)) {
            (Some(n), Some(g)) => (n, g),
            _ => continue,
        };
        let (Some(num), Some(gen)) = (
            parse_ascii::<u32>(num_match.as_bytes()),
            parse_ascii::<u16>(gen_match.as_bytes()),
        ) else {
            log::debug!("Skipping unparsable object header at {}", num_match.start());
            continue;
        };
        table.insert_if_newer(num, XRefEntry::offset(num_match.start() as u64, gen));
    }

    if table.is_empty() {
        return Err(Error::InvalidXref(
            "repair: no objects found while scanning file".to_string(),
        ));
    }

    let mut trailer = find_last_trailer(data).unwrap_or_default();
    if !matches!(trailer.get("Root"), Some(Object::Reference(_))) {
        match find_catalog(data, &table) {
            Some(root) => {
                log::warn!("Repair: using {} as document catalog", root);
                trailer.insert("Root".to_string(), Object::Reference(root));
            },
            None => log::warn!("Repair: no document catalog found"),
        }
    }
    let size = table.iter().map(|(n, _)| n).max().map_or(0, |n| n as i64 + 1);
    let declared = trailer.get("Size").and_then(Object::as_integer).unwrap_or(0);
    trailer.insert("Size".to_string(), Object::Integer(size.max(declared)));
    table.set_trailer(trailer);

    log::info!("Reconstructed xref table with {} objects", table.len());
    Ok(table)
}

/// Find the first `PDF-d.d` marker and return its position (the `%` when
/// present) with the major and minor version.
pub fn seek_version_top_down(data: &[u8]) -> Option<(usize, u8, u8)> {
    let caps = RE_VERSION.captures(data)?;
    let whole = caps.get(0)?;
    let major = caps.get(1)?.as_bytes()[0] - b'0';
    let minor = caps.get(2)?.as_bytes()[0] - b'0';
    Some((whole.start(), major, minor))
}

fn parse_ascii<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Parse the dictionary of the last `trailer` keyword that has one.
fn find_last_trailer(data: &[u8]) -> Option<Dict> {
    RE_TRAILER
        .find_iter(data)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .find_map(|m| {
            let dict_start = m.end() - 2;
            match parse_object(&data[dict_start..]) {
                Ok((_, Object::Dictionary(dict))) => Some(dict),
                _ => {
                    log::debug!("Unparsable trailer dictionary at {}", m.start());
                    None
                },
            }
        })
}

/// The object whose header most closely precedes the last `/Type /Catalog`.
fn find_catalog(data: &[u8], table: &CrossRefTable) -> Option<ObjectRef> {
    let catalog_pos = RE_CATALOG.find_iter(data).last()?.start() as u64;
    table
        .iter()
        .filter_map(|(num, entry)| {
            entry
                .byte_offset()
                .filter(|&off| off <= catalog_pos)
                .map(|off| (off, ObjectRef::new(num, entry.generation)))
        })
        .max_by_key(|(off, _)| *off)
        .map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAMAGED: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
2 1 obj\n<< /Type /Pages /Kids [] /Count 1 >>\nendobj\n\
xref\n0 1\ngarbage\n\
trailer\n<< /Size 3 /Root 1 0 R /Info 9 0 R >>\nstartxref\n999999\n%%EOF\n";

    // ========================================================================
    // Top-down rebuild
    // ========================================================================

    #[test]
    fn test_rebuild_finds_objects() {
        let table = rebuild_top_down(DAMAGED).unwrap();
        assert_eq!(table.len(), 2);

        let one = table.get(1).unwrap();
        assert_eq!(one.byte_offset(), Some(9));
        assert_eq!(&DAMAGED[9..16], b"1 0 obj");
    }

    #[test]
    fn test_rebuild_keeps_highest_generation() {
        let table = rebuild_top_down(DAMAGED).unwrap();
        let two = table.get(2).unwrap();
        assert_eq!(two.generation, 1);
        let off = two.byte_offset().unwrap() as usize;
        assert!(DAMAGED[off..].starts_with(b"2 1 obj"));
    }

    #[test]
    fn test_rebuild_uses_last_trailer() {
        let table = rebuild_top_down(DAMAGED).unwrap();
        let trailer = table.trailer();
        assert_eq!(
            trailer.get("Root"),
            Some(&Object::Reference(ObjectRef::new(1, 0)))
        );
        assert!(trailer.contains_key("Info"));
        assert_eq!(trailer.get("Size"), Some(&Object::Integer(3)));
    }

    #[test]
    fn test_rebuild_synthesizes_root_from_catalog() {
        let data = b"%PDF-1.7\n4 0 obj\n<< /Type /Pages >>\nendobj\n\
7 0 obj\n<</Type/Catalog/Pages 4 0 R>>\nendobj\n";
        let table = rebuild_top_down(data).unwrap();
        assert_eq!(
            table.trailer().get("Root"),
            Some(&Object::Reference(ObjectRef::new(7, 0)))
        );
        assert_eq!(table.trailer().get("Size"), Some(&Object::Integer(8)));
    }

    #[test]
    fn test_rebuild_ignores_obj_without_leading_whitespace() {
        let data = b"%PDF-1.4\nx1 0 obj\n1 0 obj\nnull\nendobj\n";
        let table = rebuild_top_down(data).unwrap();
        assert_eq!(table.get(1).unwrap().byte_offset(), Some(18));
    }

    #[test]
    fn test_rebuild_empty_file_fails() {
        assert!(matches!(
            rebuild_top_down(b"%PDF-1.4\nnothing here"),
            Err(Error::InvalidXref(_))
        ));
    }

    // ========================================================================
    // Backward scans
    // ========================================================================

    #[test]
    fn test_seek_xref_marker_skips_whitespace() {
        let pos = seek_xref_marker(DAMAGED).unwrap() as usize;
        assert!(DAMAGED[pos..].starts_with(b"xref\n0 1"));
    }

    #[test]
    fn test_seek_xref_marker_across_windows() {
        let mut data = b"%PDF-1.4\n xref\n0 0\ntrailer<<>>\n".to_vec();
        data.extend(std::iter::repeat(b'%').take(5000));
        let pos = seek_xref_marker(&data).unwrap();
        assert_eq!(pos, 10);
    }

    #[test]
    fn test_seek_xref_marker_split_by_window_boundary() {
        let mut data = vec![b'%'; 3000];
        // Window [2000, 3000) only sees "ef\n"
        data[1998..2004].copy_from_slice(b"\nxref\n");
        assert_eq!(seek_xref_marker(&data).unwrap(), 1999);
    }

    #[test]
    fn test_seek_xref_marker_missing() {
        assert!(seek_xref_marker(b"%PDF-1.4\nstartxref\n").is_err());
    }

    #[test]
    fn test_locate_xref_near_end() {
        let eof = DAMAGED.len() - 6;
        let off = locate_xref_near(DAMAGED, eof).unwrap() as usize;
        assert_eq!(DAMAGED[off], b'\n');
        assert!(DAMAGED[off + 1..].starts_with(b"xref"));
    }

    #[test]
    fn test_locate_xref_ignores_startxref() {
        let data = b"%PDF-1.4\ntrailer<<>>\nstartxref\n5\n%%EOF";
        assert!(locate_xref_near(data, data.len()).is_err());
    }

    #[test]
    fn test_seek_version() {
        assert_eq!(seek_version_top_down(b"junk\n%PDF-1.6\n"), Some((5, 1, 6)));
        assert_eq!(seek_version_top_down(b"xxPDF-2.0"), Some((2, 2, 0)));
        assert_eq!(seek_version_top_down(b"no header"), None);
    }
}
