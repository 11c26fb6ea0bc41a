//! PDF object parser.
//!
//! This module provides parsing of PDF objects by combining tokens from the lexer
//! into complete objects (arrays, dictionaries, indirect references, etc.).
//!
//! # Architecture
//!
//! The parser uses a recursive descent approach:
//! 1. Read token from lexer
//! 2. Based on token type, decide how to parse
//! 3. For composite types (arrays, dicts), recursively parse contents
//!
//! Stream bodies are not read here. [`parse_indirect_object`] reports where
//! the body starts and the session resolves `/Length` (which may itself be an
//! indirect object) before reading it.

use crate::error::{Error, Result};
use crate::lexer::{LexError, LexErrorKind, LexResult, Token, skip_ws, token};
use crate::object::{Dict, Object, ObjectRef, PdfString};

/// Default limit on array/dictionary nesting (ISO 32000-1:2008, Annex C).
pub const DEFAULT_MAX_NESTING: u32 = 100;

/// An indirect object as framed on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIndirect {
    /// Object number and generation from the `N G obj` header
    pub id: ObjectRef,
    /// Object content; for a stream this is its dictionary
    pub object: Object,
    /// For a stream, offset of the first data byte relative to the parsed input
    pub stream_data_offset: Option<usize>,
}

/// Parse a PDF object from input bytes.
///
/// # Example
///
/// ```
/// use pdf_core::parser::parse_object;
///
/// let input = b"[ 1 2 /Name ]";
/// let (_remaining, obj) = parse_object(input).unwrap();
/// assert_eq!(obj.as_array().map(|a| a.len()), Some(3));
/// ```
pub fn parse_object(input: &[u8]) -> LexResult<'_, Object> {
    parse_value(input, 0, DEFAULT_MAX_NESTING)
}

/// Parse a PDF object with an explicit nesting limit.
pub fn parse_object_with_limit(input: &[u8], max_nesting: u32) -> LexResult<'_, Object> {
    parse_value(input, 0, max_nesting)
}

/// Parse one complete object from `input`, converting lexer errors.
pub fn parse(input: &[u8]) -> Result<Object> {
    parse_object(input)
        .map(|(_, obj)| obj)
        .map_err(|e| to_error(input, 0, e))
}

fn parse_value(input: &[u8], depth: u32, max_nesting: u32) -> LexResult<'_, Object> {
    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Integer(i) => {
            if let Some((after, r)) = reference_tail(i, rest) {
                return Ok((after, Object::Reference(r)));
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(bytes) => Ok((rest, Object::String(PdfString::literal(bytes)))),
        Token::HexString(bytes) => Ok((rest, Object::String(PdfString::hex(bytes)))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::ArrayStart => parse_array(rest, enter(input, depth, max_nesting)?, max_nesting),
        Token::DictStart => {
            let depth = enter(input, depth, max_nesting)?;
            let (rest, dict) = parse_dictionary(rest, depth, max_nesting)?;
            Ok((rest, Object::Dictionary(dict)))
        },
        Token::ArrayEnd | Token::DictEnd | Token::Keyword(_) => Err(nom::Err::Error(
            LexError::new(skip_ws(input)?.0, LexErrorKind::Nom(nom::error::ErrorKind::Tag)),
        )),
    }
}

fn enter(
    input: &[u8],
    depth: u32,
    max_nesting: u32,
) -> std::result::Result<u32, nom::Err<LexError<'_>>> {
    if depth >= max_nesting {
        return Err(nom::Err::Failure(LexError::new(
            input,
            LexErrorKind::NestingTooDeep(max_nesting),
        )));
    }
    Ok(depth + 1)
}

/// After an integer, check for `G R` completing a reference.
///
/// Running out of input during the lookahead means "not a reference"; the
/// enclosing construct will ask for more input if it needs it.
fn reference_tail(id: i64, input: &[u8]) -> Option<(&[u8], ObjectRef)> {
    let id = u32::try_from(id).ok()?;
    let (rest, gen) = match token(input) {
        Ok((rest, Token::Integer(g))) => (rest, u16::try_from(g).ok()?),
        _ => return None,
    };
    match token(rest) {
        Ok((rest, Token::Keyword(b"R"))) => Some((rest, ObjectRef::new(id, gen))),
        _ => None,
    }
}

/// Parse a PDF array after its opening `[`.
fn parse_array(input: &[u8], depth: u32, max_nesting: u32) -> LexResult<'_, Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        let (after, tok) = token(remaining)?;
        if tok == Token::ArrayEnd {
            return Ok((after, Object::Array(objects)));
        }
        let (after, obj) = parse_value(remaining, depth, max_nesting)?;
        objects.push(obj);
        remaining = after;
    }
}

/// Parse a PDF dictionary after its opening `<<`.
///
/// Some producers emit `/Keynull /Next ...` for a key whose value is null;
/// a key ending in `null` that is directly followed by another name is
/// stored under the shortened key with a null value.
fn parse_dictionary(input: &[u8], depth: u32, max_nesting: u32) -> LexResult<'_, Dict> {
    let mut dict = Dict::new();
    let mut remaining = input;

    loop {
        let (after, tok) = token(remaining)?;
        let key = match tok {
            Token::DictEnd => return Ok((after, dict)),
            Token::Name(key) => key,
            _ => {
                let (at, _) = skip_ws(remaining)?;
                return Err(nom::Err::Error(LexError::new(
                    at,
                    LexErrorKind::Nom(nom::error::ErrorKind::Tag),
                )));
            },
        };

        let (peek, _) = skip_ws(after)?;
        if key.len() > 4 && key.ends_with("null") && peek.first() == Some(&b'/') {
            log::debug!("Dictionary key /{} absorbed a null value", key);
            dict.insert(key[..key.len() - 4].to_string(), Object::Null);
            remaining = after;
            continue;
        }

        if let Ok((end, Token::DictEnd)) = token(after) {
            log::debug!("Dictionary key /{} has no value, using null", key);
            dict.insert(key, Object::Null);
            return Ok((end, dict));
        }

        let (after, value) = parse_value(after, depth, max_nesting)?;
        dict.insert(key, value);
        remaining = after;
    }
}

/// Parse an `N G obj` header.
pub fn parse_indirect_header(input: &[u8]) -> LexResult<'_, ObjectRef> {
    let fail =
        |at| nom::Err::Error(LexError::new(at, LexErrorKind::Nom(nom::error::ErrorKind::Tag)));

    let (rest, id) = match token(input)? {
        (rest, Token::Integer(n)) if n >= 0 && n <= i64::from(u32::MAX) => (rest, n as u32),
        _ => return Err(fail(input)),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(g)) if (0..=i64::from(u16::MAX)).contains(&g) => (rest, g as u16),
        _ => return Err(fail(rest)),
    };
    match token(rest)? {
        (rest, Token::Keyword(b"obj")) => Ok((rest, ObjectRef::new(id, gen))),
        _ => Err(fail(rest)),
    }
}

/// Parse an indirect object up to its `endobj`, or up to the first data byte
/// of its stream body.
///
/// The `stream` keyword may be followed by one stray space or tab before
/// the end of line; CRLF, LF and a lone CR are all accepted as the end of line.
pub fn parse_indirect_object(input: &[u8], max_nesting: u32) -> LexResult<'_, ParsedIndirect> {
    let (rest, id) = parse_indirect_header(input)?;

    // "N G obj endobj" has no content
    if let Ok((after, Token::Keyword(b"endobj"))) = token(rest) {
        return Ok((
            after,
            ParsedIndirect {
                id,
                object: Object::Null,
                stream_data_offset: None,
            },
        ));
    }

    let (rest, object) = parse_value(rest, 0, max_nesting)?;

    match token(rest) {
        Ok((after, Token::Keyword(b"stream"))) if matches!(object, Object::Dictionary(_)) => {
            let eol = stream_eol_len(after)?;
            let offset = input.len() - after.len() + eol;
            Ok((
                &after[eol..],
                ParsedIndirect {
                    id,
                    object,
                    stream_data_offset: Some(offset),
                },
            ))
        },
        Ok((after, Token::Keyword(b"endobj"))) => Ok((
            after,
            ParsedIndirect {
                id,
                object,
                stream_data_offset: None,
            },
        )),
        Err(nom::Err::Incomplete(n)) => Err(nom::Err::Incomplete(n)),
        _ => {
            log::debug!("Object {} has no endobj", id);
            Ok((
                rest,
                ParsedIndirect {
                    id,
                    object,
                    stream_data_offset: None,
                },
            ))
        },
    }
}

/// Length of the end-of-line sequence after the `stream` keyword.
fn stream_eol_len(input: &[u8]) -> std::result::Result<usize, nom::Err<LexError<'_>>> {
    if input.len() < 2 {
        return Err(nom::Err::Incomplete(nom::Needed::Unknown));
    }
    let mut i = 0;
    if matches!(input[0], b' ' | b'\t' | 0x00 | 0x0C) {
        i = 1;
    }
    match (input.get(i), input.get(i + 1)) {
        (Some(b'\r'), Some(b'\n')) => Ok(i + 2),
        (Some(b'\n'), _) => Ok(i + 1),
        (Some(b'\r'), _) => {
            log::warn!("Stream keyword followed by CR alone");
            Ok(i + 1)
        },
        (None, _) => Err(nom::Err::Incomplete(nom::Needed::Unknown)),
        _ => {
            log::warn!("No end of line after stream keyword");
            Ok(i)
        },
    }
}

/// Convert a lexer error to a crate error.
///
/// `buf` is the input handed to the failing parser and `base` its absolute
/// file offset; the reported offset points at the failure position.
pub fn to_error(buf: &[u8], base: u64, err: nom::Err<LexError<'_>>) -> Error {
    match err {
        nom::Err::Incomplete(_) => Error::UnexpectedEof,
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = base as usize + buf.len().saturating_sub(e.input.len());
            match e.kind {
                LexErrorKind::UnexpectedByte(byte) => Error::UnexpectedToken { offset, byte },
                LexErrorKind::Truncated { kind, partial } => {
                    Error::TruncatedToken { kind, partial }
                },
                LexErrorKind::NestingTooDeep(max) => Error::RecursionLimitExceeded(max),
                LexErrorKind::Nom(kind) => Error::ParseError {
                    offset,
                    reason: format!("unexpected input ({:?})", kind),
                },
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(input: &[u8]) -> Object {
        parse(input).unwrap()
    }

    fn dict(entries: &[(&str, Object)]) -> Object {
        Object::Dictionary(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    // ========================================================================
    // Primitive Type Tests
    // ========================================================================

    #[test]
    fn test_parse_primitives() {
        assert_eq!(obj(b"null"), Object::Null);
        assert_eq!(obj(b"true"), Object::Boolean(true));
        assert_eq!(obj(b"false"), Object::Boolean(false));
        assert_eq!(obj(b"-123"), Object::Integer(-123));
        assert_eq!(obj(b"2.5"), Object::Real(2.5));
        assert_eq!(obj(b"/Type"), Object::name("Type"));
    }

    #[test]
    fn test_parse_strings_keep_form() {
        assert_eq!(obj(b"(Hi)"), Object::string(b"Hi".to_vec()));
        assert_eq!(obj(b"<4869>"), Object::hex_string(b"Hi".to_vec()));
    }

    // ========================================================================
    // References
    // ========================================================================

    #[test]
    fn test_parse_indirect_reference() {
        assert_eq!(obj(b"10 0 R"), Object::Reference(ObjectRef::new(10, 0)));
        assert_eq!(obj(b"5 3 R"), Object::Reference(ObjectRef::new(5, 3)));
    }

    #[test]
    fn test_parse_integer_not_reference() {
        let (rest, o) = parse_object(b"10 20 30").unwrap();
        assert_eq!(o, Object::Integer(10));
        assert_eq!(rest, b" 20 30");
    }

    #[test]
    fn test_negative_integers_are_not_references() {
        let (rest, o) = parse_object(b"-1 0 R").unwrap();
        assert_eq!(o, Object::Integer(-1));
        assert_eq!(rest, b" 0 R");
    }

    #[test]
    fn test_parse_array_with_references() {
        assert_eq!(
            obj(b"[1 0 R 2 0 R 7]"),
            Object::Array(vec![
                Object::Reference(ObjectRef::new(1, 0)),
                Object::Reference(ObjectRef::new(2, 0)),
                Object::Integer(7),
            ])
        );
    }

    // ========================================================================
    // Arrays and dictionaries
    // ========================================================================

    #[test]
    fn test_parse_nested_structure() {
        let parsed = obj(b"<< /Type /Page /Kids [ 3 0 R [ 1 2 ] ] /Res << /F /F1 >> >>");
        let expected = dict(&[
            ("Type", Object::name("Page")),
            (
                "Kids",
                Object::Array(vec![
                    Object::Reference(ObjectRef::new(3, 0)),
                    Object::Array(vec![Object::Integer(1), Object::Integer(2)]),
                ]),
            ),
            ("Res", dict(&[("F", Object::name("F1"))])),
        ]);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_dictionary_preserves_key_order() {
        let parsed = obj(b"<</Z 1/A 2/M 3>>");
        let keys: Vec<&str> = parsed.as_dict().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_dictionary_null_key_workaround() {
        let parsed = obj(b"<</Foonull /Bar 1>>");
        assert_eq!(parsed, dict(&[("Foo", Object::Null), ("Bar", Object::Integer(1))]));
    }

    #[test]
    fn test_dictionary_key_named_null_is_kept() {
        let parsed = obj(b"<</null 1>>");
        assert_eq!(parsed, dict(&[("null", Object::Integer(1))]));
    }

    #[test]
    fn test_dictionary_missing_last_value() {
        assert_eq!(obj(b"<</A 1 /B>>"), dict(&[("A", Object::Integer(1)), ("B", Object::Null)]));
    }

    #[test]
    fn test_dictionary_non_name_key() {
        assert!(matches!(parse(b"<< 1 2 >>"), Err(Error::ParseError { offset: 3, .. })));
    }

    #[test]
    fn test_unclosed_array_is_eof() {
        assert!(matches!(parse(b"[1 2"), Err(Error::UnexpectedEof)));
        assert!(matches!(parse(b"<</A 1"), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_unexpected_token_offset() {
        match parse(b"[1 )]") {
            Err(Error::UnexpectedToken { offset, byte }) => {
                assert_eq!(offset, 3);
                assert_eq!(byte, b')');
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_truncated_string_error() {
        assert!(matches!(
            parse(b"(abc"),
            Err(Error::TruncatedToken { kind: "string", ref partial }) if partial == b"abc"
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "[".repeat(10) + &"]".repeat(10);
        assert!(parse_object_with_limit(deep.as_bytes(), 10).is_ok());
        let err = parse_object_with_limit(deep.as_bytes(), 9).unwrap_err();
        assert!(matches!(to_error(deep.as_bytes(), 0, err), Error::RecursionLimitExceeded(9)));
    }

    // ========================================================================
    // Indirect objects
    // ========================================================================

    #[test]
    fn test_parse_indirect_header() {
        let (_, id) = parse_indirect_header(b"12 3 obj <<>>").unwrap();
        assert_eq!(id, ObjectRef::new(12, 3));
        assert!(parse_indirect_header(b"12 3 R").is_err());
    }

    #[test]
    fn test_parse_indirect_object() {
        let (_, parsed) = parse_indirect_object(b"4 0 obj\n<</A 1>>\nendobj\n", 100).unwrap();
        assert_eq!(parsed.id, ObjectRef::new(4, 0));
        assert_eq!(parsed.object, dict(&[("A", Object::Integer(1))]));
        assert_eq!(parsed.stream_data_offset, None);
    }

    #[test]
    fn test_empty_indirect_object_is_null() {
        let (_, parsed) = parse_indirect_object(b"4 0 obj endobj", 100).unwrap();
        assert_eq!(parsed.object, Object::Null);
    }

    #[test]
    fn test_stream_data_offset_eol_variants() {
        let cases: [(&[u8], usize); 4] = [
            (b"1 0 obj<</Length 3>>stream\r\nabc", 28),
            (b"1 0 obj<</Length 3>>stream\nabc", 27),
            (b"1 0 obj<</Length 3>>stream\rabc", 27),
            (b"1 0 obj<</Length 3>>stream \nabc", 28),
        ];
        for (input, expected) in cases {
            let (_, parsed) = parse_indirect_object(input, 100).unwrap();
            assert_eq!(parsed.stream_data_offset, Some(expected));
            assert_eq!(&input[expected..], b"abc");
        }
    }
}
