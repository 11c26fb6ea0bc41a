//! PDF lexer (tokenizer).
//!
//! This module provides low-level tokenization of PDF byte streams.
//! It recognizes all PDF token types including numbers, strings, names,
//! keywords, and delimiters.
//!
//! # PDF Syntax Overview
//!
//! - Numbers: integers (42, -123) and reals (3.14, -2.5, 1e3)
//! - Strings: literal ((Hello)) and hexadecimal (<48656C6C6F>)
//! - Names: identifiers starting with / (/Type, /A#20B)
//! - Keywords: true, false, null and bare words (obj, R, stream, content operators)
//! - Delimiters: `[`, `]`, `<<`, `>>`
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.
//!
//! Running out of input inside a token is reported as `nom::Err::Incomplete`
//! for structural tokens, or as a [`LexErrorKind::Truncated`] failure carrying
//! the bytes decoded so far for strings. Callers that read from a window of a
//! larger file use either signal to retry with a bigger window.

use nom::{
    IResult,
    bytes::complete::{take_till, take_while},
    character::complete::char,
    error::{ErrorKind, ParseError},
    sequence::preceded,
};

/// Lexer error: the input position plus what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError<'a> {
    /// Input at the point of failure
    pub input: &'a [u8],
    /// Failure detail
    pub kind: LexErrorKind,
}

/// Lexer failure kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    /// A nom combinator failed
    Nom(ErrorKind),
    /// A byte that cannot start any token
    UnexpectedByte(u8),
    /// Input ended inside a string; carries the decoded prefix
    Truncated {
        /// "string" or "hex string"
        kind: &'static str,
        /// Bytes decoded before the input ran out
        partial: Vec<u8>,
    },
    /// Arrays/dictionaries nested deeper than the configured limit
    NestingTooDeep(u32),
}

impl<'a> LexError<'a> {
    /// Construct an error of `kind` at `input`.
    pub fn new(input: &'a [u8], kind: LexErrorKind) -> Self {
        Self { input, kind }
    }
}

impl<'a> ParseError<&'a [u8]> for LexError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        Self::new(input, LexErrorKind::Nom(kind))
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

/// Result type for lexer and grammar-level parsers.
pub type LexResult<'a, O> = IResult<&'a [u8], O, LexError<'a>>;

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string with escape sequences decoded
    LiteralString(Vec<u8>),

    /// Hexadecimal string, decoded to bytes
    HexString(Vec<u8>),

    /// Name (e.g., "Type" from "/Type") with #XX escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Any other bare word: obj, endobj, stream, R, content operators
    Keyword(&'a [u8]),
}

/// PDF whitespace characters (ISO 32000-1:2008, Table 1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters (ISO 32000-1:2008, Table 2).
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn whitespace(input: &[u8]) -> LexResult<'_, ()> {
    let (remaining, ws) = take_while(is_whitespace)(input)?;
    if ws.is_empty() {
        return Err(nom::Err::Error(LexError::new(input, LexErrorKind::Nom(ErrorKind::Space))));
    }
    Ok((remaining, ()))
}

/// Parse a comment (% to end of line).
fn comment(input: &[u8]) -> LexResult<'_, ()> {
    let (rest, _) = preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(input)?;
    Ok((rest, ()))
}

/// Skip all whitespace and comments.
pub fn skip_ws(input: &[u8]) -> LexResult<'_, ()> {
    let mut remaining = input;
    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }
        break;
    }
    Ok((remaining, ()))
}

/// Parse an integer or real number.
///
/// Accepts an optional sign, digits, one decimal point and an optional
/// exponent. This never fails once a number has started: text that does
/// not form a valid number (`--5`, `1.2.3`, `+`) becomes `0` or `0.0` and
/// the anomaly is logged.
fn parse_number(input: &[u8]) -> LexResult<'_, Token<'_>> {
    let mut pos = 0;
    let mut is_real = false;

    while pos < input.len() {
        let c = input[pos];
        match c {
            b'0'..=b'9' => pos += 1,
            b'+' | b'-' if pos == 0 || matches!(input[pos - 1], b'e' | b'E' | b'+' | b'-') => {
                pos += 1
            },
            b'.' => {
                is_real = true;
                pos += 1;
            },
            b'e' | b'E' if pos > 0 => {
                is_real = true;
                pos += 1;
            },
            _ => break,
        }
    }

    if pos == 0 {
        return Err(nom::Err::Error(LexError::new(input, LexErrorKind::Nom(ErrorKind::Digit))));
    }

    let text = &input[..pos];
    // Only ASCII bytes were accepted above
    let text = std::str::from_utf8(text).unwrap_or("");

    let token = if is_real {
        match text.parse::<f64>() {
            Ok(r) => Token::Real(r),
            Err(_) => {
                log::debug!("Malformed real number {:?}, using 0.0", text);
                Token::Real(0.0)
            },
        }
    } else {
        match text.parse::<i64>() {
            Ok(i) => Token::Integer(i),
            Err(_) => {
                log::debug!("Malformed integer {:?}, using 0", text);
                Token::Integer(0)
            },
        }
    };

    Ok((&input[pos..], token))
}

/// Parse a literal string enclosed in parentheses, decoding escapes.
///
/// Handles balanced nested parentheses, `\n \r \t \b \f \( \) \\`, 1-3 digit
/// octal escapes and backslash line continuations. An unknown escape drops
/// the backslash and keeps the character.
fn parse_literal_string(input: &[u8]) -> LexResult<'_, Token<'_>> {
    let (rest, _) = char('(')(input)?;
    let mut out = Vec::new();
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < rest.len() {
        let c = rest[pos];
        pos += 1;
        match c {
            b'\\' => {
                let Some(&e) = rest.get(pos) else {
                    break;
                };
                pos += 1;
                match e {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'(' | b')' | b'\\' => out.push(e),
                    b'0'..=b'7' => {
                        let mut value = u32::from(e - b'0');
                        for _ in 0..2 {
                            match rest.get(pos) {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    pos += 1;
                                },
                                _ => break,
                            }
                        }
                        out.push((value & 0xFF) as u8);
                    },
                    b'\r' => {
                        if rest.get(pos) == Some(&b'\n') {
                            pos += 1;
                        }
                    },
                    b'\n' => {},
                    other => out.push(other),
                }
            },
            b'(' => {
                depth += 1;
                out.push(c);
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&rest[pos..], Token::LiteralString(out)));
                }
                out.push(c);
            },
            _ => out.push(c),
        }
    }

    Err(nom::Err::Failure(LexError::new(
        &rest[rest.len()..],
        LexErrorKind::Truncated {
            kind: "string",
            partial: out,
        },
    )))
}

/// Decode hex digits to bytes, ignoring whitespace and padding an odd
/// trailing nibble with 0. Non-hex characters are skipped.
pub fn decode_hex(hex: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = hex
        .iter()
        .filter_map(|&c| match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        })
        .collect();

    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn parse_hex_string(input: &[u8]) -> LexResult<'_, Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(LexError::new(input, LexErrorKind::Nom(ErrorKind::Tag))));
    }
    let (rest, _) = char('<')(input)?;
    let (rest, body) = take_till(|c| c == b'>')(rest)?;
    if rest.is_empty() {
        return Err(nom::Err::Failure(LexError::new(
            rest,
            LexErrorKind::Truncated {
                kind: "hex string",
                partial: decode_hex(body),
            },
        )));
    }
    Ok((&rest[1..], Token::HexString(decode_hex(body))))
}

/// Decode #XX escape sequences in PDF name bytes.
///
/// An invalid sequence keeps the literal `#`. The result is UTF-8 when the
/// decoded bytes are valid UTF-8, otherwise each byte maps to the Latin-1
/// code point of the same value.
///
/// ```
/// # use pdf_core::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"Type"), "Type");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            let hex = raw.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok());
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                bytes.push(b);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }

    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> LexResult<'_, Token<'_>> {
    let (rest, raw) = preceded(char('/'), take_while(is_regular))(input)?;
    Ok((rest, Token::Name(decode_name_escapes(raw))))
}

/// Parse delimiters and bare words.
fn parse_keyword(input: &[u8]) -> LexResult<'_, Token<'_>> {
    if input.starts_with(b"<<") {
        return Ok((&input[2..], Token::DictStart));
    }
    if input.starts_with(b">>") {
        return Ok((&input[2..], Token::DictEnd));
    }
    match input.first() {
        Some(b'[') => return Ok((&input[1..], Token::ArrayStart)),
        Some(b']') => return Ok((&input[1..], Token::ArrayEnd)),
        _ => {},
    }

    let (rest, word) = take_while(is_regular)(input)?;
    if word.is_empty() {
        return Err(nom::Err::Error(LexError::new(input, LexErrorKind::Nom(ErrorKind::Tag))));
    }
    let token = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        _ => Token::Keyword(word),
    };
    Ok((rest, token))
}

/// Parse a single PDF token.
///
/// Skips whitespace and comments, then dispatches on the leading byte.
///
/// # Errors
///
/// * `Incomplete` if only whitespace/comments remain.
/// * `Failure` with [`LexErrorKind::Truncated`] for an unterminated string.
/// * `Error` with [`LexErrorKind::UnexpectedByte`] for a byte that cannot
///   start a token (`)`, `>`, `{`, `}`).
pub fn token(input: &[u8]) -> LexResult<'_, Token<'_>> {
    let (input, _) = skip_ws(input)?;

    let Some(&first) = input.first() else {
        return Err(nom::Err::Incomplete(nom::Needed::Unknown));
    };

    match first {
        b'/' => parse_name(input),
        b'(' => parse_literal_string(input),
        b'<' if input.get(1) == Some(&b'<') => parse_keyword(input),
        b'<' => parse_hex_string(input),
        b'+' | b'-' | b'.' | b'0'..=b'9' => parse_number(input),
        b'[' | b']' => parse_keyword(input),
        b'>' if input.get(1) == Some(&b'>') => parse_keyword(input),
        c if is_regular(c) => parse_keyword(input),
        c => Err(nom::Err::Error(LexError::new(input, LexErrorKind::UnexpectedByte(c)))),
    }
}

/// Parse tokens until the input is exhausted or a token fails.
pub fn tokens(input: &[u8]) -> LexResult<'_, Vec<Token<'_>>> {
    let mut out = Vec::new();
    let mut remaining = input;
    loop {
        match token(remaining) {
            Ok((rest, tok)) => {
                out.push(tok);
                remaining = rest;
            },
            Err(nom::Err::Incomplete(_)) => return Ok((remaining, out)),
            Err(e) => return Err(e),
        }
    }
}
