//! Error types for the PDF core.
//!
//! Lexical errors are always propagated to the caller of the specific parse.
//! Structural errors trigger repair where the resolver defines one, and are
//! propagated otherwise. Circular references are fatal. A wrong password is
//! never an error: authentication reports `Ok(false)`.

use crate::object::ObjectRef;

/// Result type alias for PDF core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading a PDF file.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// A byte that cannot start any token
    #[error("Unexpected token 0x{byte:02x} at byte {offset}")]
    UnexpectedToken {
        /// Byte offset of the offending byte
        offset: usize,
        /// The offending byte
        byte: u8,
    },

    /// End of input inside a string or hex string
    #[error("Unterminated {kind} ({} bytes read)", .partial.len())]
    TruncatedToken {
        /// Token kind ("string" or "hex string")
        kind: &'static str,
        /// Bytes decoded before the input ran out
        partial: Vec<u8>,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// Invalid cross-reference table or stream
    #[error("Invalid cross-reference table: {0}")]
    InvalidXref(String),

    /// A required dictionary key is absent
    #[error("Missing required key /{0}")]
    MissingKey(&'static str),

    /// Malformed /W array of a cross-reference stream
    #[error("Invalid /W field widths: {0}")]
    InvalidWidths(String),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Encryption dictionary uses a filter, version or revision this crate cannot handle
    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// Malformed encryption data or a cipher failure
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// A reference whose target is itself a reference
    #[error("Multi-level indirection: object {0} points to another reference")]
    MultiLevelIndirection(ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}
