/// Parser options for controlling error handling and recovery behavior.
///
/// These options allow you to trade strict PDF compliance for broader compatibility
/// with malformed or non-standard PDF files.
///
/// # Example
///
/// ```
/// use pdf_core::parser_config::ParserOptions;
///
/// // Strict mode - structural damage is an error
/// let strict = ParserOptions::strict();
/// assert!(!strict.allow_repairs);
///
/// // Lenient mode (default) - repair the xref table and fix stream lengths
/// let lenient = ParserOptions::default();
/// assert!(lenient.allow_repairs);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Rebuild the cross-reference table by scanning the file when the
    /// structured lookup fails
    pub allow_repairs: bool,

    /// Correct a stream `/Length` that overruns the next object
    pub allow_malformed_streams: bool,

    /// Maximum object nesting depth (DoS protection)
    ///
    /// PDF Spec: ISO 32000-1:2008, Section H.1 - Implementation Limits
    pub max_nesting: u32,

    /// Maximum depth of nested object lookups (stream lengths resolving
    /// other objects, object streams, decrypt walks)
    pub max_recursion_depth: u32,

    /// Maximum decompression ratio (compressed:decompressed)
    ///
    /// Default: 100 (100:1 ratio). Set to 0 to disable check.
    pub max_decompression_ratio: u32,

    /// Maximum decompressed stream size in bytes
    ///
    /// Default: 100 MB. Set to 0 to disable check.
    pub max_decompressed_size: usize,

    /// Maximum PDF file size in bytes
    ///
    /// Default: 500 MB. Set to 0 to disable check.
    pub max_file_size: u64,

    /// First read size when parsing an object; doubled until the object fits
    pub initial_window: usize,
}

impl Default for ParserOptions {
    /// Default configuration: lenient mode with error limits
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: fail on any structural error
    pub fn strict() -> Self {
        Self {
            allow_repairs: false,
            allow_malformed_streams: false,
            ..Self::lenient()
        }
    }

    /// Lenient mode: attempt to recover from parsing errors
    pub fn lenient() -> Self {
        Self {
            allow_repairs: true,
            allow_malformed_streams: true,
            max_nesting: 100, // PDF spec recommended limit
            max_recursion_depth: 100,
            max_decompression_ratio: 100,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
            max_file_size: 500 * 1024 * 1024,         // 500 MB
            initial_window: 4096,
        }
    }
}
