//! Document session: cross-reference resolution and object materialization.
//!
//! A [`Session`] owns the seekable source of one PDF file. Opening it reads
//! the header and the cross-reference chain; objects are then parsed lazily
//! on lookup, cached by object number, and decrypted when the document is
//! encrypted and a password has been accepted.
//!
//! Structural damage is repaired where a repair is defined:
//!
//! - a `startxref` offset past the end of the file
//! - an offset that misses its `xref` keyword or xref stream
//! - a table whose entries name the wrong objects
//! - a table that cannot be read at all (full reconstruction)
//!
//! Each repair strategy runs at most once per session.

use crate::decoders::CodecRegistry;
use crate::encryption::{Crypter, Permissions};
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::ObjectStream;
use crate::parser::{parse_indirect_header, parse_indirect_object, to_error, ParsedIndirect};
use crate::parser_config::ParserOptions;
use crate::repair::{locate_xref_near, rebuild_top_down, seek_version_top_down, seek_xref_marker};
use crate::source::ByteSource;
use crate::xref::{
    classify_xref, next_object_offset, parse_startxref, parse_xref_stream, parse_xref_table, rfind,
    CrossRefTable, XRefEntry, XRefEntryKind, XrefKind,
};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// Bytes inspected for the `%PDF-` header.
const HEADER_WINDOW: usize = 20;

/// Bytes peeked at an xref offset, and the step size when backing up.
const XREF_PEEK: usize = 20;

/// Backward scan window for `%%EOF`.
const EOF_SCAN_WINDOW: u64 = 1000;

/// Bytes before `%%EOF` searched for `startxref`.
const STARTXREF_WINDOW: u64 = 64;

/// Bytes read to re-parse an `N G obj` header.
const OBJECT_HEADER_PEEK: usize = 64;

/// Bytes the framing after an object's value needs (`endobj`, `stream` and
/// its end of line). A window ending closer than this may have cut a keyword.
const KEYWORD_SLACK: usize = 16;

/// `\nendstream\nendobj\n`: the framing assumed after a stream body when the
/// `endstream` keyword cannot be found.
const STREAM_TRAILER_LEN: u64 = 17;

/// Result of reading an uncompressed object at its recorded offset.
enum Loaded {
    Found(Object),
    /// The offset holds a different object than the table claims
    WrongObject(ObjectRef),
}

/// An open PDF document.
///
/// The session exclusively owns its reader; every positioned read restores
/// the cursor, so nested lookups (an indirect `/Length`, an object stream
/// container) never disturb each other.
///
/// # Example
///
/// ```no_run
/// use pdf_core::document::Session;
///
/// let mut session = Session::open_path("sample.pdf")?;
/// println!("PDF version: {}.{}", session.version().0, session.version().1);
/// if let Some(root) = session.trailer().get("Root").cloned() {
///     let catalog = session.resolve(&root)?;
///     println!("Catalog: {}", catalog);
/// }
/// # Ok::<(), pdf_core::error::Error>(())
/// ```
pub struct Session<R> {
    /// Seekable file contents
    source: ByteSource<R>,
    /// Parsing and repair limits
    options: ParserOptions,
    /// PDF version (major, minor) from the header
    version: (u8, u8),
    /// Cross-reference table; its trailer is the document trailer
    xref: CrossRefTable,
    /// Sorted byte offsets of all uncompressed objects
    offsets: Vec<u64>,
    /// Materialized objects by object number
    object_cache: HashMap<u32, Object>,
    /// Decoded object streams by container object number
    object_streams: HashMap<u32, ObjectStream>,
    /// Object numbers currently being loaded (cycle detection)
    in_progress: HashSet<u32>,
    /// Current depth of nested lookups
    recursion_depth: u32,
    /// Stream filters used for xref and object streams
    codecs: CodecRegistry,
    /// Encryption state, when the trailer has `/Encrypt`
    crypter: Option<Crypter>,
    /// Whether `/Encrypt` has been examined
    encryption_checked: bool,
    /// Repair strategy flags: each runs at most once
    marker_searched: bool,
    rekeyed: bool,
    rebuilt: bool,
}

impl<R> std::fmt::Debug for Session<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.object_cache.len())
            .field("encrypted", &self.crypter.is_some())
            .field("rebuilt", &self.rebuilt)
            .finish_non_exhaustive()
    }
}

impl Session<BufReader<File>> {
    /// Open a PDF file by path with default (lenient) options.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pdf_core::document::Session;
    ///
    /// let session = Session::open_path("sample.pdf")?;
    /// # Ok::<(), pdf_core::error::Error>(())
    /// ```
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> Session<R> {
    /// Open a PDF from a seekable reader with default (lenient) options.
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with_options(reader, ParserOptions::default())
    }

    /// Open a PDF from a seekable reader.
    ///
    /// This function:
    /// 1. Reads the `%PDF-x.y` header, tolerating junk before it
    /// 2. Locates `startxref` and reads the cross-reference chain
    /// 3. Checks for `/Encrypt` and tries the empty user password
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exceeds [`ParserOptions::max_file_size`]
    /// - No header is found (or junk precedes it in strict mode)
    /// - The cross-reference table cannot be read or reconstructed
    pub fn open_with_options(reader: R, options: ParserOptions) -> Result<Self> {
        let mut source = ByteSource::new(reader)?;
        if options.max_file_size > 0 && source.len() > options.max_file_size {
            return Err(Error::ParseError {
                offset: 0,
                reason: format!(
                    "file size {} exceeds limit {}",
                    source.len(),
                    options.max_file_size
                ),
            });
        }

        let version = read_header(&mut source, &options)?;
        log::debug!("PDF version {}.{}", version.0, version.1);

        let mut session = Self {
            source,
            options,
            version,
            xref: CrossRefTable::new(),
            offsets: Vec::new(),
            object_cache: HashMap::new(),
            object_streams: HashMap::new(),
            in_progress: HashSet::new(),
            recursion_depth: 0,
            codecs: CodecRegistry::with_defaults(),
            crypter: None,
            encryption_checked: false,
            marker_searched: false,
            rekeyed: false,
            rebuilt: false,
        };
        session.load_xref()?;

        match session.is_encrypted() {
            Ok(true) => match session.authenticate(b"") {
                Ok(true) => log::info!("Authenticated with the empty password"),
                Ok(false) => log::warn!("Document is encrypted and requires a password"),
                Err(e) => log::error!("Failed to authenticate with the empty password: {}", e),
            },
            Ok(false) => {},
            Err(e) => log::error!("Failed to initialize encryption: {}", e),
        }

        Ok(session)
    }

    /// PDF version (major, minor) from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The trailer dictionary (the newest one in a `/Prev` chain).
    pub fn trailer(&self) -> &Dict {
        self.xref.trailer()
    }

    /// The cross-reference table in use.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Options the session was opened with.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Stream filters used by [`decode_stream`](Self::decode_stream).
    ///
    /// Callers register codecs beyond Flate here.
    pub fn codecs_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codecs
    }

    /// Encryption state, once `/Encrypt` has been read.
    pub fn crypter(&self) -> Option<&Crypter> {
        self.crypter.as_ref()
    }

    /// Permissions granted so far: everything for an unencrypted document,
    /// nothing before a password has been accepted.
    pub fn permissions(&self) -> Permissions {
        match &self.crypter {
            Some(crypter) => crypter.permissions(),
            None => Permissions::OWNER,
        }
    }

    // ========================================================================
    // Encryption
    // ========================================================================

    /// Check whether the trailer has `/Encrypt`, loading the encryption
    /// state on first call.
    ///
    /// The objects named by the trailer's `/Info` and `/Encrypt` are never
    /// decrypted afterwards.
    pub fn is_encrypted(&mut self) -> Result<bool> {
        if self.encryption_checked {
            return Ok(self.crypter.is_some());
        }

        let encrypt = match self.xref.trailer().get("Encrypt") {
            None | Some(Object::Null) => {
                log::debug!("PDF is not encrypted (no /Encrypt entry)");
                self.encryption_checked = true;
                return Ok(false);
            },
            Some(obj) => obj.clone(),
        };

        let encrypt_dict = match encrypt {
            Object::Reference(r) => {
                log::debug!("Loading /Encrypt object {}", r);
                match self.lookup_by_number(r.id)?.into_direct() {
                    Object::Dictionary(dict) => dict,
                    other => {
                        return Err(Error::InvalidObjectType {
                            expected: "Dictionary".to_string(),
                            found: other.type_name().to_string(),
                        })
                    },
                }
            },
            Object::Dictionary(dict) => dict,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };

        let trailer = self.xref.trailer().clone();
        let mut crypter =
            Crypter::from_encrypt_dict(&encrypt_dict, &trailer, |r| self.lookup_by_number(r.id))?;
        exempt_trailer_objects(&mut crypter, &trailer);

        self.crypter = Some(crypter);
        self.encryption_checked = true;
        Ok(true)
    }

    /// Try `password` as the owner, then as the user password.
    ///
    /// On success every object read afterwards is decrypted. A wrong password
    /// is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Fails when the document is not encrypted or its encryption
    /// dictionary is malformed.
    pub fn authenticate(&mut self, password: &[u8]) -> Result<bool> {
        if !self.is_encrypted()? {
            return Err(Error::Encryption("document is not encrypted".to_string()));
        }
        let crypter = self
            .crypter
            .as_mut()
            .ok_or_else(|| Error::Encryption("encryption state missing".to_string()))?;
        crypter.authenticate(password)
    }

    /// Check what `password` would grant without changing the session.
    ///
    /// An unencrypted document grants everything to any password.
    pub fn check_access(&mut self, password: &[u8]) -> Result<(bool, Permissions)> {
        if !self.is_encrypted()? {
            return Ok((true, Permissions::OWNER));
        }
        match &self.crypter {
            Some(crypter) => crypter.check_access(password),
            None => Ok((false, Permissions::empty())),
        }
    }

    /// Objects may be cached once decryption can no longer change them.
    fn can_cache(&self) -> bool {
        match &self.crypter {
            Some(crypter) => crypter.is_authenticated(),
            None => self.encryption_checked,
        }
    }

    // ========================================================================
    // Object access
    // ========================================================================

    /// Dereference one level.
    ///
    /// A reference yields the content of its indirect object; any other
    /// value is returned as is. Missing objects resolve to `Null`.
    ///
    /// # Errors
    ///
    /// [`Error::MultiLevelIndirection`] when the indirect object's content is
    /// itself a reference.
    pub fn resolve(&mut self, object: &Object) -> Result<Object> {
        let Object::Reference(r) = object else {
            return Ok(object.clone());
        };
        let resolved = self.lookup_by_number(r.id)?.into_direct();
        if matches!(resolved, Object::Reference(_)) {
            log::error!("Object {} points to another reference", r);
            return Err(Error::MultiLevelIndirection(*r));
        }
        Ok(resolved)
    }

    /// Materialize object `number`.
    ///
    /// Returns an [`Object::Indirect`] wrapping the object's content, or
    /// `Null` when the table has no entry for `number`. Stream payloads are
    /// returned raw (still filtered, already decrypted).
    ///
    /// # Errors
    ///
    /// - [`Error::CircularReference`] when loading the object requires
    ///   loading it again (a stream `/Length` pointing back at its stream)
    /// - [`Error::RecursionLimitExceeded`] past
    ///   [`ParserOptions::max_recursion_depth`] nested lookups
    /// - parse errors that repair could not fix
    pub fn lookup_by_number(&mut self, number: u32) -> Result<Object> {
        self.lookup(number, self.options.allow_repairs)
    }

    /// Decode a stream's payload through its `/Filter` chain.
    ///
    /// A reference is resolved first.
    pub fn decode_stream(&mut self, object: &Object) -> Result<Vec<u8>> {
        let object = self.resolve(object)?;
        match object.direct() {
            Object::Stream { dict, data } => self.codecs.decode_stream(dict, data, &self.options),
            other => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    fn lookup(&mut self, number: u32, attempt_repairs: bool) -> Result<Object> {
        if let Some(cached) = self.object_cache.get(&number) {
            log::trace!("Object {} found in cache", number);
            return Ok(cached.clone());
        }

        let Some(entry) = self.xref.get(number).copied() else {
            log::debug!("Object {} not in xref table, resolving to null", number);
            return Ok(Object::Null);
        };

        if self.in_progress.contains(&number) {
            log::error!("Circular reference detected while loading object {}", number);
            return Err(Error::CircularReference(ObjectRef::new(number, entry.generation)));
        }
        if self.recursion_depth >= self.options.max_recursion_depth {
            log::error!(
                "Recursion depth limit exceeded ({}) while loading object {}",
                self.options.max_recursion_depth,
                number
            );
            return Err(Error::RecursionLimitExceeded(self.options.max_recursion_depth));
        }

        self.in_progress.insert(number);
        self.recursion_depth += 1;
        let loaded = match entry.kind {
            XRefEntryKind::Offset(offset) => self.load_uncompressed(number, offset),
            XRefEntryKind::Compressed { container, index } => {
                self.load_compressed(number, container, index).map(Loaded::Found)
            },
        };
        self.recursion_depth -= 1;
        self.in_progress.remove(&number);

        let mut object = match loaded {
            Ok(Loaded::Found(object)) => object,
            Ok(Loaded::WrongObject(found)) => {
                if !attempt_repairs {
                    return Err(Error::InvalidXref(format!(
                        "xref entry for object {} points at object {}",
                        number, found
                    )));
                }
                log::warn!(
                    "Xref entry for object {} points at object {}, repairing table",
                    number,
                    found
                );
                self.repair_wrong_entries()?;
                return self.lookup(number, false);
            },
            Err(e) if attempt_repairs && !self.rebuilt && is_repairable(&e, &entry) => {
                log::warn!("Failed to read object {} ({}), reconstructing xref", number, e);
                self.rebuild_table()?;
                return self.lookup(number, false);
            },
            Err(e) => return Err(e),
        };

        if let Some(crypter) = self.crypter.as_mut() {
            if crypter.is_authenticated() && !crypter.is_decrypted(&object) {
                crypter.decrypt(&mut object, ObjectRef::new(number, entry.generation))?;
            }
        }

        if self.can_cache() {
            self.object_cache.insert(number, object.clone());
        }
        Ok(object)
    }

    /// Parse the indirect object at `offset` and read its stream body.
    fn load_uncompressed(&mut self, number: u32, offset: u64) -> Result<Loaded> {
        let parsed = self.parse_indirect_at(offset)?;
        if parsed.id.id != number {
            return Ok(Loaded::WrongObject(parsed.id));
        }

        let Some(data_offset) = parsed.stream_data_offset else {
            return Ok(Loaded::Found(Object::Indirect {
                id: parsed.id,
                object: Box::new(parsed.object),
            }));
        };

        let mut dict = match parsed.object {
            Object::Dictionary(dict) => dict,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };
        let start = offset + data_offset as u64;
        let length = self.stream_length(&mut dict, parsed.id, start)?;
        let data = self.source.read_exact_at(start, length)?;

        Ok(Loaded::Found(Object::Indirect {
            id: parsed.id,
            object: Box::new(Object::Stream {
                dict,
                data: data.into(),
            }),
        }))
    }

    /// Resolve `/Length` and check it against the next object's offset,
    /// rewriting `/Length` when it had to be corrected.
    fn stream_length(&mut self, dict: &mut Dict, id: ObjectRef, start: u64) -> Result<usize> {
        let declared = match dict.get("Length") {
            Some(Object::Integer(n)) => *n,
            Some(Object::Reference(r)) => {
                let r = *r;
                log::debug!("Stream {} has indirect /Length {}", id, r);
                let resolved = self.lookup_by_number(r.id)?;
                resolved.direct().as_integer().ok_or_else(|| Error::InvalidObjectType {
                    expected: "Integer".to_string(),
                    found: resolved.direct().type_name().to_string(),
                })?
            },
            Some(other) => {
                return Err(Error::InvalidObjectType {
                    expected: "Integer".to_string(),
                    found: other.type_name().to_string(),
                })
            },
            None => return Err(Error::MissingKey("Length")),
        };
        if declared < 0 {
            return Err(Error::ParseError {
                offset: start as usize,
                reason: format!("stream {} has negative /Length {}", id, declared),
            });
        }

        let mut length = declared as u64;
        if let Some(next) = next_object_offset(&self.offsets, start) {
            if next > start && start + length > next {
                if !self.options.allow_malformed_streams {
                    return Err(Error::ParseError {
                        offset: start as usize,
                        reason: format!(
                            "stream {} /Length {} overruns the next object at {}",
                            id, declared, next
                        ),
                    });
                }
                length = self.length_before(start, next)?;
                log::warn!(
                    "Stream {} /Length {} overruns the next object at {}; corrected to {}",
                    id,
                    declared,
                    next,
                    length
                );
                dict.insert("Length".to_string(), Object::Integer(length as i64));
            }
        }

        if start + length > self.source.len() {
            return Err(Error::ParseError {
                offset: start as usize,
                reason: format!("stream {} /Length {} runs past end of file", id, length),
            });
        }
        Ok(length as usize)
    }

    /// Length of a stream body that starts at `start` and must end before
    /// `next`: up to the last `endstream` in the gap, without its end of line.
    fn length_before(&mut self, start: u64, next: u64) -> Result<u64> {
        let gap = self.source.read_at(start, (next - start) as usize)?;
        if let Some(mut end) = rfind(&gap, b"endstream") {
            if end > 0 && gap[end - 1] == b'\n' {
                end -= 1;
            }
            if end > 0 && gap[end - 1] == b'\r' {
                end -= 1;
            }
            return Ok(end as u64);
        }
        (next - start)
            .checked_sub(STREAM_TRAILER_LEN)
            .ok_or_else(|| Error::ParseError {
                offset: start as usize,
                reason: "no room for stream data before the next object".to_string(),
            })
    }

    /// Load member `number` of the object stream `container`.
    fn load_compressed(&mut self, number: u32, container: u32, index: u32) -> Result<Object> {
        if container == number {
            log::error!("Object {} names itself as its object stream", number);
            return Err(Error::CircularReference(ObjectRef::new(number, 0)));
        }
        match self.xref.get(container).map(|e| e.kind) {
            Some(XRefEntryKind::Offset(_)) => {},
            Some(XRefEntryKind::Compressed { .. }) => {
                return Err(Error::InvalidXref(format!(
                    "object stream {} is itself compressed",
                    container
                )))
            },
            None => {
                return Err(Error::InvalidXref(format!(
                    "object stream {} is not in the xref table",
                    container
                )))
            },
        }

        let max_nesting = self.options.max_nesting;
        let object = match self.object_streams.get(&container) {
            Some(objstm) => objstm.get(number, index, max_nesting)?,
            None => {
                let objstm = self.load_object_stream(container)?;
                let object = objstm.get(number, index, max_nesting)?;
                if self.can_cache() {
                    self.object_streams.insert(container, objstm);
                }
                object
            },
        };
        log::trace!("Loaded object {} from object stream {}", number, container);

        // Decrypted along with the container
        if let Some(crypter) = self.crypter.as_mut() {
            crypter.mark_decrypted(number);
        }
        Ok(Object::Indirect {
            id: ObjectRef::new(number, 0),
            object: Box::new(object),
        })
    }

    fn load_object_stream(&mut self, container: u32) -> Result<ObjectStream> {
        let loaded = self.lookup_by_number(container)?;
        match loaded.direct() {
            Object::Stream { dict, data } => {
                let decoded = self.codecs.decode_stream(dict, data, &self.options)?;
                log::debug!(
                    "Decoded object stream {} ({} -> {} bytes)",
                    container,
                    data.len(),
                    decoded.len()
                );
                ObjectStream::parse(dict, decoded)
            },
            other => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Parse an indirect object framed at `offset`, growing the read window
    /// until the object fits.
    fn parse_indirect_at(&mut self, offset: u64) -> Result<ParsedIndirect> {
        let max_nesting = self.options.max_nesting;
        self.source
            .with_window(offset, self.options.initial_window, |buf, at_eof| {
                let (rest, parsed) =
                    parse_indirect_object(buf, max_nesting).map_err(|e| to_error(buf, offset, e))?;
                if !at_eof && parsed.stream_data_offset.is_none() && rest.len() < KEYWORD_SLACK {
                    return Err(Error::UnexpectedEof);
                }
                Ok(parsed)
            })
    }

    // ========================================================================
    // Cross-reference loading
    // ========================================================================

    fn load_xref(&mut self) -> Result<()> {
        match self.read_xref_chain() {
            Ok(table) => {
                log::debug!("Loaded xref table with {} entries", table.len());
                self.install_table(table);
                Ok(())
            },
            Err(e) if self.options.allow_repairs && !is_fatal(&e) => {
                log::warn!("Failed to read cross-reference table ({}), reconstructing", e);
                self.rebuild_table()
            },
            Err(e) => Err(e),
        }
    }

    /// Read the newest section and everything reachable through `/Prev`.
    fn read_xref_chain(&mut self) -> Result<CrossRefTable> {
        let first = self.locate_startxref()?;
        let mut table = self.read_section(first)?;

        let mut visited = HashSet::from([first]);
        let mut prev = prev_offset(table.trailer());
        while let Some(offset) = prev {
            if !visited.insert(offset) {
                log::warn!("Cyclic /Prev chain at offset {}, stopping", offset);
                break;
            }
            match self.read_section(offset) {
                Ok(older) => {
                    log::debug!("Merging older xref section at {}", offset);
                    prev = prev_offset(older.trailer());
                    table.merge_older(older);
                },
                Err(e) => {
                    log::warn!("Failed to read /Prev xref section at {}: {}", offset, e);
                    break;
                },
            }
        }

        if table.is_empty() {
            return Err(Error::InvalidXref("cross-reference table is empty".to_string()));
        }
        Ok(table)
    }

    /// Find the `startxref` offset from the end of the file.
    fn locate_startxref(&mut self) -> Result<u64> {
        let eof = self.find_eof_marker()?;
        let tail_start = eof.saturating_sub(STARTXREF_WINDOW);
        let tail = self.source.read_at(tail_start, (eof - tail_start) as usize)?;
        let offset = parse_startxref(&tail)
            .ok_or_else(|| Error::InvalidXref("startxref not found".to_string()))?;
        log::trace!("startxref at {}", offset);

        if offset <= self.source.len() {
            return Ok(offset);
        }
        if !self.options.allow_repairs {
            return Err(Error::InvalidXref(format!(
                "startxref offset {} is outside the file",
                offset
            )));
        }
        log::warn!("startxref offset {} is outside the file, searching for xref", offset);
        let window_start = eof.saturating_sub(EOF_SCAN_WINDOW);
        let window = self.source.read_at(window_start, (eof - window_start) as usize)?;
        Ok(window_start + locate_xref_near(&window, window.len())?)
    }

    /// Offset of the last `%%EOF`, scanning backward in overlapping windows.
    fn find_eof_marker(&mut self) -> Result<u64> {
        let mut end = self.source.len();
        while end > 0 {
            let start = end.saturating_sub(EOF_SCAN_WINDOW);
            let window = self.source.read_at(start, (end - start) as usize)?;
            if let Some(pos) = rfind(&window, b"%%EOF") {
                return Ok(start + pos as u64);
            }
            log::debug!("EOF marker not in {}..{}, continuing", start, end);
            if start == 0 {
                break;
            }
            // Keep a marker split across two windows
            end = start + 4;
        }
        Err(Error::InvalidXref("%%EOF marker not found".to_string()))
    }

    /// Read one section (a classic table with its optional `/XRefStm`, or
    /// an xref stream) at `offset`.
    fn read_section(&mut self, offset: u64) -> Result<CrossRefTable> {
        let (start, kind) = self.locate_section(offset)?;
        match kind {
            XrefKind::Stream => self.read_xref_stream(start),
            XrefKind::Table => {
                let mut table = self.read_xref_table(start)?;
                let hybrid = table.trailer().get("XRefStm").and_then(Object::as_integer);
                if let Some(stm) = hybrid.filter(|&n| n >= 0) {
                    match self.read_xref_stream(stm as u64) {
                        Ok(stream) => {
                            log::debug!("Merging /XRefStm section at {}", stm);
                            for (number, entry) in stream.iter() {
                                table.fill_gap(number, *entry);
                            }
                        },
                        Err(e) => log::warn!("Failed to read /XRefStm at {}: {}", stm, e),
                    }
                }
                Ok(table)
            },
        }
    }

    /// Find where the section near `offset` starts, backing up by two
    /// peek windows before falling back to the marker search.
    fn locate_section(&mut self, offset: u64) -> Result<(u64, XrefKind)> {
        let end = offset + XREF_PEEK as u64;
        let mut start = offset;
        for _ in 0..=2 {
            let peek = self.source.read_at(start, (end - start) as usize)?;
            if let Some((pos, kind)) = classify_xref(&peek) {
                if start != offset {
                    log::debug!("Found xref {} bytes before its recorded offset", offset - start);
                }
                return Ok((start + pos as u64, kind));
            }
            if start == 0 {
                break;
            }
            start = start.saturating_sub(XREF_PEEK as u64);
        }

        if !self.options.allow_repairs || self.marker_searched {
            return Err(Error::InvalidXref(format!("no xref section at offset {}", offset)));
        }
        self.marker_searched = true;
        log::warn!("No xref section at offset {}, searching for the last xref marker", offset);
        let data = self.source.read_all()?;
        Ok((seek_xref_marker(&data)?, XrefKind::Table))
    }

    fn read_xref_table(&mut self, start: u64) -> Result<CrossRefTable> {
        self.source
            .with_window(start, self.options.initial_window, |buf, _| parse_xref_table(buf, start))
    }

    fn read_xref_stream(&mut self, start: u64) -> Result<CrossRefTable> {
        let parsed = self.parse_indirect_at(start)?;
        let data_offset = parsed.stream_data_offset.ok_or_else(|| {
            Error::InvalidXref(format!("object {} at {} is not a stream", parsed.id, start))
        })?;
        let dict = parsed.object.as_dict().ok_or_else(|| {
            Error::InvalidXref(format!("xref stream {} has no dictionary", parsed.id))
        })?;
        if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
            return Err(Error::InvalidXref(format!("object {} is not an xref stream", parsed.id)));
        }
        let length = dict
            .get("Length")
            .and_then(Object::as_integer)
            .filter(|&n| n >= 0)
            .ok_or_else(|| {
                Error::InvalidXref(format!("xref stream {} needs a direct /Length", parsed.id))
            })?;

        let raw = self.source.read_exact_at(start + data_offset as u64, length as usize)?;
        let data = self.codecs.decode_stream(dict, &raw, &self.options)?;
        parse_xref_stream(dict, &data, start, parsed.id.id)
    }

    // ========================================================================
    // Repair
    // ========================================================================

    fn install_table(&mut self, table: CrossRefTable) {
        self.offsets = table.sorted_offsets();
        self.xref = table;
        self.object_cache.clear();
        self.object_streams.clear();
        if let Some(crypter) = self.crypter.as_mut() {
            crypter.reset_processed();
            exempt_trailer_objects(crypter, self.xref.trailer());
        }
    }

    /// Replace the table with one built by scanning the whole file.
    fn rebuild_table(&mut self) -> Result<()> {
        if self.rebuilt {
            return Err(Error::InvalidXref("xref reconstruction already attempted".to_string()));
        }
        self.rebuilt = true;
        let data = self.source.read_all()?;
        let mut table = rebuild_top_down(&data)?;

        // Keep /Encrypt, /ID and /Info from the table being replaced
        let mut trailer = table.trailer().clone();
        for key in ["Encrypt", "ID", "Info"] {
            if let Some(value) = self.xref.trailer().get(key) {
                trailer.entry(key.to_string()).or_insert_with(|| value.clone());
            }
        }
        table.set_trailer(trailer);
        self.install_table(table);
        Ok(())
    }

    /// Re-key every uncompressed entry by the object number actually found
    /// at its offset; fall back to full reconstruction when a header cannot
    /// be read.
    fn repair_wrong_entries(&mut self) -> Result<()> {
        if !self.rekeyed {
            self.rekeyed = true;
            match self.rekey_table() {
                Ok(table) => {
                    log::info!("Re-keyed xref table ({} entries)", table.len());
                    self.install_table(table);
                    return Ok(());
                },
                Err(e) => log::warn!("Re-keying xref table failed: {}", e),
            }
        }
        self.rebuild_table()
    }

    fn rekey_table(&mut self) -> Result<CrossRefTable> {
        let mut table = CrossRefTable::new();
        table.set_trailer(self.xref.trailer().clone());

        let entries: Vec<(u32, XRefEntry)> = self.xref.iter().map(|(n, e)| (n, *e)).collect();
        for &(number, entry) in &entries {
            if let XRefEntryKind::Offset(offset) = entry.kind {
                let head = self.source.read_at(offset, OBJECT_HEADER_PEEK)?;
                let (_, id) =
                    parse_indirect_header(&head).map_err(|e| to_error(&head, offset, e))?;
                if id.id != number {
                    log::debug!("Offset {} holds object {}, not {}", offset, id, number);
                }
                table.insert_if_newer(id.id, XRefEntry::offset(offset, id.gen));
            }
        }
        for (number, entry) in entries {
            if matches!(entry.kind, XRefEntryKind::Compressed { .. }) {
                table.fill_gap(number, entry);
            }
        }
        Ok(table)
    }
}

/// Read the header version, moving the source base past any junk in front
/// of it.
fn read_header<R: Read + Seek>(
    source: &mut ByteSource<R>,
    options: &ParserOptions,
) -> Result<(u8, u8)> {
    let head = source.read_at(0, HEADER_WINDOW)?;
    if let Some((pos, major, minor)) = seek_version_top_down(&head) {
        if head[pos] == b'%' {
            return Ok((major, minor));
        }
    }

    let found = String::from_utf8_lossy(&head[..head.len().min(8)]).into_owned();
    if !options.allow_repairs {
        return Err(Error::InvalidHeader(found));
    }
    let data = source.read_all()?;
    match seek_version_top_down(&data) {
        Some((pos, major, minor)) => {
            log::warn!("PDF header found at offset {}; treating it as offset 0", pos);
            source.set_base(pos as u64);
            Ok((major, minor))
        },
        None => Err(Error::InvalidHeader(found)),
    }
}

/// `/Info` and `/Encrypt` are read as stored.
fn exempt_trailer_objects(crypter: &mut Crypter, trailer: &Dict) {
    for key in ["Info", "Encrypt"] {
        if let Some(Object::Reference(r)) = trailer.get(key) {
            crypter.mark_decrypted(r.id);
        }
    }
}

fn prev_offset(trailer: &Dict) -> Option<u64> {
    trailer
        .get("Prev")
        .and_then(Object::as_integer)
        .and_then(|n| u64::try_from(n).ok())
}

/// Errors no repair can fix.
fn is_fatal(err: &Error) -> bool {
    matches!(
        err,
        Error::CircularReference(_)
            | Error::MultiLevelIndirection(_)
            | Error::RecursionLimitExceeded(_)
            | Error::Io(_)
    )
}

/// Whether rebuilding the table may fix a failed load of `entry`.
fn is_repairable(err: &Error, entry: &XRefEntry) -> bool {
    matches!(entry.kind, XRefEntryKind::Offset(_))
        && !is_fatal(err)
        && !matches!(
            err,
            Error::Encryption(_) | Error::UnsupportedEncryption(_) | Error::UnsupportedFilter(_)
        )
}
