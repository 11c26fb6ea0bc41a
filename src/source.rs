//! Positioned reads over a seekable byte stream.
//!
//! Every read goes through a [`PositionGuard`], which restores the cursor
//! when dropped. Nested lookups (a stream length that lives in another
//! object, an object stream container) can therefore seek freely without
//! disturbing the caller, including on early `?` returns.

use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

/// Saves the cursor of `R` on creation and seeks back to it on drop.
pub struct PositionGuard<'a, R: Seek> {
    reader: &'a mut R,
    saved: u64,
}

impl<'a, R: Seek> PositionGuard<'a, R> {
    /// Remember the current position of `reader`.
    pub fn new(reader: &'a mut R) -> Result<Self> {
        let saved = reader.stream_position()?;
        Ok(Self { reader, saved })
    }
}

impl<R: Seek> Deref for PositionGuard<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.reader
    }
}

impl<R: Seek> DerefMut for PositionGuard<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.reader
    }
}

impl<R: Seek> Drop for PositionGuard<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.reader.seek(SeekFrom::Start(self.saved)) {
            log::error!("Failed to restore stream position {}: {}", self.saved, e);
        }
    }
}

/// A seekable source addressed by logical offsets.
///
/// When a file has junk in front of its `%PDF-` header, every offset in the
/// file is relative to the header; `base` holds the header position.
pub struct ByteSource<R> {
    reader: R,
    physical_len: u64,
    base: u64,
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wrap `reader`, measuring its length.
    pub fn new(mut reader: R) -> Result<Self> {
        let physical_len = {
            let mut guard = PositionGuard::new(&mut reader)?;
            guard.seek(SeekFrom::End(0))?
        };
        Ok(Self {
            reader,
            physical_len,
            base: 0,
        })
    }

    /// Logical length: bytes from the base to the end of the stream.
    pub fn len(&self) -> u64 {
        self.physical_len - self.base
    }

    /// True when the source has no bytes past its base.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical position that logical offset 0 maps to.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Make `base` logical offset 0.
    pub fn set_base(&mut self, base: u64) {
        self.base = base.min(self.physical_len);
    }

    /// Read up to `len` bytes at logical `offset`; short at end of stream.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset >= self.len() {
            return Ok(Vec::new());
        }
        let available = (self.len() - offset).min(len as u64) as usize;
        let mut buf = vec![0u8; available];

        let mut guard = PositionGuard::new(&mut self.reader)?;
        guard.seek(SeekFrom::Start(self.base + offset))?;
        guard.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read exactly `len` bytes at logical `offset`.
    pub fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let buf = self.read_at(offset, len)?;
        if buf.len() < len {
            return Err(Error::UnexpectedEof);
        }
        Ok(buf)
    }

    /// Read everything from the base to the end.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.read_at(0, self.len() as usize)
    }

    /// Run `parse` over a window starting at `offset`, doubling the window
    /// while the parse reports running out of input and the window has not
    /// yet reached the end of the stream.
    ///
    /// `parse` receives the window bytes and whether they end at EOF.
    pub fn with_window<T>(
        &mut self,
        offset: u64,
        initial: usize,
        mut parse: impl FnMut(&[u8], bool) -> Result<T>,
    ) -> Result<T> {
        let mut size = initial.max(64);
        loop {
            let buf = self.read_at(offset, size)?;
            let at_eof = offset + buf.len() as u64 >= self.len();
            match parse(&buf, at_eof) {
                Err(e) if !at_eof && needs_more_input(&e) => {
                    size = size.saturating_mul(2);
                },
                result => return result,
            }
        }
    }
}

/// Errors that a larger input window may resolve.
pub fn needs_more_input(err: &Error) -> bool {
    matches!(err, Error::UnexpectedEof | Error::TruncatedToken { .. })
}
