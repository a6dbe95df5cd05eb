//! Low-level binary encoding primitives for circle transport.
//!
//! Everything a circle puts on the wire is built from four tagged,
//! length-prefixed element kinds:
//!
//! | Element      | Tag    | Contents                          |
//! |--------------|--------|-----------------------------------|
//! | SEQUENCE     | `0x30` | concatenated child elements       |
//! | INTEGER      | `0x02` | exactly 8 bytes, big-endian `u64` |
//! | UTF8 STRING  | `0x0c` | UTF-8 bytes                       |
//! | OCTET STRING | `0x04` | raw bytes                         |
//!
//! Each element is `tag (1 byte) ‖ length (4 bytes, big-endian u32) ‖
//! contents`. Fixed-width integers and length fields make the encoding
//! of a given value byte-identical across runs, which the signature
//! scheme and round-trip tests rely on.
//!
//! [`Reader`] enforces exact consumption: a sequence whose declared
//! length does not match the bytes actually read is malformed, as is
//! trailing data after the outermost element.

use thiserror::Error;

/// Tag byte for a sequence of elements.
pub const TAG_SEQUENCE: u8 = 0x30;
/// Tag byte for an unsigned 64-bit integer.
pub const TAG_INTEGER: u8 = 0x02;
/// Tag byte for a UTF-8 string.
pub const TAG_UTF8_STRING: u8 = 0x0c;
/// Tag byte for a raw octet string.
pub const TAG_OCTET_STRING: u8 = 0x04;

/// Bytes occupied by a tag plus its length prefix.
const HEADER_LEN: usize = 5;

/// Errors from the wire primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WireError {
    /// Input ended before the declared element length.
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the current element required.
        needed: usize,
        /// Bytes remaining in the input.
        available: usize,
    },

    /// Element carries a different tag than the decoder expected.
    #[error("Unexpected tag: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedTag {
        /// Tag the decoder was positioned to read.
        expected: u8,
        /// Tag actually present.
        actual: u8,
    },

    /// Bytes remain after the element that should have ended the input.
    #[error("{0} trailing bytes after final element")]
    TrailingBytes(usize),

    /// Integer contents were not exactly 8 bytes.
    #[error("Integer element must be 8 bytes, got {0}")]
    BadInteger(usize),

    /// String contents were not valid UTF-8.
    #[error("String element is not valid UTF-8")]
    BadString,

    /// Encoded element would exceed the 4-byte length prefix.
    #[error("Element too large for length prefix")]
    Oversized,

    /// Element contents are well-formed but semantically unusable.
    #[error("Invalid element contents: {0}")]
    BadContents(String),
}

/// Result type alias for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Append-only builder for wire elements.
///
/// # Example
///
/// ```
/// use accord_core::wire::{Encoder, Reader};
///
/// let mut enc = Encoder::new();
/// enc.sequence(|e| {
///     e.uint(1);
///     e.string("circle");
/// });
/// let bytes = enc.finish().unwrap();
///
/// let mut reader = Reader::new(&bytes);
/// let mut seq = reader.sequence().unwrap();
/// assert_eq!(seq.uint().unwrap(), 1);
/// assert_eq!(seq.string().unwrap(), "circle");
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
    oversized: bool,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            oversized: false,
        }
    }

    fn header(&mut self, tag: u8, len: usize) {
        match u32::try_from(len) {
            Ok(len32) => {
                self.buf.push(tag);
                self.buf.extend_from_slice(&len32.to_be_bytes());
            }
            Err(_) => self.oversized = true,
        }
    }

    /// Appends an unsigned 64-bit integer element.
    pub fn uint(&mut self, value: u64) -> &mut Self {
        self.header(TAG_INTEGER, 8);
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Appends a UTF-8 string element.
    pub fn string(&mut self, value: &str) -> &mut Self {
        self.header(TAG_UTF8_STRING, value.len());
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    /// Appends an octet-string element.
    pub fn octets(&mut self, value: &[u8]) -> &mut Self {
        self.header(TAG_OCTET_STRING, value.len());
        self.buf.extend_from_slice(value);
        self
    }

    /// Appends a sequence whose contents are written by `fill`.
    pub fn sequence(&mut self, fill: impl FnOnce(&mut Self)) -> &mut Self {
        let mut inner = Self::new();
        fill(&mut inner);
        self.oversized |= inner.oversized;
        self.header(TAG_SEQUENCE, inner.buf.len());
        self.buf.extend_from_slice(&inner.buf);
        self
    }

    /// Consumes the encoder and returns the encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Oversized`] if any element's contents
    /// exceeded what the 4-byte length prefix can describe.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.oversized {
            return Err(WireError::Oversized);
        }
        Ok(self.buf)
    }
}

/// Cursor over encoded wire bytes.
///
/// Reads elements in order; every read validates the tag and bounds.
/// Call [`Reader::finish`] (or check [`Reader::is_at_end`]) to reject
/// trailing bytes.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader over `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads a header with the expected tag, returning the content length.
    fn read_header(&mut self, expected: u8) -> Result<usize> {
        let available = self.data.len() - self.pos;
        if available < HEADER_LEN {
            return Err(WireError::Truncated {
                needed: HEADER_LEN,
                available,
            });
        }
        let actual = self.data[self.pos];
        if actual != expected {
            return Err(WireError::UnexpectedTag { expected, actual });
        }
        let len_bytes: [u8; 4] = self.data[self.pos + 1..self.pos + HEADER_LEN]
            .try_into()
            .expect("slice length is fixed");
        let len = u32::from_be_bytes(len_bytes) as usize;
        let content_available = available - HEADER_LEN;
        if len > content_available {
            return Err(WireError::Truncated {
                needed: len,
                available: content_available,
            });
        }
        self.pos += HEADER_LEN;
        Ok(len)
    }

    fn take(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    /// Reads an unsigned 64-bit integer element.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] on tag mismatch, truncation, or an
    /// integer that is not exactly 8 bytes.
    pub fn uint(&mut self) -> Result<u64> {
        let len = self.read_header(TAG_INTEGER)?;
        if len != 8 {
            return Err(WireError::BadInteger(len));
        }
        let bytes: [u8; 8] = self.take(8).try_into().expect("length checked");
        Ok(u64::from_be_bytes(bytes))
    }

    /// Reads a UTF-8 string element.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] on tag mismatch, truncation, or invalid
    /// UTF-8.
    pub fn string(&mut self) -> Result<String> {
        let len = self.read_header(TAG_UTF8_STRING)?;
        let bytes = self.take(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::BadString)
    }

    /// Reads an octet-string element.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] on tag mismatch or truncation.
    pub fn octets(&mut self) -> Result<&'a [u8]> {
        let len = self.read_header(TAG_OCTET_STRING)?;
        Ok(self.take(len))
    }

    /// Opens a sequence element, returning a reader over its contents.
    ///
    /// The returned reader sees exactly the sequence's declared bytes;
    /// the parent reader advances past the whole sequence.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] on tag mismatch or truncation.
    pub fn sequence(&mut self) -> Result<Reader<'a>> {
        let len = self.read_header(TAG_SEQUENCE)?;
        Ok(Reader::new(self.take(len)))
    }

    /// Returns whether all bytes have been consumed.
    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Asserts that the input was fully consumed.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::TrailingBytes`] if unread bytes remain.
    pub fn finish(&self) -> Result<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes(self.remaining()))
        }
    }
}
