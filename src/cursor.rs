//! Bounds-checked sequential reads over an in-memory byte buffer.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{ParseError, ParseErrorKind};

/// SMF caps a variable-length quantity at 4 bytes (28 significant bits).
pub const MAX_VLQ_BYTES: usize = 4;

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Offset of `buf[0]` within the whole input, so errors raised by a
    /// sub-cursor still point into the file.
    base: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, base: 0 }
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(ParseError::new(
                self.position(),
                ParseErrorKind::UnexpectedEndOfBuffer { needed: n, remaining },
            ));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn peek_u8(&self) -> Result<u8, ParseError> {
        self.buf.get(self.pos).copied().ok_or_else(|| {
            ParseError::new(
                self.position(),
                ParseErrorKind::UnexpectedEndOfBuffer { needed: 1, remaining: 0 },
            )
        })
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, ParseError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u24_be(&mut self) -> Result<u32, ParseError> {
        Ok(BigEndian::read_u24(self.take(3)?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, ParseError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        self.take(n)
    }

    /// Four-byte chunk tag such as `MThd`.
    pub fn read_tag(&mut self) -> Result<[u8; 4], ParseError> {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(self.take(4)?);
        Ok(tag)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        self.take(n).map(|_| ())
    }

    /// Reads a MIDI variable-length quantity: 7 bits per byte, most
    /// significant group first, high bit set on every byte but the last.
    pub fn read_vlq(&mut self) -> Result<u32, ParseError> {
        let start = self.position();
        let malformed = || ParseError::new(start, ParseErrorKind::MalformedVlq);

        let mut value = 0u32;
        for i in 0..MAX_VLQ_BYTES {
            // Running out before the first byte is a plain short read.
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(e) if i == 0 => return Err(e),
                Err(_) => return Err(malformed()),
            };
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(malformed())
    }

    /// Splits off the next `n` bytes as their own cursor and advances past them.
    pub fn sub_cursor(&mut self, n: usize) -> Result<ByteCursor<'a>, ParseError> {
        let base = self.position();
        let buf = self.take(n)?;
        Ok(ByteCursor { buf, pos: 0, base })
    }
}
