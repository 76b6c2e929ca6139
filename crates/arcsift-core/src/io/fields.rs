//! Little-endian field reader over a header slice.

use std::io::Cursor;
use std::io::Read;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;

use crate::ArchiveError;
use crate::Result;

/// Reads fixed and variable-width fields from an in-memory header.
///
/// Every read is bounded by the slice; running off the end is reported as
/// `CorruptArchive` naming the structure being decoded, never as a panic or
/// a bare I/O error.
pub struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
    structure: &'static str,
}

impl<'a> FieldReader<'a> {
    /// Starts reading `bytes`; `structure` names the record in error messages.
    #[must_use]
    pub const fn new(bytes: &'a [u8], structure: &'static str) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            structure,
        }
    }

    fn short(&self) -> ArchiveError {
        ArchiveError::corrupt(format!(
            "{} ends unexpectedly at byte {}",
            self.structure,
            self.cursor.position()
        ))
    }

    /// Reads one byte.
    pub fn u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| self.short())
    }

    /// Reads a little-endian `u16`.
    pub fn u16(&mut self) -> Result<u16> {
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| self.short())
    }

    /// Reads a little-endian `u32`.
    pub fn u32(&mut self) -> Result<u32> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| self.short())
    }

    /// Reads a little-endian `u64`.
    pub fn u64(&mut self) -> Result<u64> {
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| self.short())
    }

    /// Reads a RAR5 variable-length integer (7 bits per byte, at most 10
    /// bytes, high bit set on every byte but the last).
    pub fn vint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for shift in (0..70).step_by(7) {
            let byte = self.u8()?;
            let bits = u64::from(byte & 0x7F);
            if shift == 63 && bits > 1 {
                return Err(ArchiveError::corrupt(format!(
                    "{} holds an oversized variable-length integer",
                    self.structure
                )));
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ArchiveError::corrupt(format!(
            "{} holds an unterminated variable-length integer",
            self.structure
        )))
    }

    /// Borrows the next `len` bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position();
        let end = start.checked_add(len).ok_or_else(|| self.short())?;
        let data: &'a [u8] = *self.cursor.get_ref();
        let slice = data.get(start..end).ok_or_else(|| self.short())?;
        self.cursor.set_position(end as u64);
        Ok(slice)
    }

    /// Borrows the next `len` bytes where `len` came from a header field.
    pub fn bytes_u64(&mut self, len: u64) -> Result<&'a [u8]> {
        let len = usize::try_from(len).map_err(|_| self.short())?;
        self.bytes(len)
    }

    /// Skips `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(|_| ())
    }

    /// Reads into a fixed-size array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.cursor.read_exact(&mut out).map_err(|_| self.short())?;
        Ok(out)
    }

    /// Current offset inside the slice.
    #[must_use]
    pub fn position(&self) -> usize {
        usize::try_from(self.cursor.position()).unwrap_or(usize::MAX)
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }
}
