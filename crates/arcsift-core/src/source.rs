//! Seekable byte source owned by an open session.

use crate::ArchiveError;
use crate::Result;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

/// The bytes of one archive.
///
/// Plain archives are read straight from the file. Compressed tar streams are
/// inflated once at open and replace the file source with an in-memory one,
/// so every parser and reader sees a seekable, length-known source.
#[derive(Debug)]
pub enum ByteSource {
    /// Buffered file handle with its length at open time.
    File {
        /// Buffered reader over the file.
        reader: BufReader<File>,
        /// File length in bytes.
        len: u64,
    },
    /// Bytes held in memory.
    Memory(Cursor<Vec<u8>>),
}

impl ByteSource {
    /// Opens a file source.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::File {
            reader: BufReader::new(file),
            len,
        })
    }

    /// Wraps an in-memory buffer.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::Memory(Cursor::new(bytes))
    }

    /// Total source length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::File { len, .. } => *len,
            Self::Memory(cursor) => cursor.get_ref().len() as u64,
        }
    }

    /// Returns `true` for a zero-length source.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails with `TruncatedArchive` unless `offset..offset + length` lies
    /// inside the source.
    pub fn check_span(&self, offset: u64, length: u64) -> Result<()> {
        let source_len = self.len();
        match offset.checked_add(length) {
            Some(end) if end <= source_len => Ok(()),
            _ => Err(ArchiveError::TruncatedArchive {
                offset,
                length,
                source_len,
            }),
        }
    }

    /// Reads exactly `length` bytes starting at `offset`.
    ///
    /// The span is bounds-checked before any allocation, so a hostile length
    /// field cannot make this allocate more than the source holds.
    pub fn read_span(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.check_span(offset, length)?;
        let size = usize::try_from(length).map_err(|_| ArchiveError::TruncatedArchive {
            offset,
            length,
            source_len: self.len(),
        })?;

        self.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size];
        self.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ArchiveError::TruncatedArchive {
                offset,
                length,
                source_len: self.len(),
            },
            _ => ArchiveError::Io(e),
        })?;
        Ok(buf)
    }

    /// Reads up to `max` bytes from the start, fewer if the source is shorter.
    pub fn read_prefix(&mut self, max: usize) -> Result<Vec<u8>> {
        self.rewind()?;
        let mut prefix = Vec::with_capacity(max);
        (&mut *self).take(max as u64).read_to_end(&mut prefix)?;
        self.rewind()?;
        Ok(prefix)
    }

    /// Reads the last `max` bytes (or the whole source if shorter).
    ///
    /// Returns the tail and its absolute offset.
    pub fn read_tail(&mut self, max: u64) -> Result<(u64, Vec<u8>)> {
        let len = self.len();
        let start = len.saturating_sub(max);
        let tail = self.read_span(start, len - start)?;
        Ok((start, tail))
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::File { reader, .. } => reader.read(buf),
            Self::Memory(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Self::File { reader, .. } => reader.seek(pos),
            Self::Memory(cursor) => cursor.seek(pos),
        }
    }
}
