//! Entry descriptors produced by directory parsing.

use std::fmt;

/// What kind of filesystem object an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file with content.
    File,
    /// Directory marker.
    Directory,
    /// Symbolic link. Listed, but never materialized on disk.
    Symlink,
    /// Hard link to an earlier entry. Listed, but never materialized on disk.
    Hardlink,
}

/// Compression method recorded for an entry.
///
/// The set is wider than what the decoder supports; an entry with an
/// undecodable method still lists, and only extraction fails with
/// [`ArchiveError::UnsupportedCompression`](crate::ArchiveError::UnsupportedCompression).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// No compression.
    Stored,
    /// DEFLATE (RFC 1951).
    Deflate,
    /// Enhanced deflate (PKWARE method 9).
    Deflate64,
    /// bzip2.
    Bzip2,
    /// LZMA.
    Lzma,
    /// LZMA2 (7z default).
    Lzma2,
    /// PPMd.
    Ppmd,
    /// Zstandard.
    Zstd,
    /// XZ container.
    Xz,
    /// RAR's native LZ algorithm at the given level (1 fastest, 5 best).
    Rar {
        /// Compression level from the header.
        level: u8,
    },
    /// Method identifier the parser could not map.
    Unknown(String),
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored => f.write_str("stored"),
            Self::Deflate => f.write_str("deflate"),
            Self::Deflate64 => f.write_str("deflate64"),
            Self::Bzip2 => f.write_str("bzip2"),
            Self::Lzma => f.write_str("lzma"),
            Self::Lzma2 => f.write_str("lzma2"),
            Self::Ppmd => f.write_str("ppmd"),
            Self::Zstd => f.write_str("zstd"),
            Self::Xz => f.write_str("xz"),
            Self::Rar { level } => write!(f, "rar-m{level}"),
            Self::Unknown(id) => f.write_str(id),
        }
    }
}

/// Key size of a WinZip AES encrypted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AesStrength {
    /// 128-bit key, 8-byte salt.
    Aes128,
    /// 192-bit key, 12-byte salt.
    Aes192,
    /// 256-bit key, 16-byte salt.
    Aes256,
}

impl AesStrength {
    /// Maps the strength byte of the 0x9901 extra field.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Aes128),
            2 => Some(Self::Aes192),
            3 => Some(Self::Aes256),
            _ => None,
        }
    }

    /// Key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Salt length in bytes.
    #[must_use]
    pub const fn salt_len(self) -> usize {
        self.key_len() / 2
    }

    /// Key length in bits.
    #[must_use]
    pub const fn bits(self) -> usize {
        self.key_len() * 8
    }
}

/// Encryption scheme recorded for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encryption {
    /// Plain entry.
    None,
    /// Traditional PKWARE stream cipher.
    ZipCrypto {
        /// Expected last byte of the decrypted 12-byte header.
        check_byte: u8,
    },
    /// WinZip AES (AE-1 or AE-2).
    WinZipAes {
        /// Key size.
        strength: AesStrength,
        /// 1 for AE-1 (CRC present), 2 for AE-2 (no CRC).
        vendor_version: u16,
    },
    /// 7z AES-256 + SHA-256 coder.
    SevenZAes,
    /// RAR file-level encryption.
    Rar,
}

impl Encryption {
    /// Returns `true` for every scheme except [`Encryption::None`].
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::ZipCrypto { .. } => f.write_str("zipcrypto"),
            Self::WinZipAes { strength, .. } => write!(f, "aes-{}", strength.bits()),
            Self::SevenZAes => f.write_str("7z-aes"),
            Self::Rar => f.write_str("rar"),
        }
    }
}

/// Where the Entry Reader finds an entry's raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLocation {
    /// Contiguous region of the byte source.
    Span {
        /// Absolute offset of the first data byte.
        offset: u64,
        /// Number of raw (compressed, possibly encrypted) bytes.
        length: u64,
    },
    /// Stream inside a 7z block; `None` for entries without content.
    Block {
        /// Block index inside the archive.
        block: Option<usize>,
    },
    /// The data cannot be read from this source.
    Unavailable {
        /// Why the data is out of reach.
        reason: &'static str,
    },
}

/// One logical entry of an archive directory.
///
/// Descriptors are immutable; the session hands out shared references to
/// them. `name` is the path exactly as stored in the archive and has not been
/// sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) kind: EntryKind,
    pub(crate) uncompressed_size: u64,
    pub(crate) compressed_size: u64,
    pub(crate) method: CompressionMethod,
    pub(crate) encryption: Encryption,
    pub(crate) crc32: Option<u32>,
    pub(crate) location: EntryLocation,
}

impl EntryDescriptor {
    /// Zero-based position in the directory.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Raw entry path as stored in the archive.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry kind.
    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Returns `true` for directory markers.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    /// Declared decoded size in bytes.
    #[must_use]
    pub const fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Declared stored size in bytes.
    ///
    /// Zero when the format does not record it per entry (solid 7z blocks).
    #[must_use]
    pub const fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Compression method.
    #[must_use]
    pub const fn method(&self) -> &CompressionMethod {
        &self.method
    }

    /// Encryption scheme.
    #[must_use]
    pub const fn encryption(&self) -> Encryption {
        self.encryption
    }

    /// Returns `true` if extraction needs a password.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.encryption.is_encrypted()
    }

    /// Declared CRC-32 of the decoded content, when the format stores one.
    #[must_use]
    pub const fn crc32(&self) -> Option<u32> {
        self.crc32
    }

    /// Location of the raw bytes.
    #[must_use]
    pub const fn location(&self) -> &EntryLocation {
        &self.location
    }
}
