//! Error types for archive inspection and extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ArchiveError`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Represents a specific limit that was exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaResource {
    /// The directory declares more entries than allowed.
    EntryCount {
        /// Declared entry count.
        declared: u64,
        /// Maximum allowed entry count.
        max: usize,
    },
    /// A single decoded entry is larger than allowed.
    EntrySize {
        /// Entry size in bytes.
        size: u64,
        /// Maximum allowed entry size in bytes.
        max: u64,
    },
    /// The inflated tar stream is larger than allowed.
    TotalSize {
        /// Bytes produced before the limit tripped.
        current: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },
    /// Integer overflow detected while adding sizes or offsets.
    IntegerOverflow,
}

impl std::fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryCount { declared, max } => {
                write!(f, "quota exceeded: entry count ({declared} > {max})")
            }
            Self::EntrySize { size, max } => {
                write!(f, "quota exceeded: entry size ({size} > {max})")
            }
            Self::TotalSize { current, max } => {
                write!(f, "quota exceeded: inflated size ({current} > {max})")
            }
            Self::IntegerOverflow => {
                write!(f, "quota exceeded: integer overflow in size arithmetic")
            }
        }
    }
}

/// Errors produced while detecting, listing or extracting archives.
///
/// Every public operation either fully succeeds or fails with exactly one of
/// these kinds. [`ArchiveError::PasswordRequired`] is the only kind a caller
/// is expected to recover from (prompt for a password, then retry).
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O operation on the source or destination failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No magic signature (or allowed extension) matched.
    #[error("unsupported archive format")]
    UnsupportedFormat,

    /// Structural or checksum validation failed.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// The format is recognized but uses a feature that is not implemented.
    #[error("unsupported archive feature: {0}")]
    UnsupportedFeature(String),

    /// The entry uses a compression method that is not implemented.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompression {
        /// Human-readable method description.
        method: String,
    },

    /// A declared region extends past the end of the source.
    #[error(
        "truncated archive: region at offset {offset} with length {length} exceeds source length {source_len}"
    )]
    TruncatedArchive {
        /// Region start.
        offset: u64,
        /// Region length.
        length: u64,
        /// Actual source length.
        source_len: u64,
    },

    /// The entry is encrypted and no password has been set.
    #[error("password required for entry: {entry}")]
    PasswordRequired {
        /// Name of the encrypted entry (or the archive for encrypted headers).
        entry: String,
    },

    /// A password is set but verification or decoding failed.
    #[error("incorrect password for entry: {entry}")]
    IncorrectPassword {
        /// Name of the entry that failed to decrypt.
        entry: String,
    },

    /// The requested entry index does not exist.
    #[error("entry index {index} out of range (archive has {len} entries)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of entries in the archive.
        len: usize,
    },

    /// The session has not been opened or has been closed.
    #[error("archive session is not open")]
    SessionNotOpen,

    /// Entry name would escape the destination directory.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry path.
        path: PathBuf,
    },

    /// Entry name cannot be mapped to a file name.
    #[error("unsafe entry name: {name:?}")]
    UnsafeEntryName {
        /// The raw entry name.
        name: String,
    },

    /// A configured limit was exceeded.
    #[error("{resource}")]
    QuotaExceeded {
        /// Description of the exceeded resource.
        resource: QuotaResource,
    },

    /// Declared compression ratio is beyond the configured maximum.
    #[error(
        "potential decompression bomb: compressed={compressed} bytes, uncompressed={uncompressed} bytes (ratio: {ratio:.2})"
    )]
    ZipBomb {
        /// Compressed size in bytes.
        compressed: u64,
        /// Uncompressed size in bytes.
        uncompressed: u64,
        /// Compression ratio.
        ratio: f64,
    },
}

impl ArchiveError {
    /// Returns `true` if this error asks the caller for a password.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsift_core::ArchiveError;
    ///
    /// let err = ArchiveError::PasswordRequired {
    ///     entry: "secret.txt".into(),
    /// };
    /// assert!(err.is_password_required());
    /// assert!(!ArchiveError::UnsupportedFormat.is_password_required());
    /// ```
    #[must_use]
    pub const fn is_password_required(&self) -> bool {
        matches!(self, Self::PasswordRequired { .. })
    }

    /// Returns `true` if this error is about a missing or wrong password.
    #[must_use]
    pub const fn is_password_error(&self) -> bool {
        matches!(
            self,
            Self::PasswordRequired { .. } | Self::IncorrectPassword { .. }
        )
    }

    /// Returns `true` if the input itself is malformed or cut short.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptArchive(_) | Self::TruncatedArchive { .. }
        )
    }

    /// Returns a context string for this error, if available.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsift_core::ArchiveError;
    ///
    /// let err = ArchiveError::CorruptArchive("bad header".to_string());
    /// assert_eq!(err.context(), Some("bad header"));
    ///
    /// let err = ArchiveError::UnsupportedFormat;
    /// assert_eq!(err.context(), None);
    /// ```
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::CorruptArchive(msg) | Self::UnsupportedFeature(msg) => Some(msg),
            Self::UnsupportedCompression { method } => Some(method),
            _ => None,
        }
    }

    /// Returns the quota resource that was exceeded, if applicable.
    #[must_use]
    pub const fn quota_resource(&self) -> Option<&QuotaResource> {
        match self {
            Self::QuotaExceeded { resource } => Some(resource),
            _ => None,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptArchive(msg.into())
    }
}
