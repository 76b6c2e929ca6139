//! Error conversion utilities for CLI.
//!
//! Converts arcsift-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use arcsift_core::ArchiveError;
use arcsift_core::QuotaResource;
use std::path::Path;

/// Converts `ArchiveError` to a user-friendly anyhow error with context
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn convert_archive_error(err: ArchiveError, archive: &Path) -> anyhow::Error {
    match err {
        ArchiveError::UnsupportedFormat => {
            anyhow!(
                "Archive format not supported: {}\n\
                 HINT: Supported formats: 7z, rar, zip, tar, tar.gz, tar.bz2, tar.xz, tar.zst",
                archive.display()
            )
        }
        ArchiveError::PasswordRequired { entry } => {
            anyhow!(
                "Entry '{}' in '{}' is encrypted and no password was given\n\
                 HINT: Pass --password, or run in a terminal to be prompted.",
                entry,
                archive.display()
            )
        }
        ArchiveError::IncorrectPassword { entry } => {
            anyhow!(
                "Incorrect password for '{}' in '{}'",
                entry,
                archive.display()
            )
        }
        ArchiveError::IndexOutOfRange { index, len } => {
            anyhow!(
                "Entry index {} is out of range for '{}' ({} entries)\n\
                 HINT: Run `arcsift list` to see valid indices.",
                index,
                archive.display(),
                len
            )
        }
        ArchiveError::CorruptArchive(_) => {
            anyhow!(
                "Corrupt archive '{}': {}\n\
                 HINT: The archive may be damaged or incompletely downloaded.",
                archive.display(),
                err.context().unwrap_or("damaged structure")
            )
        }
        ArchiveError::TruncatedArchive {
            offset,
            length,
            source_len,
        } => {
            anyhow!(
                "Truncated archive '{}': {} bytes at offset {} exceed the {}-byte file\n\
                 HINT: The archive may be incompletely downloaded.",
                archive.display(),
                length,
                offset,
                source_len
            )
        }
        ArchiveError::UnsupportedCompression { .. } => {
            anyhow!(
                "Compression method {} in '{}' is not supported",
                err.context().unwrap_or("unknown"),
                archive.display()
            )
        }
        ArchiveError::UnsupportedFeature(_) => {
            anyhow!(
                "Unsupported feature in '{}': {}",
                archive.display(),
                err.context().unwrap_or("unknown")
            )
        }
        ArchiveError::PathTraversal { path } => {
            anyhow!(
                "Security violation: Archive '{}' attempted path traversal with '{}'\n\
                 HINT: This archive may be malicious. Do not extract from untrusted sources.",
                archive.display(),
                path.display()
            )
        }
        ArchiveError::ZipBomb {
            compressed,
            uncompressed,
            ratio,
        } => {
            anyhow!(
                "Security violation: Entry in '{}' appears to be a zip bomb\n\
                 Compression ratio: {}:1 ({}KB → {}MB)\n\
                 HINT: Use --max-compression-ratio to allow higher ratios if legitimate.",
                archive.display(),
                ratio as u64,
                compressed / 1024,
                uncompressed / 1024 / 1024
            )
        }
        ArchiveError::QuotaExceeded { .. } => {
            let hint = match err.quota_resource() {
                Some(QuotaResource::EntryCount { .. }) => "Use --max-entries to raise the limit.",
                Some(QuotaResource::EntrySize { .. }) => {
                    "Use --max-entry-size to raise the limit."
                }
                _ => "The archive exceeds a fixed safety limit.",
            };
            anyhow!(
                "Limit exceeded for '{}': {}\n\
                 HINT: {}",
                archive.display(),
                err,
                hint
            )
        }
        ArchiveError::Io(io_err) => {
            anyhow!(
                "I/O error while processing '{}': {}",
                archive.display(),
                io_err
            )
        }
        _ => anyhow::Error::from(err)
            .context(format!("Error processing archive '{}'", archive.display())),
    }
}

/// Adds archive context to a core result
pub fn add_archive_context<T>(
    result: Result<T, ArchiveError>,
    archive: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_archive_error(e, archive))
}
