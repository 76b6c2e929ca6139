//! Declared-size checks run before an entry is decoded.

use crate::ArchiveError;
use crate::QuotaResource;
use crate::Result;
use crate::SecurityConfig;

/// Validates compression ratio to detect potential decompression bombs.
///
/// Entries with no recorded compressed size (solid 7z streams) are skipped;
/// their output is still capped by `max_entry_size` while decoding.
///
/// # Errors
///
/// Returns `ArchiveError::ZipBomb` if the ratio exceeds the configured maximum.
pub fn validate_compression_ratio(
    compressed_size: u64,
    uncompressed_size: u64,
    config: &SecurityConfig,
) -> Result<()> {
    if compressed_size == 0 {
        return Ok(());
    }

    let ratio = uncompressed_size as f64 / compressed_size as f64;

    if ratio > config.max_compression_ratio {
        return Err(ArchiveError::ZipBomb {
            compressed: compressed_size,
            uncompressed: uncompressed_size,
            ratio,
        });
    }

    Ok(())
}

/// Rejects an entry whose declared decoded size is above `max_entry_size`.
///
/// # Errors
///
/// Returns `ArchiveError::QuotaExceeded` with [`QuotaResource::EntrySize`].
pub fn check_declared_size(uncompressed_size: u64, config: &SecurityConfig) -> Result<()> {
    if uncompressed_size > config.max_entry_size {
        return Err(ArchiveError::QuotaExceeded {
            resource: QuotaResource::EntrySize {
                size: uncompressed_size,
                max: config.max_entry_size,
            },
        });
    }
    Ok(())
}
