//! Per-entry decompression.

use std::io::Read;

use log::trace;

use crate::ArchiveError;
use crate::QuotaResource;
use crate::Result;
use crate::types::CompressionMethod;

/// Returns `true` if [`decompress`] can decode `method`.
pub(crate) const fn is_supported(method: &CompressionMethod) -> bool {
    matches!(
        method,
        CompressionMethod::Stored
            | CompressionMethod::Deflate
            | CompressionMethod::Bzip2
            | CompressionMethod::Zstd
            | CompressionMethod::Xz
    )
}

/// Decodes `data` with `method`, producing at most `limit` bytes.
///
/// # Errors
///
/// - `UnsupportedCompression` for methods without a decoder
/// - `QuotaExceeded` when the output would exceed `limit`
/// - `CorruptArchive` when the codec rejects the input
pub(crate) fn decompress(method: &CompressionMethod, data: Vec<u8>, limit: u64) -> Result<Vec<u8>> {
    trace!("decompressing {} bytes with {method}", data.len());

    let decoder: Box<dyn Read + '_> = match method {
        CompressionMethod::Stored => {
            check_limit(data.len() as u64, limit)?;
            return Ok(data);
        }
        CompressionMethod::Deflate => Box::new(flate2::read::DeflateDecoder::new(&data[..])),
        CompressionMethod::Bzip2 => Box::new(bzip2::read::BzDecoder::new(&data[..])),
        CompressionMethod::Zstd => Box::new(
            zstd::stream::read::Decoder::new(&data[..])
                .map_err(|e| ArchiveError::corrupt(format!("zstd stream: {e}")))?,
        ),
        CompressionMethod::Xz => Box::new(xz2::read::XzDecoder::new(&data[..])),
        other => {
            return Err(ArchiveError::UnsupportedCompression {
                method: other.to_string(),
            });
        }
    };

    let mut out = Vec::new();
    decoder
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| ArchiveError::corrupt(format!("{method} stream: {e}")))?;
    check_limit(out.len() as u64, limit)?;
    Ok(out)
}

fn check_limit(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(ArchiveError::QuotaExceeded {
            resource: QuotaResource::EntrySize { size, max: limit },
        });
    }
    Ok(())
}
