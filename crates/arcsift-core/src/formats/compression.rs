//! Outer compression codecs wrapped around tar streams.
//!
//! # Supported Codecs
//!
//! - **Gzip** (.tar.gz, .tgz)
//! - **Bzip2** (.tar.bz2, .tbz2)
//! - **Xz** (.tar.xz, .txz)
//! - **Zstd** (.tar.zst, .tzst)

use std::io::Read;

use crate::ArchiveError;
use crate::QuotaResource;
use crate::Result;

/// Compression codec applied to a whole tar stream.
///
/// # Examples
///
/// ```
/// use arcsift_core::formats::compression::CompressionCodec;
///
/// assert_eq!(CompressionCodec::Gzip.name(), "gzip");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionCodec {
    /// Gzip (deflate with a gzip member header). Concatenated members are
    /// decoded as one stream.
    Gzip,

    /// Bzip2 (Burrows-Wheeler).
    Bzip2,

    /// XZ container (LZMA2).
    Xz,

    /// Zstandard.
    Zstd,
}

impl CompressionCodec {
    /// Returns a human-readable name for this codec.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    /// Wraps `reader` in the matching streaming decoder.
    pub fn decoder<'a, R: Read + 'a>(self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            Self::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
            Self::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }

    /// Inflates the whole stream into memory, failing once more than `limit`
    /// bytes come out.
    ///
    /// # Errors
    ///
    /// - `ArchiveError::QuotaExceeded` when the output exceeds `limit`
    /// - `ArchiveError::CorruptArchive` when the codec rejects the input,
    ///   including input that ends early
    pub fn inflate_bounded<R: Read>(self, reader: R, limit: u64) -> Result<Vec<u8>> {
        let decoder = self.decoder(reader)?;
        let mut inflated = Vec::new();
        decoder
            .take(limit.saturating_add(1))
            .read_to_end(&mut inflated)
            .map_err(|e| ArchiveError::corrupt(format!("{} stream: {e}", self.name())))?;

        let produced = inflated.len() as u64;
        if produced > limit {
            return Err(ArchiveError::QuotaExceeded {
                resource: QuotaResource::TotalSize {
                    current: produced,
                    max: limit,
                },
            });
        }
        Ok(inflated)
    }
}
