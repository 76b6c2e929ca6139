//! Archive format detection.
//!
//! Detection matches a short byte prefix against an ordered table of magic
//! signatures. The file extension is consulted only when no signature
//! matches, and only for formats that may legitimately carry none.

use std::fmt;
use std::path::Path;

use log::debug;

use super::compression::CompressionCodec;
use crate::ArchiveError;
use crate::Result;
use crate::SecurityConfig;
use crate::source::ByteSource;

/// Number of prefix bytes the sniffer needs: the ustar magic ends at 262.
pub const SNIFF_PREFIX_LEN: usize = 262;

/// Offset of the `ustar` magic inside the first tar header.
const USTAR_OFFSET: usize = 257;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// 7z archive.
    SevenZ,
    /// RAR archive (v1.5 to v5).
    Rar,
    /// ZIP archive.
    Zip,
    /// XZ-compressed tar archive.
    TarXz,
    /// Zstd-compressed tar archive.
    TarZst,
    /// Bzip2-compressed tar archive.
    TarBz2,
    /// Gzip-compressed tar archive.
    TarGz,
    /// Tar archive (uncompressed).
    Tar,
}

impl ArchiveFormat {
    /// Short format name, as shown to users.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcsift_core::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::TarGz.name(), "tar.gz");
    /// assert_eq!(ArchiveFormat::SevenZ.name(), "7z");
    /// ```
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SevenZ => "7z",
            Self::Rar => "rar",
            Self::Zip => "zip",
            Self::TarXz => "tar.xz",
            Self::TarZst => "tar.zst",
            Self::TarBz2 => "tar.bz2",
            Self::TarGz => "tar.gz",
            Self::Tar => "tar",
        }
    }

    /// Outer codec wrapped around a tar stream, if any.
    #[must_use]
    pub const fn outer_codec(self) -> Option<CompressionCodec> {
        match self {
            Self::TarGz => Some(CompressionCodec::Gzip),
            Self::TarBz2 => Some(CompressionCodec::Bzip2),
            Self::TarXz => Some(CompressionCodec::Xz),
            Self::TarZst => Some(CompressionCodec::Zstd),
            _ => None,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One signature rule.
struct MagicRule {
    offset: usize,
    magic: &'static [u8],
    format: ArchiveFormat,
}

/// Signatures, most specific first.
///
/// RAR5 precedes RAR4 because the v4 marker is a prefix of the v5 marker.
/// Short codec magics (`BZh`, `1F 8B`) come last so that they cannot shadow
/// the longer container signatures.
const MAGIC_RULES: &[MagicRule] = &[
    MagicRule {
        offset: 0,
        magic: &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C],
        format: ArchiveFormat::SevenZ,
    },
    MagicRule {
        offset: 0,
        magic: b"Rar!\x1A\x07\x01\x00",
        format: ArchiveFormat::Rar,
    },
    MagicRule {
        offset: 0,
        magic: b"Rar!\x1A\x07\x00",
        format: ArchiveFormat::Rar,
    },
    MagicRule {
        offset: 0,
        magic: &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00],
        format: ArchiveFormat::TarXz,
    },
    MagicRule {
        offset: 0,
        magic: b"PK\x03\x04",
        format: ArchiveFormat::Zip,
    },
    MagicRule {
        offset: 0,
        magic: b"PK\x05\x06",
        format: ArchiveFormat::Zip,
    },
    MagicRule {
        offset: 0,
        magic: b"PK\x07\x08",
        format: ArchiveFormat::Zip,
    },
    MagicRule {
        offset: 0,
        magic: &[0x28, 0xB5, 0x2F, 0xFD],
        format: ArchiveFormat::TarZst,
    },
    MagicRule {
        offset: 0,
        magic: b"BZh",
        format: ArchiveFormat::TarBz2,
    },
    MagicRule {
        offset: 0,
        magic: &[0x1F, 0x8B],
        format: ArchiveFormat::TarGz,
    },
    MagicRule {
        offset: USTAR_OFFSET,
        magic: b"ustar",
        format: ArchiveFormat::Tar,
    },
];

/// Detects the format from a byte prefix and an optional file name.
///
/// Only the first [`SNIFF_PREFIX_LEN`] bytes of `prefix` are inspected.
///
/// # Errors
///
/// Returns `ArchiveError::UnsupportedFormat` if no signature matches and the
/// extension fallback does not apply.
///
/// # Examples
///
/// ```
/// use arcsift_core::ArchiveFormat;
/// use arcsift_core::formats::detect::detect;
///
/// let format = detect(b"PK\x03\x04rest-of-archive", None, true)?;
/// assert_eq!(format, ArchiveFormat::Zip);
///
/// assert!(detect(b"just some text", Some("notes.txt"), true).is_err());
/// # Ok::<(), arcsift_core::ArchiveError>(())
/// ```
pub fn detect(
    prefix: &[u8],
    file_name: Option<&str>,
    extension_fallback: bool,
) -> Result<ArchiveFormat> {
    let window = &prefix[..prefix.len().min(SNIFF_PREFIX_LEN)];

    let matched = MAGIC_RULES.iter().find(|rule| {
        window
            .get(rule.offset..rule.offset + rule.magic.len())
            .is_some_and(|bytes| bytes == rule.magic)
    });

    if let Some(rule) = matched {
        return Ok(rule.format);
    }

    if extension_fallback && file_name.is_some_and(has_tar_extension) {
        return Ok(ArchiveFormat::Tar);
    }

    Err(ArchiveError::UnsupportedFormat)
}

/// Detects the format of an already opened source.
pub(crate) fn detect_source(
    source: &mut ByteSource,
    file_name: Option<&str>,
    config: &SecurityConfig,
) -> Result<ArchiveFormat> {
    let prefix = source.read_prefix(SNIFF_PREFIX_LEN)?;
    let format = detect(&prefix, file_name, config.extension_fallback)?;
    debug!(
        "detected {} from {} prefix bytes",
        format.name(),
        prefix.len()
    );
    Ok(format)
}

/// Detects the format of the file at `path`.
///
/// Reads at most [`SNIFF_PREFIX_LEN`] bytes.
///
/// # Errors
///
/// Returns `ArchiveError::Io` if the file cannot be read and
/// `ArchiveError::UnsupportedFormat` if nothing matches.
pub fn detect_path(path: &Path, config: &SecurityConfig) -> Result<ArchiveFormat> {
    let mut source = ByteSource::open(path)?;
    let file_name = path.file_name().and_then(|n| n.to_str());
    detect_source(&mut source, file_name, config)
}

fn has_tar_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tar"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ustar_header() -> Vec<u8> {
        let mut header = vec![0u8; 512];
        header[USTAR_OFFSET..USTAR_OFFSET + 6].copy_from_slice(b"ustar\0");
        header
    }

    #[test]
    fn test_detect_sevenz() {
        let data = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
        assert_eq!(detect(&data, None, false).unwrap(), ArchiveFormat::SevenZ);
    }

    #[test]
    fn test_detect_rar_versions() {
        assert_eq!(
            detect(b"Rar!\x1A\x07\x01\x00", None, false).unwrap(),
            ArchiveFormat::Rar
        );
        assert_eq!(
            detect(b"Rar!\x1A\x07\x00\xCF", None, false).unwrap(),
            ArchiveFormat::Rar
        );
    }

    #[test]
    fn test_detect_zip_signatures() {
        for magic in [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"] {
            assert_eq!(detect(magic, None, false).unwrap(), ArchiveFormat::Zip);
        }
        assert!(detect(b"PK\x01\x02", None, false).is_err());
    }

    #[test]
    fn test_detect_compressed_tar() {
        assert_eq!(
            detect(&[0x1F, 0x8B, 0x08], None, false).unwrap(),
            ArchiveFormat::TarGz
        );
        assert_eq!(detect(b"BZh91AY", None, false).unwrap(), ArchiveFormat::TarBz2);
        assert_eq!(
            detect(&[0xFD, b'7', b'z', b'X', b'Z', 0x00], None, false).unwrap(),
            ArchiveFormat::TarXz
        );
        assert_eq!(
            detect(&[0x28, 0xB5, 0x2F, 0xFD, 0x00], None, false).unwrap(),
            ArchiveFormat::TarZst
        );
    }

    #[test]
    fn test_detect_ustar() {
        assert_eq!(
            detect(&ustar_header(), None, false).unwrap(),
            ArchiveFormat::Tar
        );
    }

    #[test]
    fn test_magic_wins_over_extension() {
        assert_eq!(
            detect(b"PK\x03\x04", Some("archive.tar"), true).unwrap(),
            ArchiveFormat::Zip
        );
    }

    #[test]
    fn test_extension_fallback_only_for_tar() {
        let v7_header = vec![0u8; 512];
        assert_eq!(
            detect(&v7_header, Some("OLD.TAR"), true).unwrap(),
            ArchiveFormat::Tar
        );
        assert!(matches!(
            detect(&v7_header, Some("old.tar"), false),
            Err(ArchiveError::UnsupportedFormat)
        ));
        assert!(matches!(
            detect(b"hello", Some("fake.zip"), true),
            Err(ArchiveError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_detect_text_and_empty() {
        assert!(matches!(
            detect(b"Lorem ipsum dolor sit amet", None, true),
            Err(ArchiveError::UnsupportedFormat)
        ));
        assert!(matches!(
            detect(&[], None, true),
            Err(ArchiveError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_prefix_window_is_bounded() {
        let mut data = vec![0u8; 1024];
        data[600..605].copy_from_slice(b"ustar");
        assert!(detect(&data, None, false).is_err());
    }

    #[test]
    fn test_outer_codec() {
        assert_eq!(
            ArchiveFormat::TarZst.outer_codec(),
            Some(CompressionCodec::Zstd)
        );
        assert_eq!(ArchiveFormat::Tar.outer_codec(), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ArchiveFormat::Rar.to_string(), "rar");
        assert_eq!(ArchiveFormat::TarXz.to_string(), "tar.xz");
    }
}
