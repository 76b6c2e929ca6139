//! Tar directory parsing, plain or wrapped in an outer codec.
//!
//! A compressed tar stream has no index: the only way to find entry `n` is to
//! decode everything before it. The outer codec is therefore inflated once at
//! open (bounded by `max_total_size`) and the inflated bytes become the
//! session's source. After that, every entry is a plain byte span.

use std::io::Seek;

use log::debug;
use log::warn;

use super::ArchiveFormat;
use super::traits::DirectoryParser;
use super::traits::ParseContext;
use crate::ArchiveError;
use crate::Result;
use crate::SecurityConfig;
use crate::source::ByteSource;
use crate::types::CompressionMethod;
use crate::types::Encryption;
use crate::types::EntryDescriptor;
use crate::types::EntryKind;
use crate::types::EntryLocation;

const BLOCK_LEN: usize = 512;

/// Directory parser for the tar family.
#[derive(Debug, Clone, Copy)]
pub struct TarParser {
    format: ArchiveFormat,
}

impl TarParser {
    /// Creates a parser for `format`, which must be one of the tar variants.
    #[must_use]
    pub const fn new(format: ArchiveFormat) -> Self {
        Self { format }
    }
}

impl DirectoryParser for TarParser {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn prepare(&self, source: ByteSource, config: &SecurityConfig) -> Result<ByteSource> {
        let Some(codec) = self.format.outer_codec() else {
            return Ok(source);
        };

        let packed = source.len();
        let inflated = codec.inflate_bounded(source, config.max_total_size)?;
        if inflated.len() < BLOCK_LEN {
            return Err(ArchiveError::corrupt(format!(
                "{} stream holds {} bytes, less than one tar block",
                codec.name(),
                inflated.len()
            )));
        }
        debug!(
            "inflated {} stream: {packed} -> {} bytes",
            codec.name(),
            inflated.len()
        );
        Ok(ByteSource::from_bytes(inflated))
    }

    fn parse(&self, source: &mut ByteSource, ctx: &ParseContext<'_>) -> Result<Vec<EntryDescriptor>> {
        source.rewind()?;
        let source_len = source.len();
        let lenient = ctx.config.lenient_listing;

        let mut archive = tar::Archive::new(&mut *source);
        let iter = archive.entries_with_seek().map_err(header_error)?;

        let mut spans = Vec::new();
        for item in iter {
            let raw = match item.and_then(|entry| read_header(&entry)) {
                Ok(raw) => raw,
                Err(e) if lenient => {
                    warn!("tar: stopping listing at unreadable header: {e}");
                    break;
                }
                Err(e) => return Err(header_error(e)),
            };

            ctx.config.check_entry_count(spans.len() as u64 + 1)?;
            spans.push(raw);
        }
        drop(archive);

        let mut entries = Vec::with_capacity(spans.len());
        for raw in spans {
            if let Err(e) = check_data(&raw, source_len) {
                if lenient {
                    warn!("tar: {} is cut short, stopping listing", raw.name);
                    break;
                }
                return Err(e);
            }
            entries.push(raw.into_descriptor(entries.len()));
        }

        debug!("tar directory: {} entries", entries.len());
        Ok(entries)
    }
}

/// Header fields copied out of a `tar::Entry` before the archive moves on.
struct RawHeader {
    name: String,
    kind: EntryKind,
    special: bool,
    offset: u64,
    size: u64,
}

impl RawHeader {
    fn into_descriptor(self, index: usize) -> EntryDescriptor {
        let location = if self.special {
            EntryLocation::Unavailable {
                reason: "device and FIFO entries have no data",
            }
        } else {
            EntryLocation::Span {
                offset: self.offset,
                length: self.size,
            }
        };

        EntryDescriptor {
            index,
            name: self.name,
            kind: self.kind,
            uncompressed_size: self.size,
            compressed_size: self.size,
            method: CompressionMethod::Stored,
            encryption: Encryption::None,
            crc32: None,
            location,
        }
    }
}

fn read_header<R: std::io::Read>(entry: &tar::Entry<'_, R>) -> std::io::Result<RawHeader> {
    let (kind, special) = match entry.header().entry_type() {
        tar::EntryType::Directory => (EntryKind::Directory, false),
        tar::EntryType::Symlink => (EntryKind::Symlink, false),
        tar::EntryType::Link => (EntryKind::Hardlink, false),
        tar::EntryType::Char | tar::EntryType::Block | tar::EntryType::Fifo => {
            (EntryKind::File, true)
        }
        _ => (EntryKind::File, false),
    };

    Ok(RawHeader {
        name: entry.path()?.to_string_lossy().into_owned(),
        kind,
        special,
        offset: entry.raw_file_position(),
        size: entry.size(),
    })
}

fn check_data(raw: &RawHeader, source_len: u64) -> Result<()> {
    match raw.offset.checked_add(raw.size) {
        Some(end) if end <= source_len => Ok(()),
        _ => Err(ArchiveError::TruncatedArchive {
            offset: raw.offset,
            length: raw.size,
            source_len,
        }),
    }
}

fn header_error(err: std::io::Error) -> ArchiveError {
    ArchiveError::corrupt(format!("tar header: {err}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::formats::compression::CompressionCodec;
    use crate::test_utils::TarTestBuilder;
    use crate::test_utils::compress;

    fn parse_with(data: Vec<u8>, format: ArchiveFormat, config: &SecurityConfig) -> Result<Vec<EntryDescriptor>> {
        let parser = TarParser::new(format);
        let mut source = parser.prepare(ByteSource::from_bytes(data), config)?;
        let ctx = ParseContext {
            config,
            password: None,
        };
        parser.parse(&mut source, &ctx)
    }

    fn parse(data: Vec<u8>) -> Result<Vec<EntryDescriptor>> {
        parse_with(data, ArchiveFormat::Tar, &SecurityConfig::default())
    }

    #[test]
    fn test_entries_in_order() {
        let data = TarTestBuilder::new()
            .add_directory("docs/")
            .add_file("docs/readme.txt", b"read me")
            .add_symlink("latest", "docs/readme.txt")
            .add_hardlink("copy.txt", "docs/readme.txt")
            .build();

        let entries = parse(data).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].kind(), EntryKind::Hardlink);
        assert_eq!(entries[0].kind(), EntryKind::Directory);
        assert_eq!(entries[1].name(), "docs/readme.txt");
        assert_eq!(entries[1].uncompressed_size(), 7);
        assert_eq!(entries[2].kind(), EntryKind::Symlink);
        assert!(entries.iter().enumerate().all(|(i, e)| e.index() == i));
    }

    #[test]
    fn test_span_points_at_data() {
        let data = TarTestBuilder::new().add_file("a.txt", b"payload").build();
        let entries = parse(data.clone()).unwrap();
        let EntryLocation::Span { offset, length } = *entries[0].location() else {
            panic!("expected a span");
        };
        let start = usize::try_from(offset).unwrap();
        assert_eq!(&data[start..start + usize::try_from(length).unwrap()], b"payload");
    }

    #[test]
    fn test_long_names() {
        let long = format!("{}/file.txt", "deep".repeat(40));
        let data = TarTestBuilder::new().add_file(&long, b"x").build();
        assert_eq!(parse(data).unwrap()[0].name(), long);
    }

    #[test]
    fn test_compressed_variants() {
        let tar = TarTestBuilder::new()
            .add_file("one.txt", b"1")
            .add_file("two.txt", b"22")
            .build();

        for (format, codec) in [
            (ArchiveFormat::TarGz, CompressionCodec::Gzip),
            (ArchiveFormat::TarBz2, CompressionCodec::Bzip2),
            (ArchiveFormat::TarXz, CompressionCodec::Xz),
            (ArchiveFormat::TarZst, CompressionCodec::Zstd),
        ] {
            let entries =
                parse_with(compress(codec, &tar), format, &SecurityConfig::default()).unwrap();
            assert_eq!(entries.len(), 2, "{format}");
            assert_eq!(entries[1].name(), "two.txt");
        }
    }

    #[test]
    fn test_compressed_non_tar_is_corrupt() {
        let data = compress(CompressionCodec::Gzip, &b"just some text, not a tar header".repeat(20));
        let err = parse_with(data, ArchiveFormat::TarGz, &SecurityConfig::default()).unwrap_err();
        assert!(err.is_corruption(), "got {err:?}");
    }

    #[test]
    fn test_inflate_limit() {
        let tar = TarTestBuilder::new().add_file("zeros", &[0u8; 8192]).build();
        let config = SecurityConfig {
            max_total_size: 1024,
            ..Default::default()
        };
        assert!(matches!(
            parse_with(compress(CompressionCodec::Zstd, &tar), ArchiveFormat::TarZst, &config),
            Err(ArchiveError::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn test_entry_count_ceiling() {
        let data = TarTestBuilder::new()
            .add_file("a", b"a")
            .add_file("b", b"b")
            .add_file("c", b"c")
            .build();
        let config = SecurityConfig {
            max_entry_count: 2,
            ..Default::default()
        };
        assert!(matches!(
            parse_with(data, ArchiveFormat::Tar, &config),
            Err(ArchiveError::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn test_truncated_data() {
        let mut data = TarTestBuilder::new()
            .add_file("a.txt", b"first")
            .add_file("b.bin", &[9u8; 2000])
            .build();
        // Keep both headers but cut into the second entry's data.
        data.truncate(512 + 512 + 512 + 1000);

        let err = parse(data.clone()).unwrap_err();
        assert!(err.is_corruption(), "got {err:?}");

        let lenient = SecurityConfig {
            lenient_listing: true,
            ..Default::default()
        };
        let entries = parse_with(data, ArchiveFormat::Tar, &lenient).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "a.txt");
    }

    #[test]
    fn test_empty_stream() {
        assert!(parse(Vec::new()).unwrap().is_empty());
        assert!(parse(vec![0u8; 1024]).unwrap().is_empty());
    }

    #[test]
    fn test_compressed_stream_without_a_tar_block() {
        for payload in [&b""[..], b"short"] {
            let data = compress(CompressionCodec::Gzip, payload);
            let err = parse_with(data, ArchiveFormat::TarGz, &SecurityConfig::default()).unwrap_err();
            assert!(matches!(err, ArchiveError::CorruptArchive(_)), "got {err:?}");
        }

        let empty_tar = compress(CompressionCodec::Gzip, &[0u8; 1024]);
        assert!(
            parse_with(empty_tar, ArchiveFormat::TarGz, &SecurityConfig::default())
                .unwrap()
                .is_empty()
        );
    }
}
