//! ZIP central-directory parser.
//!
//! The directory is located through the End Of Central Directory record
//! (and its ZIP64 locator when present). Every offset and length taken from
//! the file is checked against the source before it is followed:
//!
//! - the central directory must lie inside the source
//! - the declared entry count must fit the configured ceiling and the
//!   directory size
//! - each record's variable-length fields must fit the directory
//! - each local header must carry the local signature, and the entry's data
//!   region must lie inside the source
//!
//! Data offsets are resolved here, from the local header, so that the entry
//! reader never has to parse ZIP structures.

use log::debug;
use log::trace;
use log::warn;

use super::ArchiveFormat;
use super::traits::DirectoryParser;
use super::traits::ParseContext;
use crate::ArchiveError;
use crate::QuotaResource;
use crate::Result;
use crate::io::FieldReader;
use crate::source::ByteSource;
use crate::types::AesStrength;
use crate::types::CompressionMethod;
use crate::types::Encryption;
use crate::types::EntryDescriptor;
use crate::types::EntryKind;
use crate::types::EntryLocation;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
const ZIP64_EOCD_SIG: u32 = 0x0606_4b50;

const EOCD_LEN: u64 = 22;
const EOCD_LEN_BYTES: usize = 22;
const ZIP64_LOCATOR_LEN: u64 = 20;
const ZIP64_EOCD_LEN: u64 = 56;
const LOCAL_HEADER_LEN: u64 = 30;
const CENTRAL_HEADER_LEN: u64 = 46;
const MAX_COMMENT_LEN: u64 = 65_535;

const ZIP64_MARKER_16: u16 = 0xFFFF;
const ZIP64_MARKER_32: u32 = 0xFFFF_FFFF;

const ZIP64_EXTRA_ID: u16 = 0x0001;
const AES_EXTRA_ID: u16 = 0x9901;

const FLAG_ENCRYPTED: u16 = 0x0001;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;
const FLAG_UTF8: u16 = 0x0800;

const METHOD_AES: u16 = 99;

const HOST_UNIX: u8 = 3;
const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Parser for PKWARE ZIP archives (including ZIP64).
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipParser;

/// Where the central directory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirectoryLocation {
    entry_count: u64,
    size: u64,
    offset: u64,
}

/// One central-directory record, before the local header is consulted.
#[derive(Debug)]
struct CentralRecord {
    name: String,
    kind: EntryKind,
    method: CompressionMethod,
    encryption: Encryption,
    crc32: Option<u32>,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
}

impl DirectoryParser for ZipParser {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn parse(
        &self,
        source: &mut ByteSource,
        ctx: &ParseContext<'_>,
    ) -> Result<Vec<EntryDescriptor>> {
        let location = locate_directory(source)?;
        ctx.config.check_entry_count(location.entry_count)?;

        if location.entry_count.saturating_mul(CENTRAL_HEADER_LEN) > location.size {
            return Err(ArchiveError::corrupt(format!(
                "central directory of {} bytes cannot hold {} entries",
                location.size, location.entry_count
            )));
        }

        debug!(
            "zip central directory: {} entries, {} bytes at offset {}",
            location.entry_count, location.size, location.offset
        );

        let directory = source.read_span(location.offset, location.size)?;
        let mut reader = FieldReader::new(&directory, "central directory record");
        let mut entries = Vec::new();

        for position in 0..location.entry_count {
            let record = match read_central_record(&mut reader) {
                Ok(record) => record,
                Err(e) if ctx.config.lenient_listing => {
                    warn!("stopping zip listing at record {position}: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };

            match resolve_entry(source, record, entries.len()) {
                Ok(entry) => entries.push(entry),
                Err(e) if ctx.config.lenient_listing => {
                    warn!("skipping zip record {position}: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(entries)
    }
}

/// Finds the EOCD record by scanning backwards over the archive comment
/// window, then follows the ZIP64 locator if there is one.
fn locate_directory(source: &mut ByteSource) -> Result<DirectoryLocation> {
    if source.len() < EOCD_LEN {
        return Err(ArchiveError::corrupt(
            "file too short for an end of central directory record",
        ));
    }

    let (tail_start, tail) = source.read_tail(MAX_COMMENT_LEN + EOCD_LEN)?;
    let signature = EOCD_SIG.to_le_bytes();
    let last_candidate = tail.len().saturating_sub(EOCD_LEN_BYTES);
    let eocd_pos = (0..=last_candidate)
        .rev()
        .find(|&pos| tail[pos..pos + 4] == signature)
        .ok_or_else(|| ArchiveError::corrupt("end of central directory record not found"))?;

    let mut eocd = FieldReader::new(&tail[eocd_pos..], "end of central directory record");
    eocd.skip(4)?;
    let disk = eocd.u16()?;
    let directory_disk = eocd.u16()?;
    let _entries_on_disk = eocd.u16()?;
    let entry_count = eocd.u16()?;
    let size = eocd.u32()?;
    let offset = eocd.u32()?;

    let eocd_offset = tail_start + eocd_pos as u64;

    if let Some(zip64) = read_zip64_location(source, eocd_offset)? {
        return Ok(zip64);
    }

    if disk != 0 || directory_disk != 0 {
        return Err(ArchiveError::UnsupportedFeature(
            "multi-disk ZIP archives".into(),
        ));
    }

    if entry_count == ZIP64_MARKER_16 || size == ZIP64_MARKER_32 || offset == ZIP64_MARKER_32 {
        return Err(ArchiveError::corrupt(
            "ZIP64 markers present without a ZIP64 locator",
        ));
    }

    let location = DirectoryLocation {
        entry_count: u64::from(entry_count),
        size: u64::from(size),
        offset: u64::from(offset),
    };
    source.check_span(location.offset, location.size)?;
    Ok(location)
}

/// Reads the ZIP64 EOCD record if a locator precedes the EOCD.
fn read_zip64_location(
    source: &mut ByteSource,
    eocd_offset: u64,
) -> Result<Option<DirectoryLocation>> {
    let Some(locator_offset) = eocd_offset.checked_sub(ZIP64_LOCATOR_LEN) else {
        return Ok(None);
    };

    let locator = source.read_span(locator_offset, ZIP64_LOCATOR_LEN)?;
    let mut reader = FieldReader::new(&locator, "zip64 end of central directory locator");
    if reader.u32()? != ZIP64_LOCATOR_SIG {
        return Ok(None);
    }
    let directory_disk = reader.u32()?;
    let record_offset = reader.u64()?;
    let total_disks = reader.u32()?;
    if directory_disk != 0 || total_disks > 1 {
        return Err(ArchiveError::UnsupportedFeature(
            "multi-disk ZIP archives".into(),
        ));
    }

    let record = source.read_span(record_offset, ZIP64_EOCD_LEN)?;
    let mut reader = FieldReader::new(&record, "zip64 end of central directory record");
    if reader.u32()? != ZIP64_EOCD_SIG {
        return Err(ArchiveError::corrupt(
            "zip64 end of central directory signature mismatch",
        ));
    }
    let _record_size = reader.u64()?;
    let _version_made_by = reader.u16()?;
    let _version_needed = reader.u16()?;
    let _disk = reader.u32()?;
    let _directory_disk = reader.u32()?;
    let _entries_on_disk = reader.u64()?;
    let entry_count = reader.u64()?;
    let size = reader.u64()?;
    let offset = reader.u64()?;

    source.check_span(offset, size)?;
    Ok(Some(DirectoryLocation {
        entry_count,
        size,
        offset,
    }))
}

fn read_central_record(reader: &mut FieldReader<'_>) -> Result<CentralRecord> {
    if reader.u32()? != CENTRAL_HEADER_SIG {
        return Err(ArchiveError::corrupt(format!(
            "central directory signature mismatch at byte {}",
            reader.position() - 4
        )));
    }

    let version_made_by = reader.u16()?;
    let _version_needed = reader.u16()?;
    let flags = reader.u16()?;
    let raw_method = reader.u16()?;
    let mod_time = reader.u16()?;
    let _mod_date = reader.u16()?;
    let crc32 = reader.u32()?;
    let compressed_32 = reader.u32()?;
    let uncompressed_32 = reader.u32()?;
    let name_len = usize::from(reader.u16()?);
    let extra_len = usize::from(reader.u16()?);
    let comment_len = usize::from(reader.u16()?);
    let _disk_start = reader.u16()?;
    let _internal_attributes = reader.u16()?;
    let external_attributes = reader.u32()?;
    let offset_32 = reader.u32()?;

    let name_bytes = reader.bytes(name_len)?;
    let extra = reader.bytes(extra_len)?;
    reader.skip(comment_len)?;

    let name = if flags & FLAG_UTF8 != 0 {
        String::from_utf8_lossy(name_bytes).into_owned()
    } else {
        decode_legacy_name(name_bytes)
    };

    let extras = ExtraFields::parse(extra, uncompressed_32, compressed_32, offset_32)?;

    if flags & FLAG_STRONG_ENCRYPTION != 0 {
        return Err(ArchiveError::UnsupportedFeature(format!(
            "PKWARE strong encryption ({name})"
        )));
    }

    let (method, encryption) = if flags & FLAG_ENCRYPTED == 0 {
        (method_from_id(raw_method), Encryption::None)
    } else if raw_method == METHOD_AES {
        let aes = extras.aes.ok_or_else(|| {
            ArchiveError::corrupt(format!("AES entry {name} lacks the 0x9901 extra field"))
        })?;
        (
            method_from_id(aes.actual_method),
            Encryption::WinZipAes {
                strength: aes.strength,
                vendor_version: aes.vendor_version,
            },
        )
    } else {
        // With a data descriptor the CRC is not known when the header is
        // written, so the check byte comes from the DOS time instead.
        let check_source = if flags & FLAG_DATA_DESCRIPTOR != 0 {
            u32::from(mod_time) << 16
        } else {
            crc32
        };
        (
            method_from_id(raw_method),
            Encryption::ZipCrypto {
                check_byte: check_source.to_be_bytes()[0],
            },
        )
    };

    let has_crc = !matches!(
        encryption,
        Encryption::WinZipAes {
            vendor_version: 2,
            ..
        }
    );

    let unix_mode = (version_made_by >> 8 == u16::from(HOST_UNIX)).then_some(external_attributes >> 16);
    let kind = if name.ends_with('/') || name.ends_with('\\') {
        EntryKind::Directory
    } else if unix_mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
        EntryKind::Symlink
    } else {
        EntryKind::File
    };

    Ok(CentralRecord {
        name,
        kind,
        method,
        encryption,
        crc32: has_crc.then_some(crc32),
        compressed_size: extras.compressed_size,
        uncompressed_size: extras.uncompressed_size,
        local_header_offset: extras.local_header_offset,
    })
}

/// Follows the record to its local header and pins down the data region.
fn resolve_entry(
    source: &mut ByteSource,
    record: CentralRecord,
    index: usize,
) -> Result<EntryDescriptor> {
    let header = source.read_span(record.local_header_offset, LOCAL_HEADER_LEN)?;
    let mut reader = FieldReader::new(&header, "local file header");
    if reader.u32()? != LOCAL_HEADER_SIG {
        return Err(ArchiveError::corrupt(format!(
            "local header signature mismatch for {}",
            record.name
        )));
    }
    reader.skip(22)?;
    let name_len = u64::from(reader.u16()?);
    let extra_len = u64::from(reader.u16()?);

    let data_offset = record
        .local_header_offset
        .checked_add(LOCAL_HEADER_LEN + name_len + extra_len)
        .ok_or(ArchiveError::QuotaExceeded {
            resource: QuotaResource::IntegerOverflow,
        })?;
    source.check_span(data_offset, record.compressed_size)?;

    trace!(
        "zip entry {index}: {} ({} -> {} bytes, {}, encryption {})",
        record.name,
        record.compressed_size,
        record.uncompressed_size,
        record.method,
        record.encryption
    );

    Ok(EntryDescriptor {
        index,
        name: record.name,
        kind: record.kind,
        uncompressed_size: record.uncompressed_size,
        compressed_size: record.compressed_size,
        method: record.method,
        encryption: record.encryption,
        crc32: record.crc32,
        location: EntryLocation::Span {
            offset: data_offset,
            length: record.compressed_size,
        },
    })
}

#[derive(Debug, Clone, Copy)]
struct AesExtra {
    vendor_version: u16,
    strength: AesStrength,
    actual_method: u16,
}

/// Values resolved from the extra-field block of a central record.
#[derive(Debug)]
struct ExtraFields {
    uncompressed_size: u64,
    compressed_size: u64,
    local_header_offset: u64,
    aes: Option<AesExtra>,
}

impl ExtraFields {
    fn parse(extra: &[u8], uncompressed: u32, compressed: u32, offset: u32) -> Result<Self> {
        let mut fields = Self {
            uncompressed_size: u64::from(uncompressed),
            compressed_size: u64::from(compressed),
            local_header_offset: u64::from(offset),
            aes: None,
        };

        let mut reader = FieldReader::new(extra, "extra field");
        while reader.remaining() >= 4 {
            let id = reader.u16()?;
            let len = usize::from(reader.u16()?);
            let body = reader.bytes(len)?;
            let mut body = FieldReader::new(body, "extra field");

            match id {
                ZIP64_EXTRA_ID => {
                    // Only the fields whose 32-bit slot holds the marker are
                    // present, in this fixed order.
                    if uncompressed == ZIP64_MARKER_32 {
                        fields.uncompressed_size = body.u64()?;
                    }
                    if compressed == ZIP64_MARKER_32 {
                        fields.compressed_size = body.u64()?;
                    }
                    if offset == ZIP64_MARKER_32 {
                        fields.local_header_offset = body.u64()?;
                    }
                }
                AES_EXTRA_ID => {
                    let vendor_version = body.u16()?;
                    let vendor_id = body.array::<2>()?;
                    let strength_code = body.u8()?;
                    let actual_method = body.u16()?;
                    if &vendor_id != b"AE" {
                        return Err(ArchiveError::corrupt("AES extra field has an unknown vendor"));
                    }
                    let strength = AesStrength::from_code(strength_code).ok_or_else(|| {
                        ArchiveError::corrupt(format!("unknown AES strength {strength_code}"))
                    })?;
                    fields.aes = Some(AesExtra {
                        vendor_version,
                        strength,
                        actual_method,
                    });
                }
                _ => {}
            }
        }

        Ok(fields)
    }
}

fn method_from_id(id: u16) -> CompressionMethod {
    match id {
        0 => CompressionMethod::Stored,
        8 => CompressionMethod::Deflate,
        9 => CompressionMethod::Deflate64,
        12 => CompressionMethod::Bzip2,
        14 => CompressionMethod::Lzma,
        93 => CompressionMethod::Zstd,
        95 => CompressionMethod::Xz,
        98 => CompressionMethod::Ppmd,
        other => CompressionMethod::Unknown(format!("zip method {other}")),
    }
}

/// Names without the UTF-8 flag are nominally CP437, but most archivers
/// write UTF-8 regardless, so they are decoded as UTF-8 with lossy
/// replacement of invalid sequences.
fn decode_legacy_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
