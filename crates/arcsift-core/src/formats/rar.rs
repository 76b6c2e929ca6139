//! RAR directory parsing (RAR 1.5-4.x and RAR 5.0).
//!
//! RAR has no central directory: file headers are interleaved with file data
//! and the directory is rebuilt by walking the headers from the signature to
//! the end-of-archive block. Both generations are checksummed per header
//! (CRC-16 for 4.x, CRC-32 for 5.0); a mismatch is reported as corruption.
//!
//! Only stored entries can be extracted. Entries compressed with the RAR
//! algorithms are listed with `CompressionMethod::Rar { level }`.

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
use crate::types::CompressionMethod;
use crate::types::Encryption;
use crate::types::EntryDescriptor;
use crate::types::EntryKind;
use crate::types::EntryLocation;

const RAR5_SIGNATURE: &[u8] = b"Rar!\x1A\x07\x01\x00";
const RAR4_SIGNATURE: &[u8] = b"Rar!\x1A\x07\x00";

const SPLIT_REASON: &str = "entry continues in another volume";

/// Upper bound on a single RAR5 header (the format caps it at 2 MiB).
const RAR5_MAX_HEADER: u64 = 2 * 1024 * 1024;

/// RAR5 header types.
mod v5 {
    pub const HEAD_MAIN: u64 = 1;
    pub const HEAD_FILE: u64 = 2;
    pub const HEAD_SERVICE: u64 = 3;
    pub const HEAD_CRYPT: u64 = 4;
    pub const HEAD_END: u64 = 5;

    pub const FLAG_EXTRA: u64 = 0x0001;
    pub const FLAG_DATA: u64 = 0x0002;
    pub const FLAG_SPLIT_BEFORE: u64 = 0x0008;
    pub const FLAG_SPLIT_AFTER: u64 = 0x0010;

    pub const FILE_DIRECTORY: u64 = 0x0001;
    pub const FILE_MTIME: u64 = 0x0002;
    pub const FILE_CRC: u64 = 0x0004;

    pub const EXTRA_CRYPT: u64 = 0x01;
    pub const EXTRA_REDIRECTION: u64 = 0x05;

    pub const REDIRECTION_HARDLINK: u64 = 4;
}

/// RAR 1.5-4.x block types and flags.
mod v4 {
    pub const BLOCK_MAIN: u8 = 0x73;
    pub const BLOCK_FILE: u8 = 0x74;
    pub const BLOCK_END: u8 = 0x7B;

    pub const LONG_BLOCK: u16 = 0x8000;
    pub const MAIN_PASSWORD: u16 = 0x0080;

    pub const FILE_SPLIT_BEFORE: u16 = 0x0001;
    pub const FILE_SPLIT_AFTER: u16 = 0x0002;
    pub const FILE_PASSWORD: u16 = 0x0004;
    pub const FILE_DIRECTORY_MASK: u16 = 0x00E0;
    pub const FILE_LARGE: u16 = 0x0100;
    pub const FILE_UNICODE: u16 = 0x0200;

    pub const METHOD_STORE: u8 = 0x30;
    pub const HOST_UNIX: u8 = 3;
    pub const BASE_HEADER_LEN: u64 = 7;
    pub const BASE_HEADER_BYTES: usize = 7;
}

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Directory parser for RAR archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct RarParser;

impl DirectoryParser for RarParser {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Rar
    }

    fn parse(&self, source: &mut ByteSource, ctx: &ParseContext<'_>) -> Result<Vec<EntryDescriptor>> {
        let prefix = source.read_prefix(RAR5_SIGNATURE.len())?;
        let mut walker = if prefix.starts_with(RAR5_SIGNATURE) {
            HeaderWalker::new(Generation::V5, RAR5_SIGNATURE.len() as u64)
        } else if prefix.starts_with(RAR4_SIGNATURE) {
            HeaderWalker::new(Generation::V4, RAR4_SIGNATURE.len() as u64)
        } else {
            return Err(ArchiveError::corrupt("missing RAR signature"));
        };

        let mut entries = Vec::new();
        loop {
            let step = match walker.next(source) {
                Ok(step) => step,
                Err(e) if ctx.config.lenient_listing && e.is_corruption() => {
                    warn!("rar: stopping listing at offset {}: {e}", walker.position);
                    break;
                }
                Err(e) => return Err(e),
            };

            match step {
                Step::File(mut entry) => {
                    ctx.config.check_entry_count(entries.len() as u64 + 1)?;
                    entry.index = entries.len();
                    trace!("rar: {} at {:?}", entry.name, entry.location);
                    entries.push(entry);
                }
                Step::Skip => {}
                Step::End => break,
            }
        }

        debug!(
            "rar directory ({:?}): {} entries",
            walker.generation,
            entries.len()
        );
        Ok(entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    V4,
    V5,
}

enum Step {
    File(EntryDescriptor),
    Skip,
    End,
}

struct HeaderWalker {
    generation: Generation,
    position: u64,
}

impl HeaderWalker {
    const fn new(generation: Generation, position: u64) -> Self {
        Self {
            generation,
            position,
        }
    }

    fn next(&mut self, source: &mut ByteSource) -> Result<Step> {
        if self.position >= source.len() {
            return Err(ArchiveError::corrupt(format!(
                "RAR archive ends at offset {} without an end-of-archive header",
                self.position
            )));
        }
        match self.generation {
            Generation::V5 => self.next_v5(source),
            Generation::V4 => self.next_v4(source),
        }
    }

    fn next_v5(&mut self, source: &mut ByteSource) -> Result<Step> {
        let start = self.position;
        let peek_len = (source.len() - start).min(4 + 10);
        let peek = source.read_span(start, peek_len)?;

        let mut fields = FieldReader::new(&peek, "RAR5 header prefix");
        let expected_crc = fields.u32()?;
        let header_size = fields.vint()?;
        let size_len = fields.position() - 4;

        if header_size == 0 || header_size > RAR5_MAX_HEADER {
            return Err(ArchiveError::corrupt(format!(
                "RAR5 header at offset {start} declares size {header_size}"
            )));
        }

        // CRC covers the size field and the header body.
        let crc_start = start + 4;
        let crc_len = size_len as u64 + header_size;
        let checked = source.read_span(crc_start, crc_len)?;
        let actual_crc = crc32fast::hash(&checked);
        if actual_crc != expected_crc {
            return Err(ArchiveError::corrupt(format!(
                "RAR5 header CRC mismatch at offset {start}"
            )));
        }
        let body = &checked[size_len..];

        let mut fields = FieldReader::new(body, "RAR5 header");
        let header_type = fields.vint()?;
        let flags = fields.vint()?;
        let extra_size = if flags & v5::FLAG_EXTRA != 0 {
            fields.vint()?
        } else {
            0
        };
        let data_size = if flags & v5::FLAG_DATA != 0 {
            fields.vint()?
        } else {
            0
        };

        let data_offset = end_of(crc_start, crc_len)?;
        source.check_span(data_offset, data_size)?;
        self.position = end_of(data_offset, data_size)?;

        match header_type {
            v5::HEAD_FILE => {
                let extra_len = usize::try_from(extra_size)
                    .ok()
                    .filter(|&len| len <= body.len())
                    .ok_or_else(|| {
                        ArchiveError::corrupt(format!(
                            "RAR5 extra area at offset {start} is larger than its header"
                        ))
                    })?;
                let extra = &body[body.len() - extra_len..];
                let entry = parse_v5_file(&mut fields, extra, flags, data_offset, data_size)?;
                Ok(Step::File(entry))
            }
            v5::HEAD_CRYPT => Err(ArchiveError::UnsupportedFeature(
                "RAR5 archive with encrypted headers".into(),
            )),
            v5::HEAD_END => Ok(Step::End),
            v5::HEAD_MAIN | v5::HEAD_SERVICE => Ok(Step::Skip),
            other => {
                trace!("rar: skipping unknown RAR5 header type {other}");
                Ok(Step::Skip)
            }
        }
    }

    fn next_v4(&mut self, source: &mut ByteSource) -> Result<Step> {
        let start = self.position;
        let base = source.read_span(start, v4::BASE_HEADER_LEN)?;
        let mut fields = FieldReader::new(&base, "RAR block header");
        let expected_crc = fields.u16()?;
        let block_type = fields.u8()?;
        let flags = fields.u16()?;
        let header_size = u64::from(fields.u16()?);

        if header_size < v4::BASE_HEADER_LEN {
            return Err(ArchiveError::corrupt(format!(
                "RAR block at offset {start} declares header size {header_size}"
            )));
        }

        let header = source.read_span(start, header_size)?;
        let actual_crc = crc32fast::hash(&header[2..]).to_le_bytes();
        if u16::from_le_bytes([actual_crc[0], actual_crc[1]]) != expected_crc {
            return Err(ArchiveError::corrupt(format!(
                "RAR header CRC mismatch at offset {start}"
            )));
        }

        let mut fields = FieldReader::new(&header, "RAR block");
        fields.skip(v4::BASE_HEADER_BYTES)?;
        let header_end = end_of(start, header_size)?;

        match block_type {
            v4::BLOCK_MAIN if flags & v4::MAIN_PASSWORD != 0 => Err(
                ArchiveError::UnsupportedFeature("RAR archive with encrypted headers".into()),
            ),
            v4::BLOCK_FILE => {
                let (entry, data_size) = parse_v4_file(&mut fields, flags, header_end)?;
                source.check_span(header_end, data_size)?;
                self.position = end_of(header_end, data_size)?;
                Ok(Step::File(entry))
            }
            v4::BLOCK_END => Ok(Step::End),
            _ => {
                let add_size = if flags & v4::LONG_BLOCK != 0 {
                    u64::from(fields.u32()?)
                } else {
                    0
                };
                source.check_span(header_end, add_size)?;
                self.position = end_of(header_end, add_size)?;
                Ok(Step::Skip)
            }
        }
    }
}

fn parse_v5_file(
    fields: &mut FieldReader<'_>,
    extra: &[u8],
    header_flags: u64,
    data_offset: u64,
    data_size: u64,
) -> Result<EntryDescriptor> {
    let file_flags = fields.vint()?;
    let unpacked_size = fields.vint()?;
    let _attributes = fields.vint()?;
    if file_flags & v5::FILE_MTIME != 0 {
        fields.u32()?;
    }
    let crc32 = if file_flags & v5::FILE_CRC != 0 {
        Some(fields.u32()?)
    } else {
        None
    };
    let compression = fields.vint()?;
    let _host_os = fields.vint()?;
    let name_len = fields.vint()?;
    let name = String::from_utf8_lossy(fields.bytes_u64(name_len)?).into_owned();

    let mut encryption = Encryption::None;
    let mut redirection = None;
    let mut records = FieldReader::new(extra, "RAR5 extra area");
    while records.remaining() > 0 {
        let size = records.vint()?;
        let record = records.bytes_u64(size)?;
        let mut record = FieldReader::new(record, "RAR5 extra record");
        match record.vint()? {
            v5::EXTRA_CRYPT => encryption = Encryption::Rar,
            v5::EXTRA_REDIRECTION => redirection = Some(record.vint()?),
            _ => {}
        }
    }

    let kind = if file_flags & v5::FILE_DIRECTORY != 0 {
        EntryKind::Directory
    } else if redirection == Some(v5::REDIRECTION_HARDLINK) {
        EntryKind::Hardlink
    } else if redirection.is_some() {
        EntryKind::Symlink
    } else {
        EntryKind::File
    };

    let split = header_flags & (v5::FLAG_SPLIT_BEFORE | v5::FLAG_SPLIT_AFTER) != 0;

    Ok(EntryDescriptor {
        index: 0,
        name,
        kind,
        uncompressed_size: unpacked_size,
        compressed_size: data_size,
        method: method_from_level(((compression >> 7) & 0x07) as u8),
        encryption,
        crc32,
        location: location(split, data_offset, data_size),
    })
}

/// Decodes a RAR 1.5-4.x file name.
///
/// With the Unicode flag set, the name is either plain UTF-8 (no NUL) or an
/// OEM name, a NUL, and the Unicode form packed against the OEM bytes. If
/// the packed form does not decode, the OEM part is used.
fn decode_v4_name(raw: &[u8], unicode: bool) -> String {
    let Some(nul) = raw.iter().position(|&b| b == 0).filter(|_| unicode) else {
        return String::from_utf8_lossy(raw).into_owned();
    };
    let (oem, packed) = (&raw[..nul], &raw[nul + 1..]);
    unpack_unicode_name(oem, packed).unwrap_or_else(|| String::from_utf8_lossy(oem).into_owned())
}

/// Expands the packed UTF-16 name.
///
/// The first byte is a shared high byte. Then every flag byte describes up to
/// four units, two bits each: 0 a low byte, 1 a low byte under the shared
/// high byte, 2 a full little-endian unit, 3 a run copied from the OEM name
/// (optionally shifted by a correction byte).
fn unpack_unicode_name(oem: &[u8], packed: &[u8]) -> Option<String> {
    let (&high, mut rest) = packed.split_first()?;
    let high = u16::from(high) << 8;
    let mut units: Vec<u16> = Vec::with_capacity(oem.len());
    let mut flags = 0u8;
    let mut flag_bits = 0u8;

    while !rest.is_empty() {
        if flag_bits == 0 {
            (flags, rest) = (rest[0], &rest[1..]);
            flag_bits = 8;
        }
        match flags >> 6 {
            0 => {
                let (&low, tail) = rest.split_first()?;
                units.push(u16::from(low));
                rest = tail;
            }
            1 => {
                let (&low, tail) = rest.split_first()?;
                units.push(high | u16::from(low));
                rest = tail;
            }
            2 => {
                let [low, hi, tail @ ..] = rest else {
                    return None;
                };
                units.push(u16::from_le_bytes([*low, *hi]));
                rest = tail;
            }
            _ => {
                let (&length, tail) = rest.split_first()?;
                rest = tail;
                let correction = if length & 0x80 == 0 {
                    None
                } else {
                    let (&correction, tail) = rest.split_first()?;
                    rest = tail;
                    Some(correction)
                };
                let count = usize::from(length & 0x7F) + 2;
                let start = units.len();
                let end = start.saturating_add(count).min(oem.len());
                for &byte in oem.get(start..end).unwrap_or_default() {
                    units.push(correction.map_or(u16::from(byte), |c| {
                        high | u16::from(byte.wrapping_add(c))
                    }));
                }
            }
        }
        flags <<= 2;
        flag_bits -= 2;
    }

    if units.is_empty() {
        return None;
    }
    String::from_utf16(&units).ok()
}

fn parse_v4_file(
    fields: &mut FieldReader<'_>,
    flags: u16,
    data_offset: u64,
) -> Result<(EntryDescriptor, u64)> {
    let pack_low = fields.u32()?;
    let unpacked_low = fields.u32()?;
    let host_os = fields.u8()?;
    let crc32 = fields.u32()?;
    let _mtime = fields.u32()?;
    let _version = fields.u8()?;
    let method = fields.u8()?;
    let name_len = fields.u16()?;
    let attributes = fields.u32()?;

    let (pack_high, unpacked_high) = if flags & v4::FILE_LARGE != 0 {
        (fields.u32()?, fields.u32()?)
    } else {
        (0, 0)
    };
    let data_size = (u64::from(pack_high) << 32) | u64::from(pack_low);
    let unpacked_size = (u64::from(unpacked_high) << 32) | u64::from(unpacked_low);

    let raw_name = fields.bytes(usize::from(name_len))?;
    let name = decode_v4_name(raw_name, flags & v4::FILE_UNICODE != 0);

    let kind = if flags & v4::FILE_DIRECTORY_MASK == v4::FILE_DIRECTORY_MASK {
        EntryKind::Directory
    } else if host_os == v4::HOST_UNIX && attributes & S_IFMT == S_IFLNK {
        EntryKind::Symlink
    } else {
        EntryKind::File
    };

    let encryption = if flags & v4::FILE_PASSWORD != 0 {
        Encryption::Rar
    } else {
        Encryption::None
    };

    let split = flags & (v4::FILE_SPLIT_BEFORE | v4::FILE_SPLIT_AFTER) != 0;

    let entry = EntryDescriptor {
        index: 0,
        name,
        kind,
        uncompressed_size: unpacked_size,
        compressed_size: data_size,
        method: method_from_level(method.saturating_sub(v4::METHOD_STORE)),
        encryption,
        crc32: Some(crc32),
        location: location(split, data_offset, data_size),
    };
    Ok((entry, data_size))
}

/// Maps a RAR compression level (0 = store, 1-5 = fastest-best).
fn method_from_level(level: u8) -> CompressionMethod {
    if level == 0 {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Rar { level }
    }
}

const fn location(split: bool, offset: u64, length: u64) -> EntryLocation {
    if split {
        EntryLocation::Unavailable {
            reason: SPLIT_REASON,
        }
    } else {
        EntryLocation::Span { offset, length }
    }
}

fn end_of(offset: u64, length: u64) -> Result<u64> {
    offset
        .checked_add(length)
        .ok_or(ArchiveError::QuotaExceeded {
            resource: QuotaResource::IntegerOverflow,
        })
}
