//! 7z directory parsing and block decoding via `sevenz-rust2`.
//!
//! 7z stores file data in blocks ("folders") that may hold several files
//! compressed as one stream (solid compression). An entry's location is
//! therefore its block index rather than a byte span, and extracting one file
//! decodes its block from the start up to that file.
//!
//! # Encryption
//!
//! Content encryption is a coder in the block's chain (AES-256 with a
//! SHA-256 key derivation), so it is reported per entry. Archives created with
//! encrypted headers cannot even be listed without the password: opening one
//! without a password fails with `PasswordRequired`.
//!
//! # Known limitations
//!
//! - Per-entry compressed sizes are not recorded (files share a packed
//!   stream), so the compression-ratio check is skipped and decoding is
//!   capped by `max_entry_size` instead.
//! - Hardlinks are not represented and are listed as regular files.
//!
//! # Panics in the decoder
//!
//! `sevenz-rust2` indexes its header tables without bounds checks, so some
//! damaged headers make it panic. Every call into the crate runs under
//! [`guarded`], which turns such a panic into `CorruptArchive`. This relies
//! on the unwinding panic strategy.

use std::io::Read;
use std::io::Seek;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

use log::debug;
use log::trace;
use sevenz_rust2::Archive;
use sevenz_rust2::ArchiveEntry;
use sevenz_rust2::ArchiveReader;

use super::ArchiveFormat;
use super::traits::DirectoryParser;
use super::traits::ParseContext;
use crate::ArchiveError;
use crate::QuotaResource;
use crate::Result;
use crate::source::ByteSource;
use crate::types::CompressionMethod;
use crate::types::Encryption;
use crate::types::EntryDescriptor;
use crate::types::EntryKind;
use crate::types::EntryLocation;
use crate::types::Password;
use crate::types::password::usable;

/// Coder id of AES-256 + SHA-256.
const METHOD_AES: &[u8] = &[0x06, 0xF1, 0x07, 0x01];

const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0000_0400;
/// Set by p7zip when the high 16 bits carry a Unix mode.
const FILE_ATTRIBUTE_UNIX_EXTENSION: u32 = 0x0000_8000;
const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Directory parser for 7z archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct SevenZParser;

impl DirectoryParser for SevenZParser {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZ
    }

    fn parse(&self, source: &mut ByteSource, ctx: &ParseContext<'_>) -> Result<Vec<EntryDescriptor>> {
        source.rewind()?;
        let password = to_sevenz_password(ctx.password);
        let archive = guarded("archive header", || Archive::read(&mut *source, &password))?
            .map_err(|e| map_error(e, ctx.password.is_some(), "archive header"))?;

        ctx.config.check_entry_count(archive.files.len() as u64)?;

        let entries: Vec<EntryDescriptor> = archive
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| describe(&archive, index, file))
            .collect();

        debug!(
            "7z directory: {} entries in {} blocks (solid: {})",
            entries.len(),
            archive.blocks.len(),
            archive.is_solid
        );
        Ok(entries)
    }
}

fn describe(archive: &Archive, index: usize, file: &ArchiveEntry) -> EntryDescriptor {
    let block = if file.has_stream {
        archive
            .stream_map
            .file_block_index
            .get(index)
            .copied()
            .flatten()
    } else {
        None
    };

    let (method, encryption) = block.map_or(
        (CompressionMethod::Stored, Encryption::None),
        |block| block_coding(archive, block),
    );

    EntryDescriptor {
        index,
        name: file.name.clone(),
        kind: entry_kind(file),
        uncompressed_size: file.size,
        compressed_size: 0,
        method,
        encryption,
        crc32: if file.has_crc {
            u32::try_from(file.crc).ok()
        } else {
            None
        },
        location: EntryLocation::Block { block },
    }
}

/// Returns the block's compression method and whether it is encrypted.
fn block_coding(archive: &Archive, block: usize) -> (CompressionMethod, Encryption) {
    let Some(block) = archive.blocks.get(block) else {
        return (CompressionMethod::Unknown("missing block".into()), Encryption::None);
    };

    let mut method = CompressionMethod::Stored;
    let mut encryption = Encryption::None;
    for coder in &block.coders {
        let id = coder.encoder_method_id();
        if id == METHOD_AES {
            encryption = Encryption::SevenZAes;
        } else {
            method = method_from_id(id);
        }
    }
    (method, encryption)
}

fn method_from_id(id: &[u8]) -> CompressionMethod {
    match id {
        [0x00] => CompressionMethod::Stored,
        [0x21] => CompressionMethod::Lzma2,
        [0x03, 0x01, 0x01] => CompressionMethod::Lzma,
        [0x04, 0x01, 0x08] => CompressionMethod::Deflate,
        [0x04, 0x01, 0x09] => CompressionMethod::Deflate64,
        [0x04, 0x02, 0x02] => CompressionMethod::Bzip2,
        [0x03, 0x04, 0x01] => CompressionMethod::Ppmd,
        [0x04, 0xF7, 0x11, 0x01] => CompressionMethod::Zstd,
        other => CompressionMethod::Unknown(format!("7z coder {}", hex(other))),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn entry_kind(file: &ArchiveEntry) -> EntryKind {
    if file.is_directory() {
        return EntryKind::Directory;
    }
    if file.has_windows_attributes {
        let attributes = file.windows_attributes;
        if attributes & FILE_ATTRIBUTE_REPARSE_POINT != 0 {
            return EntryKind::Symlink;
        }
        if attributes & FILE_ATTRIBUTE_UNIX_EXTENSION != 0
            && (attributes >> 16) & S_IFMT == S_IFLNK
        {
            return EntryKind::Symlink;
        }
    }
    EntryKind::File
}

/// Decodes the entry's block up to the entry and returns its plaintext.
///
/// # Errors
///
/// - `IncorrectPassword` when the block cannot be decoded and is encrypted
/// - `CorruptArchive` for decoder or CRC failures
/// - `QuotaExceeded` when the entry decodes to more than `limit` bytes
pub(crate) fn read_block_entry(
    source: &mut ByteSource,
    entry: &EntryDescriptor,
    password: Option<&Password>,
    limit: u64,
) -> Result<Vec<u8>> {
    source.rewind()?;
    let encrypted = entry.is_encrypted();
    let mut reader = guarded(entry.name(), move || {
        ArchiveReader::new(source, to_sevenz_password(password))
    })?
    .map_err(|e| map_error(e, password.is_some(), entry.name()))?;

    // Stream-bearing files are visited in directory order; empty files after.
    let ordinal = reader
        .archive()
        .files
        .iter()
        .take(entry.index())
        .filter(|f| f.has_stream)
        .count();

    let mut seen = 0usize;
    let mut outcome: Option<Result<Vec<u8>>> = None;
    let walk = guarded(entry.name(), || {
        reader.for_each_entries(|file, data| {
            if !file.has_stream {
                return Ok(true);
            }
            if seen < ordinal {
                seen += 1;
                return Ok(true);
            }
            trace!("7z: decoding {} ({} bytes)", file.name, file.size);
            outcome = Some(read_limited(data, entry, encrypted, limit));
            Ok(false)
        })
    })
    .map_err(|e| blame(e, encrypted, entry))?;

    match (outcome, walk) {
        (Some(result), _) => result,
        (None, Err(e)) => Err(blame(map_error(e, password.is_some(), entry.name()), encrypted, entry)),
        (None, Ok(())) => Err(ArchiveError::corrupt(format!(
            "7z stream ended before entry {}",
            entry.name()
        ))),
    }
}

fn read_limited(
    data: &mut dyn Read,
    entry: &EntryDescriptor,
    encrypted: bool,
    limit: u64,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    data.take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| {
            blame(
                ArchiveError::corrupt(format!("7z entry {}: {e}", entry.name())),
                encrypted,
                entry,
            )
        })?;

    if out.len() as u64 > limit {
        return Err(ArchiveError::QuotaExceeded {
            resource: QuotaResource::EntrySize {
                size: out.len() as u64,
                max: limit,
            },
        });
    }
    Ok(out)
}

/// An undecodable encrypted block most likely means a wrong password.
fn blame(err: ArchiveError, encrypted: bool, entry: &EntryDescriptor) -> ArchiveError {
    if encrypted && err.is_corruption() {
        ArchiveError::IncorrectPassword {
            entry: entry.name().to_string(),
        }
    } else {
        err
    }
}

/// Runs a `sevenz-rust2` call, reporting a panic inside it as corruption.
fn guarded<T>(what: &str, call: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(call)).map_err(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "decoder panicked".to_string());
        debug!("7z: decoder panicked on {what}: {reason}");
        ArchiveError::corrupt(format!("7z: malformed data in {what}"))
    })
}

fn to_sevenz_password(password: Option<&Password>) -> sevenz_rust2::Password {
    usable(password).map_or_else(sevenz_rust2::Password::empty, |p| {
        sevenz_rust2::Password::from(p.as_str())
    })
}

fn map_error(err: sevenz_rust2::Error, password_set: bool, what: &str) -> ArchiveError {
    match err {
        sevenz_rust2::Error::PasswordRequired if !password_set => ArchiveError::PasswordRequired {
            entry: what.to_string(),
        },
        sevenz_rust2::Error::PasswordRequired | sevenz_rust2::Error::MaybeBadPassword(_) => {
            ArchiveError::IncorrectPassword {
                entry: what.to_string(),
            }
        }
        other => {
            let message = other.to_string();
            let lower = message.to_lowercase();
            if password_set && lower.contains("password") {
                ArchiveError::IncorrectPassword {
                    entry: what.to_string(),
                }
            } else if lower.contains("unsupported") {
                ArchiveError::UnsupportedFeature(format!("7z: {message}"))
            } else {
                ArchiveError::corrupt(format!("7z: {message}"))
            }
        }
    }
}
