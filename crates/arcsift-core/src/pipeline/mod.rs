//! Decompression and decryption of one entry.
//!
//! Each format contributes a stage plan, run in order over the raw bytes:
//!
//! | Format | Stages                                         |
//! |--------|------------------------------------------------|
//! | ZIP    | decrypt (ZipCrypto or WinZip AES), decompress, CRC-32 |
//! | RAR    | decompress (stored only), CRC-32               |
//! | tar    | stored copy                                    |
//! | 7z     | delegated to the 7z block decoder              |
//!
//! Cipher state is created inside the stage that needs it, so decoding one
//! entry never depends on entries decoded before it.

pub(crate) mod codec;
pub(crate) mod winzip_aes;
pub(crate) mod zipcrypto;

use log::trace;

use crate::ArchiveError;
use crate::Result;
use crate::SecurityConfig;
use crate::extraction::reader::RawEntry;
use crate::formats::ArchiveFormat;
use crate::formats::sevenz;
use crate::security::check_declared_size;
use crate::security::validate_compression_ratio;
use crate::types::AesStrength;
use crate::types::CompressionMethod;
use crate::types::Encryption;
use crate::types::EntryDescriptor;
use crate::types::Password;
use crate::types::password::usable;

/// One decode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Stage {
    /// PKWARE stream cipher.
    ZipCrypto {
        /// Expected last header byte.
        check_byte: u8,
    },
    /// WinZip AES-CTR with HMAC-SHA1 authentication.
    WinZipAes {
        /// Key size.
        strength: AesStrength,
    },
    /// Codec dispatch on the entry's method.
    Decompress(CompressionMethod),
    /// CRC-32 of the plaintext.
    VerifyCrc(u32),
}

/// Builds the stage list for a byte-addressed entry.
///
/// # Errors
///
/// - `UnsupportedFeature` for encryption schemes without a decryptor
/// - `UnsupportedCompression` for methods without a codec
pub(crate) fn plan(format: ArchiveFormat, entry: &EntryDescriptor) -> Result<Vec<Stage>> {
    let mut stages = Vec::with_capacity(3);

    match entry.encryption() {
        Encryption::None => {}
        Encryption::ZipCrypto { check_byte } if format == ArchiveFormat::Zip => {
            stages.push(Stage::ZipCrypto { check_byte });
        }
        Encryption::WinZipAes { strength, .. } if format == ArchiveFormat::Zip => {
            stages.push(Stage::WinZipAes { strength });
        }
        Encryption::Rar => {
            return Err(ArchiveError::UnsupportedFeature(
                "RAR decryption is not implemented".into(),
            ));
        }
        other => {
            return Err(ArchiveError::UnsupportedFeature(format!(
                "{other} encryption in a {format} archive"
            )));
        }
    }

    if !codec::is_supported(entry.method()) {
        return Err(ArchiveError::UnsupportedCompression {
            method: entry.method().to_string(),
        });
    }
    stages.push(Stage::Decompress(entry.method().clone()));

    if let Some(crc) = entry.crc32() {
        stages.push(Stage::VerifyCrc(crc));
    }

    Ok(stages)
}

/// Returns the password to decrypt `entry` with, or `PasswordRequired` if the
/// entry is encrypted and no non-empty password is set.
pub(crate) fn require_password<'p>(
    entry: &EntryDescriptor,
    password: Option<&'p Password>,
) -> Result<Option<&'p Password>> {
    if !entry.is_encrypted() {
        return Ok(None);
    }
    match usable(password) {
        Some(password) => Ok(Some(password)),
        None => Err(ArchiveError::PasswordRequired {
            entry: entry.name().to_string(),
        }),
    }
}

/// Turns an entry's raw bytes into plaintext.
///
/// # Errors
///
/// - `PasswordRequired` for an encrypted entry without a password
/// - `IncorrectPassword` when the password fails verification, or when a
///   weakly verified password (ZipCrypto) produces undecodable data
/// - `CorruptArchive` for codec, CRC or authentication failures
/// - `UnsupportedCompression`, `UnsupportedFeature`, `QuotaExceeded`,
///   `ZipBomb` for entries the configuration or the decoder refuses
pub(crate) fn decode(
    raw: RawEntry<'_>,
    format: ArchiveFormat,
    entry: &EntryDescriptor,
    password: Option<&Password>,
    config: &SecurityConfig,
) -> Result<Vec<u8>> {
    let password = require_password(entry, password)?;
    check_declared_size(entry.uncompressed_size(), config)?;
    validate_compression_ratio(entry.compressed_size(), entry.uncompressed_size(), config)?;

    match raw {
        RawEntry::Empty => Ok(Vec::new()),
        RawEntry::Block(source) => {
            sevenz::read_block_entry(source, entry, password, config.max_entry_size)
        }
        RawEntry::Bytes(bytes) => {
            let stages = plan(format, entry)?;
            run(&stages, bytes, entry, password, config.max_entry_size)
        }
    }
}

fn run(
    stages: &[Stage],
    mut data: Vec<u8>,
    entry: &EntryDescriptor,
    password: Option<&Password>,
    limit: u64,
) -> Result<Vec<u8>> {
    let name = entry.name();
    let weak_verifier = matches!(entry.encryption(), Encryption::ZipCrypto { .. });
    let blame = |err: ArchiveError| {
        if weak_verifier && err.is_corruption() {
            ArchiveError::IncorrectPassword {
                entry: name.to_string(),
            }
        } else {
            err
        }
    };
    let key = || {
        password.map(Password::as_bytes).ok_or_else(|| ArchiveError::PasswordRequired {
            entry: name.to_string(),
        })
    };

    for stage in stages {
        trace!("{name}: {stage:?} over {} bytes", data.len());
        data = match stage {
            Stage::ZipCrypto { check_byte } => zipcrypto::decrypt(&data, key()?, *check_byte, name)?,
            Stage::WinZipAes { strength } => winzip_aes::decrypt(&data, key()?, *strength, name)?,
            Stage::Decompress(method) => codec::decompress(method, data, limit).map_err(blame)?,
            Stage::VerifyCrc(expected) => {
                let actual = crc32fast::hash(&data);
                if actual != *expected {
                    return Err(blame(ArchiveError::corrupt(format!(
                        "CRC mismatch for {name}: expected {expected:08x}, got {actual:08x}"
                    ))));
                }
                data
            }
        };
    }

    Ok(data)
}
