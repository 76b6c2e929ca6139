//! Traditional PKWARE ("ZipCrypto") stream cipher.
//!
//! The cipher keeps three 32-bit keys that are updated with every plaintext
//! byte. Encrypted data starts with a 12-byte header whose last decrypted byte
//! must equal the entry's check byte; this is the only password check the
//! scheme offers, so one wrong password in 256 slips through and is caught
//! later by the CRC.

use crate::ArchiveError;
use crate::Result;

/// Length of the encryption header preceding the data.
pub(crate) const HEADER_LEN: usize = 12;

/// One CRC-32 register step, without the pre/post inversion.
fn crc32_step(crc: u32, byte: u8) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(!crc);
    hasher.update(&[byte]);
    !hasher.finalize()
}

/// Cipher state for one entry. Never reused across entries.
#[derive(Debug, Clone)]
pub(crate) struct ZipCryptoKeys {
    keys: [u32; 3],
}

impl ZipCryptoKeys {
    pub(crate) fn new(password: &[u8]) -> Self {
        let mut state = Self {
            keys: [0x1234_5678, 0x2345_6789, 0x3456_7890],
        };
        for &byte in password {
            state.update(byte);
        }
        state
    }

    fn update(&mut self, byte: u8) {
        self.keys[0] = crc32_step(self.keys[0], byte);
        self.keys[1] = self.keys[1]
            .wrapping_add(self.keys[0] & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.keys[2] = crc32_step(self.keys[2], self.keys[1].to_be_bytes()[0]);
    }

    fn keystream_byte(&self) -> u8 {
        let temp = (self.keys[2] | 2) & 0xFFFF;
        (temp.wrapping_mul(temp ^ 1) >> 8).to_le_bytes()[0]
    }

    pub(crate) fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.keystream_byte();
        self.update(plain);
        plain
    }

    #[cfg(test)]
    pub(crate) fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.keystream_byte();
        self.update(plain);
        cipher
    }
}

/// Decrypts a ZipCrypto entry payload (header included).
///
/// Fails with `IncorrectPassword` when the decrypted check byte does not
/// match `check_byte`.
pub(crate) fn decrypt(
    data: &[u8],
    password: &[u8],
    check_byte: u8,
    entry: &str,
) -> Result<Vec<u8>> {
    if data.len() < HEADER_LEN {
        return Err(ArchiveError::corrupt(format!(
            "encrypted entry {entry} is shorter than its encryption header"
        )));
    }

    let mut keys = ZipCryptoKeys::new(password);
    let (header, body) = data.split_at(HEADER_LEN);

    let mut last = 0;
    for &byte in header {
        last = keys.decrypt_byte(byte);
    }
    if last != check_byte {
        return Err(ArchiveError::IncorrectPassword {
            entry: entry.to_string(),
        });
    }

    Ok(body.iter().map(|&b| keys.decrypt_byte(b)).collect())
}
