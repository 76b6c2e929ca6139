//! WinZip AES decryption (AE-1 and AE-2).
//!
//! Payload layout: salt, 2-byte password verifier, ciphertext, 10-byte
//! authentication code. Keys come from PBKDF2-HMAC-SHA1 with 1000 rounds;
//! the cipher is AES in CTR mode with a little-endian counter starting at 1;
//! the authentication code is HMAC-SHA1 over the ciphertext, truncated to 10
//! bytes.

use aes::Aes128;
use aes::Aes192;
use aes::Aes256;
use aes::cipher::BlockCipher;
use aes::cipher::BlockEncrypt;
use aes::cipher::BlockSizeUser;
use aes::cipher::KeyInit;
use aes::cipher::KeyIvInit;
use aes::cipher::StreamCipher;
use aes::cipher::consts::U16;
use ctr::Ctr128LE;
use hmac::Hmac;
use hmac::Mac;
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

use crate::ArchiveError;
use crate::Result;
use crate::types::AesStrength;

type HmacSha1 = Hmac<Sha1>;

const KDF_ROUNDS: u32 = 1000;
const VERIFIER_LEN: usize = 2;
pub(crate) const AUTH_CODE_LEN: usize = 10;

/// Key material derived from a password and salt.
struct DerivedKeys {
    material: Vec<u8>,
    key_len: usize,
}

impl DerivedKeys {
    fn derive(password: &[u8], salt: &[u8], strength: AesStrength) -> Self {
        let key_len = strength.key_len();
        let mut material = vec![0u8; 2 * key_len + VERIFIER_LEN];
        pbkdf2_hmac::<Sha1>(password, salt, KDF_ROUNDS, &mut material);
        Self { material, key_len }
    }

    fn encryption_key(&self) -> &[u8] {
        &self.material[..self.key_len]
    }

    fn mac_key(&self) -> &[u8] {
        &self.material[self.key_len..2 * self.key_len]
    }

    fn verifier(&self) -> &[u8] {
        &self.material[2 * self.key_len..]
    }
}

/// Decrypts a WinZip AES payload.
///
/// # Errors
///
/// - `IncorrectPassword` when the password verifier does not match
/// - `CorruptArchive` when the payload is too short or the authentication
///   code does not match
pub(crate) fn decrypt(
    data: &[u8],
    password: &[u8],
    strength: AesStrength,
    entry: &str,
) -> Result<Vec<u8>> {
    let salt_len = strength.salt_len();
    if data.len() < salt_len + VERIFIER_LEN + AUTH_CODE_LEN {
        return Err(ArchiveError::corrupt(format!(
            "AES entry {entry} is shorter than its salt, verifier and authentication code"
        )));
    }

    let (salt, rest) = data.split_at(salt_len);
    let (verifier, rest) = rest.split_at(VERIFIER_LEN);
    let (ciphertext, auth_code) = rest.split_at(rest.len() - AUTH_CODE_LEN);

    let keys = DerivedKeys::derive(password, salt, strength);
    if verifier != keys.verifier() {
        return Err(ArchiveError::IncorrectPassword {
            entry: entry.to_string(),
        });
    }

    let mut mac = <HmacSha1 as Mac>::new_from_slice(keys.mac_key())
        .map_err(|_| ArchiveError::corrupt("invalid HMAC key length"))?;
    mac.update(ciphertext);
    mac.verify_truncated_left(auth_code).map_err(|_| {
        ArchiveError::corrupt(format!("authentication code mismatch for {entry}"))
    })?;

    let mut plain = ciphertext.to_vec();
    apply_keystream(keys.encryption_key(), &mut plain)?;
    Ok(plain)
}

/// XORs `data` with the CTR keystream. Encryption and decryption are the
/// same operation.
pub(crate) fn apply_keystream(key: &[u8], data: &mut [u8]) -> Result<()> {
    match key.len() {
        16 => apply_ctr::<Aes128>(key, data),
        24 => apply_ctr::<Aes192>(key, data),
        32 => apply_ctr::<Aes256>(key, data),
        n => Err(ArchiveError::corrupt(format!("invalid AES key length {n}"))),
    }
}

fn apply_ctr<C>(key: &[u8], data: &mut [u8]) -> Result<()>
where
    C: BlockCipher + BlockEncrypt + KeyInit + BlockSizeUser<BlockSize = U16>,
{
    // WinZip counts blocks from 1, little-endian over the whole block.
    let iv = 1u128.to_le_bytes();
    let mut cipher = Ctr128LE::<C>::new_from_slices(key, &iv)
        .map_err(|_| ArchiveError::corrupt("invalid AES key"))?;
    cipher.apply_keystream(data);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encrypt(plain: &[u8], password: &[u8], strength: AesStrength) -> Vec<u8> {
        let salt: Vec<u8> = (0..strength.salt_len()).map(|i| i as u8).collect();
        let keys = DerivedKeys::derive(password, &salt, strength);
        let mut ciphertext = plain.to_vec();
        apply_keystream(keys.encryption_key(), &mut ciphertext).unwrap();

        let mut mac = <HmacSha1 as Mac>::new_from_slice(keys.mac_key()).unwrap();
        mac.update(&ciphertext);
        let tag = mac.finalize().into_bytes();

        let mut out = salt;
        out.extend_from_slice(keys.verifier());
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&tag[..AUTH_CODE_LEN]);
        out
    }

    #[test]
    fn test_roundtrip_all_strengths() {
        let plain = b"a message longer than one sixteen byte block";
        for strength in [AesStrength::Aes128, AesStrength::Aes192, AesStrength::Aes256] {
            let payload = encrypt(plain, b"pw", strength);
            assert_eq!(decrypt(&payload, b"pw", strength, "x").unwrap(), plain);
        }
    }

    #[test]
    fn test_wrong_password() {
        let payload = encrypt(b"data", b"right", AesStrength::Aes256);
        match decrypt(&payload, b"wrong", AesStrength::Aes256, "x") {
            // The 16-bit verifier lets one password in 65536 through; the MAC
            // catches it.
            Err(ArchiveError::IncorrectPassword { .. } | ArchiveError::CorruptArchive(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_tampered_ciphertext() {
        let mut payload = encrypt(b"important data", b"pw", AesStrength::Aes128);
        let index = AesStrength::Aes128.salt_len() + VERIFIER_LEN + 3;
        payload[index] ^= 0x01;
        assert!(matches!(
            decrypt(&payload, b"pw", AesStrength::Aes128, "x"),
            Err(ArchiveError::CorruptArchive(_))
        ));
    }

    #[test]
    fn test_short_payload() {
        assert!(matches!(
            decrypt(&[0u8; 12], b"pw", AesStrength::Aes256, "x"),
            Err(ArchiveError::CorruptArchive(_))
        ));
    }

    #[test]
    fn test_keystream_starts_at_counter_one() {
        let key = [7u8; 16];
        let mut data = vec![0u8; 32];
        apply_keystream(&key, &mut data).unwrap();

        let cipher = Aes128::new_from_slice(&key).unwrap();
        for (i, chunk) in data.chunks(16).enumerate() {
            let mut block = (i as u128 + 1).to_le_bytes().into();
            cipher.encrypt_block(&mut block);
            assert_eq!(chunk, block.as_slice());
        }
    }

    #[test]
    fn test_keystream_is_counter_mode() {
        let key = [7u8; 16];
        let mut a = vec![0u8; 40];
        apply_keystream(&key, &mut a).unwrap();
        assert_ne!(a[..16], a[16..32]);
        apply_keystream(&key, &mut a).unwrap();
        assert!(a.iter().all(|&b| b == 0));
    }
}
