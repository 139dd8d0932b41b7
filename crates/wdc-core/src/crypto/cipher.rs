//! AES-CBC encryption with PKCS#7 padding
//!
//! The AES variant follows the key length: 16, 24 or 32 bytes select
//! AES-128, AES-192 or AES-256. Every encryption draws a fresh random IV.
//! - IV: 16 bytes (one AES block)
//! - Ciphertext: padded plaintext, always a non-empty multiple of 16 bytes

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use zeroize::Zeroizing;

use super::{BufferKind, SecretBuffer};
use crate::error::{DecryptionFailure, Result, WdcError};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Length of the initialization vector
pub const IV_LENGTH: usize = 16;

/// Ciphertext together with the IV it was produced under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Initialization vector (16 bytes for CBC)
    pub iv: [u8; IV_LENGTH],
    /// Encrypted, padded plaintext
    pub ciphertext: Vec<u8>,
}

/// Encrypt plaintext using AES-CBC with a random IV
///
/// # Arguments
/// * `plaintext` - The data to encrypt
/// * `key` - A 128, 192 or 256-bit key
///
/// # Returns
/// Encrypted data containing IV and ciphertext
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<EncryptedData> {
    let mut iv = [0u8; IV_LENGTH];
    rand::thread_rng().fill_bytes(&mut iv);

    encrypt_with_iv(plaintext, key, iv)
}

fn encrypt_with_iv(plaintext: &[u8], key: &[u8], iv: [u8; IV_LENGTH]) -> Result<EncryptedData> {
    let msg_len = plaintext.len();

    // Working copy holds plaintext until encrypted in place
    let mut buffer = Zeroizing::new(vec![0u8; padded_len(msg_len)]);
    buffer[..msg_len].copy_from_slice(plaintext);

    let ciphertext_len = match key.len() {
        16 => encrypt_blocks::<cbc::Encryptor<Aes128>>(key, &iv, &mut buffer, msg_len)?,
        24 => encrypt_blocks::<cbc::Encryptor<Aes192>>(key, &iv, &mut buffer, msg_len)?,
        32 => encrypt_blocks::<cbc::Encryptor<Aes256>>(key, &iv, &mut buffer, msg_len)?,
        other => return Err(WdcError::UnsupportedKeyLength(other)),
    };
    buffer.truncate(ciphertext_len);

    Ok(EncryptedData {
        iv,
        ciphertext: std::mem::take(&mut *buffer),
    })
}

fn encrypt_blocks<E>(key: &[u8], iv: &[u8], buffer: &mut [u8], msg_len: usize) -> Result<usize>
where
    E: KeyIvInit + BlockEncryptMut,
{
    let encryptor = E::new_from_slices(key, iv)
        .map_err(|_| WdcError::UnsupportedKeyLength(key.len()))?;

    let ciphertext = encryptor
        .encrypt_padded_mut::<Pkcs7>(buffer, msg_len)
        .map_err(|_| WdcError::EncryptionError("buffer too small for padding".to_string()))?;

    Ok(ciphertext.len())
}

/// Decrypt `buffer` in place and return the length of the plaintext prefix
///
/// On failure the buffer holds partially decrypted data; callers own it and
/// are responsible for wiping it.
pub fn decrypt_in_place(buffer: &mut [u8], key: &[u8], iv: &[u8; IV_LENGTH]) -> Result<usize> {
    if !matches!(key.len(), 16 | 24 | 32) {
        return Err(WdcError::UnsupportedKeyLength(key.len()));
    }
    if buffer.is_empty() || buffer.len() % BLOCK_SIZE != 0 {
        return Err(DecryptionFailure::InvalidLength(buffer.len()).into());
    }

    match key.len() {
        16 => decrypt_blocks::<cbc::Decryptor<Aes128>>(key, iv, buffer),
        24 => decrypt_blocks::<cbc::Decryptor<Aes192>>(key, iv, buffer),
        _ => decrypt_blocks::<cbc::Decryptor<Aes256>>(key, iv, buffer),
    }
}

fn decrypt_blocks<D>(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<usize>
where
    D: KeyIvInit + BlockDecryptMut,
{
    let decryptor = D::new_from_slices(key, iv)
        .map_err(|_| WdcError::UnsupportedKeyLength(key.len()))?;

    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(buffer)
        .map_err(|_| DecryptionFailure::InvalidPadding)?;

    Ok(plaintext.len())
}

/// Decrypt ciphertext using AES-CBC
///
/// # Arguments
/// * `encrypted` - The encrypted data containing IV and ciphertext
/// * `key` - The key used for encryption
///
/// # Returns
/// The decrypted plaintext in a buffer that wipes itself when dropped
pub fn decrypt(encrypted: &EncryptedData, key: &[u8]) -> Result<SecretBuffer> {
    let mut buffer = SecretBuffer::from_vec(encrypted.ciphertext.clone(), BufferKind::Plaintext);

    let len = decrypt_in_place(buffer.as_mut_slice(), key, &encrypted.iv)?;
    buffer.truncate(len);

    Ok(buffer)
}

/// Ciphertext length for a plaintext of `msg_len` bytes (PKCS#7 always pads)
fn padded_len(msg_len: usize) -> usize {
    (msg_len / BLOCK_SIZE + 1) * BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_derivation::derive_key;

    fn test_key() -> Vec<u8> {
        derive_key(b"test-password").as_bytes().to_vec()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"Hello, World!";

        let encrypted = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&encrypted, &key).unwrap();

        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_all_key_sizes_roundtrip() {
        let plaintext = b"the same secret under three key sizes";

        for len in [16usize, 24, 32] {
            let key = vec![0x5au8; len];
            let encrypted = encrypt(plaintext, &key).unwrap();
            let decrypted = decrypt(&encrypted, &key).unwrap();
            assert_eq!(decrypted.as_slice(), plaintext, "key length {}", len);
        }
    }

    #[test]
    fn test_ciphertext_is_padded() {
        let key = test_key();

        assert_eq!(encrypt(b"", &key).unwrap().ciphertext.len(), 16);
        assert_eq!(encrypt(&[1u8; 15], &key).unwrap().ciphertext.len(), 16);
        assert_eq!(encrypt(&[1u8; 16], &key).unwrap().ciphertext.len(), 32);

        let empty = encrypt(b"", &key).unwrap();
        assert!(decrypt(&empty, &key).unwrap().is_empty());
    }

    #[test]
    fn test_known_answer_aes128_cbc() {
        // NIST SP 800-38A, F.2.1 CBC-AES128.Encrypt, first block
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let mut iv = [0u8; IV_LENGTH];
        iv.copy_from_slice(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap());

        let encrypted = encrypt_with_iv(&plaintext, &key, iv).unwrap();
        assert_eq!(
            hex::encode(&encrypted.ciphertext[..16]),
            "7649abac8119b246cee98e9b12e9197d"
        );
    }

    #[test]
    fn test_different_ivs_produce_different_ciphertext() {
        let key = test_key();
        let plaintext = b"same plaintext";

        let encrypted1 = encrypt(plaintext, &key).unwrap();
        let encrypted2 = encrypt(plaintext, &key).unwrap();

        // IVs should be different (random)
        assert_ne!(encrypted1.iv, encrypted2.iv);
        // Ciphertexts should be different due to different IVs
        assert_ne!(encrypted1.ciphertext, encrypted2.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let plaintext = b"secret data that spans more than one block";
        let encrypted = encrypt(plaintext, &test_key()).unwrap();
        let wrong_key = derive_key(b"another-password");

        // Padding can validate by chance; the plaintext never comes back
        match decrypt(&encrypted, wrong_key.as_bytes()) {
            Err(e) => assert!(e.is_decryption_failure()),
            Ok(decrypted) => assert_ne!(decrypted.as_slice(), plaintext),
        }
    }

    #[test]
    fn test_tampered_ciphertext_fails_decryption() {
        let key = test_key();
        let plaintext = b"secret data";

        let mut encrypted = encrypt(plaintext, &key).unwrap();
        let last = encrypted.ciphertext.len() - 1;
        encrypted.ciphertext[last] ^= 0xFF;

        match decrypt(&encrypted, &key) {
            Err(e) => assert!(e.is_decryption_failure()),
            Ok(decrypted) => assert_ne!(decrypted.as_slice(), plaintext),
        }
    }

    #[test]
    fn test_unsupported_key_length() {
        let key = vec![1u8; 20];

        assert!(matches!(
            encrypt(b"data", &key),
            Err(WdcError::UnsupportedKeyLength(20))
        ));

        let encrypted = EncryptedData {
            iv: [0u8; IV_LENGTH],
            ciphertext: vec![0u8; 16],
        };
        assert!(matches!(
            decrypt(&encrypted, &key),
            Err(WdcError::UnsupportedKeyLength(20))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let key = test_key();
        let mut encrypted = encrypt(b"some secret data", &key).unwrap();
        encrypted.ciphertext.truncate(20);

        assert!(matches!(
            decrypt(&encrypted, &key),
            Err(WdcError::Decryption(DecryptionFailure::InvalidLength(20)))
        ));
    }
}
