//! Cryptographic primitives for the WDC export format
//!
//! This module provides:
//! - AES-CBC encryption with PKCS#7 padding
//! - SHA-256 (legacy) and Argon2id key derivation from passwords
//! - Secure memory handling with zeroize

mod cipher;
mod key_derivation;
pub(crate) mod secure_memory;

pub use cipher::{decrypt, decrypt_in_place, encrypt, EncryptedData, BLOCK_SIZE, IV_LENGTH};
pub use key_derivation::{
    derive_key, generate_salt, KdfScheme, KeyDerivation, KeyDerivationParams, KEY_LENGTH,
    MAX_MEMORY_COST, MAX_PARALLELISM, MAX_TIME_COST, SALT_LENGTH,
};
pub use secure_memory::{BufferKind, BufferTracker, DerivedKey, SecretBuffer};
