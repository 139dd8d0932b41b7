//! Password-based key derivation
//!
//! Two schemes are supported:
//! - `Sha256`: the legacy WDC scheme, a single unsalted SHA-256 digest of the
//!   UTF-8 password. Weak against brute force, kept so existing records open.
//! - `Argon2id`: salted, memory-hard derivation. The salt and cost parameters
//!   travel in the record header.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::digest::generic_array::GenericArray;
use sha2::{Digest, Sha256};

use super::DerivedKey;
use crate::error::{Result, WdcError};

/// Length in bytes of every derived key
pub const KEY_LENGTH: usize = 32;

/// Length in bytes of generated Argon2id salts
pub const SALT_LENGTH: usize = 16;

/// Largest accepted Argon2id memory cost in KiB (1 GiB)
pub const MAX_MEMORY_COST: u32 = 1 << 20;

/// Largest accepted Argon2id time cost
pub const MAX_TIME_COST: u32 = 16;

/// Largest accepted Argon2id parallelism
pub const MAX_PARALLELISM: u32 = 16;

/// Parameters for Argon2id key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyDerivationParams {
    /// Memory cost in KiB (default: 65536 = 64MB)
    pub memory_cost: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KeyDerivationParams {
    /// Reject costs above the accepted bounds
    pub fn validate(&self) -> Result<()> {
        if self.memory_cost > MAX_MEMORY_COST {
            return Err(out_of_range("memory cost", self.memory_cost, MAX_MEMORY_COST));
        }
        if self.time_cost > MAX_TIME_COST {
            return Err(out_of_range("time cost", self.time_cost, MAX_TIME_COST));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(out_of_range("parallelism", self.parallelism, MAX_PARALLELISM));
        }
        Ok(())
    }
}

fn out_of_range(name: &str, value: u32, max: u32) -> WdcError {
    WdcError::KeyDerivationError(format!("{} {} exceeds maximum {}", name, value, max))
}

/// Key derivation algorithm, without per-record inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfScheme {
    Sha256,
    Argon2id,
}

impl KdfScheme {
    /// Identifier stored in the record header
    pub fn id(self) -> u8 {
        match self {
            Self::Sha256 => 1,
            Self::Argon2id => 2,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Self::Sha256),
            2 => Ok(Self::Argon2id),
            other => Err(WdcError::UnsupportedDigestAlgorithm(format!(
                "algorithm id {}",
                other
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Argon2id => "argon2id",
        }
    }
}

impl fmt::Display for KdfScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KdfScheme {
    type Err = WdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "argon2id" => Ok(Self::Argon2id),
            _ => Err(WdcError::UnsupportedDigestAlgorithm(s.to_string())),
        }
    }
}

/// A fully specified derivation: scheme plus the inputs stored with a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDerivation {
    Sha256,
    Argon2id {
        params: KeyDerivationParams,
        salt: Vec<u8>,
    },
}

impl KeyDerivation {
    /// Argon2id with a freshly generated salt
    pub fn argon2id(params: KeyDerivationParams) -> Self {
        Self::Argon2id {
            params,
            salt: generate_salt(),
        }
    }

    /// Fresh derivation inputs for a new export under `scheme`
    pub fn for_scheme(scheme: KdfScheme, params: KeyDerivationParams) -> Self {
        match scheme {
            KdfScheme::Sha256 => Self::Sha256,
            KdfScheme::Argon2id => Self::argon2id(params),
        }
    }

    pub fn scheme(&self) -> KdfScheme {
        match self {
            Self::Sha256 => KdfScheme::Sha256,
            Self::Argon2id { .. } => KdfScheme::Argon2id,
        }
    }

    /// Derive a key from the UTF-8 bytes of a password
    pub fn derive(&self, password: &[u8]) -> Result<DerivedKey> {
        match self {
            Self::Sha256 => Ok(derive_key(password)),
            Self::Argon2id { params, salt } => derive_argon2id(password, salt, params),
        }
    }
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self::Sha256
    }
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key as the SHA-256 digest of the password bytes
pub fn derive_key(password: &[u8]) -> DerivedKey {
    let mut key = DerivedKey::zeroed(KEY_LENGTH);

    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.finalize_into(GenericArray::from_mut_slice(key.as_mut_bytes()));

    key
}

fn derive_argon2id(
    password: &[u8],
    salt: &[u8],
    params: &KeyDerivationParams,
) -> Result<DerivedKey> {
    params.validate()?;

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| WdcError::KeyDerivationError(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = DerivedKey::zeroed(KEY_LENGTH);
    argon2
        .hash_password_into(password, salt, key.as_mut_bytes())
        .map_err(|e| WdcError::KeyDerivationError(e.to_string()))?;

    Ok(key)
}
