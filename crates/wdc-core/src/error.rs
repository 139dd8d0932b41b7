//! Error types for wdc-core

use std::fmt;

use thiserror::Error;

/// Result type alias for credential store operations
pub type Result<T> = std::result::Result<T, WdcError>;

/// Kind of titled entity, used in validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Credential,
    Keyring,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential => f.write_str("Credential"),
            Self::Keyring => f.write_str("Keyring"),
        }
    }
}

/// Reasons a ciphertext could not be turned back into plaintext
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptionFailure {
    #[error("invalid padding (wrong key or corrupted data)")]
    InvalidPadding,

    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    InvalidLength(usize),

    #[error("decrypted data is not a database stream (wrong key or corrupted data)")]
    WrongKey,
}

/// Credential store error types
#[derive(Error, Debug)]
pub enum WdcError {
    #[error("{0} title cannot be empty")]
    EmptyTitle(EntityKind),

    #[error("{0} title is missing")]
    MissingTitle(EntityKind),

    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedDigestAlgorithm(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Password has been destroyed")]
    PasswordDestroyed,

    #[error("Unsupported key length: {0} bytes (expected 16, 24 or 32)")]
    UnsupportedKeyLength(usize),

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Decryption failed: {0}")]
    Decryption(#[from] DecryptionFailure),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Decoded data is not a valid credential database: {0}")]
    DeserializationTypeMismatch(String),

    #[error("Malformed encryption record: {0}")]
    MalformedRecord(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WdcError {
    /// True for every failure caused by a wrong key or damaged ciphertext
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::Decryption(_))
    }
}

/// Failure of the export pipeline. The only error type surfaced by export.
#[derive(Error, Debug)]
#[error("Database export failed: {source}")]
pub struct DatabaseExportError {
    #[source]
    source: WdcError,
}

impl DatabaseExportError {
    /// The underlying failure
    pub fn cause(&self) -> &WdcError {
        &self.source
    }

    pub fn into_cause(self) -> WdcError {
        self.source
    }
}

impl From<WdcError> for DatabaseExportError {
    fn from(source: WdcError) -> Self {
        Self { source }
    }
}

/// Failure of the import pipeline. The only error type surfaced by import.
#[derive(Error, Debug)]
#[error("Database import failed: {source}")]
pub struct DatabaseImportError {
    #[source]
    source: WdcError,
}

impl DatabaseImportError {
    /// The underlying failure
    pub fn cause(&self) -> &WdcError {
        &self.source
    }

    pub fn into_cause(self) -> WdcError {
        self.source
    }
}

impl From<WdcError> for DatabaseImportError {
    fn from(source: WdcError) -> Self {
        Self { source }
    }
}
