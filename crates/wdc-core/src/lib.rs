//! # wdc-core
//!
//! In-memory credential store with a password-protected export format:
//! - Credentials and keyrings whose titles stay unique under renames
//! - SHA-256 (legacy) or Argon2id key derivation
//! - AES-CBC encryption of the serialized database ("WDC" records)
//! - Zeroize-on-drop handling of passwords, keys and plaintext

pub mod credential;
pub mod crypto;
pub mod database;
pub mod error;
pub mod export;
pub mod serialization;
pub mod settings;

pub use credential::{Credential, Keyring, Password, TextPassword, TitleObserver};
pub use database::CredentialDatabase;
pub use error::{DatabaseExportError, DatabaseImportError, DecryptionFailure, Result, WdcError};
pub use export::{
    export_database, import_database, Exporter, Importer, WdcEncryptionRecord, WdcExporter,
    WdcImporter,
};
pub use settings::ExportSettings;
