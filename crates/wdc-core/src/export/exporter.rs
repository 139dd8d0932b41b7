//! Export: derive key -> serialize -> encrypt

use std::sync::Arc;

use tracing::info;

use super::{derive_key, WdcEncryptionRecord};
use crate::credential::Password;
use crate::crypto::{encrypt, BufferKind, BufferTracker, SecretBuffer};
use crate::database::CredentialDatabase;
use crate::error::{DatabaseExportError, Result};
use crate::serialization;
use crate::settings::ExportSettings;

/// Turns a database into an encrypted record
pub trait Exporter {
    fn export_database(
        &self,
        db: &CredentialDatabase,
    ) -> std::result::Result<WdcEncryptionRecord, DatabaseExportError>;
}

/// Exporter owning the password that protects its records
pub struct WdcExporter<P: Password> {
    password: P,
    settings: ExportSettings,
    tracker: Option<Arc<dyn BufferTracker>>,
}

impl<P: Password> WdcExporter<P> {
    pub fn new(password: P) -> Self {
        Self {
            password,
            settings: ExportSettings::default(),
            tracker: None,
        }
    }

    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Report every key and plaintext wipe to `tracker`
    pub fn with_tracker(mut self, tracker: Arc<dyn BufferTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Wipe the password; later exports fail
    pub fn destroy(&mut self) {
        self.password.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.password.is_destroyed()
    }
}

impl<P: Password> Exporter for WdcExporter<P> {
    fn export_database(
        &self,
        db: &CredentialDatabase,
    ) -> std::result::Result<WdcEncryptionRecord, DatabaseExportError> {
        export_with(db, &self.password, &self.settings, self.tracker.as_ref()).map_err(Into::into)
    }
}

/// Export `db` under `password` with default settings
pub fn export_database<P: Password + ?Sized>(
    db: &CredentialDatabase,
    password: &P,
) -> std::result::Result<WdcEncryptionRecord, DatabaseExportError> {
    export_with(db, password, &ExportSettings::default(), None).map_err(Into::into)
}

fn export_with<P: Password + ?Sized>(
    db: &CredentialDatabase,
    password: &P,
    settings: &ExportSettings,
    tracker: Option<&Arc<dyn BufferTracker>>,
) -> Result<WdcEncryptionRecord> {
    let key_derivation = settings.key_derivation()?;
    let key = derive_key(&key_derivation, password, tracker)?;

    let mut serialized = serialization::serialize(db)?;
    let plaintext = SecretBuffer::from_vec(std::mem::take(&mut *serialized), BufferKind::Plaintext)
        .track(tracker);

    let encrypted = encrypt(plaintext.as_slice(), key.as_bytes())?;

    info!(
        "Exported database ({} credentials, {} keyrings) using {}",
        db.credential_count(),
        db.keyring_count(),
        key_derivation.scheme()
    );
    Ok(WdcEncryptionRecord::new(key_derivation, encrypted))
}
