//! Import: derive key -> decrypt -> deserialize

use std::sync::Arc;

use tracing::info;

use super::{derive_key, WdcEncryptionRecord};
use crate::credential::Password;
use crate::crypto::{decrypt_in_place, BufferKind, BufferTracker, SecretBuffer};
use crate::database::CredentialDatabase;
use crate::error::{DatabaseImportError, DecryptionFailure, Result};
use crate::serialization;

/// Rebuilds a database from an encrypted record
pub trait Importer {
    fn import_database(
        &self,
        record: &WdcEncryptionRecord,
    ) -> std::result::Result<CredentialDatabase, DatabaseImportError>;
}

/// Importer owning the password that unlocks records
pub struct WdcImporter<P: Password> {
    password: P,
    tracker: Option<Arc<dyn BufferTracker>>,
}

impl<P: Password> WdcImporter<P> {
    pub fn new(password: P) -> Self {
        Self {
            password,
            tracker: None,
        }
    }

    /// Report every key and plaintext wipe to `tracker`
    pub fn with_tracker(mut self, tracker: Arc<dyn BufferTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Wipe the password; later imports fail
    pub fn destroy(&mut self) {
        self.password.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.password.is_destroyed()
    }
}

impl<P: Password> Importer for WdcImporter<P> {
    fn import_database(
        &self,
        record: &WdcEncryptionRecord,
    ) -> std::result::Result<CredentialDatabase, DatabaseImportError> {
        import_with(record, &self.password, self.tracker.as_ref()).map_err(Into::into)
    }
}

/// Import a record protected by `password`
pub fn import_database<P: Password + ?Sized>(
    record: &WdcEncryptionRecord,
    password: &P,
) -> std::result::Result<CredentialDatabase, DatabaseImportError> {
    import_with(record, password, None).map_err(Into::into)
}

fn import_with<P: Password + ?Sized>(
    record: &WdcEncryptionRecord,
    password: &P,
    tracker: Option<&Arc<dyn BufferTracker>>,
) -> Result<CredentialDatabase> {
    let key = derive_key(&record.key_derivation, password, tracker)?;

    let mut plaintext =
        SecretBuffer::from_vec(record.ciphertext.clone(), BufferKind::Plaintext).track(tracker);
    let len = decrypt_in_place(plaintext.as_mut_slice(), key.as_bytes(), &record.iv)?;
    plaintext.truncate(len);

    // Padding can check out under a wrong key; the stream header cannot
    if !serialization::has_stream_header(plaintext.as_slice()) {
        return Err(DecryptionFailure::WrongKey.into());
    }

    let db = serialization::deserialize(plaintext.as_slice())?;
    info!(
        "Imported database ({} credentials, {} keyrings)",
        db.credential_count(),
        db.keyring_count()
    );
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{Credential, TextPassword};
    use crate::crypto::secure_memory::tests::RecordingTracker;
    use crate::crypto::{derive_key as sha256_key, encrypt, KeyDerivation, KeyDerivationParams};
    use crate::error::WdcError;
    use crate::export::{export_database, Exporter, WdcExporter};
    use crate::serialization::tests::{assert_same_content, sample_database};
    use crate::settings::ExportSettings;

    fn record_for_plaintext(plaintext: &[u8], password: &str) -> WdcEncryptionRecord {
        let key = sha256_key(password.as_bytes());
        let encrypted = encrypt(plaintext, key.as_bytes()).unwrap();
        WdcEncryptionRecord::new(KeyDerivation::Sha256, encrypted)
    }

    #[test]
    fn test_roundtrip() {
        let db = sample_database();
        let password = TextPassword::from("this is a test password");

        let record = export_database(&db, &password).unwrap();
        let imported = import_database(&record, &password).unwrap();

        assert_same_content(&db, &imported);
        assert!(!imported.is_modified());
    }

    #[test]
    fn test_roundtrip_through_record_bytes() {
        let db = sample_database();
        let password = TextPassword::from("pw");

        let hex = export_database(&db, &password).unwrap().to_hex().unwrap();
        let record = WdcEncryptionRecord::from_hex(&hex).unwrap();

        assert_same_content(&db, &import_database(&record, &password).unwrap());
    }

    #[test]
    fn test_argon2id_roundtrip() {
        let db = sample_database();
        let settings = ExportSettings::argon2id(KeyDerivationParams {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
        });
        let exporter = WdcExporter::new(TextPassword::from("pw")).with_settings(settings);

        let record = exporter.export_database(&db).unwrap();
        assert!(matches!(record.key_derivation, KeyDerivation::Argon2id { .. }));

        let importer = WdcImporter::new(TextPassword::from("pw"));
        assert_same_content(&db, &importer.import_database(&record).unwrap());
    }

    #[test]
    fn test_excessive_argon2_costs_fail_cleanly() {
        let mut record = export_database(&sample_database(), &TextPassword::from("pw")).unwrap();
        record.key_derivation = KeyDerivation::Argon2id {
            params: KeyDerivationParams {
                memory_cost: u32::MAX,
                time_cost: 1,
                parallelism: 1,
            },
            salt: vec![1u8; 16],
        };

        let err = import_database(&record, &TextPassword::from("pw")).unwrap_err();
        assert!(matches!(err.cause(), WdcError::KeyDerivationError(_)));
    }

    #[test]
    fn test_wrong_password_fails_decryption() {
        let record = export_database(&sample_database(), &TextPassword::from("right")).unwrap();

        let err = import_database(&record, &TextPassword::from("wrong")).unwrap_err();
        assert!(err.cause().is_decryption_failure());
        assert!(err.to_string().starts_with("Database import failed"));
    }

    #[test]
    fn test_shared_credential_stays_shared() {
        let password = TextPassword::from("pw");
        let record = export_database(&sample_database(), &password).unwrap();
        let imported = import_database(&record, &password).unwrap();

        let third = imported.credential("third").unwrap();
        let in_keyring = imported
            .keyring("first")
            .unwrap()
            .members()
            .into_iter()
            .find(|c| c.title() == "third")
            .unwrap();
        assert!(third.same_entity(&in_keyring));

        // The rename protocol is wired up again after import
        let first = imported.credential("first").unwrap();
        third.set_title("first").unwrap();
        assert_eq!(third.title(), "third");
        first.set_title("renamed").unwrap();
        assert_eq!(first.title(), "renamed");
    }

    #[test]
    fn test_import_wipes_on_success() {
        let password = TextPassword::from("pw");
        let record = export_database(&sample_database(), &password).unwrap();
        let tracker = RecordingTracker::new();

        WdcImporter::new(password)
            .with_tracker(tracker.clone())
            .import_database(&record)
            .unwrap();

        assert_eq!(tracker.count(BufferKind::DerivedKey), 1);
        assert_eq!(tracker.count(BufferKind::Plaintext), 1);
        assert!(tracker.all_zeroed());
    }

    #[test]
    fn test_import_wipes_on_failure() {
        let record = export_database(&sample_database(), &TextPassword::from("right")).unwrap();
        let tracker = RecordingTracker::new();

        let importer = WdcImporter::new(TextPassword::from("wrong")).with_tracker(tracker.clone());
        assert!(importer.import_database(&record).is_err());

        assert_eq!(tracker.count(BufferKind::DerivedKey), 1);
        assert_eq!(tracker.count(BufferKind::Plaintext), 1);
        assert!(tracker.all_zeroed());
    }

    #[test]
    fn test_missing_header_is_wrong_key() {
        let record = record_for_plaintext(b"{\"credentials\":[]}", "pw");

        let err = import_database(&record, &TextPassword::from("pw")).unwrap_err();
        assert!(matches!(
            err.cause(),
            WdcError::Decryption(DecryptionFailure::WrongKey)
        ));
    }

    #[test]
    fn test_not_a_database_is_type_mismatch() {
        let tracker = RecordingTracker::new();
        let record = record_for_plaintext(b"WDCS\x01\"just a string\"", "pw");

        let err = WdcImporter::new(TextPassword::from("pw"))
            .with_tracker(tracker.clone())
            .import_database(&record)
            .unwrap_err();

        assert!(matches!(err.cause(), WdcError::DeserializationTypeMismatch(_)));
        assert!(!err.to_string().contains("just a string"));
        assert_eq!(tracker.count(BufferKind::Plaintext), 1);
        assert!(tracker.all_zeroed());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let password = TextPassword::from("pw");
        let mut record = export_database(&sample_database(), &password).unwrap();
        record.ciphertext.truncate(record.ciphertext.len() - 3);

        let err = import_database(&record, &password).unwrap_err();
        assert!(matches!(
            err.cause(),
            WdcError::Decryption(DecryptionFailure::InvalidLength(_))
        ));
    }

    #[test]
    fn test_destroyed_importer_refuses() {
        let record = export_database(&sample_database(), &TextPassword::from("pw")).unwrap();
        let mut importer = WdcImporter::new(TextPassword::from("pw"));
        importer.destroy();

        assert!(importer.is_destroyed());
        assert!(matches!(
            importer.import_database(&record).unwrap_err().cause(),
            WdcError::PasswordDestroyed
        ));
    }

    #[test]
    fn test_empty_database_roundtrip() {
        let password = TextPassword::from("pw");
        let record = export_database(&CredentialDatabase::new(), &password).unwrap();

        let imported = import_database(&record, &password).unwrap();
        assert!(imported.is_empty());

        let lone = Credential::new("lone").unwrap();
        assert!(imported.add_credential(&lone));
        assert!(imported.is_modified());
    }
}
