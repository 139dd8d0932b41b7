//! Password-protected export and import of a credential database
//!
//! Export: derive key -> serialize -> encrypt. Import: derive key ->
//! decrypt -> deserialize. Key material and plaintext live in
//! [`SecretBuffer`](crate::crypto::SecretBuffer)s, so they are zeroed on every
//! exit path.

mod exporter;
mod importer;
mod record;

use std::sync::Arc;

use crate::credential::Password;
use crate::crypto::{BufferTracker, DerivedKey, KeyDerivation};
use crate::error::{Result, WdcError};

pub use exporter::{export_database, Exporter, WdcExporter};
pub use importer::{import_database, Importer, WdcImporter};
pub use record::WdcEncryptionRecord;

fn derive_key<P: Password + ?Sized>(
    key_derivation: &KeyDerivation,
    password: &P,
    tracker: Option<&Arc<dyn BufferTracker>>,
) -> Result<DerivedKey> {
    if password.is_destroyed() {
        return Err(WdcError::PasswordDestroyed);
    }

    let revealed = password.reveal();
    Ok(key_derivation.derive(&revealed)?.track(tracker))
}
