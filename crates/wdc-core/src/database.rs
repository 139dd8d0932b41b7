//! Credential database
//!
//! Owns the credentials and keyrings of a session and is the single authority
//! on title uniqueness: no two credentials and no two keyrings may share a
//! title. Entities can be renamed directly through their handles, so the
//! database subscribes to every member and reverts renames that collide.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::debug;

use crate::credential::{Credential, Keyring, TitleObserver};

struct DatabaseShared {
    credentials: RwLock<Vec<Credential>>,
    keyrings: RwLock<Vec<Keyring>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl TitleObserver for DatabaseShared {
    fn credential_renamed(&self, credential: &Credential, old_title: &str) {
        let title = credential.title();
        let clashes = read(&self.credentials)
            .iter()
            .filter(|c| c.has_title(&title))
            .count();

        if clashes > 1 {
            debug!(
                "Rejected rename of credential '{}' to '{}': title already in use",
                old_title, title
            );
            credential.restore_title(old_title.to_string());
        }
    }

    fn keyring_renamed(&self, keyring: &Keyring, old_title: &str) {
        let title = keyring.title();
        let clashes = read(&self.keyrings)
            .iter()
            .filter(|k| k.has_title(&title))
            .count();

        if clashes > 1 {
            debug!(
                "Rejected rename of keyring '{}' to '{}': title already in use",
                old_title, title
            );
            keyring.restore_title(old_title.to_string());
        }
    }
}

/// Aggregate of all credentials and keyrings, and the unit of export
pub struct CredentialDatabase {
    shared: Arc<DatabaseShared>,
}

impl CredentialDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self {
            shared: Arc::new(DatabaseShared {
                credentials: RwLock::new(Vec::new()),
                keyrings: RwLock::new(Vec::new()),
            }),
        }
    }

    fn as_observer(&self) -> Weak<dyn TitleObserver> {
        let shared: Arc<dyn TitleObserver> = self.shared.clone();
        Arc::downgrade(&shared)
    }

    /// Add a credential. Returns `false` if a credential with the same title
    /// is already present.
    pub fn add_credential(&self, credential: &Credential) -> bool {
        {
            let mut credentials = write(&self.shared.credentials);
            if credentials.iter().any(|c| c == credential) {
                debug!("Credential '{}' already present", credential.title());
                return false;
            }
            credentials.push(credential.clone());
        }

        credential.subscribe(self.as_observer());
        debug!("Added credential '{}'", credential.title());
        true
    }

    /// Add a keyring. Returns `false` if a keyring with the same title is
    /// already present.
    pub fn add_keyring(&self, keyring: &Keyring) -> bool {
        {
            let mut keyrings = write(&self.shared.keyrings);
            if keyrings.iter().any(|k| k == keyring) {
                debug!("Keyring '{}' already present", keyring.title());
                return false;
            }
            keyrings.push(keyring.clone());
        }

        keyring.subscribe(self.as_observer());
        debug!("Added keyring '{}'", keyring.title());
        true
    }

    /// Remove the credential with the same title. Returns `false` if there
    /// is none.
    pub fn remove_credential(&self, credential: &Credential) -> bool {
        let removed = {
            let mut credentials = write(&self.shared.credentials);
            match credentials.iter().position(|c| c == credential) {
                Some(index) => credentials.remove(index),
                None => return false,
            }
        };

        removed.unsubscribe(&self.as_observer());
        debug!("Removed credential '{}'", removed.title());
        true
    }

    /// Remove the keyring with the same title. Returns `false` if there is
    /// none.
    pub fn remove_keyring(&self, keyring: &Keyring) -> bool {
        let removed = {
            let mut keyrings = write(&self.shared.keyrings);
            match keyrings.iter().position(|k| k == keyring) {
                Some(index) => keyrings.remove(index),
                None => return false,
            }
        };

        removed.unsubscribe(&self.as_observer());
        debug!("Removed keyring '{}'", removed.title());
        true
    }

    /// Get a credential by title
    pub fn credential(&self, title: &str) -> Option<Credential> {
        read(&self.shared.credentials)
            .iter()
            .find(|c| c.has_title(title))
            .cloned()
    }

    /// Get a keyring by title
    pub fn keyring(&self, title: &str) -> Option<Keyring> {
        read(&self.shared.keyrings)
            .iter()
            .find(|k| k.has_title(title))
            .cloned()
    }

    /// Credentials in insertion order
    pub fn credentials(&self) -> Vec<Credential> {
        read(&self.shared.credentials).clone()
    }

    /// Keyrings in insertion order
    pub fn keyrings(&self) -> Vec<Keyring> {
        read(&self.shared.keyrings).clone()
    }

    pub fn contains_credential(&self, credential: &Credential) -> bool {
        read(&self.shared.credentials).iter().any(|c| c == credential)
    }

    pub fn contains_keyring(&self, keyring: &Keyring) -> bool {
        read(&self.shared.keyrings).iter().any(|k| k == keyring)
    }

    pub fn credential_count(&self) -> usize {
        read(&self.shared.credentials).len()
    }

    pub fn keyring_count(&self) -> usize {
        read(&self.shared.keyrings).len()
    }

    pub fn is_empty(&self) -> bool {
        self.credential_count() == 0 && self.keyring_count() == 0
    }

    /// True if any credential or keyring has unsaved changes
    pub fn is_modified(&self) -> bool {
        read(&self.shared.credentials).iter().any(Credential::is_modified)
            || read(&self.shared.keyrings).iter().any(Keyring::is_modified)
    }

    /// Forget pending changes of every member, including keyring members
    pub(crate) fn mark_clean(&self) {
        for credential in read(&self.shared.credentials).iter() {
            credential.mark_clean();
        }
        for keyring in read(&self.shared.keyrings).iter() {
            keyring.mark_clean();
            for member in keyring.members() {
                member.mark_clean();
            }
        }
    }
}

impl Default for CredentialDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CredentialDatabase {
    fn drop(&mut self) {
        let observer = self.as_observer();
        for credential in read(&self.shared.credentials).iter() {
            credential.unsubscribe(&observer);
        }
        for keyring in read(&self.shared.keyrings).iter() {
            keyring.unsubscribe(&observer);
        }
    }
}

impl fmt::Debug for CredentialDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDatabase")
            .field("credentials", &read(&self.shared.credentials))
            .field("keyrings", &read(&self.shared.keyrings))
            .finish()
    }
}
