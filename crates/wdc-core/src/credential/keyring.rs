//! Keyring: a titled group of credentials

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::debug;

use super::observer::{Observers, TitleObserver};
use super::types::{validate_title, Credential};
use crate::error::{EntityKind, Result};

struct KeyringState {
    title: String,
    description: String,
    members: Vec<Credential>,
    modified: bool,
    observers: Observers,
}

struct KeyringShared {
    state: RwLock<KeyringState>,
}

impl KeyringShared {
    fn read(&self) -> RwLockReadGuard<'_, KeyringState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, KeyringState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TitleObserver for KeyringShared {
    fn credential_renamed(&self, credential: &Credential, old_title: &str) {
        let title = credential.title();
        let clashes = self
            .read()
            .members
            .iter()
            .filter(|member| member.has_title(&title))
            .count();

        if clashes > 1 {
            debug!(
                "Rejected rename of keyring member '{}' to '{}': title already in use",
                old_title, title
            );
            credential.restore_title(old_title.to_string());
        }
    }
}

/// A named, insertion-ordered set of credentials.
///
/// Members are unique by title, and renaming a member onto the title of
/// another member is reverted. Like [`Credential`], a `Keyring` is a shared
/// handle with equality and hashing by title only.
#[derive(Clone)]
pub struct Keyring {
    shared: Arc<KeyringShared>,
}

impl Keyring {
    /// Create an empty keyring with an empty description
    pub fn new(title: impl Into<String>) -> Result<Self> {
        let title = validate_title(EntityKind::Keyring, title.into())?;

        Ok(Self {
            shared: Arc::new(KeyringShared {
                state: RwLock::new(KeyringState {
                    title,
                    description: String::new(),
                    members: Vec::new(),
                    // Not yet persisted anywhere
                    modified: true,
                    observers: Observers::default(),
                }),
            }),
        })
    }

    fn as_observer(&self) -> Weak<dyn TitleObserver> {
        let shared: Arc<dyn TitleObserver> = self.shared.clone();
        Arc::downgrade(&shared)
    }

    pub fn title(&self) -> String {
        self.shared.read().title.clone()
    }

    pub fn description(&self) -> String {
        self.shared.read().description.clone()
    }

    /// Rename the keyring and notify observers.
    ///
    /// An observer may reject the new title by reverting it; the call still
    /// succeeds. Only an empty title is an error.
    pub fn set_title(&self, value: impl Into<String>) -> Result<()> {
        let value = validate_title(EntityKind::Keyring, value.into())?;

        let (old_title, observers) = {
            let mut state = self.shared.write();
            let old_title = std::mem::replace(&mut state.title, value);
            state.modified = true;
            (old_title, state.observers.live())
        };

        for observer in observers {
            observer.keyring_renamed(self, &old_title);
        }

        Ok(())
    }

    pub fn set_description(&self, value: impl Into<String>) {
        let mut state = self.shared.write();
        state.description = value.into();
        state.modified = true;
    }

    /// Add a credential. Returns `false` if a member with the same title
    /// is already present.
    pub fn add(&self, credential: &Credential) -> bool {
        {
            let mut state = self.shared.write();
            if state.members.iter().any(|member| member == credential) {
                return false;
            }
            state.members.push(credential.clone());
            state.modified = true;
        }

        credential.subscribe(self.as_observer());
        true
    }

    /// Remove the member with the same title as `credential`. Returns
    /// `false` if there is none.
    pub fn remove(&self, credential: &Credential) -> bool {
        let removed = {
            let mut state = self.shared.write();
            match state.members.iter().position(|member| member == credential) {
                Some(index) => {
                    state.modified = true;
                    state.members.remove(index)
                }
                None => return false,
            }
        };

        removed.unsubscribe(&self.as_observer());
        true
    }

    pub fn contains(&self, credential: &Credential) -> bool {
        self.shared
            .read()
            .members
            .iter()
            .any(|member| member == credential)
    }

    /// Members in insertion order
    pub fn members(&self) -> Vec<Credential> {
        self.shared.read().members.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.read().members.is_empty()
    }

    /// True if the keyring changed since it was created or imported
    pub fn is_modified(&self) -> bool {
        self.shared.read().modified
    }

    /// Register an observer for title changes
    pub fn subscribe(&self, observer: Weak<dyn TitleObserver>) {
        self.shared.write().observers.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Weak<dyn TitleObserver>) {
        self.shared.write().observers.unsubscribe(observer);
    }

    /// True if both handles refer to the same keyring
    pub fn same_entity(&self, other: &Keyring) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Put back a title without validation or notification
    pub(crate) fn restore_title(&self, title: String) {
        self.shared.write().title = title;
    }

    /// Forget pending changes after the keyring was rebuilt from storage
    pub(crate) fn mark_clean(&self) {
        self.shared.write().modified = false;
    }

    pub(crate) fn has_title(&self, title: &str) -> bool {
        self.shared.read().title == title
    }
}

impl PartialEq for Keyring {
    fn eq(&self, other: &Self) -> bool {
        self.same_entity(other) || self.shared.read().title == other.shared.read().title
    }
}

impl Eq for Keyring {}

impl Hash for Keyring {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shared.read().title.hash(state);
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.read();
        let members: Vec<String> = state.members.iter().map(Credential::title).collect();
        f.debug_struct("Keyring")
            .field("title", &state.title)
            .field("description", &state.description)
            .field("members", &members)
            .field("modified", &state.modified)
            .finish()
    }
}
