//! Credential entity

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use zeroize::Zeroizing;

use super::observer::{Observers, TitleObserver};
use super::password::{Password, TextPassword};
use crate::error::{EntityKind, Result, WdcError};

/// Reject an empty title for an entity of `kind`
pub(crate) fn validate_title(kind: EntityKind, title: String) -> Result<String> {
    if title.is_empty() {
        return Err(WdcError::EmptyTitle(kind));
    }
    Ok(title)
}

struct CredentialState {
    title: String,
    description: String,
    user: String,
    password: Option<TextPassword>,
    modified: bool,
    observers: Observers,
}

/// A named secret record.
///
/// `Credential` is a shared handle: clones refer to the same record, so a
/// credential held by a database and by a keyring is renamed for both.
/// Equality and hashing use the title only.
#[derive(Clone)]
pub struct Credential {
    inner: Arc<RwLock<CredentialState>>,
}

impl Credential {
    /// Create a credential with an empty description, user and no password
    pub fn new(title: impl Into<String>) -> Result<Self> {
        let title = validate_title(EntityKind::Credential, title.into())?;

        Ok(Self {
            inner: Arc::new(RwLock::new(CredentialState {
                title,
                description: String::new(),
                user: String::new(),
                password: None,
                // Not yet persisted anywhere
                modified: true,
                observers: Observers::default(),
            })),
        })
    }

    /// Create a credential with a user name and password
    pub fn with_login(
        title: impl Into<String>,
        user: impl Into<String>,
        password: TextPassword,
    ) -> Result<Self> {
        let credential = Self::new(title)?;
        credential.set_user(user);
        credential.set_password(Some(password));
        Ok(credential)
    }

    fn read(&self) -> RwLockReadGuard<'_, CredentialState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CredentialState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn title(&self) -> String {
        self.read().title.clone()
    }

    pub fn description(&self) -> String {
        self.read().description.clone()
    }

    pub fn user(&self) -> String {
        self.read().user.clone()
    }

    /// Independent copy of the stored password
    pub fn password(&self) -> Option<TextPassword> {
        self.read().password.clone()
    }

    /// Copy of the password bytes, wiped when dropped
    pub fn reveal_password(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.read().password.as_ref().map(|p| p.reveal())
    }

    pub fn has_password(&self) -> bool {
        self.read().password.is_some()
    }

    /// Rename the credential and notify observers.
    ///
    /// An observer may reject the new title by reverting it; the call still
    /// succeeds. Only an empty title is an error.
    pub fn set_title(&self, value: impl Into<String>) -> Result<()> {
        let value = validate_title(EntityKind::Credential, value.into())?;

        let (old_title, observers) = {
            let mut state = self.write();
            let old_title = std::mem::replace(&mut state.title, value);
            state.modified = true;
            (old_title, state.observers.live())
        };

        for observer in observers {
            observer.credential_renamed(self, &old_title);
        }

        Ok(())
    }

    pub fn set_description(&self, value: impl Into<String>) {
        let mut state = self.write();
        state.description = value.into();
        state.modified = true;
    }

    pub fn set_user(&self, value: impl Into<String>) {
        let mut state = self.write();
        state.user = value.into();
        state.modified = true;
    }

    pub fn set_password(&self, value: Option<TextPassword>) {
        let mut state = self.write();
        state.password = value;
        state.modified = true;
    }

    /// True if the credential changed since it was created or imported
    pub fn is_modified(&self) -> bool {
        self.read().modified
    }

    /// Register an observer for title changes
    pub fn subscribe(&self, observer: Weak<dyn TitleObserver>) {
        self.write().observers.subscribe(observer);
    }

    pub fn unsubscribe(&self, observer: &Weak<dyn TitleObserver>) {
        self.write().observers.unsubscribe(observer);
    }

    /// True if both handles refer to the same record
    pub fn same_entity(&self, other: &Credential) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Put back a title without validation or notification
    pub(crate) fn restore_title(&self, title: String) {
        self.write().title = title;
    }

    /// Forget pending changes after the credential was rebuilt from storage
    pub(crate) fn mark_clean(&self) {
        self.write().modified = false;
    }

    pub(crate) fn has_title(&self, title: &str) -> bool {
        self.read().title == title
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.same_entity(other) || self.read().title == other.read().title
    }
}

impl Eq for Credential {}

impl Hash for Credential {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.read().title.hash(state);
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Credential")
            .field("title", &state.title)
            .field("description", &state.description)
            .field("user", &state.user)
            .field("password", &state.password.as_ref().map(|_| "[REDACTED]"))
            .field("modified", &state.modified)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::sync::Mutex;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_gets_and_sets() {
        let c1 = Credential::with_login("First", "god", TextPassword::from("one")).unwrap();

        assert_eq!(c1.title(), "First");
        assert_eq!(c1.description(), "");
        assert_eq!(c1.user(), "god");
        assert_eq!(c1.reveal_password().unwrap().as_slice(), b"one");

        c1.set_title("Old").unwrap();
        c1.set_user("sprout");
        c1.set_password(Some(TextPassword::from("yeah")));
        c1.set_description("Doesn't matter");

        assert_eq!(c1.title(), "Old");
        assert_eq!(c1.description(), "Doesn't matter");
        assert_eq!(c1.user(), "sprout");
        assert_eq!(c1.password(), Some(TextPassword::from("yeah")));
    }

    #[test]
    fn test_equality_by_title_only() {
        let c1 = Credential::with_login("First", "god", TextPassword::from("one")).unwrap();
        let c2 = Credential::new("First").unwrap();
        let c3 = Credential::with_login("Third", "god", TextPassword::from("one")).unwrap();

        assert_eq!(c1, c2);
        assert_ne!(c1, c3);
        assert!(!c1.same_entity(&c2));
        assert!(c1.same_entity(&c1.clone()));
    }

    #[test]
    fn test_hash_follows_title() {
        let title = "This is a test string";
        let c = Credential::new(title).unwrap();
        assert_eq!(hash_of(&c), hash_of(&title.to_string()));
    }

    #[test]
    fn test_empty_title_rejected() {
        assert!(matches!(
            Credential::new(""),
            Err(WdcError::EmptyTitle(EntityKind::Credential))
        ));

        let c = Credential::new("valid").unwrap();
        assert!(matches!(
            c.set_title(""),
            Err(WdcError::EmptyTitle(EntityKind::Credential))
        ));
        assert_eq!(c.title(), "valid");
    }

    #[test]
    fn test_new_credential_is_modified_until_marked_clean() {
        let c = Credential::new("fresh").unwrap();
        assert!(c.is_modified());

        c.mark_clean();
        assert!(!c.is_modified());

        c.set_description("changed");
        assert!(c.is_modified());
    }

    struct Recorder {
        renames: Mutex<Vec<(String, String)>>,
    }

    impl TitleObserver for Recorder {
        fn credential_renamed(&self, credential: &Credential, old_title: &str) {
            self.renames
                .lock()
                .unwrap()
                .push((old_title.to_string(), credential.title()));
        }
    }

    #[test]
    fn test_every_rename_is_notified() {
        let recorder = Arc::new(Recorder {
            renames: Mutex::new(Vec::new()),
        });
        let observer: Arc<dyn TitleObserver> = recorder.clone();

        let c = Credential::new("a").unwrap();
        c.subscribe(Arc::downgrade(&observer));
        c.set_title("b").unwrap();
        c.set_title("c").unwrap();

        assert_eq!(
            *recorder.renames.lock().unwrap(),
            vec![
                ("a".to_string(), "b".to_string()),
                ("b".to_string(), "c".to_string())
            ]
        );

        c.unsubscribe(&Arc::downgrade(&observer));
        c.set_title("d").unwrap();
        assert_eq!(recorder.renames.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_debug_hides_password() {
        let c = Credential::with_login("mail", "me", TextPassword::from("hunter2")).unwrap();
        let debug = format!("{:?}", c);
        assert!(debug.contains("mail"));
        assert!(!debug.contains("hunter2"));
    }
}
