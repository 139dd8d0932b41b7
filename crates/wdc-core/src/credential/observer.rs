//! Rename notifications between entities and the collections holding them
//!
//! A collection subscribes to every entity it inserts and unsubscribes on
//! removal. Entities hold their observers weakly, so an observer that has been
//! dropped silently stops receiving callbacks.

use std::sync::{Arc, Weak};

use super::{Credential, Keyring};

/// Receives a callback after an entity's title changed.
///
/// Callbacks run after the entity released its own lock, so an observer may
/// read the entity and force its title back with a revert.
pub trait TitleObserver: Send + Sync {
    fn credential_renamed(&self, _credential: &Credential, _old_title: &str) {}

    fn keyring_renamed(&self, _keyring: &Keyring, _old_title: &str) {}
}

/// Weak observer registrations of a single entity
#[derive(Default)]
pub(crate) struct Observers {
    entries: Vec<Weak<dyn TitleObserver>>,
}

impl Observers {
    /// Register `observer`; registering the same observer twice is a no-op
    pub(crate) fn subscribe(&mut self, observer: Weak<dyn TitleObserver>) {
        if !self.entries.iter().any(|o| same_observer(o, &observer)) {
            self.entries.push(observer);
        }
    }

    pub(crate) fn unsubscribe(&mut self, observer: &Weak<dyn TitleObserver>) {
        self.entries.retain(|o| !same_observer(o, observer));
    }

    /// Live observers, pruning the ones that have been dropped
    pub(crate) fn live(&mut self) -> Vec<Arc<dyn TitleObserver>> {
        self.entries.retain(|o| o.strong_count() > 0);
        self.entries.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.iter().filter(|o| o.strong_count() > 0).count()
    }
}

fn same_observer(a: &Weak<dyn TitleObserver>, b: &Weak<dyn TitleObserver>) -> bool {
    // Compare data addresses only; vtable pointers may differ across codegen units
    std::ptr::eq(a.as_ptr() as *const (), b.as_ptr() as *const ())
}
