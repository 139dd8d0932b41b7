//! Password secrets with explicit destruction

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Secret material that can be revealed and destroyed
pub trait Password: Send + Sync {
    /// Independent copy of the secret bytes. The copy is wiped when dropped,
    /// so wiping it never affects the stored secret or other copies.
    fn reveal(&self) -> Zeroizing<Vec<u8>>;

    /// Overwrite the stored secret with zeros. Calling it again is a no-op.
    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;
}

/// Text password stored as UTF-8 bytes - automatically zeroed when dropped
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct TextPassword {
    data: Vec<u8>,
    #[zeroize(skip)]
    destroyed: bool,
}

impl TextPassword {
    /// Create a password, taking ownership of the bytes
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            destroyed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Password for TextPassword {
    fn reveal(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.data.clone())
    }

    fn destroy(&mut self) {
        self.data.as_mut_slice().zeroize();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl PartialEq for TextPassword {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for TextPassword {}

impl From<&str> for TextPassword {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for TextPassword {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<Vec<u8>> for TextPassword {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for TextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextPassword")
            .field("value", &"[REDACTED]")
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
