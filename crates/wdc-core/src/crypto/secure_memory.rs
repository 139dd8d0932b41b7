//! Secure memory handling with automatic zeroization

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

/// What a [`SecretBuffer`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Key material derived from a password
    DerivedKey,
    /// A serialized database in clear
    Plaintext,
}

/// Receives a callback every time a tracked secret buffer is wiped.
///
/// `wiped` is the buffer contents right after zeroization and before the
/// memory is released, so an implementation can check that nothing
/// recoverable is left behind.
pub trait BufferTracker: Send + Sync {
    fn on_wipe(&self, kind: BufferKind, wiped: &[u8]);
}

/// Heap buffer holding secret bytes, zeroed when dropped
pub struct SecretBuffer {
    bytes: Vec<u8>,
    kind: BufferKind,
    tracker: Option<Arc<dyn BufferTracker>>,
}

impl SecretBuffer {
    /// Take ownership of `bytes`; they are wiped when the buffer drops
    pub fn from_vec(bytes: Vec<u8>, kind: BufferKind) -> Self {
        Self {
            bytes,
            kind,
            tracker: None,
        }
    }

    /// Report the eventual wipe of this buffer to `tracker`
    pub fn track(mut self, tracker: Option<&Arc<dyn BufferTracker>>) -> Self {
        self.tracker = tracker.cloned();
        self
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Get the secret bytes (use carefully - avoid copying)
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Shorten the buffer, zeroing the bytes that are cut off
    pub fn truncate(&mut self, len: usize) {
        if len < self.bytes.len() {
            self.bytes[len..].zeroize();
            self.bytes.truncate(len);
        }
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.bytes.as_mut_slice().zeroize();
        if let Some(tracker) = &self.tracker {
            tracker.on_wipe(self.kind, &self.bytes);
        }
        // Also clears spare capacity left behind by `truncate`
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encryption key derived from a password - automatically zeroed when dropped
pub struct DerivedKey {
    buffer: SecretBuffer,
}

impl DerivedKey {
    /// Create a key from raw bytes
    pub fn new(key: Vec<u8>) -> Self {
        Self {
            buffer: SecretBuffer::from_vec(key, BufferKind::DerivedKey),
        }
    }

    /// All-zero key of `len` bytes, filled in place by a derivation
    pub(crate) fn zeroed(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    /// Report the eventual wipe of this key to `tracker`
    pub fn track(self, tracker: Option<&Arc<dyn BufferTracker>>) -> Self {
        Self {
            buffer: self.buffer.track(tracker),
        }
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }

    /// Get the key bytes (use carefully - avoid copying)
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
