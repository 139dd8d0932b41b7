//! WDC encryption record
//!
//! Binary layout (integers big-endian):
//!
//! ```text
//! "WDC" | version u8 | kdf id u8 | kdf params | iv (16) | ciphertext
//! ```
//!
//! KDF params are empty for SHA-256 (id 1). Argon2id (id 2) stores
//! `memory_cost u32 | time_cost u32 | parallelism u32 | salt_len u8 | salt`.

use crate::crypto::{
    EncryptedData, KdfScheme, KeyDerivation, KeyDerivationParams, BLOCK_SIZE, IV_LENGTH,
};
use crate::error::{Result, WdcError};

const RECORD_MAGIC: &[u8; 3] = b"WDC";
const RECORD_VERSION: u8 = 1;

/// Encrypted, portable form of a credential database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WdcEncryptionRecord {
    /// How the key was derived from the password
    pub key_derivation: KeyDerivation,
    /// Initialization vector (16 bytes for CBC)
    pub iv: [u8; IV_LENGTH],
    /// Encrypted serialized database
    pub ciphertext: Vec<u8>,
}

impl WdcEncryptionRecord {
    pub fn new(key_derivation: KeyDerivation, encrypted: EncryptedData) -> Self {
        Self {
            key_derivation,
            iv: encrypted.iv,
            ciphertext: encrypted.ciphertext,
        }
    }

    /// IV and ciphertext, as consumed by the cipher
    pub fn encrypted_data(&self) -> EncryptedData {
        EncryptedData {
            iv: self.iv,
            ciphertext: self.ciphertext.clone(),
        }
    }

    /// Encode into the binary record layout. Fails if the salt does not fit
    /// its one-byte length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(64 + self.ciphertext.len());
        bytes.extend_from_slice(RECORD_MAGIC);
        bytes.push(RECORD_VERSION);
        bytes.push(self.key_derivation.scheme().id());

        if let KeyDerivation::Argon2id { params, salt } = &self.key_derivation {
            bytes.extend_from_slice(&params.memory_cost.to_be_bytes());
            bytes.extend_from_slice(&params.time_cost.to_be_bytes());
            bytes.extend_from_slice(&params.parallelism.to_be_bytes());
            let salt_len = u8::try_from(salt.len()).map_err(|_| {
                malformed(format!("salt of {} bytes exceeds {}", salt.len(), u8::MAX))
            })?;
            bytes.push(salt_len);
            bytes.extend_from_slice(salt);
        }

        bytes.extend_from_slice(&self.iv);
        bytes.extend_from_slice(&self.ciphertext);
        Ok(bytes)
    }

    /// Decode from the binary record layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        if reader.take(RECORD_MAGIC.len(), "magic")? != RECORD_MAGIC {
            return Err(malformed("not a WDC record"));
        }
        let version = reader.u8("version")?;
        if version != RECORD_VERSION {
            return Err(malformed(format!("unsupported record version {}", version)));
        }

        let key_derivation = match KdfScheme::from_id(reader.u8("key derivation id")?)? {
            KdfScheme::Sha256 => KeyDerivation::Sha256,
            KdfScheme::Argon2id => {
                let params = KeyDerivationParams {
                    memory_cost: reader.u32("memory cost")?,
                    time_cost: reader.u32("time cost")?,
                    parallelism: reader.u32("parallelism")?,
                };
                params
                    .validate()
                    .map_err(|_| malformed("argon2id parameters out of range"))?;
                let salt_len = reader.u8("salt length")? as usize;
                let salt = reader.take(salt_len, "salt")?.to_vec();
                KeyDerivation::Argon2id { params, salt }
            }
        };

        let mut iv = [0u8; IV_LENGTH];
        iv.copy_from_slice(reader.take(IV_LENGTH, "iv")?);

        let ciphertext = reader.rest().to_vec();
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(malformed(format!(
                "ciphertext length {} is not a positive multiple of {}",
                ciphertext.len(),
                BLOCK_SIZE
            )));
        }

        Ok(Self {
            key_derivation,
            iv,
            ciphertext,
        })
    }

    /// Hex encoding of [`to_bytes`](Self::to_bytes), for text transports
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(self.to_bytes()?))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| malformed(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

fn malformed(detail: impl Into<String>) -> WdcError {
    WdcError::MalformedRecord(detail.into())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.bytes.len() {
            return Err(malformed(format!("record truncated in {}", field)));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn u32(&mut self, field: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4, field)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}
