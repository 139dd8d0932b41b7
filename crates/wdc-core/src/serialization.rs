//! Database serialization
//!
//! Stream layout: the magic bytes `WDCS`, a version byte, then a JSON
//! document. Every distinct credential object is written once (database
//! members first, then credentials that only live in keyrings, flagged
//! `detached`); keyrings refer to their members by index so shared
//! credentials stay shared after a round trip.
//!
//! Passwords are written as hex strings. Encoding and decoding each go through
//! one exactly-sized buffer that is wiped on drop, so no reallocation leaves a
//! stray copy behind. Decoding errors report position only, never decoded
//! content.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use zeroize::Zeroizing;

use crate::credential::{Credential, Keyring, TextPassword};
use crate::database::CredentialDatabase;
use crate::error::{EntityKind, Result, WdcError};

const STREAM_MAGIC: &[u8; 4] = b"WDCS";
const STREAM_VERSION: u8 = 1;
const HEADER_LEN: usize = STREAM_MAGIC.len() + 1;

#[derive(Serialize, Deserialize)]
struct DatabaseSnapshot {
    #[serde(default)]
    credentials: Vec<CredentialSnapshot>,
    #[serde(default)]
    keyrings: Vec<KeyringSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct CredentialSnapshot {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    user: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_secret")]
    password: Option<Zeroizing<Vec<u8>>>,
    #[serde(default, skip_serializing_if = "is_false")]
    detached: bool,
}

#[derive(Serialize, Deserialize)]
struct KeyringSnapshot {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    members: Vec<usize>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

mod hex_secret {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use zeroize::Zeroizing;

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Zeroizing<Vec<u8>>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&Zeroizing::new(hex::encode(&**bytes))),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Zeroizing<Vec<u8>>>, D::Error> {
        let encoded = match Option::<&'de str>::deserialize(deserializer)? {
            Some(encoded) => encoded,
            None => return Ok(None),
        };
        if encoded.len() % 2 != 0 {
            return Err(D::Error::custom("password encoding has odd length"));
        }

        let mut bytes = Zeroizing::new(vec![0u8; encoded.len() / 2]);
        hex::decode_to_slice(encoded, &mut bytes[..])
            .map_err(|_| D::Error::custom("password encoding is not hex"))?;
        Ok(Some(bytes))
    }
}

impl DatabaseSnapshot {
    fn capture(db: &CredentialDatabase) -> Self {
        let mut table = db.credentials();
        let database_len = table.len();

        let mut keyrings = Vec::new();
        for keyring in db.keyrings() {
            let mut members = Vec::new();
            for member in keyring.members() {
                let index = match table.iter().position(|c| c.same_entity(&member)) {
                    Some(index) => index,
                    None => {
                        table.push(member);
                        table.len() - 1
                    }
                };
                members.push(index);
            }

            keyrings.push(KeyringSnapshot {
                title: Some(keyring.title()),
                description: keyring.description(),
                members,
            });
        }

        let credentials = table
            .iter()
            .enumerate()
            .map(|(index, credential)| CredentialSnapshot {
                title: Some(credential.title()),
                description: credential.description(),
                user: credential.user(),
                password: credential.reveal_password(),
                detached: index >= database_len,
            })
            .collect();

        Self {
            credentials,
            keyrings,
        }
    }

    fn restore(self) -> Result<CredentialDatabase> {
        let db = CredentialDatabase::new();
        let mut table = Vec::with_capacity(self.credentials.len());

        for (index, snapshot) in self.credentials.into_iter().enumerate() {
            let detached = snapshot.detached;
            let credential = snapshot.into_credential()?;

            if !detached && !db.add_credential(&credential) {
                return Err(mismatch(format!(
                    "duplicate credential title at index {}",
                    index
                )));
            }
            table.push(credential);
        }

        for (index, snapshot) in self.keyrings.into_iter().enumerate() {
            let title = snapshot
                .title
                .ok_or(WdcError::MissingTitle(EntityKind::Keyring))?;
            let keyring = Keyring::new(title)?;
            keyring.set_description(snapshot.description);

            for member in snapshot.members {
                let credential = table.get(member).ok_or_else(|| {
                    mismatch(format!(
                        "keyring {} refers to missing credential {}",
                        index, member
                    ))
                })?;
                if !keyring.add(credential) {
                    return Err(mismatch(format!(
                        "keyring {} has duplicate member titles",
                        index
                    )));
                }
            }

            if !db.add_keyring(&keyring) {
                return Err(mismatch(format!("duplicate keyring title at index {}", index)));
            }
        }

        db.mark_clean();
        Ok(db)
    }
}

impl CredentialSnapshot {
    fn into_credential(mut self) -> Result<Credential> {
        let title = self
            .title
            .take()
            .ok_or(WdcError::MissingTitle(EntityKind::Credential))?;

        let credential = Credential::new(title)?;
        credential.set_description(std::mem::take(&mut self.description));
        credential.set_user(std::mem::take(&mut self.user));
        if let Some(mut password) = self.password.take() {
            credential.set_password(Some(TextPassword::new(std::mem::take(&mut *password))));
        }

        Ok(credential)
    }
}

/// Counts bytes without storing them, to size the output buffer up front
#[derive(Default)]
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn mismatch(detail: String) -> WdcError {
    WdcError::DeserializationTypeMismatch(detail)
}

fn encode_error(e: serde_json::Error) -> WdcError {
    WdcError::SerializationError(format!("{:?} error", e.classify()))
}

fn decode_error(e: serde_json::Error) -> WdcError {
    let position = format!("line {} column {}", e.line(), e.column());
    match e.classify() {
        Category::Data => mismatch(format!("unexpected data at {}", position)),
        category => WdcError::SerializationError(format!("{:?} error at {}", category, position)),
    }
}

/// Serialize a database into a buffer that is wiped when dropped
pub fn serialize(db: &CredentialDatabase) -> Result<Zeroizing<Vec<u8>>> {
    let snapshot = DatabaseSnapshot::capture(db);

    // Size exactly so the buffer never reallocates and leaves copies behind
    let mut counter = ByteCounter::default();
    serde_json::to_writer(&mut counter, &snapshot).map_err(encode_error)?;

    let mut bytes = Zeroizing::new(Vec::with_capacity(HEADER_LEN + counter.0));
    bytes.extend_from_slice(STREAM_MAGIC);
    bytes.push(STREAM_VERSION);
    serde_json::to_writer(&mut *bytes, &snapshot).map_err(encode_error)?;

    Ok(bytes)
}

/// True if `bytes` start like a serialized database
pub fn has_stream_header(bytes: &[u8]) -> bool {
    bytes.len() >= HEADER_LEN && bytes.starts_with(STREAM_MAGIC)
}

/// Rebuild a database from bytes produced by [`serialize`].
///
/// The returned database and all its members start unmodified.
pub fn deserialize(bytes: &[u8]) -> Result<CredentialDatabase> {
    if !has_stream_header(bytes) {
        return Err(mismatch("missing database stream header".to_string()));
    }
    let version = bytes[STREAM_MAGIC.len()];
    if version != STREAM_VERSION {
        return Err(mismatch(format!("unsupported stream version {}", version)));
    }

    let snapshot: DatabaseSnapshot =
        serde_json::from_slice(&bytes[HEADER_LEN..]).map_err(decode_error)?;
    snapshot.restore()
}
