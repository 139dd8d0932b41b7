//! Credentials, keyrings and the rename protocol that keeps titles unique

mod keyring;
mod observer;
mod password;
mod types;

pub use keyring::Keyring;
pub use observer::TitleObserver;
pub use password::{Password, TextPassword};
pub use types::Credential;
