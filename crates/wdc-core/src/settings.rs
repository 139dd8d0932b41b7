//! Export settings
//!
//! Non-sensitive configuration for the export pipeline, stored as a plain
//! JSON file. Import never consults settings: everything it needs travels in
//! the record header.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::crypto::{KdfScheme, KeyDerivation, KeyDerivationParams};
use crate::error::{Result, WdcError};

/// Settings for new exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportSettings {
    /// Settings file version
    pub version: u32,
    /// Key derivation algorithm name: "sha256" (legacy default) or "argon2id"
    pub key_derivation: String,
    /// Argon2id cost parameters, used when `key_derivation` is "argon2id"
    pub argon2: KeyDerivationParams,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            version: 1,
            key_derivation: KdfScheme::Sha256.name().to_string(),
            argon2: KeyDerivationParams::default(),
        }
    }
}

impl ExportSettings {
    /// Settings selecting Argon2id with the given parameters
    pub fn argon2id(params: KeyDerivationParams) -> Self {
        Self {
            key_derivation: KdfScheme::Argon2id.name().to_string(),
            argon2: params,
            ..Self::default()
        }
    }

    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(WdcError::InvalidSettings)
    }

    /// Load settings from file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&contents)?;
        debug!("Loaded export settings from {:?}", path);
        Ok(settings)
    }

    /// Load settings from file, falling back to defaults if it is missing or
    /// unreadable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Self::default();
        }

        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).map_err(WdcError::InvalidSettings)?;

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &contents)?;
        std::fs::rename(&temp_path, path)?;

        debug!("Saved export settings to {:?}", path);
        Ok(())
    }

    /// The configured algorithm, or `UnsupportedDigestAlgorithm`
    pub fn scheme(&self) -> Result<KdfScheme> {
        self.key_derivation.parse()
    }

    /// Fresh derivation inputs for one export (a new salt for Argon2id)
    pub fn key_derivation(&self) -> Result<KeyDerivation> {
        Ok(KeyDerivation::for_scheme(self.scheme()?, self.argon2))
    }
}
