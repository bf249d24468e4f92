//! Persisted credential records consumed by the agent.
//!
//! The external bootstrap flow writes two sibling files under the tether
//! home directory: `access.key` carrying the bearer token and the 32-byte
//! signing secret, and `settings.json` carrying the machine identifier.
//! Both are opaque inputs here; the agent never re-verifies signatures.

use std::path::Path;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;

use crate::error::CredentialsError;

pub const ACCESS_KEY_FILE: &str = "access.key";
pub const SETTINGS_FILE: &str = "settings.json";

pub const SETTINGS_SCHEMA_VERSION: u32 = 2;

/// On-disk shape of `access.key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccessKeyRecord {
    /// base64 of the 32-byte signing secret.
    secret: String,
    token: String,
}

/// Decoded contents of `access.key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub secret: [u8; 32],
    pub token: String,
}

impl Credentials {
    pub fn load(home: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(access_key_path(home))?;
        let record: AccessKeyRecord = serde_json::from_str(&raw)?;
        let bytes = BASE64.decode(&record.secret)?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| CredentialsError::BadSecretLength { len: bytes.len() })?;
        Ok(Self {
            secret,
            token: record.token,
        })
    }

    pub fn write(&self, home: &Path) -> Result<(), CredentialsError> {
        std::fs::create_dir_all(home)?;
        let record = AccessKeyRecord {
            secret: BASE64.encode(self.secret),
            token: self.token.clone(),
        };
        let raw = serde_json::to_string_pretty(&record)?;
        std::fs::write(access_key_path(home), raw)?;
        Ok(())
    }
}

/// On-disk shape of `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub schema_version: u32,
    pub onboarding_completed: bool,
    pub machine_id: String,
    pub machine_id_confirmed_by_server: bool,
}

impl Settings {
    pub fn new(machine_id: String) -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            onboarding_completed: true,
            machine_id,
            machine_id_confirmed_by_server: false,
        }
    }

    pub fn load(home: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(settings_path(home))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write(&self, home: &Path) -> Result<(), CredentialsError> {
        std::fs::create_dir_all(home)?;
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(settings_path(home), raw)?;
        Ok(())
    }
}

pub fn access_key_path(home: &Path) -> PathBuf {
    home.join(ACCESS_KEY_FILE)
}

pub fn settings_path(home: &Path) -> PathBuf {
    home.join(SETTINGS_FILE)
}
