//! Encryption domain models

use serde::{Deserialize, Serialize};

/// Default Argon2id parameters
pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_MEMORY_COST: u32 = 65536; // 64 MiB
pub const DEFAULT_PARALLELISM: u32 = 4;
pub const DEFAULT_HASH_LEN: u32 = 32;

/// Argon2id parameters for key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    pub time_cost: u32,
    pub memory_cost: u32,
    pub parallelism: u32,
    pub hash_len: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            time_cost: DEFAULT_TIME_COST,
            memory_cost: DEFAULT_MEMORY_COST,
            parallelism: DEFAULT_PARALLELISM,
            hash_len: DEFAULT_HASH_LEN,
        }
    }
}

/// How store keys are derived from the passphrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kdf", rename_all = "lowercase")]
pub enum KeyDerivation {
    /// Passphrase bytes truncated or zero-padded to the key length
    Raw,
    Argon2id {
        /// Base64-encoded random salt
        salt: String,
        argon2_params: Argon2Params,
    },
}

impl KeyDerivation {
    pub fn name(&self) -> &'static str {
        match self {
            KeyDerivation::Raw => "raw",
            KeyDerivation::Argon2id { .. } => "argon2id",
        }
    }
}

/// Contents of encryption.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    pub algorithm: String,
    pub version: u32,
    #[serde(flatten)]
    pub key_derivation: KeyDerivation,
}

impl EncryptionMetadata {
    pub fn new(key_derivation: KeyDerivation) -> Self {
        Self {
            algorithm: "aes-256-gcm".to_string(),
            version: 1,
            key_derivation,
        }
    }
}

impl Default for EncryptionMetadata {
    fn default() -> Self {
        Self::new(KeyDerivation::Raw)
    }
}

/// Status of store encryption for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionStatus {
    pub algorithm: String,
    pub kdf: String,
    /// False when no encryption.json exists and the legacy default applies
    pub configured: bool,
}

impl EncryptionStatus {
    pub fn from_metadata(meta: &EncryptionMetadata, configured: bool) -> Self {
        Self {
            algorithm: meta.algorithm.clone(),
            kdf: meta.key_derivation.name().to_string(),
            configured,
        }
    }
}
