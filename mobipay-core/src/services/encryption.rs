//! Encryption service - how store keys are derived
//!
//! The three store files are sealed with AES-256-GCM under one key. By
//! default the key is the passphrase truncated or zero-padded to 32 bytes.
//! A data directory may instead be initialized with Argon2id, recorded in
//! encryption.json together with its salt and parameters.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::Engine;
use rand::Rng;
use serde::Serialize;

use super::ledger::STORE_FILES;
use crate::adapters::crypto::{self, Key};
use crate::adapters::snapshot_store::write_atomic;
use crate::domain::{Argon2Params, EncryptionMetadata, EncryptionStatus, KeyDerivation};

pub const ENCRYPTION_FILE: &str = "encryption.json";

/// Salt length for Argon2id
const SALT_LEN: usize = 16;

pub struct EncryptionService {
    data_dir: PathBuf,
}

impl EncryptionService {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn encryption_file(&self) -> PathBuf {
        self.data_dir.join(ENCRYPTION_FILE)
    }

    /// Recorded metadata, or the raw default when none was written
    pub fn metadata(&self) -> Result<(EncryptionMetadata, bool)> {
        let enc_file = self.encryption_file();
        if !enc_file.exists() {
            return Ok((EncryptionMetadata::default(), false));
        }
        let content = fs::read_to_string(&enc_file)?;
        let metadata: EncryptionMetadata = serde_json::from_str(&content)
            .with_context(|| format!("Invalid {}", enc_file.display()))?;
        Ok((metadata, true))
    }

    pub fn status(&self) -> Result<EncryptionStatus> {
        let (metadata, configured) = self.metadata()?;
        Ok(EncryptionStatus::from_metadata(&metadata, configured))
    }

    /// Derive the store key from the passphrase using the recorded mode
    pub fn derive_key(&self, passphrase: &str) -> Result<Key> {
        let (metadata, _) = self.metadata()?;
        match &metadata.key_derivation {
            KeyDerivation::Raw => Ok(crypto::derive_key(passphrase.as_bytes())),
            KeyDerivation::Argon2id {
                salt,
                argon2_params,
            } => {
                let salt = base64::engine::general_purpose::STANDARD
                    .decode(salt)
                    .context("Invalid salt in encryption metadata")?;
                Ok(crypto::derive_key_argon2(
                    passphrase.as_bytes(),
                    &salt,
                    argon2_params,
                )?)
            }
        }
    }

    /// True once any store file exists; the key mode is fixed from then on
    pub fn has_store_files(&self) -> bool {
        STORE_FILES
            .iter()
            .any(|name| self.data_dir.join(name).exists())
    }

    /// Record the key-derivation mode for a new data directory
    ///
    /// `None` keeps the raw mode; `Some(params)` selects Argon2id with a
    /// fresh random salt.
    pub fn initialize(&self, argon2: Option<Argon2Params>) -> Result<EncryptionMetadata> {
        if self.has_store_files() {
            bail!(
                "{} already holds ledger data; the key derivation can only be chosen \
                 before the first run",
                self.data_dir.display()
            );
        }
        if self.encryption_file().exists() {
            bail!("Key derivation is already configured");
        }

        let key_derivation = match argon2 {
            None => KeyDerivation::Raw,
            Some(argon2_params) => {
                let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
                KeyDerivation::Argon2id {
                    salt: base64::engine::general_purpose::STANDARD.encode(salt),
                    argon2_params,
                }
            }
        };
        let metadata = EncryptionMetadata::new(key_derivation);

        fs::create_dir_all(&self.data_dir)?;
        let content = serde_json::to_string_pretty(&metadata)?;
        write_atomic(&self.encryption_file(), content.as_bytes())?;
        Ok(metadata)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub data_dir: String,
    pub kdf: String,
    pub admin_seeded: bool,
}
