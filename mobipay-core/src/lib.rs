//! MobiPay Core - encrypted, crash-consistent mobile-money ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transaction, Journal, etc.)
//! - **ports**: Trait definitions the adapters depend on (Snapshot)
//! - **services**: Business logic orchestration (ledger, doctor, backup, ...)
//! - **adapters**: Concrete implementations (AES-GCM, encrypted snapshot files)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::DataDirLock;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Account, BackupMetadata, EncryptionMetadata, EncryptionStatus, Outcome, Rejection, Role,
    Transaction, TransactionType,
};

/// Main context for MobiPay operations
///
/// Holds the data-directory lock for its whole lifetime, the configuration,
/// the open ledger and the services built on it.
pub struct MobipayContext {
    pub config: Config,
    pub ledger: Arc<LedgerService>,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
    pub backup_service: BackupService,
    pub encryption_service: EncryptionService,
    data_dir: PathBuf,
    _lock: DataDirLock,
}

impl MobipayContext {
    /// Lock `data_dir`, derive the store key from `passphrase` and open the
    /// ledger, replaying any interrupted commit
    pub fn new(data_dir: &Path, passphrase: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let lock = DataDirLock::acquire(data_dir)?;

        let config = Config::load(data_dir)?;
        let encryption_service = EncryptionService::new(data_dir.to_path_buf());
        let key = encryption_service.derive_key(passphrase)?;

        let ledger = Arc::new(LedgerService::open(data_dir, &key, config.fees)?);

        Ok(Self {
            status_service: StatusService::new(Arc::clone(&ledger)),
            doctor_service: DoctorService::new(Arc::clone(&ledger)),
            backup_service: BackupService::new(data_dir.to_path_buf()),
            encryption_service,
            config,
            ledger,
            data_dir: data_dir.to_path_buf(),
            _lock: lock,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create the account if no account holds `phone` yet
    pub fn ensure_admin(&self, phone: &str, name: &str, pin: &str) -> Result<bool> {
        if self.ledger.balance_of(phone).is_some() {
            return Ok(false);
        }
        let outcome = self.ledger.register_with_role(phone, name, pin, Role::Admin)?;
        Ok(outcome.is_committed())
    }
}
