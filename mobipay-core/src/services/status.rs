//! Status service - ledger and storage summary

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

use super::encryption::EncryptionService;
use super::ledger::{FeeSchedule, LedgerService, RecoveryReport, StoreInfo};

pub struct StatusService {
    ledger: Arc<LedgerService>,
}

impl StatusService {
    pub fn new(ledger: Arc<LedgerService>) -> Self {
        Self { ledger }
    }

    /// Get overall status summary
    pub fn get_status(&self, encryption: &EncryptionService) -> Result<StatusSummary> {
        let summary = self.ledger.summary();
        let last_transaction = self
            .ledger
            .transactions()
            .last()
            .map(|tx| tx.timestamp.to_rfc3339());

        Ok(StatusSummary {
            total_accounts: summary.accounts,
            admin_accounts: summary.admins,
            total_transactions: summary.transactions,
            total_balance: summary.total_balance,
            fees_burned: summary.fees_burned,
            last_transaction,
            fees: self.ledger.fees(),
            kdf: encryption.status()?.kdf,
            stores: self.ledger.stores(),
            recovery: self.ledger.recovery().clone(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: usize,
    pub admin_accounts: usize,
    pub total_transactions: usize,
    pub total_balance: Decimal,
    pub fees_burned: Decimal,
    pub last_transaction: Option<String>,
    pub fees: FeeSchedule,
    pub kdf: String,
    pub stores: Vec<StoreInfo>,
    pub recovery: RecoveryReport,
}
