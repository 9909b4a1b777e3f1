//! Commit journal: the write-ahead record for cross-store commits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Account;
use super::result::{Error, Result};
use super::transaction::Transaction;
use crate::ports::Snapshot;

/// Everything needed to redo one ledger operation
///
/// `accounts` holds post-images, so replaying an intent is idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitIntent {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub transaction: Transaction,
    pub accounts: Vec<Account>,
}

impl CommitIntent {
    pub fn new(transaction: Transaction, accounts: Vec<Account>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            transaction,
            accounts,
        }
    }
}

/// Journal contents; at most one operation is ever in flight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub pending: Option<CommitIntent>,
}

impl Journal {
    pub fn is_clear(&self) -> bool {
        self.pending.is_none()
    }
}

impl Snapshot for Journal {
    const KIND: &'static str = "journal";

    fn restore(&mut self) -> Result<()> {
        if let Some(intent) = &self.pending {
            for phone in intent.transaction.account_refs() {
                if !intent.accounts.iter().any(|a| a.phone == phone) {
                    return Err(Error::integrity(format!(
                        "intent {} lacks post-image for {}",
                        intent.id, phone
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, TransactionType};
    use rust_decimal::Decimal;

    #[test]
    fn test_restore_requires_post_images() {
        let tx = Transaction::new(
            TransactionType::SendMoney,
            Some("a".into()),
            Some("b".into()),
            Decimal::ONE,
            "Send money",
        );
        let a = Account::new("a", "A", "00", Role::User);
        let mut journal = Journal {
            pending: Some(CommitIntent::new(tx, vec![a])),
        };
        assert!(journal.restore().is_err());
        assert!(Journal::default().is_clear());
    }
}
