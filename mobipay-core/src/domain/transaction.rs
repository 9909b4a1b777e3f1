//! Transaction domain model

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{Error, Result};
use crate::ports::Snapshot;

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    SendMoney,
    CashOut,
    Payment,
    Recharge,
    Topup,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::SendMoney => "SEND_MONEY",
            TransactionType::CashOut => "CASH_OUT",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Recharge => "RECHARGE",
            TransactionType::Topup => "TOPUP",
        }
    }

    /// Whether `to` names an account (as opposed to a merchant or top-up number)
    fn credits_account(&self) -> bool {
        matches!(self, TransactionType::SendMoney | TransactionType::Topup)
    }
}

/// An immutable record of one balance-affecting event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// 1-based position in the log; assigned at commit
    pub sequence: u64,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// None means system/external (top-ups)
    pub from: Option<String>,
    /// None means external (cash-out)
    pub to: Option<String>,
    pub amount: Decimal,
    /// Burned fee charged on top of `amount`
    #[serde(default)]
    pub fee: Decimal,
    /// Wall clock only; `sequence` is the order
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl Transaction {
    pub fn new(
        tx_type: TransactionType,
        from: Option<String>,
        to: Option<String>,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            tx_type,
            from,
            to,
            amount,
            fee: Decimal::ZERO,
            timestamp: Utc::now(),
            description: description.into(),
        }
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    /// Amount leaving the source account
    pub fn debit_total(&self) -> Decimal {
        self.amount + self.fee
    }

    /// Account that pays, if any
    pub fn debited_account(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Account that is credited, if any
    pub fn credited_account(&self) -> Option<&str> {
        if self.tx_type.credits_account() {
            self.to.as_deref()
        } else {
            None
        }
    }

    /// Every account this transaction must be linked to
    pub fn account_refs(&self) -> Vec<&str> {
        let mut refs = Vec::with_capacity(2);
        if let Some(from) = self.debited_account() {
            refs.push(from);
        }
        if let Some(to) = self.credited_account() {
            if !refs.contains(&to) {
                refs.push(to);
            }
        }
        refs
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} -> {} : {:.2} ({}) - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.from.as_deref().unwrap_or("SYSTEM"),
            self.to.as_deref().unwrap_or("SYSTEM"),
            self.amount,
            self.tx_type.as_str(),
            self.description
        )
    }
}

/// Append-ordered transaction history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionLog {
    entries: Vec<Transaction>,
    #[serde(skip)]
    index: HashMap<Uuid, usize>,
}

impl TransactionLog {
    /// Append a transaction, assigning its sequence number
    ///
    /// Fails if the id is already present.
    pub fn append(&mut self, mut tx: Transaction) -> Result<&Transaction> {
        if self.index.contains_key(&tx.id) {
            return Err(Error::integrity(format!("duplicate transaction id {}", tx.id)));
        }
        tx.sequence = self.entries.len() as u64 + 1;
        self.index.insert(tx.id, self.entries.len());
        self.entries.push(tx);
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn get(&self, id: &Uuid) -> Option<&Transaction> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Transactions in commit order
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    pub fn fees_burned(&self) -> Decimal {
        self.entries.iter().map(|t| t.fee).sum()
    }
}

impl PartialEq for TransactionLog {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Snapshot for TransactionLog {
    const KIND: &'static str = "transactions";

    fn restore(&mut self) -> Result<()> {
        self.index.clear();
        for (i, tx) in self.entries.iter().enumerate() {
            if self.index.insert(tx.id, i).is_some() {
                return Err(Error::integrity(format!("duplicate transaction id {}", tx.id)));
            }
            if tx.amount <= Decimal::ZERO {
                return Err(Error::integrity(format!(
                    "transaction {} has non-positive amount",
                    tx.id
                )));
            }
        }
        Ok(())
    }
}
