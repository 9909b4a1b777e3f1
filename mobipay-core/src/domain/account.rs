//! Account domain model

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{Error, Result};
use crate::ports::Snapshot;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

/// A mobile-money account, keyed by phone number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque identifier, not validated for format
    pub phone: String,
    pub name: String,
    /// Hex-encoded PIN digest
    pub pin_hash: String,
    pub balance: Decimal,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    /// Ids of the transactions this account takes part in, in commit order
    pub transactions: Vec<Uuid>,
}

impl Account {
    /// Create a new account with a zero balance
    pub fn new(
        phone: impl Into<String>,
        name: impl Into<String>,
        pin_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            phone: phone.into(),
            name: name.into(),
            pin_hash: pin_hash.into(),
            balance: Decimal::ZERO,
            role,
            created_at: Utc::now(),
            transactions: Vec::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Link a transaction id, ignoring repeats
    pub fn link(&mut self, tx_id: Uuid) {
        if !self.transactions.contains(&tx_id) {
            self.transactions.push(tx_id);
        }
    }

    /// Phone numbers are opaque; only the balance is checked
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.balance.is_sign_negative() && !self.balance.is_zero() {
            return Err("balance cannot be negative");
        }
        Ok(())
    }
}

/// The account collection: phone number -> account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountBook {
    accounts: HashMap<String, Account>,
}

impl AccountBook {
    pub fn get(&self, phone: &str) -> Option<&Account> {
        self.accounts.get(phone)
    }

    pub fn get_mut(&mut self, phone: &str) -> Option<&mut Account> {
        self.accounts.get_mut(phone)
    }

    pub fn contains(&self, phone: &str) -> bool {
        self.accounts.contains_key(phone)
    }

    /// Insert or replace the account stored under its phone number
    pub fn put(&mut self, account: Account) {
        self.accounts.insert(account.phone.clone(), account);
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// All accounts ordered by phone number
    pub fn sorted(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.phone.cmp(&b.phone));
        accounts
    }

    pub fn total_balance(&self) -> Decimal {
        self.accounts.values().map(|a| a.balance).sum()
    }
}

impl Snapshot for AccountBook {
    const KIND: &'static str = "accounts";

    fn restore(&mut self) -> Result<()> {
        for (key, account) in &self.accounts {
            if key != &account.phone {
                return Err(Error::integrity(format!(
                    "account stored under {} carries phone {}",
                    key, account.phone
                )));
            }
            account
                .validate()
                .map_err(|e| Error::integrity(format!("account {}: {}", key, e)))?;
        }
        Ok(())
    }
}
