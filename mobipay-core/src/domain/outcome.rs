//! Business outcomes: committed or rejected

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a ledger request was turned down
///
/// Rejections are decided against in-memory state before anything is
/// written, so a rejected request never has side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Amount is zero, negative or finer than the smallest currency unit
    InvalidAmount { amount: Decimal },
    UnknownAccount { phone: String },
    AccountExists { phone: String },
    WrongPin,
    InsufficientFunds { required: Decimal, available: Decimal },
    SelfTransfer,
    NotPermitted,
}

impl Rejection {
    /// Stable machine-readable reason, free of account data
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::InvalidAmount { .. } => "invalid_amount",
            Rejection::UnknownAccount { .. } => "unknown_account",
            Rejection::AccountExists { .. } => "account_exists",
            Rejection::WrongPin => "wrong_pin",
            Rejection::InsufficientFunds { .. } => "insufficient_funds",
            Rejection::SelfTransfer => "self_transfer",
            Rejection::NotPermitted => "not_permitted",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::InvalidAmount { amount } => write!(f, "invalid amount: {amount}"),
            Rejection::UnknownAccount { phone } => write!(f, "no account for {phone}"),
            Rejection::AccountExists { phone } => write!(f, "account {phone} already exists"),
            Rejection::WrongPin => write!(f, "incorrect PIN"),
            Rejection::InsufficientFunds { required, available } => {
                write!(f, "insufficient balance: need {required}, have {available}")
            }
            Rejection::SelfTransfer => write!(f, "cannot send money to the same account"),
            Rejection::NotPermitted => write!(f, "operation requires an admin account"),
        }
    }
}

/// Result of a ledger request that passed storage without error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Committed(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    pub fn committed(&self) -> Option<&T> {
        match self {
            Outcome::Committed(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Committed(_) => None,
            Outcome::Rejected(r) => Some(r),
        }
    }

    pub fn into_committed(self) -> Option<T> {
        match self {
            Outcome::Committed(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Committed(value) => Outcome::Committed(f(value)),
            Outcome::Rejected(r) => Outcome::Rejected(r),
        }
    }
}

impl<T> From<Rejection> for Outcome<T> {
    fn from(rejection: Rejection) -> Self {
        Outcome::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let ok: Outcome<u32> = Outcome::Committed(7);
        assert!(ok.is_committed());
        assert_eq!(ok.committed(), Some(&7));

        let no: Outcome<u32> = Rejection::WrongPin.into();
        assert!(!no.is_committed());
        assert_eq!(no.rejection(), Some(&Rejection::WrongPin));
        assert_eq!(no.map(|v| v + 1).into_committed(), None);
    }

    #[test]
    fn test_rejection_display() {
        let r = Rejection::InsufficientFunds {
            required: Decimal::new(1300, 2),
            available: Decimal::ZERO,
        };
        assert_eq!(r.to_string(), "insufficient balance: need 13.00, have 0");
    }

    #[test]
    fn test_rejection_code_matches_serialized_reason() {
        let r = Rejection::UnknownAccount {
            phone: "017".to_string(),
        };
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["reason"], r.code());
        assert_eq!(Rejection::SelfTransfer.code(), "self_transfer");
    }
}
