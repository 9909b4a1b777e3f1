//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O.

mod account;
mod backup;
mod encryption;
mod journal;
mod outcome;
pub mod result;
mod transaction;

pub use account::{Account, AccountBook, Role};
pub use backup::BackupMetadata;
pub use encryption::{Argon2Params, EncryptionMetadata, EncryptionStatus, KeyDerivation};
pub use journal::{CommitIntent, Journal};
pub use outcome::{Outcome, Rejection};
pub use transaction::{Transaction, TransactionLog, TransactionType};
