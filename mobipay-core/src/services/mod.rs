//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and the stores. Each service focuses on
//! a specific use case or feature area.

mod backup;
mod doctor;
pub mod encryption;
pub mod identity;
pub mod ledger;
pub mod logging;
mod status;

pub use backup::{BackupService, ClearResult, RestoreResult};
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use encryption::{EncryptionService, InitResult};
pub use identity::IdentityVerifier;
pub use ledger::{FeeSchedule, LedgerService, LedgerSummary, RecoveryReport, StoreInfo};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use status::{StatusService, StatusSummary};
