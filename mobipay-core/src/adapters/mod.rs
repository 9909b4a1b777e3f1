//! Adapter implementations
//!
//! Adapters implement the ports with concrete technologies:
//! - AES-256-GCM (ring) and Argon2id for the crypto engine
//! - Encrypted whole-file snapshots for every persisted collection
//! - An advisory lock file guarding the data directory

pub mod crypto;
pub mod lock;
pub mod snapshot_store;

pub use crypto::Key;
pub use lock::DataDirLock;
pub use snapshot_store::{EncryptedSnapshotStore, StoreOrigin};
