//! Snapshot port - what a collection must provide to be stored

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::result::Result;

/// A collection persisted as one whole encrypted snapshot
///
/// `Default` is the empty collection used for a fresh store.
pub trait Snapshot: Serialize + DeserializeOwned + Default + Clone + Send + Sync {
    /// Short name used in file names and diagnostics
    const KIND: &'static str;

    /// Rebuild derived state and check invariants after deserialization
    ///
    /// An error here makes the store unreadable, never silently empty.
    fn restore(&mut self) -> Result<()> {
        Ok(())
    }
}
