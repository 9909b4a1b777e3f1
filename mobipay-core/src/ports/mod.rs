//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces the core relies on. The stores depend only
//! on these traits, not on the concrete collections.

mod snapshot;

pub use snapshot::Snapshot;
