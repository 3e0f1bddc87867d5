//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (PersistenceAdapter, SyncAdapter)
//! but are themselves concrete structs, not traits.

mod hierarchy;

pub use hierarchy::{HierarchyStore, StoreOptions};
