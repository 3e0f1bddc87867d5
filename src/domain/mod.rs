//! Domain layer: entities and hierarchy invariants
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod import;
pub mod roster;
pub mod tree;

pub use entities::*;
pub use error::{DomainError, DomainResult, Violation, ViolationKind};
pub use import::{resolve_external, ExternalRecord};
pub use roster::{validate_forest, Ancestors, Roster};
pub use tree::{node_label, render_forest, render_subtree};
