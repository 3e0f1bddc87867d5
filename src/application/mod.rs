//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod dispatch;
pub mod error;
pub mod sample;
pub mod services;

pub use dispatch::{Warning, WarningKind};
pub use error::{ApplicationError, ApplicationResult};
