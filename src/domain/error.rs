//! Domain-level errors (no external dependencies)

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::domain::entities::{Employee, EmployeeId};

/// Domain errors represent violations of the hierarchy invariants.
/// All of them are recoverable and leave the roster untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown manager: {0}")]
    UnknownManager(EmployeeId),

    #[error("employee not found: {0}")]
    NotFound(EmployeeId),

    #[error("cycle detected in hierarchy at: {0}")]
    Cycle(EmployeeId),

    #[error("employee {id} has {} subordinate(s): {}", .subordinates.len(), names(.subordinates))]
    HasSubordinates {
        id: EmployeeId,
        subordinates: Vec<Employee>,
    },

    #[error("employee name must not be empty")]
    EmptyName,

    #[error("no employee ids left to assign")]
    IdSpaceExhausted,

    #[error("invalid employee set: {}", .0.iter().join("; "))]
    Validation(Vec<Violation>),
}

fn names(employees: &[Employee]) -> String {
    employees
        .iter()
        .map(|e| format!("{} ({})", e.name, e.id))
        .join(", ")
}

/// One offending record found while validating a bulk replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub id: EmployeeId,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// The id occurs more than once.
    DuplicateId,
    /// The manager does not exist.
    UnknownManager(EmployeeId),
    /// Following managers never reaches a root.
    Cycle,
    EmptyName,
    /// No employee in the set carries the manager name.
    UnresolvedManager(String),
    /// More than one employee carries the manager name.
    AmbiguousManager(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::DuplicateId => write!(f, "{}: duplicate id", self.id),
            ViolationKind::UnknownManager(m) => write!(f, "{}: unknown manager {}", self.id, m),
            ViolationKind::Cycle => write!(f, "{}: manager chain contains a cycle", self.id),
            ViolationKind::EmptyName => write!(f, "{}: empty name", self.id),
            ViolationKind::UnresolvedManager(name) => {
                write!(f, "{}: no employee named '{}'", self.id, name)
            }
            ViolationKind::AmbiguousManager(name) => {
                write!(f, "{}: several employees named '{}'", self.id, name)
            }
        }
    }
}

/// Result type for hierarchy operations.
pub type DomainResult<T> = Result<T, DomainError>;
