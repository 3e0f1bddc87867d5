//! Records coming back from the external board.
//!
//! Board items know their manager only by name. Names are matched exactly
//! (after trimming); anything else is reported, never guessed.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::domain::entities::{Employee, EmployeeDraft, EmployeeId, ExternalRef};
use crate::domain::error::{DomainError, DomainResult, Violation, ViolationKind};
use crate::domain::roster::Roster;

/// One item of the external board, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRecord {
    pub external_ref: ExternalRef,
    pub draft: EmployeeDraft,
    /// Raw manager column text.
    pub manager_name: Option<String>,
}

/// Turn board records into a complete employee set for [`Roster::replace_all`].
///
/// Employees already linked to an item keep their id; new items get ids
/// above every id `current` has handed out. Unknown or ambiguous manager
/// names fail the whole batch with a `Validation` error.
pub fn resolve_external(
    records: Vec<ExternalRecord>,
    current: &Roster,
) -> DomainResult<Vec<Employee>> {
    let linked: HashMap<&str, EmployeeId> = current
        .iter()
        .filter_map(|e| e.external_ref.as_ref().map(|r| (r.as_str(), e.id)))
        .collect();
    let kept: HashSet<EmployeeId> = records
        .iter()
        .filter_map(|r| linked.get(r.external_ref.as_str()).copied())
        .collect();

    let mut next = current.id_watermark();
    let mut ids = Vec::with_capacity(records.len());
    for record in &records {
        let id = match linked.get(record.external_ref.as_str()) {
            Some(id) => *id,
            None => {
                while kept.contains(&EmployeeId(next)) {
                    next = next.checked_add(1).ok_or(DomainError::IdSpaceExhausted)?;
                }
                let id = EmployeeId(next);
                next = next.checked_add(1).ok_or(DomainError::IdSpaceExhausted)?;
                id
            }
        };
        ids.push(id);
    }

    let mut by_name: HashMap<&str, Vec<EmployeeId>> = HashMap::new();
    for (record, id) in records.iter().zip(&ids) {
        by_name.entry(record.draft.name.trim()).or_default().push(*id);
    }

    let mut violations = Vec::new();
    let mut managers = Vec::with_capacity(records.len());
    for (record, id) in records.iter().zip(&ids) {
        let name = record.manager_name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            managers.push(None);
            continue;
        }
        match by_name.get(name).map(Vec::as_slice) {
            Some([manager]) => managers.push(Some(*manager)),
            Some(_) => {
                violations.push(Violation {
                    id: *id,
                    kind: ViolationKind::AmbiguousManager(name.to_string()),
                });
                managers.push(None);
            }
            None => {
                violations.push(Violation {
                    id: *id,
                    kind: ViolationKind::UnresolvedManager(name.to_string()),
                });
                managers.push(None);
            }
        }
    }
    if !violations.is_empty() {
        debug!("resolve_external: {} unresolved manager name(s)", violations.len());
        return Err(DomainError::Validation(violations));
    }

    Ok(records
        .into_iter()
        .zip(ids)
        .zip(managers)
        .map(|((record, id), manager_id)| {
            let draft = EmployeeDraft {
                manager_id,
                external_ref: Some(record.external_ref),
                ..record.draft
            };
            Employee::from_draft(id, draft)
        })
        .collect())
}
