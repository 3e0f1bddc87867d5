//! The employee forest and its invariants.
//!
//! `Roster` is pure: no I/O, no side effects. Every mutation checks the
//! invariants against a hypothetical next state and only then commits, so a
//! rejected operation never leaves a trace.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::domain::entities::{Employee, EmployeeDraft, EmployeeId, EmployeePatch, ExternalRef};
use crate::domain::error::{DomainError, DomainResult, Violation, ViolationKind};

/// Canonical set of employees, keyed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    employees: BTreeMap<EmployeeId, Employee>,
    /// Next id to hand out; never goes backwards, so ids are not reused.
    next_id: u64,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        Self {
            employees: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Build a roster from untrusted records, validating the whole set first.
    pub fn from_records(records: Vec<Employee>) -> DomainResult<Self> {
        let mut roster = Self::new();
        roster.replace_all(records)?;
        Ok(roster)
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    pub fn get(&self, id: EmployeeId) -> Option<&Employee> {
        self.employees.get(&id)
    }

    pub fn contains(&self, id: EmployeeId) -> bool {
        self.employees.contains_key(&id)
    }

    /// All employees, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Employee> {
        self.employees.values()
    }

    pub fn to_vec(&self) -> Vec<Employee> {
        self.employees.values().cloned().collect()
    }

    /// Add a new employee under a freshly assigned id.
    pub fn add(&mut self, draft: EmployeeDraft) -> DomainResult<Employee> {
        if draft.name.trim().is_empty() {
            return Err(DomainError::EmptyName);
        }
        if let Some(manager_id) = draft.manager_id {
            if !self.contains(manager_id) {
                return Err(DomainError::UnknownManager(manager_id));
            }
        }

        let id = self.fresh_id()?;
        let employee = Employee::from_draft(id, draft);
        debug!("add: id={} manager={:?}", id, employee.manager_id);
        self.employees.insert(id, employee.clone());
        Ok(employee)
    }

    /// Apply a patch, re-validating the manager edge when it changes.
    pub fn update(&mut self, id: EmployeeId, patch: &EmployeePatch) -> DomainResult<Employee> {
        let current = self.get(id).ok_or(DomainError::NotFound(id))?;

        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(DomainError::EmptyName);
            }
        }
        if patch.changes_manager_of(current) {
            if let Some(Some(manager_id)) = patch.manager_id {
                if !self.contains(manager_id) {
                    return Err(DomainError::UnknownManager(manager_id));
                }
                if self.would_cycle(id, manager_id) {
                    return Err(DomainError::Cycle(id));
                }
            }
        }

        let next = current.patched(patch);
        debug!("update: id={} manager={:?}", id, next.manager_id);
        self.employees.insert(id, next.clone());
        Ok(next)
    }

    /// Remove an employee that nobody reports to.
    pub fn remove(&mut self, id: EmployeeId) -> DomainResult<Employee> {
        if !self.contains(id) {
            return Err(DomainError::NotFound(id));
        }
        let subordinates: Vec<Employee> = self.children(id).into_iter().cloned().collect();
        if !subordinates.is_empty() {
            return Err(DomainError::HasSubordinates { id, subordinates });
        }
        debug!("remove: id={}", id);
        self.employees.remove(&id).ok_or(DomainError::NotFound(id))
    }

    /// Swap in a completely new set after validating every record.
    ///
    /// On failure all violations are reported and the roster is untouched.
    pub fn replace_all(&mut self, records: Vec<Employee>) -> DomainResult<()> {
        let violations = validate_forest(&records);
        if !violations.is_empty() {
            debug!("replace_all: rejected with {} violation(s)", violations.len());
            return Err(DomainError::Validation(violations));
        }

        let max_id = records.iter().map(|e| e.id.0).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id.saturating_add(1));
        self.employees = records.into_iter().map(|e| (e.id, e)).collect();
        debug!("replace_all: {} employees, next id {}", self.len(), self.next_id);
        Ok(())
    }

    /// Record the external handle returned by a successful sync.
    ///
    /// Returns `false` when the employee no longer exists.
    pub fn set_external_ref(&mut self, id: EmployeeId, external_ref: ExternalRef) -> bool {
        match self.employees.get_mut(&id) {
            Some(employee) => {
                employee.external_ref = Some(external_ref);
                true
            }
            None => false,
        }
    }

    /// Direct reports of `id`.
    pub fn children(&self, id: EmployeeId) -> Vec<&Employee> {
        self.iter().filter(|e| e.manager_id == Some(id)).collect()
    }

    /// Employees without a manager.
    pub fn roots(&self) -> Vec<&Employee> {
        self.iter().filter(|e| e.is_root()).collect()
    }

    /// Lazy walk from the direct manager of `id` up to its root.
    pub fn ancestors(&self, id: EmployeeId) -> DomainResult<Ancestors<'_>> {
        let start = self.get(id).ok_or(DomainError::NotFound(id))?;
        Ok(Ancestors {
            roster: self,
            next: start.manager_id,
            steps: 0,
            done: false,
        })
    }

    /// All direct and indirect reports of `id`, breadth-first.
    pub fn descendants(&self, id: EmployeeId) -> DomainResult<Vec<&Employee>> {
        if !self.contains(id) {
            return Err(DomainError::NotFound(id));
        }
        let mut index: HashMap<EmployeeId, Vec<&Employee>> = HashMap::new();
        for employee in self.iter() {
            if let Some(manager_id) = employee.manager_id {
                index.entry(manager_id).or_default().push(employee);
            }
        }

        let mut visited = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            for child in index.get(&current).into_iter().flatten() {
                if !visited.insert(child.id) {
                    return Err(DomainError::Cycle(child.id));
                }
                result.push(*child);
                queue.push_back(child.id);
            }
        }
        Ok(result)
    }

    /// Number of ancestors of `id`; roots have depth 0.
    pub fn depth(&self, id: EmployeeId) -> DomainResult<usize> {
        let mut depth = 0;
        for ancestor in self.ancestors(id)? {
            ancestor?;
            depth += 1;
        }
        Ok(depth)
    }

    /// Case-insensitive substring match on names.
    pub fn find_by_name(&self, query: &str) -> Vec<&Employee> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Distinct non-empty department names, sorted.
    pub fn departments(&self) -> Vec<String> {
        self.iter()
            .map(|e| e.department.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether making `manager_id` the manager of `id` would close a loop.
    ///
    /// Walks upward from the candidate manager. Reaching `id`, revisiting a
    /// node or exceeding the employee count all count as a cycle.
    pub fn would_cycle(&self, id: EmployeeId, manager_id: EmployeeId) -> bool {
        let bound = self.len();
        let mut visited = HashSet::new();
        let mut current = Some(manager_id);
        while let Some(cursor) = current {
            if cursor == id || !visited.insert(cursor) || visited.len() > bound {
                trace!("would_cycle: {} -> {} closes at {}", id, manager_id, cursor);
                return true;
            }
            current = self.get(cursor).and_then(|e| e.manager_id);
        }
        false
    }

    /// Lowest id that may still be handed out.
    pub(crate) fn id_watermark(&self) -> u64 {
        self.next_id
    }

    fn fresh_id(&mut self) -> DomainResult<EmployeeId> {
        let mut candidate = self.next_id;
        while self.employees.contains_key(&EmployeeId(candidate)) {
            candidate = candidate.checked_add(1).ok_or(DomainError::IdSpaceExhausted)?;
        }
        self.next_id = candidate.checked_add(1).ok_or(DomainError::IdSpaceExhausted)?;
        Ok(EmployeeId(candidate))
    }
}

/// Iterator from an employee's direct manager up to the root.
///
/// Yields an error and stops when a link dangles or when the walk exceeds
/// the roster size.
pub struct Ancestors<'a> {
    roster: &'a Roster,
    next: Option<EmployeeId>,
    steps: usize,
    done: bool,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = DomainResult<&'a Employee>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let id = self.next?;
        self.steps += 1;
        if self.steps > self.roster.len() {
            self.done = true;
            return Some(Err(DomainError::Cycle(id)));
        }
        match self.roster.get(id) {
            Some(employee) => {
                self.next = employee.manager_id;
                Some(Ok(employee))
            }
            None => {
                self.done = true;
                Some(Err(DomainError::UnknownManager(id)))
            }
        }
    }
}

enum ChainEnd {
    Root,
    Dangling,
    Cycle,
}

/// Check invariants 1-3 (plus non-empty names) over an untrusted set.
pub fn validate_forest(records: &[Employee]) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut index: HashMap<EmployeeId, &Employee> = HashMap::with_capacity(records.len());
    let mut duplicates = BTreeSet::new();

    // first occurrence wins for chain walks
    for record in records {
        if index.contains_key(&record.id) {
            duplicates.insert(record.id);
        } else {
            index.insert(record.id, record);
        }
    }

    let mut reported_duplicates = HashSet::new();
    for record in records {
        if duplicates.contains(&record.id) && reported_duplicates.insert(record.id) {
            violations.push(Violation {
                id: record.id,
                kind: ViolationKind::DuplicateId,
            });
        }
        if record.name.trim().is_empty() {
            violations.push(Violation {
                id: record.id,
                kind: ViolationKind::EmptyName,
            });
        }
        if let Some(manager_id) = record.manager_id {
            if !index.contains_key(&manager_id) {
                violations.push(Violation {
                    id: record.id,
                    kind: ViolationKind::UnknownManager(manager_id),
                });
                continue;
            }
        }
        if let ChainEnd::Cycle = walk_to_root(&index, record, records.len()) {
            violations.push(Violation {
                id: record.id,
                kind: ViolationKind::Cycle,
            });
        }
    }
    violations
}

fn walk_to_root(
    index: &HashMap<EmployeeId, &Employee>,
    start: &Employee,
    bound: usize,
) -> ChainEnd {
    let mut visited = HashSet::from([start.id]);
    let mut current = start.manager_id;
    while let Some(cursor) = current {
        if !visited.insert(cursor) || visited.len() > bound {
            return ChainEnd::Cycle;
        }
        match index.get(&cursor) {
            Some(employee) => current = employee.manager_id,
            None => return ChainEnd::Dangling,
        }
    }
    ChainEnd::Root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(id: u64, manager: Option<u64>) -> Employee {
        Employee::from_draft(
            EmployeeId(id),
            EmployeeDraft {
                name: format!("Employee {id}"),
                manager_id: manager.map(EmployeeId),
                ..EmployeeDraft::default()
            },
        )
    }

    #[test]
    fn given_corrupted_roster_when_walking_ancestors_then_reports_cycle() {
        // bypass validation to simulate a broken bulk import
        let mut roster = Roster::new();
        roster.employees.insert(EmployeeId(1), employee(1, Some(2)));
        roster.employees.insert(EmployeeId(2), employee(2, Some(1)));

        let walked: Vec<_> = roster.ancestors(EmployeeId(1)).unwrap().collect();

        assert_eq!(walked.len(), 3);
        assert!(walked[..2].iter().all(Result::is_ok));
        assert_eq!(walked[2], Err(DomainError::Cycle(EmployeeId(2))));
    }

    #[test]
    fn given_dangling_link_when_walking_ancestors_then_reports_unknown_manager() {
        let mut roster = Roster::new();
        roster.employees.insert(EmployeeId(1), employee(1, Some(9)));

        let walked: Vec<_> = roster.ancestors(EmployeeId(1)).unwrap().collect();

        assert_eq!(walked, vec![Err(DomainError::UnknownManager(EmployeeId(9)))]);
    }

    #[test]
    fn given_removed_tail_when_adding_then_does_not_reuse_id() {
        let mut roster = Roster::new();
        let a = roster.add(EmployeeDraft::new("A")).unwrap();
        let b = roster.add(EmployeeDraft::new("B")).unwrap();
        roster.remove(b.id).unwrap();

        let c = roster.add(EmployeeDraft::new("C")).unwrap();

        assert_eq!(a.id, EmployeeId(1));
        assert_eq!(c.id, EmployeeId(3));
    }

    #[test]
    fn given_highest_possible_id_when_adding_then_reports_exhausted_id_space() {
        let mut roster = Roster::from_records(vec![employee(u64::MAX, None)]).unwrap();

        let err = roster.add(EmployeeDraft::new("B")).unwrap_err();

        assert_eq!(err, DomainError::IdSpaceExhausted);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.add(EmployeeDraft::new("C")), Err(DomainError::IdSpaceExhausted));
    }

    #[test]
    fn given_counter_near_limit_when_adding_then_stops_before_wrapping() {
        let mut roster = Roster::new();
        roster.next_id = u64::MAX - 1;

        let last = roster.add(EmployeeDraft::new("A")).unwrap();
        let overflow = roster.add(EmployeeDraft::new("B"));

        assert_eq!(last.id, EmployeeId(u64::MAX - 1));
        assert_eq!(overflow, Err(DomainError::IdSpaceExhausted));
    }

    #[test]
    fn given_self_loop_when_validating_then_flags_cycle() {
        let violations = validate_forest(&[employee(1, Some(1))]);
        assert_eq!(
            violations,
            vec![Violation {
                id: EmployeeId(1),
                kind: ViolationKind::Cycle
            }]
        );
    }

    #[test]
    fn given_chain_into_cycle_when_validating_then_flags_every_member() {
        let records = vec![
            employee(1, Some(2)),
            employee(2, Some(3)),
            employee(3, Some(2)),
            employee(4, None),
        ];

        let flagged: Vec<_> = validate_forest(&records).into_iter().map(|v| v.id.0).collect();

        assert_eq!(flagged, vec![1, 2, 3]);
    }
}
