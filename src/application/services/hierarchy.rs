//! Hierarchy store service
//!
//! Owns the employee forest, enforces its invariants on every mutation and
//! dispatches persistence and external sync after each commit.

use std::sync::Arc;
use std::time::Duration;

use termtree::Tree;
use tracing::{debug, info, warn};

use crate::application::dispatch::{Dispatcher, Job, Outcome, Warning};
use crate::application::{sample, ApplicationError, ApplicationResult};
use crate::domain::{
    render_forest, render_subtree, resolve_external, Ancestors, DomainResult, Employee,
    EmployeeDraft, EmployeeId, EmployeePatch, ExternalRecord, Roster,
};
use crate::infrastructure::traits::{PersistenceAdapter, SyncAdapter, SyncPayload};

/// Startup behavior of the store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Fill an empty store with the sample organization.
    pub seed_sample_data: bool,
    /// Bounded wait for each external sync attempt.
    pub sync_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            seed_sample_data: true,
            sync_timeout: Duration::from_secs(5),
        }
    }
}

/// Single-writer store of the employee forest.
///
/// Mutations are synchronous and atomic: on error the state is unchanged.
/// Persistence and sync run in the background after a commit and never roll
/// it back; their failures surface through [`HierarchyStore::take_warnings`].
pub struct HierarchyStore {
    roster: Roster,
    persistence: Arc<dyn PersistenceAdapter>,
    dispatcher: Dispatcher,
    sync_enabled: bool,
    warnings: Vec<Warning>,
    closed: bool,
}

impl HierarchyStore {
    /// Load the employee set once and start the side-effect worker.
    ///
    /// An absent or empty document is seeded (when enabled) and saved right
    /// away. A document that breaks the invariants aborts startup.
    pub fn open(
        persistence: Arc<dyn PersistenceAdapter>,
        sync: Option<Arc<dyn SyncAdapter>>,
        options: StoreOptions,
    ) -> ApplicationResult<Self> {
        let loaded = persistence
            .load()
            .map_err(|e| ApplicationError::OperationFailed {
                context: "load employees".into(),
                source: Box::new(e),
            })?;

        let mut roster = Roster::new();
        let mut seeded = false;
        match loaded {
            Some(records) if !records.is_empty() => {
                debug!("open: loaded {} employees", records.len());
                roster.replace_all(records)?;
            }
            _ if options.seed_sample_data => {
                info!("open: no employees stored, seeding sample organization");
                roster.replace_all(sample::generate())?;
                seeded = true;
            }
            _ => debug!("open: starting empty"),
        }

        let sync_enabled = sync.is_some();
        let dispatcher = Dispatcher::spawn(Arc::clone(&persistence), sync, options.sync_timeout)?;
        let store = Self {
            roster,
            persistence,
            dispatcher,
            sync_enabled,
            warnings: Vec::new(),
            closed: false,
        };
        if seeded {
            store.persist();
        }
        Ok(store)
    }

    /// Add an employee; the store assigns its id.
    pub fn add(&mut self, draft: EmployeeDraft) -> DomainResult<Employee> {
        self.pump();
        let employee = self.roster.add(draft)?;
        info!("added employee {} ({})", employee.id, employee.name);
        self.persist();
        self.push(&employee);
        Ok(employee)
    }

    /// Change any field of an existing employee, including its manager.
    pub fn update(&mut self, id: EmployeeId, patch: EmployeePatch) -> DomainResult<Employee> {
        self.pump();
        let employee = self.roster.update(id, &patch)?;
        info!("updated employee {}", id);
        self.persist();
        self.push(&employee);
        Ok(employee)
    }

    /// Delete an employee nobody reports to. Never cascades.
    pub fn remove(&mut self, id: EmployeeId) -> DomainResult<Employee> {
        self.pump();
        let removed = self.roster.remove(id)?;
        info!("removed employee {} ({})", removed.id, removed.name);
        self.persist();
        if self.sync_enabled {
            self.dispatcher.submit(Job::Retract {
                id,
                external_ref: removed.external_ref.clone(),
            });
        }
        Ok(removed)
    }

    /// Replace the whole set after validating it; all or nothing.
    ///
    /// Waits for queued side effects first, so no late push result lands on
    /// a record of the new set that happens to reuse an id.
    pub fn replace_all(&mut self, records: Vec<Employee>) -> DomainResult<()> {
        self.flush();
        self.roster.replace_all(records)?;
        info!("replaced employee set ({} employees)", self.roster.len());
        self.dispatcher.submit(Job::Reset);
        self.persist();
        Ok(())
    }

    /// Replace the set with records pulled from the external board.
    ///
    /// Manager names must match exactly one pulled record.
    pub fn import_external(&mut self, records: Vec<ExternalRecord>) -> DomainResult<usize> {
        self.flush();
        let employees = resolve_external(records, &self.roster)?;
        let count = employees.len();
        self.replace_all(employees)?;
        Ok(count)
    }

    /// Replace the set with the sample organization.
    pub fn reset_to_sample(&mut self) -> DomainResult<()> {
        self.replace_all(sample::generate())
    }

    pub fn get(&self, id: EmployeeId) -> Option<&Employee> {
        self.roster.get(id)
    }

    /// The full employee set, ordered by id.
    pub fn all(&self) -> Vec<&Employee> {
        self.roster.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn children(&self, id: EmployeeId) -> Vec<&Employee> {
        self.roster.children(id)
    }

    pub fn ancestors(&self, id: EmployeeId) -> DomainResult<Ancestors<'_>> {
        self.roster.ancestors(id)
    }

    pub fn roots(&self) -> Vec<&Employee> {
        self.roster.roots()
    }

    pub fn descendants(&self, id: EmployeeId) -> DomainResult<Vec<&Employee>> {
        self.roster.descendants(id)
    }

    /// Number of direct and indirect reports.
    pub fn subtree_size(&self, id: EmployeeId) -> DomainResult<usize> {
        self.roster.descendants(id).map(|d| d.len())
    }

    pub fn depth(&self, id: EmployeeId) -> DomainResult<usize> {
        self.roster.depth(id)
    }

    pub fn find_by_name(&self, query: &str) -> Vec<&Employee> {
        self.roster.find_by_name(query)
    }

    pub fn departments(&self) -> Vec<String> {
        self.roster.departments()
    }

    pub fn render(&self) -> DomainResult<Vec<Tree<String>>> {
        render_forest(&self.roster)
    }

    pub fn render_subtree(&self, id: EmployeeId) -> DomainResult<Tree<String>> {
        render_subtree(&self.roster, id)
    }

    /// Apply finished background work: record external refs, collect warnings.
    pub fn pump(&mut self) {
        let outcomes = self.dispatcher.drain();
        if self.apply(outcomes) {
            self.persist();
        }
    }

    /// Wait for all queued side effects, then apply their outcomes.
    pub fn flush(&mut self) {
        self.dispatcher.flush();
        self.pump();
    }

    /// Warnings gathered since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.pump();
        std::mem::take(&mut self.warnings)
    }

    /// Drain the queue, save the final state synchronously and stop the worker.
    ///
    /// Returns warnings not yet taken. Also runs on drop.
    pub fn shutdown(&mut self) -> Vec<Warning> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        self.dispatcher.flush();
        let outcomes = self.dispatcher.drain();
        self.apply(outcomes);
        self.dispatcher.shutdown();

        let outcomes = self.dispatcher.drain();
        self.apply(outcomes);
        if let Err(e) = self.persistence.save(&self.roster.to_vec()) {
            warn!("final save failed: {}", e);
            self.warnings.push(Warning::persistence(e.to_string()));
        }
        debug!("store shut down with {} employees", self.roster.len());
        std::mem::take(&mut self.warnings)
    }

    /// Returns true when an external ref was recorded.
    fn apply(&mut self, outcomes: Vec<Outcome>) -> bool {
        let mut changed = false;
        for outcome in outcomes {
            match outcome {
                Outcome::Pushed { id, external_ref } => {
                    let current = self.roster.get(id).and_then(|e| e.external_ref.as_ref());
                    if current == Some(&external_ref) {
                        continue;
                    }
                    if self.roster.set_external_ref(id, external_ref) {
                        debug!("employee {} linked to external record", id);
                        changed = true;
                    } else {
                        debug!("employee {} removed before sync finished", id);
                    }
                }
                Outcome::Warning(warning) => self.warnings.push(warning),
            }
        }
        changed
    }

    fn persist(&self) {
        self.dispatcher.submit(Job::Save(self.roster.to_vec()));
    }

    fn push(&self, employee: &Employee) {
        if !self.sync_enabled {
            return;
        }
        let manager_name = employee
            .manager_id
            .and_then(|m| self.roster.get(m))
            .map(|m| m.name.clone());
        self.dispatcher.submit(Job::Push(SyncPayload {
            employee: employee.clone(),
            manager_name,
        }));
    }
}

impl Drop for HierarchyStore {
    fn drop(&mut self) {
        for warning in self.shutdown() {
            warn!("unreported warning at shutdown: {}", warning);
        }
    }
}
