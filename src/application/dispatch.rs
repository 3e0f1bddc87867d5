//! Background side effects: persistence and external sync.
//!
//! Mutations commit in memory and hand their side effects to a single worker
//! thread. Jobs run in FIFO order, so saves land in commit order. Results come
//! back as [`Outcome`]s which the store applies on its own thread.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{Employee, EmployeeId, ExternalRef};
use crate::infrastructure::traits::{PersistenceAdapter, SyncAdapter, SyncPayload};
use crate::infrastructure::InfraResult;

/// Work handed to the background worker.
pub enum Job {
    Save(Vec<Employee>),
    Push(SyncPayload),
    /// `external_ref` is `None` when the store has not seen the push result yet.
    Retract {
        id: EmployeeId,
        external_ref: Option<ExternalRef>,
    },
    /// The employee set was replaced wholesale; forget refs of earlier pushes.
    Reset,
    /// Acknowledged once every earlier job has run.
    Flush(Sender<()>),
}

/// Result of a background job, applied by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pushed {
        id: EmployeeId,
        external_ref: ExternalRef,
    },
    Warning(Warning),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    Persistence,
    Sync,
}

/// Non-blocking problem surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn persistence(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Persistence,
            message: message.into(),
        }
    }

    pub fn sync(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Sync,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WarningKind::Persistence => write!(f, "persistence: {}", self.message),
            WarningKind::Sync => write!(f, "sync: {}", self.message),
        }
    }
}

/// Handle to the worker thread.
pub struct Dispatcher {
    jobs: Option<Sender<Job>>,
    outcomes: Receiver<Outcome>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the worker.
    pub fn spawn(
        persistence: Arc<dyn PersistenceAdapter>,
        sync: Option<Arc<dyn SyncAdapter>>,
        sync_timeout: Duration,
    ) -> ApplicationResult<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (outcome_tx, outcome_rx) = mpsc::channel::<Outcome>();

        let worker = Worker {
            persistence,
            sync,
            sync_timeout,
            outcomes: outcome_tx,
            known_refs: HashMap::new(),
        };
        let handle = thread::Builder::new()
            .name("orgchart-dispatch".into())
            .spawn(move || worker.run(job_rx))
            .map_err(|e| ApplicationError::OperationFailed {
                context: "spawn side-effect worker".into(),
                source: Box::new(e),
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            worker: Some(handle),
        })
    }

    /// Queue a job; never blocks.
    pub fn submit(&self, job: Job) {
        let sent = self.jobs.as_ref().map(|tx| tx.send(job).is_ok());
        if sent != Some(true) {
            warn!("side-effect worker is gone, job dropped");
        }
    }

    /// Outcomes produced so far, without waiting.
    pub fn drain(&self) -> Vec<Outcome> {
        self.outcomes.try_iter().collect()
    }

    /// Block until every job submitted so far has run.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.submit(Job::Flush(ack_tx));
        // an Err means the worker is gone, nothing left to wait for
        let _ = ack_rx.recv();
    }

    /// Run the remaining queue and stop the worker.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("side-effect worker panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    persistence: Arc<dyn PersistenceAdapter>,
    sync: Option<Arc<dyn SyncAdapter>>,
    sync_timeout: Duration,
    outcomes: Sender<Outcome>,
    // refs obtained by earlier pushes; a later job may run before the store applied them
    known_refs: HashMap<EmployeeId, ExternalRef>,
}

impl Worker {
    fn run(mut self, jobs: Receiver<Job>) {
        for job in jobs {
            match job {
                Job::Save(snapshot) => self.save(&snapshot),
                Job::Push(payload) => self.push(payload),
                Job::Retract { id, external_ref } => self.retract(id, external_ref),
                Job::Reset => {
                    debug!("forgetting {} external ref(s)", self.known_refs.len());
                    self.known_refs.clear();
                }
                Job::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        debug!("side-effect worker stopped");
    }

    fn save(&self, snapshot: &[Employee]) {
        match self.persistence.save(snapshot) {
            Ok(()) => debug!("saved {} employees", snapshot.len()),
            Err(e) => {
                warn!("save failed: {}", e);
                self.report(Outcome::Warning(Warning::persistence(e.to_string())));
            }
        }
    }

    fn push(&mut self, mut payload: SyncPayload) {
        let Some(sync) = self.sync.clone() else {
            return;
        };
        let id = payload.id();
        if payload.employee.external_ref.is_none() {
            payload.employee.external_ref = self.known_refs.get(&id).cloned();
        }
        match with_timeout(self.sync_timeout, move || sync.push(&payload)) {
            Ok(external_ref) => {
                debug!("pushed employee {} as {}", id, external_ref);
                self.known_refs.insert(id, external_ref.clone());
                self.report(Outcome::Pushed { id, external_ref });
            }
            Err(message) => {
                warn!("push of employee {} failed: {}", id, message);
                self.report(Outcome::Warning(Warning::sync(format!(
                    "employee {id} not synchronized: {message}"
                ))));
            }
        }
    }

    fn retract(&mut self, id: EmployeeId, external_ref: Option<ExternalRef>) {
        let Some(sync) = self.sync.clone() else {
            return;
        };
        let known = self.known_refs.remove(&id);
        let Some(external_ref) = external_ref.or(known) else {
            debug!("employee {} was never synchronized, nothing to retract", id);
            return;
        };
        let handle = external_ref.clone();
        match with_timeout(self.sync_timeout, move || sync.retract(&handle)) {
            Ok(()) => debug!("retracted {} for employee {}", external_ref, id),
            Err(message) => {
                warn!("retract of {} failed: {}", external_ref, message);
                self.report(Outcome::Warning(Warning::sync(format!(
                    "external record {external_ref} of employee {id} not deleted: {message}"
                ))));
            }
        }
    }

    fn report(&self, outcome: Outcome) {
        // the store may already be gone during shutdown
        let _ = self.outcomes.send(outcome);
    }
}

/// Run `f` on its own thread and wait at most `timeout`.
///
/// On timeout the attempt is abandoned; the thread finishes on its own.
fn with_timeout<T, F>(timeout: Duration, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> InfraResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("orgchart-sync".into())
        .spawn(move || {
            let _ = tx.send(f());
        })
        .map_err(|e| format!("cannot start sync attempt: {e}"))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(RecvTimeoutError::Timeout) => Err(format!("timed out after {}ms", timeout.as_millis())),
        Err(RecvTimeoutError::Disconnected) => Err("sync attempt aborted".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InfraError;

    #[test]
    fn given_slow_call_when_waiting_then_times_out() {
        let result: Result<(), String> = with_timeout(Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        assert_eq!(result, Err("timed out after 20ms".to_string()));
    }

    #[test]
    fn given_failing_call_when_waiting_then_returns_message() {
        let result: Result<(), String> = with_timeout(Duration::from_secs(1), || {
            Err(InfraError::Sync {
                message: "board offline".into(),
            })
        });
        assert_eq!(result, Err("sync failed: board offline".to_string()));
    }
}
