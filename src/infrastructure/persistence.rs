//! Persistence adapters for the employee set.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::domain::Employee;
use crate::infrastructure::traits::{FileSystem, PersistenceAdapter};
use crate::infrastructure::{InfraError, InfraResult};

/// Stores the set as one pretty-printed JSON array.
pub struct JsonFilePersistence {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceAdapter for JsonFilePersistence {
    fn load(&self) -> InfraResult<Option<Vec<Employee>>> {
        if !self.fs.exists(&self.path) {
            debug!("load: {} does not exist", self.path.display());
            return Ok(None);
        }
        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| InfraError::io(format!("read {}", self.path.display()), e))?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let employees: Vec<Employee> = serde_json::from_str(&content)
            .map_err(|e| InfraError::serialization(format!("parse {}", self.path.display()), e))?;
        debug!("load: {} employees from {}", employees.len(), self.path.display());
        Ok(Some(employees))
    }

    fn save(&self, employees: &[Employee]) -> InfraResult<()> {
        let content = serde_json::to_string_pretty(employees)
            .map_err(|e| InfraError::serialization("serialize employees", e))?;
        self.fs
            .ensure_parent(&self.path)
            .map_err(|e| InfraError::io(format!("create parent of {}", self.path.display()), e))?;
        self.fs
            .write_atomic(&self.path, &(content + "\n"))
            .map_err(|e| InfraError::io(format!("write {}", self.path.display()), e))
    }
}

/// Keeps the last saved set in memory; for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    stored: Mutex<Option<Vec<Employee>>>,
    saves: Mutex<usize>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Employee>) -> Self {
        Self {
            stored: Mutex::new(Some(records)),
            saves: Mutex::new(0),
        }
    }

    /// Last saved (or initially provided) set; `None` also when the lock is poisoned.
    pub fn snapshot(&self) -> Option<Vec<Employee>> {
        self.stored.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of completed `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }
}

impl PersistenceAdapter for MemoryPersistence {
    fn load(&self) -> InfraResult<Option<Vec<Employee>>> {
        let stored = self.stored.lock().map_err(|_| poisoned())?;
        Ok(stored.clone())
    }

    fn save(&self, employees: &[Employee]) -> InfraResult<()> {
        *self.stored.lock().map_err(|_| poisoned())? = Some(employees.to_vec());
        *self.saves.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }
}

fn poisoned() -> InfraError {
    InfraError::io("memory store", std::io::Error::other("lock poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmployeeDraft, EmployeeId};
    use crate::infrastructure::traits::RealFileSystem;
    use tempfile::TempDir;

    #[test]
    fn given_missing_file_when_loading_then_returns_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("employees.json");
        let adapter = JsonFilePersistence::new(Arc::new(RealFileSystem), path);

        assert_eq!(adapter.load().unwrap(), None);
    }

    #[test]
    fn given_saved_set_when_loading_then_returns_same_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("employees.json");
        let adapter = JsonFilePersistence::new(Arc::new(RealFileSystem), &path);
        let records = vec![
            Employee::from_draft(
                EmployeeId(1),
                EmployeeDraft::new("John Smith").custom_field("office", "Berlin"),
            ),
            Employee::from_draft(
                EmployeeId(2),
                EmployeeDraft::new("Sarah Johnson").manager(EmployeeId(1)),
            ),
        ];

        adapter.save(&records).unwrap();

        assert_eq!(adapter.load().unwrap(), Some(records));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"managerId\": 1"));
        assert!(raw.contains("\"customFields\""));
    }

    #[test]
    fn given_garbage_file_when_loading_then_reports_serialization_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("employees.json");
        std::fs::write(&path, "{ not json").unwrap();
        let adapter = JsonFilePersistence::new(Arc::new(RealFileSystem), &path);

        let err = adapter.load().unwrap_err();

        assert!(matches!(err, InfraError::Serialization { .. }), "got {err:?}");
    }

    #[test]
    fn given_poisoned_memory_store_when_loading_then_reports_error_instead_of_nothing() {
        // Arrange
        let store = Arc::new(MemoryPersistence::with_records(vec![Employee::from_draft(
            EmployeeId(1),
            EmployeeDraft::new("John Smith"),
        )]));
        let holder = Arc::clone(&store);
        let crashed = std::thread::spawn(move || {
            let _guard = holder.stored.lock().unwrap();
            panic!("crash while holding the lock");
        })
        .join();
        assert!(crashed.is_err());

        // Act
        let result = store.load();

        // Assert
        assert!(matches!(result, Err(InfraError::Io { .. })), "got {result:?}");
    }
}
