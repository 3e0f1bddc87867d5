//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing the store
//! to be tested with in-memory implementations.

use std::io;
use std::path::Path;

use crate::domain::{Employee, EmployeeId, ExternalRef};
use crate::infrastructure::InfraResult;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace file content atomically (temp file in the same directory, then rename).
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// Loads and saves the complete employee set as one document.
pub trait PersistenceAdapter: Send + Sync {
    /// `None` when nothing has been stored yet.
    fn load(&self) -> InfraResult<Option<Vec<Employee>>>;

    /// Store the complete current set (never a diff).
    fn save(&self, employees: &[Employee]) -> InfraResult<()>;
}

/// What the store hands to the external system on add/update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPayload {
    pub employee: Employee,
    /// Name of the manager at commit time; external boards key on names, not ids.
    pub manager_name: Option<String>,
}

impl SyncPayload {
    pub fn id(&self) -> EmployeeId {
        self.employee.id
    }
}

/// Mirrors employees into an external column-based system.
pub trait SyncAdapter: Send + Sync {
    /// Create or update the external record; returns its handle.
    fn push(&self, payload: &SyncPayload) -> InfraResult<ExternalRef>;

    /// Delete the external record.
    fn retract(&self, external_ref: &ExternalRef) -> InfraResult<()>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        use std::io::Write;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
