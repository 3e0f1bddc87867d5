//! Service container for dependency injection
//!
//! Wires the store up with its adapters according to the settings.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::{HierarchyStore, StoreOptions};
use crate::config::Settings;
use crate::infrastructure::board::BoardSync;
use crate::infrastructure::persistence::JsonFilePersistence;
use crate::infrastructure::traits::{FileSystem, PersistenceAdapter, RealFileSystem, SyncAdapter};
use crate::infrastructure::InfraResult;

/// Container holding settings and the I/O adapters built from them.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Employee document
    pub persistence: Arc<dyn PersistenceAdapter>,

    /// External board, when sync is enabled
    pub board: Option<Arc<BoardSync>>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with a custom filesystem (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let persistence: Arc<dyn PersistenceAdapter> = Arc::new(JsonFilePersistence::new(
            Arc::clone(&fs),
            settings.data_file.clone(),
        ));
        let board = settings.sync.enabled.then(|| {
            Arc::new(BoardSync::new(
                Arc::clone(&fs),
                settings.sync.board_file.clone(),
                settings.sync.columns.clone(),
                settings.sync.country_code.clone(),
            ))
        });
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            persistence,
            board,
        }
    }

    /// Open the hierarchy store with the configured adapters.
    pub fn open_store(&self) -> InfraResult<HierarchyStore> {
        debug!(
            "open_store: data_file={} sync={}",
            self.settings.data_file.display(),
            self.board.is_some()
        );
        let sync = self
            .board
            .as_ref()
            .map(|b| Arc::clone(b) as Arc<dyn SyncAdapter>);
        let options = StoreOptions {
            seed_sample_data: self.settings.seed_sample_data,
            sync_timeout: self.settings.sync.timeout(),
        };
        Ok(HierarchyStore::open(Arc::clone(&self.persistence), sync, options)?)
    }
}
