//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/orgchart/orgchart.toml`
//! 3. Local config: `<dir>/.orgchart.toml`
//! 4. Environment variables: `ORGCHART_*` prefix

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Board column ids used by the external sync. An empty id disables the column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnConfig {
    pub position: String,
    pub department: String,
    pub email: String,
    pub phone: String,
    pub manager: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            position: "position".into(),
            department: "department".into(),
            email: "email".into(),
            phone: "phone".into(),
            manager: "manager".into(),
        }
    }
}

/// External board synchronization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Board document mirrored to
    pub board_file: PathBuf,
    /// Upper bound for one push/retract attempt
    pub timeout_ms: u64,
    /// Country code sent with phone columns
    pub country_code: String,
    pub columns: ColumnConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            board_file: default_base_dir().join("board.json"),
            timeout_ms: 5000,
            country_code: "US".into(),
            columns: ColumnConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Partially specified settings from one config file.
///
/// `None` means "not specified here, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub data_file: Option<PathBuf>,
    pub seed_sample_data: Option<bool>,
    pub sync: RawSyncConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSyncConfig {
    pub enabled: Option<bool>,
    pub board_file: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub country_code: Option<String>,
    pub columns: RawColumnConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawColumnConfig {
    pub position: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub manager: Option<String>,
}

/// Unified configuration for orgchart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Employee document (default: ~/.orgchart/employees.json)
    pub data_file: PathBuf,
    /// Seed an empty store with the sample organization
    pub seed_sample_data: bool,
    pub sync: SyncConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: default_base_dir().join("employees.json"),
            seed_sample_data: true,
            sync: SyncConfig::default(),
        }
    }
}

/// Get the default base directory (~/.orgchart).
fn default_base_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".orgchart"))
        .unwrap_or_else(|| PathBuf::from("~/.orgchart"))
}

/// Get the XDG config directory for orgchart.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "orgchart").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("orgchart.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".orgchart.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input as is.
fn expand(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

fn pick<T: Clone>(overlay: &Option<T>, base: &T) -> T {
    overlay.clone().unwrap_or_else(|| base.clone())
}

impl ColumnConfig {
    fn merge(&self, overlay: &RawColumnConfig) -> Self {
        Self {
            position: pick(&overlay.position, &self.position),
            department: pick(&overlay.department, &self.department),
            email: pick(&overlay.email, &self.email),
            phone: pick(&overlay.phone, &self.phone),
            manager: pick(&overlay.manager, &self.manager),
        }
    }
}

impl SyncConfig {
    fn merge(&self, overlay: &RawSyncConfig) -> Self {
        Self {
            enabled: pick(&overlay.enabled, &self.enabled),
            board_file: pick(&overlay.board_file, &self.board_file),
            timeout_ms: pick(&overlay.timeout_ms, &self.timeout_ms),
            country_code: pick(&overlay.country_code, &self.country_code),
            columns: self.columns.merge(&overlay.columns),
        }
    }
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        self.data_file = PathBuf::from(expand(self.data_file.to_string_lossy().as_ref()));
        self.sync.board_file =
            PathBuf::from(expand(self.sync.board_file.to_string_lossy().as_ref()));
    }

    /// Merge overlay config onto self; specified values win.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            data_file: pick(&overlay.data_file, &self.data_file),
            seed_sample_data: pick(&overlay.seed_sample_data, &self.seed_sample_data),
            sync: self.sync.merge(&overlay.sync),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.orgchart.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Apply ORGCHART_* environment variables as explicit overrides.
    ///
    /// Nested keys use `__`, e.g. `ORGCHART_SYNC__ENABLED=true`.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("ORGCHART")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("data_file") {
            settings.data_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_bool("seed_sample_data") {
            settings.seed_sample_data = val;
        }
        if let Ok(val) = config.get_bool("sync.enabled") {
            settings.sync.enabled = val;
        }
        if let Ok(val) = config.get_string("sync.board_file") {
            settings.sync.board_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_int("sync.timeout_ms") {
            settings.sync.timeout_ms = u64::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("sync.timeout_ms must not be negative: {val}"),
            })?;
        }
        if let Ok(val) = config.get_string("sync.country_code") {
            settings.sync.country_code = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# orgchart configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/orgchart/orgchart.toml
#   Local:  <dir>/.orgchart.toml
#   Env:    ORGCHART_* environment variables (nested keys use __)

# Employee document
# data_file = "~/.orgchart/employees.json"

# Fill an empty store with a sample organization
# seed_sample_data = true

[sync]
# Mirror employees to the external board
# enabled = false
# board_file = "~/.orgchart/board.json"
# timeout_ms = 5000
# country_code = "US"

[sync.columns]
# Board column ids; set to "" to skip a column
# position = "position"
# department = "department"
# email = "email"
# phone = "phone"
# manager = "manager"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
