//! File-backed external board: employees mirrored as items with JSON-valued columns.
//!
//! Column ids come from configuration. No title matching or label lookup is
//! done here, and manager names are carried as plain text, never resolved.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ColumnConfig;
use crate::domain::{EmployeeDraft, ExternalRecord, ExternalRef};
use crate::infrastructure::traits::{FileSystem, SyncAdapter, SyncPayload};
use crate::infrastructure::{InfraError, InfraResult};

const CUSTOM_PREFIX: &str = "cf_";

/// The whole board document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub items: BTreeMap<String, BoardItem>,
}

/// One row of the board. Column values are JSON strings, e.g. `{"text":"CTO"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardItem {
    pub name: String,
    #[serde(default)]
    pub column_values: BTreeMap<String, String>,
}

/// Field values recovered from a board item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedItem {
    pub draft: EmployeeDraft,
    /// Raw manager column text; mapping it to an id is left to the caller.
    pub manager_name: Option<String>,
}

pub struct BoardSync {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    columns: ColumnConfig,
    country_code: String,
    field_sanitizer: Regex,
    // push/retract may overlap when an attempt outlives its timeout
    lock: Mutex<()>,
}

impl BoardSync {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        columns: ColumnConfig,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            path: path.into(),
            columns,
            country_code: country_code.into(),
            field_sanitizer: Regex::new(r"[^A-Za-z0-9_]").expect("static pattern"),
            lock: Mutex::new(()),
        }
    }

    /// Current board content; an absent file is an empty board.
    pub fn items(&self) -> InfraResult<BTreeMap<String, BoardItem>> {
        Ok(self.read_board()?.items)
    }

    /// Column id used for a custom field.
    ///
    /// Names that collide with a configured column get the `cf_` prefix, so a
    /// custom field never overwrites a structural one.
    pub fn custom_column_id(&self, field: &str) -> String {
        let column = self
            .field_sanitizer
            .replace_all(field.trim(), "_")
            .to_lowercase();
        if self.is_reserved(&column) {
            debug!("board: custom field '{}' moved to {}{}", field, CUSTOM_PREFIX, column);
            format!("{CUSTOM_PREFIX}{column}")
        } else {
            column
        }
    }

    fn is_reserved(&self, column: &str) -> bool {
        let c = &self.columns;
        !column.is_empty()
            && [&c.position, &c.department, &c.email, &c.phone, &c.manager]
                .iter()
                .any(|reserved| reserved.as_str() == column)
    }

    /// Column values for an employee. Empty values are left out.
    pub fn encode(&self, payload: &SyncPayload) -> BoardItem {
        let employee = &payload.employee;
        let mut values = BTreeMap::new();
        let mut put = |column: &str, value: Value| {
            if !column.is_empty() {
                values.insert(column.to_string(), value.to_string());
            }
        };

        if !employee.position.is_empty() {
            put(&self.columns.position, json!({ "text": employee.position }));
        }
        if !employee.department.is_empty() {
            put(&self.columns.department, json!({ "text": employee.department }));
        }
        if !employee.email.is_empty() {
            put(
                &self.columns.email,
                json!({ "email": employee.email, "text": employee.email }),
            );
        }
        if !employee.phone.is_empty() {
            put(
                &self.columns.phone,
                json!({ "phone": employee.phone, "countryShortName": self.country_code }),
            );
        }
        if let Some(manager) = payload.manager_name.as_deref().filter(|m| !m.is_empty()) {
            put(&self.columns.manager, json!({ "text": manager }));
        }
        for (field, value) in &employee.custom_fields {
            if value.trim().is_empty() {
                continue;
            }
            let column = self.custom_column_id(field);
            put(&column, json!({ "text": value }));
        }

        BoardItem {
            name: employee.name.clone(),
            column_values: values,
        }
    }

    /// Inverse of [`BoardSync::encode`]; unknown columns become custom fields.
    pub fn decode_item(&self, item: &BoardItem) -> DecodedItem {
        let mut draft = EmployeeDraft::new(item.name.trim());
        let mut manager_name = None;

        for (column, raw) in &item.column_values {
            let c = column.as_str();
            if c == self.columns.position {
                draft.position = column_text(raw, &["text", "value"]);
            } else if c == self.columns.department {
                draft.department = column_text(raw, &["text", "value"]);
            } else if c == self.columns.email {
                draft.email = column_text(raw, &["email", "text"]);
            } else if c == self.columns.phone {
                draft.phone = column_text(raw, &["phone", "text"]);
            } else if c == self.columns.manager {
                manager_name = Some(column_text(raw, &["text", "value"])).filter(|m| !m.is_empty());
            } else {
                let value = column_text(raw, &["text", "value"]);
                if !value.is_empty() {
                    let field = column
                        .strip_prefix(CUSTOM_PREFIX)
                        .filter(|rest| self.is_reserved(rest))
                        .unwrap_or(column);
                    draft.custom_fields.insert(field.to_string(), value);
                }
            }
        }

        DecodedItem {
            draft,
            manager_name,
        }
    }

    /// Every board item as a record for a bulk import into the store.
    pub fn pull(&self) -> InfraResult<Vec<ExternalRecord>> {
        let items = self.items()?;
        debug!("board: pulled {} items", items.len());
        Ok(items
            .into_iter()
            .map(|(item_id, item)| {
                let decoded = self.decode_item(&item);
                ExternalRecord {
                    external_ref: ExternalRef(item_id),
                    draft: decoded.draft,
                    manager_name: decoded.manager_name,
                }
            })
            .collect())
    }

    fn read_board(&self) -> InfraResult<Board> {
        if !self.fs.exists(&self.path) {
            return Ok(Board::default());
        }
        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| InfraError::io(format!("read board {}", self.path.display()), e))?;
        if content.trim().is_empty() {
            return Ok(Board::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            InfraError::serialization(format!("parse board {}", self.path.display()), e)
        })
    }

    fn write_board(&self, board: &Board) -> InfraResult<()> {
        let content = serde_json::to_string_pretty(board)
            .map_err(|e| InfraError::serialization("serialize board", e))?;
        self.fs
            .ensure_parent(&self.path)
            .map_err(|e| InfraError::io(format!("create parent of {}", self.path.display()), e))?;
        self.fs
            .write_atomic(&self.path, &content)
            .map_err(|e| InfraError::io(format!("write board {}", self.path.display()), e))
    }

    fn locked(&self) -> InfraResult<std::sync::MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| InfraError::Sync {
            message: "board lock poisoned".into(),
        })
    }
}

impl SyncAdapter for BoardSync {
    fn push(&self, payload: &SyncPayload) -> InfraResult<ExternalRef> {
        let _guard = self.locked()?;
        let mut board = self.read_board()?;
        let item = self.encode(payload);

        let existing = payload
            .employee
            .external_ref
            .as_ref()
            .map(|r| r.as_str().to_string())
            .filter(|r| board.items.contains_key(r));
        let item_id = match existing {
            Some(id) => {
                debug!("board: updating item {}", id);
                id
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                debug!("board: creating item {}", id);
                id
            }
        };

        board.items.insert(item_id.clone(), item);
        self.write_board(&board)?;
        Ok(ExternalRef(item_id))
    }

    fn retract(&self, external_ref: &ExternalRef) -> InfraResult<()> {
        let _guard = self.locked()?;
        let mut board = self.read_board()?;
        if board.items.remove(external_ref.as_str()).is_none() {
            debug!("board: item {} already gone", external_ref);
            return Ok(());
        }
        self.write_board(&board)
    }
}

/// First non-empty string among `keys` of a JSON column value.
/// Values that are not JSON objects are taken verbatim.
fn column_text(raw: &str, keys: &[&str]) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => keys
            .iter()
            .filter_map(|k| map.get(*k))
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .find(|s| !s.is_empty())
            .unwrap_or_default(),
        Ok(Value::String(s)) => s.trim().to_string(),
        _ => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Employee, EmployeeId};
    use crate::infrastructure::traits::RealFileSystem;
    use rstest::rstest;

    fn board(path: PathBuf) -> BoardSync {
        BoardSync::new(Arc::new(RealFileSystem), path, ColumnConfig::default(), "US")
    }

    #[rstest]
    #[case("Start Date", "start_date")]
    #[case("Cost-Center #", "cost_center__")]
    #[case("office", "office")]
    #[case("Position", "cf_position")]
    #[case("manager", "cf_manager")]
    fn given_field_name_when_sanitizing_then_matches_column_id(
        #[case] field: &str,
        #[case] expected: &str,
    ) {
        let sync = board(PathBuf::from("unused.json"));
        assert_eq!(sync.custom_column_id(field), expected);
    }

    #[rstest]
    #[case(r#"{"text":"CTO"}"#, "CTO")]
    #[case(r#"{"value":"CTO"}"#, "CTO")]
    #[case("\"CTO\"", "CTO")]
    #[case("CTO", "CTO")]
    #[case(r#"{"labels":[3]}"#, "")]
    fn given_column_value_when_reading_text_then_extracts_it(
        #[case] raw: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(column_text(raw, &["text", "value"]), expected);
    }

    #[test]
    fn given_employee_when_encoding_then_uses_json_column_values() {
        let sync = board(PathBuf::from("unused.json"));
        let employee = Employee::from_draft(
            EmployeeId(2),
            EmployeeDraft::new("Sarah Johnson")
                .position("CTO")
                .email("sarah.johnson@company.com")
                .phone("+1-555-102-1002")
                .custom_field("Start Date", "2020-01-01"),
        );
        let payload = SyncPayload {
            employee,
            manager_name: Some("John Smith".into()),
        };

        let item = sync.encode(&payload);

        assert_eq!(item.name, "Sarah Johnson");
        assert_eq!(item.column_values["position"], r#"{"text":"CTO"}"#);
        assert_eq!(
            item.column_values["phone"],
            r#"{"countryShortName":"US","phone":"+1-555-102-1002"}"#
        );
        assert_eq!(item.column_values["manager"], r#"{"text":"John Smith"}"#);
        assert_eq!(item.column_values["start_date"], r#"{"text":"2020-01-01"}"#);
        assert!(!item.column_values.contains_key("department"));

        let decoded = sync.decode_item(&item);
        assert_eq!(decoded.draft.position, "CTO");
        assert_eq!(decoded.draft.email, "sarah.johnson@company.com");
        assert_eq!(decoded.manager_name.as_deref(), Some("John Smith"));
        assert_eq!(decoded.draft.custom_fields["start_date"], "2020-01-01");
    }

    #[test]
    fn given_custom_field_named_like_column_when_encoding_then_keeps_structural_value() {
        // Arrange
        let sync = board(PathBuf::from("unused.json"));
        let employee = Employee::from_draft(
            EmployeeId(2),
            EmployeeDraft::new("Sarah Johnson")
                .position("CTO")
                .custom_field("Position", "legacy title")
                .custom_field("Manager", "Bob"),
        );
        let payload = SyncPayload {
            employee,
            manager_name: Some("John Smith".into()),
        };

        // Act
        let item = sync.encode(&payload);
        let decoded = sync.decode_item(&item);

        // Assert
        assert_eq!(item.column_values["position"], r#"{"text":"CTO"}"#);
        assert_eq!(item.column_values["manager"], r#"{"text":"John Smith"}"#);
        assert_eq!(item.column_values["cf_position"], r#"{"text":"legacy title"}"#);
        assert_eq!(decoded.draft.position, "CTO");
        assert_eq!(decoded.manager_name.as_deref(), Some("John Smith"));
        assert_eq!(decoded.draft.custom_fields["position"], "legacy title");
        assert_eq!(decoded.draft.custom_fields["manager"], "Bob");
    }

    #[test]
    fn given_prefixed_column_not_reserved_when_decoding_then_keeps_column_id() {
        let sync = board(PathBuf::from("unused.json"));
        let item = BoardItem {
            name: "Mike Davis".into(),
            column_values: BTreeMap::from([(
                "cf_budget".to_string(),
                r#"{"text":"12k"}"#.to_string(),
            )]),
        };

        let decoded = sync.decode_item(&item);

        assert_eq!(decoded.draft.custom_fields["cf_budget"], "12k");
    }
}
