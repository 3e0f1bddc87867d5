//! Domain entities: core data structures

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an employee, stable for the lifetime of the record.
///
/// Serialized as a plain unsigned integer so documents written by the
/// browser widget (which used numeric ids) load unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub u64);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EmployeeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(EmployeeId)
    }
}

/// Handle to the matching record in an external system (e.g. a board item id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalRef(pub String);

impl ExternalRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One node in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub department: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub email: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub phone: String,
    /// `None` marks a root.
    #[serde(default)]
    pub manager_id: Option<EmployeeId>,
    /// `None` means "not yet synchronized".
    #[serde(default, alias = "mondayItemId", deserialize_with = "lenient_ref")]
    pub external_ref: Option<ExternalRef>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

impl Employee {
    /// Materialize a draft under the given id.
    pub fn from_draft(id: EmployeeId, draft: EmployeeDraft) -> Self {
        Self {
            id,
            name: draft.name,
            position: draft.position,
            department: draft.department,
            email: draft.email,
            phone: draft.phone,
            manager_id: draft.manager_id,
            external_ref: draft.external_ref,
            custom_fields: draft.custom_fields,
        }
    }

    pub fn is_root(&self) -> bool {
        self.manager_id.is_none()
    }

    /// Copy with the patch applied; `id` and `external_ref` are untouched.
    pub fn patched(&self, patch: &EmployeePatch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(position) = &patch.position {
            next.position = position.clone();
        }
        if let Some(department) = &patch.department {
            next.department = department.clone();
        }
        if let Some(email) = &patch.email {
            next.email = email.clone();
        }
        if let Some(phone) = &patch.phone {
            next.phone = phone.clone();
        }
        if let Some(manager_id) = patch.manager_id {
            next.manager_id = manager_id;
        }
        if let Some(fields) = &patch.custom_fields {
            next.custom_fields = fields.clone();
        }
        next
    }
}

/// A record about to be added; the store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeDraft {
    pub name: String,
    pub position: String,
    pub department: String,
    pub email: String,
    pub phone: String,
    pub manager_id: Option<EmployeeId>,
    pub external_ref: Option<ExternalRef>,
    pub custom_fields: BTreeMap<String, String>,
}

impl EmployeeDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn position(mut self, position: impl Into<String>) -> Self {
        self.position = position.into();
        self
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn manager(mut self, manager_id: EmployeeId) -> Self {
        self.manager_id = Some(manager_id);
        self
    }

    pub fn custom_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_fields.insert(key.into(), value.into());
        self
    }
}

/// Partial update. `None` leaves a field unchanged.
///
/// `manager_id` is tri-state: `None` keeps the manager, `Some(None)` turns the
/// employee into a root, `Some(Some(id))` re-parents it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub manager_id: Option<Option<EmployeeId>>,
    pub custom_fields: Option<BTreeMap<String, String>>,
}

impl EmployeePatch {
    pub fn manager(manager_id: Option<EmployeeId>) -> Self {
        Self {
            manager_id: Some(manager_id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn changes_manager_of(&self, current: &Employee) -> bool {
        matches!(self.manager_id, Some(m) if m != current.manager_id)
    }
}

// The widget stored `null` for missing contact details.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Item ids were written as numbers or strings depending on the API response.
fn lenient_ref<'de, D>(deserializer: D) -> Result<Option<ExternalRef>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(ExternalRef(s)),
        Some(other) => Some(ExternalRef(other.to_string())),
    })
}
