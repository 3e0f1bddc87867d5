//! Tests for the file-backed board and its use as the store's sync target

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use orgchart::application::services::{HierarchyStore, StoreOptions};
use orgchart::config::{ColumnConfig, Settings, SyncConfig};
use orgchart::domain::{
    DomainError, Employee, EmployeeDraft, EmployeeId, EmployeePatch, ExternalRef, ViolationKind,
};
use orgchart::infrastructure::persistence::MemoryPersistence;
use orgchart::infrastructure::board::BoardSync;
use orgchart::infrastructure::di::ServiceContainer;
use orgchart::infrastructure::traits::{RealFileSystem, SyncAdapter, SyncPayload};
use orgchart::util::testing;

fn board_at(dir: &TempDir) -> BoardSync {
    BoardSync::new(
        Arc::new(RealFileSystem),
        dir.path().join("board.json"),
        ColumnConfig::default(),
        "DE",
    )
}

fn options() -> StoreOptions {
    StoreOptions {
        seed_sample_data: false,
        sync_timeout: Duration::from_secs(2),
    }
}

fn push_item(board: &BoardSync, id: u64, name: &str, manager_name: Option<&str>) -> ExternalRef {
    let employee = Employee::from_draft(EmployeeId(id), EmployeeDraft::new(name));
    board.push(&payload(employee, manager_name)).unwrap()
}

fn payload(employee: Employee, manager_name: Option<&str>) -> SyncPayload {
    SyncPayload {
        employee,
        manager_name: manager_name.map(str::to_string),
    }
}

#[test]
fn given_new_employee_when_pushing_then_creates_item() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let board = board_at(&dir);
    let employee = Employee::from_draft(
        EmployeeId(7),
        EmployeeDraft::new("Emma Wilson").department("Marketing").phone("+49 30 1234"),
    );

    // Act
    let item_id = board.push(&payload(employee, Some("Mike Davis"))).unwrap();

    // Assert
    let items = board.items().unwrap();
    assert_eq!(items.len(), 1);
    let item = &items[item_id.as_str()];
    assert_eq!(item.name, "Emma Wilson");
    assert!(item.column_values["phone"].contains("\"countryShortName\":\"DE\""));
    let decoded = board.decode_item(item);
    assert_eq!(decoded.draft.department, "Marketing");
    assert_eq!(decoded.manager_name.as_deref(), Some("Mike Davis"));
}

#[test]
fn given_known_external_ref_when_pushing_then_updates_same_item() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let board = board_at(&dir);
    let mut employee = Employee::from_draft(EmployeeId(1), EmployeeDraft::new("John Smith"));
    let first = board.push(&payload(employee.clone(), None)).unwrap();

    // Act
    employee.external_ref = Some(first.clone());
    employee.position = "CEO".into();
    let second = board.push(&payload(employee, None)).unwrap();

    // Assert
    assert_eq!(first, second);
    let items = board.items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(board.decode_item(&items[first.as_str()]).draft.position, "CEO");
}

#[test]
fn given_stale_external_ref_when_pushing_then_creates_fresh_item() {
    let dir = TempDir::new().unwrap();
    let board = board_at(&dir);
    let mut employee = Employee::from_draft(EmployeeId(1), EmployeeDraft::new("John Smith"));
    employee.external_ref = Some(ExternalRef("gone".into()));

    let item_id = board.push(&payload(employee, None)).unwrap();

    assert_ne!(item_id.as_str(), "gone");
    assert_eq!(board.items().unwrap().len(), 1);
}

#[test]
fn given_item_when_retracting_twice_then_second_call_is_noop() {
    let dir = TempDir::new().unwrap();
    let board = board_at(&dir);
    let employee = Employee::from_draft(EmployeeId(1), EmployeeDraft::new("John Smith"));
    let item_id = board.push(&payload(employee, None)).unwrap();

    board.retract(&item_id).unwrap();
    board.retract(&item_id).unwrap();

    assert!(board.items().unwrap().is_empty());
}

#[test]
fn given_sync_enabled_container_when_mutating_then_board_follows_store() {
    // Arrange
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();
    let settings = Settings {
        data_file: dir.path().join("employees.json"),
        seed_sample_data: false,
        sync: SyncConfig {
            enabled: true,
            board_file: dir.path().join("board.json"),
            ..SyncConfig::default()
        },
    };
    let container = ServiceContainer::new(settings);
    let mut store = container.open_store().unwrap();

    // Act
    let ceo = store.add(EmployeeDraft::new("John Smith").position("CEO")).unwrap();
    let cto = store
        .add(EmployeeDraft::new("Sarah Johnson").manager(ceo.id))
        .unwrap();
    store
        .update(
            cto.id,
            EmployeePatch {
                department: Some("Technology".into()),
                ..EmployeePatch::default()
            },
        )
        .unwrap();
    store.flush();
    store.flush();

    // Assert
    let board = container.board.as_ref().unwrap();
    let items = board.items().unwrap();
    assert_eq!(items.len(), 2);
    let cto_ref = store.get(cto.id).unwrap().external_ref.clone().unwrap();
    let decoded = board.decode_item(&items[cto_ref.as_str()]);
    assert_eq!(decoded.draft.department, "Technology");
    assert_eq!(decoded.manager_name.as_deref(), Some("John Smith"));

    // Act: removal retracts the item
    store.remove(cto.id).unwrap();
    assert!(store.shutdown().is_empty());

    // Assert
    let items = board.items().unwrap();
    assert_eq!(items.len(), 1);
    assert!(!items.contains_key(cto_ref.as_str()));
}

#[test]
fn given_unreadable_board_when_adding_then_store_commits_with_sync_warning() {
    // Arrange
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("board.json"), "{ broken").unwrap();
    let persistence = Arc::new(MemoryPersistence::new());
    let mut store =
        HierarchyStore::open(persistence, Some(Arc::new(board_at(&dir))), options()).unwrap();

    // Act
    let added = store.add(EmployeeDraft::new("John Smith")).unwrap();
    store.flush();

    // Assert
    assert!(store.get(added.id).is_some());
    let warnings = store.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("not synchronized"));
}

#[test]
fn given_board_items_when_pulling_into_store_then_managers_resolve_by_name() {
    // Arrange
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();
    let board = board_at(&dir);
    let ceo_ref = push_item(&board, 1, "John Smith", None);
    let cto_ref = push_item(&board, 2, "Sarah Johnson", Some("John Smith"));
    push_item(&board, 3, "Mike Davis", Some("Sarah Johnson"));
    let persistence = Arc::new(MemoryPersistence::new());
    let mut store = HierarchyStore::open(persistence.clone(), None, options()).unwrap();

    // Act
    let count = store.import_external(board.pull().unwrap()).unwrap();
    store.flush();

    // Assert
    assert_eq!(count, 3);
    let by_ref = |r: &ExternalRef| {
        store
            .all()
            .into_iter()
            .find(|e| e.external_ref.as_ref() == Some(r))
            .map(|e| e.id)
            .unwrap()
    };
    let ceo = by_ref(&ceo_ref);
    let cto = by_ref(&cto_ref);
    assert_eq!(store.get(ceo).unwrap().manager_id, None);
    assert_eq!(store.get(cto).unwrap().manager_id, Some(ceo));
    assert_eq!(store.subtree_size(ceo).unwrap(), 2);
    assert_eq!(persistence.snapshot().map(|s| s.len()), Some(3));
}

#[test]
fn given_ambiguous_manager_name_on_board_when_pulling_then_store_is_unchanged() {
    // Arrange
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();
    let board = board_at(&dir);
    push_item(&board, 1, "Alex Kim", None);
    push_item(&board, 2, "Alex Kim", None);
    push_item(&board, 3, "Lisa Chen", Some("Alex Kim"));
    let persistence = Arc::new(MemoryPersistence::with_records(vec![Employee::from_draft(
        EmployeeId(1),
        EmployeeDraft::new("Existing"),
    )]));
    let mut store = HierarchyStore::open(persistence, None, options()).unwrap();

    // Act
    let err = store.import_external(board.pull().unwrap()).unwrap_err();

    // Assert
    let DomainError::Validation(violations) = err else {
        panic!("expected validation error");
    };
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::AmbiguousManager("Alex Kim".into()));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(EmployeeId(1)).unwrap().name, "Existing");
}
