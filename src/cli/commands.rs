//! Command dispatch: each subcommand opens the store, runs one operation
//! and reports warnings from the background side effects.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use tracing::{debug, instrument};

use crate::application::services::HierarchyStore;
use crate::cli::args::{BoardCommands, Cli, Commands, ConfigCommands, FieldArgs};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{node_label, DomainError, Employee, EmployeeDraft, EmployeeId, EmployeePatch};
use crate::infrastructure::board::BoardSync;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage("no command given, see --help".into()));
    };

    match command {
        Commands::Completion { shell } => {
            completion(*shell);
            return Ok(());
        }
        Commands::Config { command } => return config(cli, command),
        _ => {}
    }

    let container = ServiceContainer::new(load_settings(cli)?);
    match command {
        Commands::Add {
            name,
            fields,
            manager,
        } => add(&container, name, fields, *manager),
        Commands::Update {
            id,
            name,
            fields,
            manager,
            no_manager,
        } => {
            let manager = match (manager, no_manager) {
                (_, true) => Some(None),
                (Some(m), false) => Some(Some(*m)),
                (None, false) => None,
            };
            update(&container, *id, name.clone(), fields, manager)
        }
        Commands::Remove { id } => remove(&container, *id),
        Commands::Show { id } => show(&container, *id),
        Commands::List { department } => list(&container, department.as_deref()),
        Commands::Children { id } => children(&container, *id),
        Commands::Ancestors { id } => ancestors(&container, *id),
        Commands::Roots => roots(&container),
        Commands::Tree { id } => tree(&container, *id),
        Commands::Search { query } => search(&container, query),
        Commands::Departments => departments(&container),
        Commands::Import { file } => import(&container, file),
        Commands::Export { file } => export(&container, file.as_deref()),
        Commands::Board { command } => match command {
            BoardCommands::List => board_list(&container),
            BoardCommands::Pull => board_pull(&container),
        },
        Commands::Reset { force } => reset(&container, *force),
        Commands::Completion { .. } | Commands::Config { .. } => Ok(()),
    }
}

fn project_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.project_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(|e| InfraError::io("current directory", e).into()),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let dir = project_dir(cli)?;
    let mut settings = Settings::load(Some(dir.as_path()))?;
    if let Some(data_file) = &cli.data_file {
        settings.data_file = data_file.clone();
    }
    debug!("settings: {:?}", settings);
    Ok(settings)
}

/// Stop the store and print every warning it gathered.
fn finish(mut store: HierarchyStore) {
    for warning in store.shutdown() {
        output::warning(&warning);
    }
}

fn with_store<T>(
    container: &ServiceContainer,
    f: impl FnOnce(&mut HierarchyStore) -> Result<T, DomainError>,
) -> CliResult<T> {
    let mut store = container.open_store()?;
    let result = f(&mut store);
    finish(store);
    Ok(result?)
}

fn merge_fields(
    mut current: BTreeMap<String, String>,
    changes: &[(String, String)],
) -> BTreeMap<String, String> {
    for (key, value) in changes {
        if value.is_empty() {
            current.remove(key);
        } else {
            current.insert(key.clone(), value.clone());
        }
    }
    current
}

#[instrument(skip(container, fields))]
fn add(
    container: &ServiceContainer,
    name: &str,
    fields: &FieldArgs,
    manager: Option<EmployeeId>,
) -> CliResult<()> {
    let draft = EmployeeDraft {
        name: name.to_string(),
        position: fields.position.clone().unwrap_or_default(),
        department: fields.department.clone().unwrap_or_default(),
        email: fields.email.clone().unwrap_or_default(),
        phone: fields.phone.clone().unwrap_or_default(),
        manager_id: manager,
        external_ref: None,
        custom_fields: merge_fields(BTreeMap::new(), &fields.fields),
    };
    let employee = with_store(container, |store| store.add(draft))?;
    output::action("Added", &node_label(&employee));
    Ok(())
}

#[instrument(skip(container, fields))]
fn update(
    container: &ServiceContainer,
    id: EmployeeId,
    name: Option<String>,
    fields: &FieldArgs,
    manager: Option<Option<EmployeeId>>,
) -> CliResult<()> {
    let employee = with_store(container, |store| {
        let current = store.get(id).ok_or(DomainError::NotFound(id))?;
        let custom_fields = (!fields.fields.is_empty())
            .then(|| merge_fields(current.custom_fields.clone(), &fields.fields));
        let patch = EmployeePatch {
            name,
            position: fields.position.clone(),
            department: fields.department.clone(),
            email: fields.email.clone(),
            phone: fields.phone.clone(),
            manager_id: manager,
            custom_fields,
        };
        store.update(id, patch)
    })?;
    output::action("Updated", &node_label(&employee));
    Ok(())
}

#[instrument(skip(container))]
fn remove(container: &ServiceContainer, id: EmployeeId) -> CliResult<()> {
    match with_store(container, |store| store.remove(id)) {
        Ok(employee) => {
            output::action("Removed", &node_label(&employee));
            Ok(())
        }
        Err(CliError::Infra(e)) => {
            if let Some(DomainError::HasSubordinates { subordinates, .. }) = domain_error(&e) {
                output::header(&format!(
                    "{} subordinate(s) still report to {}:",
                    subordinates.len(),
                    id
                ));
                for subordinate in subordinates {
                    output::failure(&node_label(subordinate));
                }
                output::detail("Reassign them to another manager or remove them first.");
            }
            Err(CliError::Infra(e))
        }
        Err(e) => Err(e),
    }
}

fn domain_error(e: &InfraError) -> Option<&DomainError> {
    match e {
        InfraError::Application(app) => app.as_domain(),
        _ => None,
    }
}

#[instrument(skip(container))]
fn show(container: &ServiceContainer, id: EmployeeId) -> CliResult<()> {
    let store = container.open_store()?;
    let result = (|| {
        let employee = store.get(id).ok_or(DomainError::NotFound(id))?;
        let manager = employee.manager_id.and_then(|m| store.get(m));
        output::header(&employee.name);
        output::detail(&format!("id:         {}", employee.id));
        output::detail(&format!("position:   {}", employee.position));
        output::detail(&format!("department: {}", employee.department));
        output::detail(&format!("email:      {}", employee.email));
        output::detail(&format!("phone:      {}", employee.phone));
        match manager {
            Some(m) => output::detail(&format!("manager:    {} [{}]", m.name, m.id)),
            None => output::detail("manager:    -"),
        }
        output::detail(&format!(
            "reports:    {} direct, {} total",
            store.children(id).len(),
            store.subtree_size(id)?
        ));
        output::detail(&format!("level:      {}", store.depth(id)?));
        if let Some(external_ref) = &employee.external_ref {
            output::detail(&format!("synced as:  {}", external_ref));
        }
        for (key, value) in &employee.custom_fields {
            output::detail(&format!("{key}: {value}"));
        }
        Ok::<_, DomainError>(())
    })();
    finish(store);
    Ok(result?)
}

#[instrument(skip(container))]
fn list(container: &ServiceContainer, department: Option<&str>) -> CliResult<()> {
    let store = container.open_store()?;
    for employee in store.all() {
        let matches = department.map_or(true, |d| employee.department.eq_ignore_ascii_case(d));
        if matches {
            output::info(&node_label(employee));
        }
    }
    finish(store);
    Ok(())
}

#[instrument(skip(container))]
fn children(container: &ServiceContainer, id: EmployeeId) -> CliResult<()> {
    let store = container.open_store()?;
    let known = store.get(id).is_some();
    if known {
        for child in store.children(id) {
            output::info(&node_label(child));
        }
    }
    finish(store);
    if !known {
        return Err(DomainError::NotFound(id).into());
    }
    Ok(())
}

#[instrument(skip(container))]
fn ancestors(container: &ServiceContainer, id: EmployeeId) -> CliResult<()> {
    let store = container.open_store()?;
    let result = store.ancestors(id).and_then(|chain| {
        for ancestor in chain {
            output::info(&node_label(ancestor?));
        }
        Ok(())
    });
    finish(store);
    Ok(result?)
}

#[instrument(skip(container))]
fn roots(container: &ServiceContainer) -> CliResult<()> {
    let store = container.open_store()?;
    for root in store.roots() {
        output::info(&node_label(root));
    }
    finish(store);
    Ok(())
}

#[instrument(skip(container))]
fn tree(container: &ServiceContainer, id: Option<EmployeeId>) -> CliResult<()> {
    let store = container.open_store()?;
    let result = match id {
        Some(id) => store.render_subtree(id).map(|tree| vec![tree]),
        None => store.render(),
    };
    finish(store);
    for tree in result? {
        output::info(&tree);
    }
    Ok(())
}

#[instrument(skip(container))]
fn search(container: &ServiceContainer, query: &str) -> CliResult<()> {
    let store = container.open_store()?;
    let found = store.find_by_name(query);
    if found.is_empty() {
        output::detail(&format!("no employee matches '{query}'"));
    }
    for employee in found {
        output::info(&node_label(employee));
    }
    finish(store);
    Ok(())
}

#[instrument(skip(container))]
fn departments(container: &ServiceContainer) -> CliResult<()> {
    let store = container.open_store()?;
    for department in store.departments() {
        output::info(&department);
    }
    finish(store);
    Ok(())
}

#[instrument(skip(container))]
fn import(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    let content = container
        .fs
        .read_to_string(file)
        .map_err(|e| InfraError::io(format!("read {}", file.display()), e))?;
    let records: Vec<Employee> = serde_json::from_str(&content)
        .map_err(|e| InfraError::serialization(format!("parse {}", file.display()), e))?;
    let count = records.len();

    let source = file.display().to_string();
    with_violations(&source, with_store(container, |store| store.replace_all(records)))?;
    output::action("Imported", &format!("{count} employees from {source}"));
    Ok(())
}

/// List every violation of a rejected bulk replacement before passing the error on.
fn with_violations<T>(source: &str, result: CliResult<T>) -> CliResult<T> {
    if let Err(CliError::Infra(e)) = &result {
        if let Some(DomainError::Validation(violations)) = domain_error(e) {
            output::header(&format!("{} problem(s) in {}:", violations.len(), source));
            for violation in violations {
                output::failure(violation);
            }
        }
    }
    result
}

#[instrument(skip(container))]
fn reset(container: &ServiceContainer, force: bool) -> CliResult<()> {
    let count = with_store(container, |store| {
        if !force && !store.is_empty() {
            return Ok(None);
        }
        store.reset_to_sample()?;
        Ok(Some(store.len()))
    })?;
    match count {
        Some(count) => {
            output::action("Reset", &format!("{count} sample employees"));
            Ok(())
        }
        None => Err(CliError::Usage(
            "the store is not empty, pass --force to replace every employee".into(),
        )),
    }
}

#[instrument(skip(container))]
fn export(container: &ServiceContainer, file: Option<&Path>) -> CliResult<()> {
    let store = container.open_store()?;
    let employees: Vec<Employee> = store.all().into_iter().cloned().collect();
    finish(store);

    let json = serde_json::to_string_pretty(&employees)
        .map_err(|e| InfraError::serialization("serialize employees", e))?;
    match file {
        Some(path) => {
            container
                .fs
                .write_atomic(path, &(json + "\n"))
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action(
                "Exported",
                &format!("{} employees to {}", employees.len(), path.display()),
            );
        }
        None => output::info(&json),
    }
    Ok(())
}

fn board_sync(container: &ServiceContainer) -> CliResult<&BoardSync> {
    container.board.as_deref().ok_or_else(|| {
        CliError::Usage("sync is disabled, set sync.enabled = true in the config".into())
    })
}

#[instrument(skip(container))]
fn board_list(container: &ServiceContainer) -> CliResult<()> {
    let board = board_sync(container)?;
    for (item_id, item) in board.items()? {
        let decoded = board.decode_item(&item);
        let manager = decoded.manager_name.unwrap_or_else(|| "-".into());
        output::info(&format!(
            "{item_id}  {}  {}  ({})  manager: {manager}",
            decoded.draft.name, decoded.draft.position, decoded.draft.department
        ));
    }
    Ok(())
}

#[instrument(skip(container))]
fn board_pull(container: &ServiceContainer) -> CliResult<()> {
    let records = board_sync(container)?.pull()?;
    let source = container.settings.sync.board_file.display().to_string();
    let count = with_violations(
        &source,
        with_store(container, |store| store.import_external(records)),
    )?;
    output::action("Pulled", &format!("{count} employees from {source}"));
    Ok(())
}

#[instrument(skip(cli))]
fn config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::detail(&format!("global: {}", path.display())),
                None => output::detail("global: (no config directory)"),
            }
            output::detail(&format!("local:  {}", local_config_path(&project_dir(cli)?).display()));
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".into())
                })?
            } else {
                local_config_path(&project_dir(cli)?)
            };
            if path.exists() {
                return Err(CliError::Usage(format!("config already exists: {}", path.display())));
            }
            let fs = RealFileSystem;
            fs.ensure_parent(&path)
                .map_err(|e| InfraError::io(format!("create parent of {}", path.display()), e))?;
            fs.write_atomic(&path, &Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action("Created", &path.display());
        }
    }
    Ok(())
}

fn completion(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
}
