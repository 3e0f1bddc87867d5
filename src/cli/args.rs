//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::domain::EmployeeId;

/// Organizational chart: employee hierarchy with enforced tree invariants
#[derive(Parser, Debug)]
#[command(name = "orgchart")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Directory holding a local .orgchart.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Employee document, overrides the configured data_file
    #[arg(long, global = true, env = "ORGCHART_DATA_FILE", value_hint = ValueHint::FilePath)]
    pub data_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add an employee
    Add {
        /// Display name
        name: String,
        #[command(flatten)]
        fields: FieldArgs,
        /// Manager id (omit for a root)
        #[arg(short, long)]
        manager: Option<EmployeeId>,
    },

    /// Change fields of an employee
    Update {
        /// Employee id
        id: EmployeeId,
        /// New display name
        #[arg(short, long)]
        name: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
        /// New manager id
        #[arg(short, long, conflicts_with = "no_manager")]
        manager: Option<EmployeeId>,
        /// Make the employee a root
        #[arg(long)]
        no_manager: bool,
    },

    /// Delete an employee without subordinates
    Remove {
        /// Employee id
        id: EmployeeId,
    },

    /// Show one employee
    Show {
        /// Employee id
        id: EmployeeId,
    },

    /// List employees
    List {
        /// Only this department
        #[arg(long)]
        department: Option<String>,
    },

    /// List direct reports
    Children {
        /// Employee id
        id: EmployeeId,
    },

    /// Show the management chain up to the root
    Ancestors {
        /// Employee id
        id: EmployeeId,
    },

    /// List employees without a manager
    Roots,

    /// Show hierarchy as tree
    Tree {
        /// Subtree root (default: whole forest)
        id: Option<EmployeeId>,
    },

    /// Find employees by name
    Search {
        /// Case-insensitive name fragment
        query: String,
    },

    /// List departments
    Departments,

    /// Replace all employees from a JSON document
    Import {
        /// JSON array of employees
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Write all employees as JSON
    Export {
        /// Target file (default: stdout)
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },

    /// Inspect or pull the synced board
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },

    /// Replace all employees with the sample organization
    Reset {
        /// Replace a non-empty store
        #[arg(short, long)]
        force: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Optional record fields shared by `add` and `update`.
#[derive(clap::Args, Debug, Default)]
pub struct FieldArgs {
    /// Job title
    #[arg(short, long)]
    pub position: Option<String>,
    /// Department
    #[arg(long)]
    pub department: Option<String>,
    /// Email address
    #[arg(short, long)]
    pub email: Option<String>,
    /// Phone number
    #[arg(long)]
    pub phone: Option<String>,
    /// Custom field KEY=VALUE (repeatable; empty VALUE removes the field)
    #[arg(short, long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{s}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[derive(Subcommand, Debug)]
pub enum BoardCommands {
    /// List board items
    List,

    /// Replace all employees with the board content (managers matched by exact name)
    Pull,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_field_without_equals_when_parsing_then_rejects() {
        assert!(parse_field("office").is_err());
        assert_eq!(parse_field("office = Berlin"), Ok(("office".into(), "Berlin".into())));
    }

    #[test]
    fn given_update_with_no_manager_when_parsing_then_sets_flag() {
        let cli = Cli::try_parse_from([
            "orgchart",
            "update",
            "4",
            "--no-manager",
            "-f",
            "office=Berlin",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Update { id, no_manager, fields, .. }) => {
                assert_eq!(id, EmployeeId(4));
                assert!(no_manager);
                assert_eq!(fields.fields, vec![("office".to_string(), "Berlin".to_string())]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn given_board_pull_when_parsing_then_selects_pull() {
        let cli = Cli::try_parse_from(["orgchart", "board", "pull"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Board {
                command: BoardCommands::Pull
            })
        ));
    }
}
