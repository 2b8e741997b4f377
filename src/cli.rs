//! CLI interface for maint.
//!
//! Each subcommand is non-interactive: arguments in, structured output out.
//! Commands split into two groups:
//!
//! - `maint equipment`: browse the catalog, no storage needed.
//! - `maint activity ...`: create, list, and move activities through their lifecycle.
//!
//! Activity ids take a full UUID or unambiguous prefix.

mod activity;
mod equipment;
mod format;

use clap::{Parser, Subcommand};

use crate::{config::Config, hierarchy::HierarchyIndex, storage::Storage};

use activity::ActivityCommand;
use equipment::PathArgs;

/// Track equipment maintenance activities.
#[derive(Debug, Parser)]
#[command(name = "maint", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Acting user id. Overrides `MAINT_IDENTITY` and the config file.
    #[arg(long = "as", global = true)]
    identity: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: from report to done
  1. maint equipment --area "Press Shop"
     → lists the machines to choose from
  2. maint --as jdoe activity new --area "Press Shop" --machine Press-01 "Oil leak"
     → prints an activity ID (e.g. a3b0fc12)
  3. maint --as jdoe activity assign a3b --to mlee --date 2026-10-20 --shift first
  4. maint --as mlee activity complete a3b

Query:
  maint activity list --status pending --area "Press Shop"
  maint activity show a3b"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse the equipment catalog.
    ///
    /// Prints the selected path and the options open at each level as JSON.
    Equipment {
        #[command(flatten)]
        path: PathArgs,
    },

    /// Manage pending activities.
    Activity {
        #[command(subcommand)]
        command: ActivityCommand,
    },
}

/// Run the CLI, returning an error message on failure.
///
/// # Errors
///
/// Returns a message describing the first failure.
pub fn run(config: &Config) -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Command::Equipment { path } => {
            let index = load_catalog(config)?;
            equipment::cmd_browse(&index, &path)
        }
        Command::Activity { command } => activity::run(config, cli.identity.as_deref(), command),
    }
}

fn load_catalog(config: &Config) -> Result<HierarchyIndex, String> {
    let path = config.catalog_path()?;
    HierarchyIndex::load(&path).map_err(|e| e.to_string())
}

fn open_storage(config: &Config) -> Result<Storage, String> {
    let path = config.database_path()?;
    Storage::new(&path).map_err(|e| format!("failed to open {}: {e}", path.display()))
}
