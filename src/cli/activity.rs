//! Activity subcommands: new, list, show, assign, complete, edit, import.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use clap::Subcommand;
use jiff::civil::Date;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    config::Config,
    form::{ActivityForm, SubmitError},
    hierarchy::HierarchyIndex,
    identity::resolve_identity,
    lifecycle::{ActivityStore, Lifecycle, LifecycleError},
    model::{ActivityRecord, Assignment, IssueType, Shift, Status},
    storage::{ActivityFilter, Storage},
};

use super::{
    equipment::{PathArgs, select_levels},
    format::{format_activity_line, format_field_errors},
    load_catalog, open_storage,
};

#[derive(Debug, Subcommand)]
pub enum ActivityCommand {
    /// Report a new activity.
    ///
    /// Prints the new activity ID.
    New {
        #[command(flatten)]
        equipment: PathArgs,

        /// Issue type: preventive, corrective, or improvement.
        #[arg(long = "type", default_value = "corrective")]
        issue_type: String,

        /// What needs doing.
        description: String,
    },

    /// List activities, oldest first.
    List {
        /// Only activities in this status (pending, assigned, done).
        #[arg(long)]
        status: Option<Status>,

        /// Only activities in this area.
        #[arg(long)]
        area: Option<String>,

        /// Only activities of this issue type.
        #[arg(long = "type")]
        issue_type: Option<IssueType>,

        /// Only activities assigned to this user.
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Show one activity as JSON.
    Show {
        /// Activity ID: full UUID or unambiguous prefix (e.g. `a3b`).
        id: String,
    },

    /// Assign (or reassign) an activity.
    Assign {
        /// Activity ID: full UUID or unambiguous prefix (e.g. `a3b`).
        id: String,

        /// Assignee user id. Repeat for several.
        #[arg(long = "to", required = true)]
        to: Vec<String>,

        /// Scheduled date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<Date>,

        /// Scheduled shift: first or second.
        #[arg(long)]
        shift: Option<Shift>,
    },

    /// Mark an activity done as the acting user.
    Complete {
        /// Activity ID: full UUID or unambiguous prefix (e.g. `a3b`).
        id: String,
    },

    /// Edit the fields of an activity that is not done yet.
    ///
    /// A given equipment level replaces the saved path from that level down.
    Edit {
        /// Activity ID: full UUID or unambiguous prefix (e.g. `a3b`).
        id: String,

        #[command(flatten)]
        equipment: PathArgs,

        /// New issue type.
        #[arg(long = "type")]
        issue_type: Option<String>,

        /// New description.
        #[arg(long)]
        description: Option<String>,
    },

    /// Create activities from a JSON array of rows.
    ///
    /// Each row has `area`, `machine`, `element`, `component`, `issueType`,
    /// and `description`. Bad rows are reported and skipped.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },
}

pub(super) fn run(
    config: &Config,
    identity: Option<&str>,
    command: ActivityCommand,
) -> Result<(), String> {
    let storage = open_storage(config)?;

    match command {
        ActivityCommand::New {
            equipment,
            issue_type,
            description,
        } => {
            let actor = resolve_identity(identity, config)?;
            let index = load_catalog(config)?;
            cmd_new(&index, &storage, &actor, &equipment, &issue_type, &description)
        }
        ActivityCommand::List {
            status,
            area,
            issue_type,
            assignee,
        } => cmd_list(
            &storage,
            &ActivityFilter {
                status,
                area,
                issue_type,
                assignee,
            },
        ),
        ActivityCommand::Show { id } => cmd_show(&storage, &id),
        ActivityCommand::Assign {
            id,
            to,
            date,
            shift,
        } => {
            let actor = resolve_identity(identity, config)?;
            let assignment = Assignment {
                assignees: to.into_iter().collect::<BTreeSet<_>>(),
                scheduled_date: date,
                shift,
            };
            cmd_assign(&storage, &id, assignment, &actor)
        }
        ActivityCommand::Complete { id } => {
            let actor = resolve_identity(identity, config)?;
            cmd_complete(&storage, &id, &actor)
        }
        ActivityCommand::Edit {
            id,
            equipment,
            issue_type,
            description,
        } => {
            let actor = resolve_identity(identity, config)?;
            let index = load_catalog(config)?;
            let edits = Edits {
                equipment,
                issue_type,
                description,
            };
            cmd_edit(&index, &storage, &id, &edits, &actor)
        }
        ActivityCommand::Import { file } => {
            let actor = resolve_identity(identity, config)?;
            let index = load_catalog(config)?;
            cmd_import(&index, &storage, &actor, &file)
        }
    }
}

fn cmd_new(
    index: &HierarchyIndex,
    storage: &Storage,
    actor: &str,
    equipment: &PathArgs,
    issue_type: &str,
    description: &str,
) -> Result<(), String> {
    let mut form = ActivityForm::new(index);
    select_levels(&mut form, equipment)?;
    form.set_issue_type(issue_type);
    form.set_description(description);

    let lifecycle = Lifecycle::new(storage);
    let record = form
        .submit(|draft| lifecycle.create(draft, actor))
        .map_err(submit_message)?;

    println!("{}", record.id());
    Ok(())
}

fn cmd_list(storage: &Storage, filter: &ActivityFilter) -> Result<(), String> {
    let records = storage
        .list_activities(filter)
        .map_err(|e| format!("failed to list activities: {e}"))?;

    if records.is_empty() {
        println!("No activities.");
        return Ok(());
    }
    for record in &records {
        println!("{}", format_activity_line(record));
    }
    Ok(())
}

fn cmd_show(storage: &Storage, reference: &str) -> Result<(), String> {
    let record = resolve_activity(storage, reference)?;
    let json = serde_json::to_string_pretty(&record)
        .map_err(|e| format!("failed to serialize activity: {e}"))?;
    println!("{json}");
    Ok(())
}

/// The record keeps no assigner; `actor` goes to the log only.
fn cmd_assign(
    storage: &Storage,
    reference: &str,
    assignment: Assignment,
    actor: &str,
) -> Result<(), String> {
    let id = resolve_activity(storage, reference)?.id();
    let record = Lifecycle::new(storage)
        .assign(id, assignment)
        .map_err(lifecycle_message)?;
    tracing::info!(%id, actor, assignees = ?record.assignment().assignees, "activity assigned");

    println!("{}", format_activity_line(&record));
    Ok(())
}

fn cmd_complete(storage: &Storage, reference: &str, actor: &str) -> Result<(), String> {
    let id = resolve_activity(storage, reference)?.id();
    let record = Lifecycle::new(storage)
        .complete(id, actor)
        .map_err(lifecycle_message)?;

    println!("{}", format_activity_line(&record));
    Ok(())
}

struct Edits {
    equipment: PathArgs,
    issue_type: Option<String>,
    description: Option<String>,
}

/// The record keeps no editor; `actor` goes to the log only.
fn cmd_edit(
    index: &HierarchyIndex,
    storage: &Storage,
    reference: &str,
    edits: &Edits,
    actor: &str,
) -> Result<(), String> {
    let current = resolve_activity(storage, reference)?;
    if edits.equipment.is_empty() && edits.issue_type.is_none() && edits.description.is_none() {
        return Err("nothing to edit: pass an equipment level, --type, or --description".into());
    }

    let mut form = ActivityForm::load(index, &current);
    select_levels(&mut form, &edits.equipment)?;
    if let Some(issue_type) = &edits.issue_type {
        form.set_issue_type(issue_type);
    }
    if let Some(description) = &edits.description {
        form.set_description(description);
    }

    let lifecycle = Lifecycle::new(storage);
    let record = form
        .submit(|draft| lifecycle.revise(current.id(), draft))
        .map_err(submit_message)?;
    tracing::info!(id = %record.id(), actor, "activity edited");

    println!("{}", format_activity_line(&record));
    Ok(())
}

/// One row of an import file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ImportRow {
    area: String,
    machine: String,
    element: String,
    component: String,
    #[serde(alias = "issue_type")]
    issue_type: Option<String>,
    description: String,
}

/// What happened to one import row.
#[derive(Debug)]
enum RowOutcome {
    Created(ActivityRecord),
    Skipped(String),
}

fn cmd_import(
    index: &HierarchyIndex,
    storage: &Storage,
    actor: &str,
    file: &Path,
) -> Result<(), String> {
    let contents = fs::read_to_string(file)
        .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
    let rows: Vec<ImportRow> = serde_json::from_str(&contents)
        .map_err(|e| format!("invalid import file {}: {e}", file.display()))?;

    let outcomes = import_rows(index, storage, actor, rows);

    let mut created = 0;
    for (n, outcome) in outcomes.iter().enumerate() {
        match outcome {
            RowOutcome::Created(record) => {
                created += 1;
                println!("row {}: created {}", n + 1, &record.id().to_string()[..8]);
            }
            RowOutcome::Skipped(reason) => println!("row {}: skipped: {reason}", n + 1),
        }
    }
    println!("Imported {created} of {} rows.", outcomes.len());
    Ok(())
}

fn import_rows(
    index: &HierarchyIndex,
    storage: &Storage,
    actor: &str,
    rows: Vec<ImportRow>,
) -> Vec<RowOutcome> {
    let lifecycle = Lifecycle::new(storage);

    rows.into_iter()
        .map(|row| {
            let path = PathArgs {
                area: Some(row.area),
                machine: non_empty(row.machine),
                element: non_empty(row.element),
                component: non_empty(row.component),
            };

            let mut form = ActivityForm::new(index);
            if let Err(e) = select_levels(&mut form, &path) {
                return RowOutcome::Skipped(e);
            }
            if let Some(issue_type) = &row.issue_type {
                form.set_issue_type(issue_type);
            }
            form.set_description(&row.description);

            match form.submit(|draft| lifecycle.create(draft, actor)) {
                Ok(record) => RowOutcome::Created(record),
                Err(e) => RowOutcome::Skipped(submit_message(e)),
            }
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn submit_message(err: SubmitError<LifecycleError>) -> String {
    match err {
        SubmitError::Invalid(errors) => format!("invalid activity: {}", format_field_errors(&errors)),
        e @ SubmitError::InFlight => e.to_string(),
        SubmitError::Rejected(e) => lifecycle_message(e),
    }
}

fn lifecycle_message(err: LifecycleError) -> String {
    match err {
        LifecycleError::Transition(e) => e.to_string(),
        LifecycleError::Storage(e) => format!("storage error: {e}"),
    }
}

/// Resolve an activity reference (full UUID or unambiguous prefix) to an activity.
fn resolve_activity(storage: &Storage, reference: &str) -> Result<ActivityRecord, String> {
    // Try full UUID first.
    if let Ok(id) = reference.parse::<Uuid>() {
        return storage
            .find_activity(id)
            .map_err(|e| format!("activity not found: {e}"));
    }

    // Try as a prefix match against all activities.
    let records = storage
        .list_activities(&ActivityFilter::default())
        .map_err(|e| format!("failed to list activities: {e}"))?;

    let mut matches: Vec<ActivityRecord> = records
        .into_iter()
        .filter(|r| r.id().to_string().starts_with(reference))
        .collect();

    match matches.len() {
        0 => Err(format!("no activity matching '{reference}'")),
        1 => Ok(matches.remove(0)),
        n => {
            let ids: Vec<String> = matches
                .iter()
                .map(|r| r.id().to_string()[..8].to_string())
                .collect();
            Err(format!(
                "'{reference}' is ambiguous: matches {n} activities: {}",
                ids.join(", ")
            ))
        }
    }
}
