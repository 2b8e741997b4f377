//! Activity storage: create, find, compare-and-swap update, and list.

use std::collections::BTreeSet;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use uuid::Uuid;

use crate::{
    lifecycle::{ActivityPatch, ActivityStore},
    model::{ActivityRecord, Assignment, Completion, IssueType, SelectionPath, Shift, Status},
};

use super::{Result, Storage, StorageError};

const COLUMNS: &str = "id, area, machine, element, component, issue_type, description, status, \
                       scheduled_date, shift, created_by, created_at, completed_by, completed_at";

/// Narrows [`Storage::list_activities`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub status: Option<Status>,
    pub area: Option<String>,
    pub issue_type: Option<IssueType>,
    pub assignee: Option<String>,
}

impl ActivityStore for Storage {
    fn create_activity(&self, record: &ActivityRecord) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM activity WHERE id = ?1)",
            [record.id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StorageError::ActivityAlreadyExists(record.id));
        }

        let (completed_by, completed_at) = completion_columns(record);
        tx.execute(
            "INSERT INTO activity (id, area, machine, element, component, equipment_display,
                                   issue_type, description, status, scheduled_date, shift,
                                   created_by, created_at, completed_by, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                record.id.to_string(),
                &record.equipment.area,
                &record.equipment.machine,
                &record.equipment.element,
                &record.equipment.component,
                &record.equipment_display,
                record.issue_type.as_str(),
                &record.description,
                record.status.as_str(),
                record.assignment.scheduled_date.map(|d| d.to_string()),
                record.assignment.shift.map(|s| s.as_str()),
                &record.created_by,
                record.created_at.to_string(),
                completed_by,
                completed_at,
            ],
        )?;
        write_assignees(&tx, &record.id.to_string(), &record.assignment.assignees)?;
        tx.commit()?;

        tracing::debug!(id = %record.id, "activity created");
        Ok(())
    }

    fn update_activity(&self, id: Uuid, patch: &ActivityPatch, expected: Status) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let key = id.to_string();

        let rows = match patch {
            ActivityPatch::Details {
                equipment,
                issue_type,
                description,
            } => tx.execute(
                "UPDATE activity
                 SET area = ?1, machine = ?2, element = ?3, component = ?4,
                     equipment_display = ?5, issue_type = ?6, description = ?7
                 WHERE id = ?8 AND status = ?9",
                params![
                    &equipment.area,
                    &equipment.machine,
                    &equipment.element,
                    &equipment.component,
                    equipment.display(),
                    issue_type.as_str(),
                    description,
                    &key,
                    expected.as_str(),
                ],
            )?,
            ActivityPatch::Assignment(assignment) => {
                let rows = tx.execute(
                    "UPDATE activity SET status = ?1, scheduled_date = ?2, shift = ?3
                     WHERE id = ?4 AND status = ?5",
                    params![
                        Status::Assigned.as_str(),
                        assignment.scheduled_date.map(|d| d.to_string()),
                        assignment.shift.map(Shift::as_str),
                        &key,
                        expected.as_str(),
                    ],
                )?;
                if rows > 0 {
                    write_assignees(&tx, &key, &assignment.assignees)?;
                }
                rows
            }
            ActivityPatch::Completion(completion) => tx.execute(
                "UPDATE activity SET status = ?1, completed_by = ?2, completed_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    Status::Done.as_str(),
                    &completion.completed_by,
                    completion.completed_at.to_string(),
                    &key,
                    expected.as_str(),
                ],
            )?,
        };

        if rows == 0 {
            let actual: Option<String> = tx
                .query_row("SELECT status FROM activity WHERE id = ?1", [&key], |row| {
                    row.get(0)
                })
                .optional()?;
            return match actual {
                None => Err(StorageError::ActivityNotFound(id)),
                Some(actual) => Err(StorageError::StatusConflict {
                    id,
                    expected,
                    actual: parse_status(&actual)?,
                }),
            };
        }
        tx.commit()?;

        tracing::debug!(%id, from = %expected, to = ?patch.status(), "activity updated");
        Ok(())
    }

    fn find_activity(&self, id: Uuid) -> Result<ActivityRecord> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM activity WHERE id = ?1"),
                [id.to_string()],
                read_row,
            )
            .optional()?
            .ok_or(StorageError::ActivityNotFound(id))?;
        into_record(&conn, raw)
    }
}

impl Storage {
    /// Lists activities matching `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the query fails or a row is malformed.
    pub fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivityRecord>> {
        let conn = self.connect()?;

        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("a.status = ?{}", values.len()));
        }
        if let Some(area) = &filter.area {
            values.push(area.clone());
            clauses.push(format!("a.area = ?{}", values.len()));
        }
        if let Some(issue_type) = filter.issue_type {
            values.push(issue_type.as_str().to_string());
            clauses.push(format!("a.issue_type = ?{}", values.len()));
        }
        if let Some(assignee) = &filter.assignee {
            values.push(assignee.clone());
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM activity_assignee x
                         WHERE x.activity_id = a.id AND x.user_id = ?{})",
                values.len()
            ));
        }

        let mut sql = format!("SELECT {COLUMNS} FROM activity a");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params_from_iter(values.iter()), read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = raws
            .into_iter()
            .map(|raw| into_record(&conn, raw))
            .collect::<Result<Vec<_>>>()?;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

/// Column values exactly as stored, before parsing.
struct RawRow {
    id: String,
    area: String,
    machine: String,
    element: String,
    component: String,
    issue_type: String,
    description: String,
    status: String,
    scheduled_date: Option<String>,
    shift: Option<String>,
    created_by: String,
    created_at: String,
    completed_by: Option<String>,
    completed_at: Option<String>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        area: row.get(1)?,
        machine: row.get(2)?,
        element: row.get(3)?,
        component: row.get(4)?,
        issue_type: row.get(5)?,
        description: row.get(6)?,
        status: row.get(7)?,
        scheduled_date: row.get(8)?,
        shift: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
        completed_by: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

/// Parses a stored row and loads its assignees.
///
/// The display string is rebuilt from the path; the stored column only
/// serves queries.
fn into_record(conn: &Connection, raw: RawRow) -> Result<ActivityRecord> {
    let id = raw
        .id
        .parse::<Uuid>()
        .map_err(|e| StorageError::Corrupt(format!("invalid activity id: {e}")))?;
    let issue_type = raw
        .issue_type
        .parse::<IssueType>()
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;
    let status = parse_status(&raw.status)?;
    let scheduled_date = raw
        .scheduled_date
        .map(|d| d.parse::<jiff::civil::Date>())
        .transpose()
        .map_err(|e| StorageError::Corrupt(format!("invalid scheduled_date: {e}")))?;
    let shift = raw
        .shift
        .map(|s| s.parse())
        .transpose()
        .map_err(StorageError::Corrupt)?;
    let created_at = raw
        .created_at
        .parse::<jiff::Timestamp>()
        .map_err(|e| StorageError::Corrupt(format!("invalid created_at: {e}")))?;
    let completion = deserialize_completion(status, raw.completed_by, raw.completed_at.as_deref())?;
    let assignees = load_assignees(conn, id)?;

    Ok(ActivityRecord::from_stored(
        id,
        SelectionPath::new(raw.area, raw.machine, raw.element, raw.component),
        issue_type,
        raw.description,
        status,
        Assignment {
            assignees,
            scheduled_date,
            shift,
        },
        raw.created_by,
        created_at,
        completion,
    ))
}

fn parse_status(status: &str) -> Result<Status> {
    status.parse().map_err(StorageError::Corrupt)
}

/// Converts a completion to its two nullable columns.
fn completion_columns(record: &ActivityRecord) -> (Option<&str>, Option<String>) {
    match &record.completion {
        Some(c) => (Some(c.completed_by.as_str()), Some(c.completed_at.to_string())),
        None => (None, None),
    }
}

/// Reconstructs a completion, which must be present exactly when done.
fn deserialize_completion(
    status: Status,
    completed_by: Option<String>,
    completed_at: Option<&str>,
) -> Result<Option<Completion>> {
    match (status, completed_by, completed_at) {
        (Status::Done, Some(completed_by), Some(at)) => {
            let completed_at = at
                .parse::<jiff::Timestamp>()
                .map_err(|e| StorageError::Corrupt(format!("invalid completed_at: {e}")))?;
            Ok(Some(Completion {
                completed_by,
                completed_at,
            }))
        }
        (Status::Done, _, _) => Err(StorageError::Corrupt(
            "activity is done but completion is incomplete".into(),
        )),
        (_, None, None) => Ok(None),
        (status, _, _) => Err(StorageError::Corrupt(format!(
            "activity is {status} but has completion fields"
        ))),
    }
}

fn load_assignees(conn: &Connection, id: Uuid) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT user_id FROM activity_assignee WHERE activity_id = ?1")?;
    let assignees = stmt
        .query_map([id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(assignees)
}

/// Replaces the stored assignee set of activity `id`.
fn write_assignees(conn: &Connection, id: &str, assignees: &BTreeSet<String>) -> Result<()> {
    conn.execute("DELETE FROM activity_assignee WHERE activity_id = ?1", [id])?;
    let mut stmt =
        conn.prepare("INSERT INTO activity_assignee (activity_id, user_id) VALUES (?1, ?2)")?;
    for user in assignees {
        stmt.execute(params![id, user])?;
    }
    Ok(())
}
