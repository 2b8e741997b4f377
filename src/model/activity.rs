//! Pending activity types: the unit of maintenance work.

use std::{collections::BTreeSet, fmt, str::FromStr};

use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SelectionPath;

/// What kind of maintenance an activity is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Preventive,
    #[default]
    Corrective,
    Improvement,
}

impl IssueType {
    pub const ALL: [Self; 3] = [Self::Preventive, Self::Corrective, Self::Improvement];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preventive => "preventive",
            Self::Corrective => "corrective",
            Self::Improvement => "improvement",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issue type string that is not one of the recognized values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized issue type: {0:?}")]
pub struct ParseIssueTypeError(pub String);

impl FromStr for IssueType {
    type Err = ParseIssueTypeError;

    /// Strict: unknown values are rejected, never defaulted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseIssueTypeError(s.to_string()))
    }
}

/// Where an activity stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Assigned,
    /// Terminal.
    Done,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "done" => Ok(Self::Done),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Work shift an assignment is scheduled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    First,
    Second,
}

impl Shift {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
        }
    }
}

impl FromStr for Shift {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "second" => Ok(Self::Second),
            other => Err(format!("unknown shift: {other}")),
        }
    }
}

/// Who an activity is assigned to, and when.
///
/// Empty until the activity is assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub assignees: BTreeSet<String>,
    pub scheduled_date: Option<Date>,
    pub shift: Option<Shift>,
}

/// Who completed an activity, and when. Written once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub completed_by: String,
    pub completed_at: Timestamp,
}

/// The user-editable fields of an activity, as submitted by a form or an
/// import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDraft {
    pub equipment: SelectionPath,
    pub issue_type: IssueType,
    pub description: String,
}

/// One pending maintenance activity.
///
/// Fields are only mutated through the lifecycle transitions, so they are
/// read through accessors. `equipment_display` is always derived from
/// `equipment` and cannot be set on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub(crate) id: Uuid,
    pub(crate) equipment: SelectionPath,
    pub(crate) equipment_display: String,
    pub(crate) issue_type: IssueType,
    pub(crate) description: String,
    pub(crate) status: Status,
    pub(crate) assignment: Assignment,
    pub(crate) created_by: String,
    pub(crate) created_at: Timestamp,
    pub(crate) completion: Option<Completion>,
}

impl ActivityRecord {
    /// Reassembles a record read back from storage.
    ///
    /// The display string is recomputed from the path rather than trusted.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_stored(
        id: Uuid,
        equipment: SelectionPath,
        issue_type: IssueType,
        description: String,
        status: Status,
        assignment: Assignment,
        created_by: String,
        created_at: Timestamp,
        completion: Option<Completion>,
    ) -> Self {
        let equipment_display = equipment.display();
        Self {
            id,
            equipment,
            equipment_display,
            issue_type,
            description,
            status,
            assignment,
            created_by,
            created_at,
            completion,
        }
    }

    /// Replaces the equipment path and recomputes the display string.
    pub(crate) fn set_equipment(&mut self, equipment: SelectionPath) {
        self.equipment_display = equipment.display();
        self.equipment = equipment;
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn equipment(&self) -> &SelectionPath {
        &self.equipment
    }

    #[must_use]
    pub fn equipment_display(&self) -> &str {
        &self.equipment_display
    }

    #[must_use]
    pub fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    #[must_use]
    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_type_parse_is_strict() {
        assert_eq!("preventive".parse(), Ok(IssueType::Preventive));
        assert_eq!("improvement".parse(), Ok(IssueType::Improvement));
        assert!("Corrective".parse::<IssueType>().is_err());
        assert!("".parse::<IssueType>().is_err());
    }

    #[test]
    fn issue_type_defaults_to_corrective() {
        assert_eq!(IssueType::default(), IssueType::Corrective);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [Status::Pending, Status::Assigned, Status::Done] {
            assert_eq!(status.as_str().parse::<Status>(), Ok(status));
        }
    }

    #[test]
    fn display_follows_equipment() {
        let mut record = ActivityRecord::from_stored(
            Uuid::new_v4(),
            SelectionPath::new("Press Shop", "Press-01", "", ""),
            IssueType::Corrective,
            "Oil leak".into(),
            Status::Pending,
            Assignment::default(),
            "u1".into(),
            Timestamp::now(),
            None,
        );
        assert_eq!(record.equipment_display(), "Press Shop > Press-01");

        record.set_equipment(SelectionPath::new("Paint", "", "", ""));
        assert_eq!(record.equipment_display(), "Paint");
    }
}
