//! Output formatting for CLI display.

use crate::{
    form::FieldErrors,
    model::{ActivityRecord, Assignment},
};

/// One-line summary of an activity for lists and transition output.
pub(super) fn format_activity_line(record: &ActivityRecord) -> String {
    let id = record.id().to_string();
    let mut line = format!(
        "{}  {:<8}  {:<11}  {}  {}",
        &id[..8],
        record.status(),
        record.issue_type(),
        record.equipment_display(),
        record.description(),
    );

    if let Some(assigned) = format_assignment(record.assignment()) {
        line.push_str(&format!("  [{assigned}]"));
    }
    if let Some(completion) = record.completion() {
        line.push_str(&format!("  (done by {})", completion.completed_by));
    }
    line
}

/// Assignees, date, and shift, or `None` before the first assignment.
pub(super) fn format_assignment(assignment: &Assignment) -> Option<String> {
    if assignment.assignees.is_empty() {
        return None;
    }
    let mut parts = vec![assignment.assignees.iter().cloned().collect::<Vec<_>>().join(", ")];
    if let Some(date) = assignment.scheduled_date {
        parts.push(date.to_string());
    }
    if let Some(shift) = assignment.shift {
        parts.push(format!("{} shift", shift.as_str()));
    }
    Some(parts.join(" "))
}

pub(super) fn format_field_errors(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use jiff::{Timestamp, civil::date};
    use uuid::Uuid;

    use crate::{
        form::{FormField, REQUIRED},
        model::{ActivityDraft, IssueType, SelectionPath, Shift},
    };

    fn record() -> ActivityRecord {
        ActivityRecord::create(
            Uuid::new_v4(),
            ActivityDraft {
                equipment: SelectionPath::new("Press Shop", "Press-01", "", ""),
                issue_type: IssueType::Corrective,
                description: "Oil leak".into(),
            },
            "jdoe",
            Timestamp::now(),
        )
        .unwrap()
    }

    #[test]
    fn pending_line() {
        let record = record();
        let line = format_activity_line(&record);

        assert!(line.starts_with(&record.id().to_string()[..8]));
        assert!(line.contains("pending"));
        assert!(line.contains("Press Shop > Press-01  Oil leak"));
        assert!(!line.contains('['));
    }

    #[test]
    fn assigned_line_shows_schedule() {
        let mut record = record();
        record
            .assign(Assignment {
                assignees: BTreeSet::from(["mlee".to_string(), "akim".to_string()]),
                scheduled_date: Some(date(2026, 10, 20)),
                shift: Some(Shift::Second),
            })
            .unwrap();

        let line = format_activity_line(&record);

        assert!(line.contains("[akim, mlee 2026-10-20 second shift]"), "{line}");
    }

    #[test]
    fn field_errors_in_order() {
        let errors = FieldErrors::from([
            (FormField::Description, REQUIRED.to_string()),
            (FormField::EquipmentArea, REQUIRED.to_string()),
        ]);
        assert_eq!(
            format_field_errors(&errors),
            "equipment_area: required; description: required"
        );
    }
}
