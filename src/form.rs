//! Activity form: cascading equipment selection plus the free-form fields,
//! validated into one [`ActivityDraft`].
//!
//! The form is the only place selection state and activity fields meet. It
//! serves an interactive caller and a batch import the same way: set
//! fields, then [`ActivityForm::submit`].

use std::{collections::BTreeMap, convert::Infallible, fmt};

use serde::Serialize;

use crate::{
    cascade::CascadeSelector,
    hierarchy::HierarchyIndex,
    model::{ActivityDraft, ActivityRecord, IssueType, Level, SelectionPath},
};

/// Message for a missing required field.
pub const REQUIRED: &str = "required";

/// Message for an unrecognized issue type.
pub const INVALID_ISSUE_TYPE: &str = "must be one of: preventive, corrective, improvement";

/// A field that can carry a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    EquipmentArea,
    Description,
    IssueType,
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EquipmentArea => "equipment_area",
            Self::Description => "description",
            Self::IssueType => "issue_type",
        })
    }
}

/// Field name → message. Serializes as a flat JSON object.
pub type FieldErrors = BTreeMap<FormField, String>;

/// Why a submission did not go through.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError<E = Infallible> {
    #[error("invalid fields: {}", describe(.0))]
    Invalid(FieldErrors),

    #[error("a submission is already in flight")]
    InFlight,

    #[error("submission failed: {0}")]
    Rejected(E),
}

fn describe(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field} {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One activity form session.
#[derive(Debug, Clone)]
pub struct ActivityForm<'a> {
    selector: CascadeSelector<'a>,
    /// The saved path from [`load`](Self::load), submitted as-is until any
    /// equipment level is selected.
    saved_equipment: Option<SelectionPath>,
    issue_type: String,
    description: String,
    errors: FieldErrors,
    submitting: bool,
}

impl<'a> ActivityForm<'a> {
    /// A blank form. Issue type starts as corrective.
    #[must_use]
    pub fn new(index: &'a HierarchyIndex) -> Self {
        Self {
            selector: CascadeSelector::new(index),
            saved_equipment: None,
            issue_type: IssueType::default().as_str().to_string(),
            description: String::new(),
            errors: FieldErrors::new(),
            submitting: false,
        }
    }

    /// Edit mode: a form pre-filled from an existing activity, with its
    /// equipment path restored into the selector.
    ///
    /// If the catalog has lost part of the saved path, the selector shows
    /// what is left, but the saved path is still what gets submitted unless
    /// equipment is selected again.
    #[must_use]
    pub fn load(index: &'a HierarchyIndex, record: &ActivityRecord) -> Self {
        let mut form = Self::new(index);
        form.selector.restore_path(record.equipment());
        form.saved_equipment = Some(record.equipment().clone());
        form.issue_type = record.issue_type().as_str().to_string();
        form.description = record.description().to_string();
        if form.selector.path() != record.equipment() {
            tracing::warn!(
                id = %record.id(),
                saved = %record.equipment_display(),
                restored = %form.selector.path().display(),
                "saved equipment path no longer matches the catalog, keeping it until re-selected"
            );
        }
        form
    }

    #[must_use]
    pub fn selector(&self) -> &CascadeSelector<'a> {
        &self.selector
    }

    /// Selects one equipment level.
    pub fn select(&mut self, level: Level, name: &str) {
        self.saved_equipment = None;
        let before = self.selector.path().area.clone();
        self.selector.set(level, name);
        if self.selector.path().area != before {
            self.errors.remove(&FormField::EquipmentArea);
        }
    }

    pub fn set_area(&mut self, name: &str) {
        self.select(Level::Area, name);
    }

    pub fn set_machine(&mut self, name: &str) {
        self.select(Level::Machine, name);
    }

    pub fn set_element(&mut self, name: &str) {
        self.select(Level::Element, name);
    }

    pub fn set_component(&mut self, name: &str) {
        self.select(Level::Component, name);
    }

    /// Sets the whole equipment path at once.
    pub fn restore_equipment(&mut self, path: &SelectionPath) {
        self.saved_equipment = None;
        let before = self.selector.path().area.clone();
        self.selector.restore_path(path);
        if self.selector.path().area != before {
            self.errors.remove(&FormField::EquipmentArea);
        }
    }

    /// Takes the raw value as typed; it is only checked on validation.
    pub fn set_issue_type(&mut self, raw: &str) {
        if raw != self.issue_type {
            self.errors.remove(&FormField::IssueType);
            self.issue_type = raw.to_string();
        }
    }

    pub fn set_description(&mut self, text: &str) {
        if text != self.description {
            self.errors.remove(&FormField::Description);
            self.description = text.to_string();
        }
    }

    #[must_use]
    pub fn issue_type(&self) -> &str {
        &self.issue_type
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Errors from the last validation, minus fields edited since.
    #[must_use]
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// True between [`begin_submit`](Self::begin_submit) and
    /// [`finish_submit`](Self::finish_submit).
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Checks every field and assembles the draft.
    ///
    /// # Errors
    ///
    /// Returns the full error map if any field fails; the map is also kept
    /// on the form.
    pub fn validate(&mut self) -> Result<ActivityDraft, FieldErrors> {
        let mut errors = FieldErrors::new();

        let equipment = self
            .saved_equipment
            .clone()
            .unwrap_or_else(|| self.selector.path().clone());
        if equipment.area.is_empty() {
            errors.insert(FormField::EquipmentArea, REQUIRED.to_string());
        }

        let description = self.description.trim();
        if description.is_empty() {
            errors.insert(FormField::Description, REQUIRED.to_string());
        }

        let issue_type = match self.issue_type.parse::<IssueType>() {
            Ok(t) => Some(t),
            Err(_) => {
                errors.insert(FormField::IssueType, INVALID_ISSUE_TYPE.to_string());
                None
            }
        };

        self.errors.clone_from(&errors);
        match issue_type {
            Some(issue_type) if errors.is_empty() => Ok(ActivityDraft {
                equipment,
                issue_type,
                description: description.to_string(),
            }),
            _ => Err(errors),
        }
    }

    /// Validates and marks the form as in flight.
    ///
    /// # Errors
    ///
    /// [`SubmitError::InFlight`] if a submission is already running,
    /// [`SubmitError::Invalid`] if validation fails.
    pub fn begin_submit(&mut self) -> Result<ActivityDraft, SubmitError> {
        if self.submitting {
            return Err(SubmitError::InFlight);
        }
        let draft = self.validate().map_err(SubmitError::Invalid)?;
        self.submitting = true;
        Ok(draft)
    }

    /// Clears the in-flight mark.
    pub fn finish_submit(&mut self) {
        self.submitting = false;
    }

    /// Validates, then calls `on_submit` exactly once with the draft.
    ///
    /// The callback is not called if validation fails.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Invalid`] or [`SubmitError::InFlight`] before the
    /// callback runs, [`SubmitError::Rejected`] if the callback fails.
    pub fn submit<T, E>(
        &mut self,
        on_submit: impl FnOnce(ActivityDraft) -> Result<T, E>,
    ) -> Result<T, SubmitError<E>> {
        let draft = match self.begin_submit() {
            Ok(draft) => draft,
            Err(SubmitError::Invalid(errors)) => return Err(SubmitError::Invalid(errors)),
            Err(SubmitError::InFlight) => return Err(SubmitError::InFlight),
            Err(SubmitError::Rejected(never)) => match never {},
        };
        let result = on_submit(draft).map_err(SubmitError::Rejected);
        self.finish_submit();
        result
    }
}
