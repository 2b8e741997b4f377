//! Activity lifecycle: pending → assigned → done, or pending → done.
//!
//! Transitions are plain methods on [`ActivityRecord`] that either apply in
//! full or leave the record untouched. [`Lifecycle`] runs them against an
//! [`ActivityStore`]: read the record, apply the transition, and write back
//! only the columns that transition owns, and only if the stored status
//! still matches what was read. A concurrent writer that changed the status
//! first turns the write into [`TransitionError::InvalidTransition`];
//! nothing blocks, and fields a transition did not touch are never written.
//!
//! `done` is terminal. There is no reopen.

use std::fmt;

use jiff::Timestamp;
use uuid::Uuid;

use crate::{
    model::{
        ActivityDraft, ActivityRecord, Assignment, Completion, IssueType, SelectionPath, Status,
    },
    storage::{self, StorageError},
};

/// A lifecycle transition, named for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create,
    Assign,
    Complete,
    Revise,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Assign => "assign",
            Self::Complete => "complete",
            Self::Revise => "revise",
        })
    }
}

/// A transition that was refused. The record is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("activity is already completed")]
    AlreadyCompleted,

    #[error("cannot {transition} an activity that is {from}")]
    InvalidTransition { transition: Transition, from: Status },

    #[error("equipment area is required")]
    MissingEquipmentArea,

    #[error("description is required")]
    MissingDescription,

    #[error("acting user is required")]
    MissingActor,

    #[error("at least one assignee is required")]
    NoAssignees,
}

/// The columns one transition owns. A store writes these and nothing else,
/// so a transition never overwrites fields it did not change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityPatch {
    /// Revise: equipment path, issue type, description. Status is kept.
    Details {
        equipment: SelectionPath,
        issue_type: IssueType,
        description: String,
    },

    /// Assign: the whole assignment. Status becomes assigned.
    Assignment(Assignment),

    /// Complete: who and when. Status becomes done.
    Completion(Completion),
}

impl ActivityPatch {
    /// The status the patch moves the activity to, if it moves it at all.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Details { .. } => None,
            Self::Assignment(_) => Some(Status::Assigned),
            Self::Completion(_) => Some(Status::Done),
        }
    }
}

/// The persistence collaborator.
///
/// Implementations own durability and id uniqueness. `update_activity` is
/// the compare-and-swap point: it must write only if the stored status
/// equals `expected`, and report [`StorageError::StatusConflict`] otherwise.
pub trait ActivityStore {
    /// Persists a new record.
    ///
    /// # Errors
    ///
    /// Fails if the id is taken or the write fails.
    fn create_activity(&self, record: &ActivityRecord) -> storage::Result<()>;

    /// Applies `patch` to a record if its stored status is still `expected`.
    ///
    /// # Errors
    ///
    /// Fails with `StatusConflict` on a status mismatch, or if the record
    /// is missing or the write fails.
    fn update_activity(
        &self,
        id: Uuid,
        patch: &ActivityPatch,
        expected: Status,
    ) -> storage::Result<()>;

    /// Reads a record by id.
    ///
    /// # Errors
    ///
    /// Fails if the record is missing or unreadable.
    fn find_activity(&self, id: Uuid) -> storage::Result<ActivityRecord>;
}

/// Errors from running a transition against a store.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn require_actor(actor: &str) -> Result<(), TransitionError> {
    if actor.trim().is_empty() {
        return Err(TransitionError::MissingActor);
    }
    Ok(())
}

/// Checks draft fields and normalizes them: description trimmed, path
/// cut at its first gap.
fn checked_draft(mut draft: ActivityDraft) -> Result<ActivityDraft, TransitionError> {
    if draft.equipment.area.is_empty() {
        return Err(TransitionError::MissingEquipmentArea);
    }
    let description = draft.description.trim().to_string();
    if description.is_empty() {
        return Err(TransitionError::MissingDescription);
    }
    draft.description = description;
    if draft.equipment.truncate_at_gap() {
        tracing::warn!(path = ?draft.equipment, "equipment path had a gap, truncated");
    }
    Ok(draft)
}

impl ActivityRecord {
    /// Entry transition: a new pending activity.
    ///
    /// # Errors
    ///
    /// [`TransitionError::MissingActor`], [`TransitionError::MissingEquipmentArea`],
    /// or [`TransitionError::MissingDescription`].
    pub fn create(
        id: Uuid,
        draft: ActivityDraft,
        created_by: &str,
        created_at: Timestamp,
    ) -> Result<Self, TransitionError> {
        require_actor(created_by)?;
        let draft = checked_draft(draft)?;
        Ok(Self::from_stored(
            id,
            draft.equipment,
            draft.issue_type,
            draft.description,
            Status::Pending,
            Assignment::default(),
            created_by.to_string(),
            created_at,
            None,
        ))
    }

    /// `pending → assigned`, or reassignment of an assigned activity.
    ///
    /// Blank assignee ids are dropped. Returns the status the record was in.
    ///
    /// # Errors
    ///
    /// [`TransitionError::InvalidTransition`] once done,
    /// [`TransitionError::NoAssignees`] if no assignee remains.
    pub fn assign(&mut self, mut assignment: Assignment) -> Result<Status, TransitionError> {
        let from = self.status;
        if from == Status::Done {
            return Err(TransitionError::InvalidTransition {
                transition: Transition::Assign,
                from,
            });
        }
        assignment.assignees.retain(|a| !a.trim().is_empty());
        if assignment.assignees.is_empty() {
            return Err(TransitionError::NoAssignees);
        }
        self.assignment = assignment;
        self.status = Status::Assigned;
        Ok(from)
    }

    /// `pending → done` or `assigned → done`. Records who and when, once.
    ///
    /// Returns the status the record was in.
    ///
    /// # Errors
    ///
    /// [`TransitionError::AlreadyCompleted`] if already done,
    /// [`TransitionError::MissingActor`] if `completed_by` is blank.
    pub fn complete(
        &mut self,
        completed_by: &str,
        completed_at: Timestamp,
    ) -> Result<Status, TransitionError> {
        let from = self.status;
        if from == Status::Done || self.completion.is_some() {
            return Err(TransitionError::AlreadyCompleted);
        }
        require_actor(completed_by)?;
        self.completion = Some(Completion {
            completed_by: completed_by.to_string(),
            completed_at,
        });
        self.status = Status::Done;
        Ok(from)
    }

    /// Replaces the user-editable fields of an open activity. Status and
    /// audit fields are untouched; the display string follows the path.
    ///
    /// Returns the status the record was in.
    ///
    /// # Errors
    ///
    /// [`TransitionError::InvalidTransition`] once done, or the draft
    /// errors of [`ActivityRecord::create`].
    pub fn revise(&mut self, draft: ActivityDraft) -> Result<Status, TransitionError> {
        let from = self.status;
        if from == Status::Done {
            return Err(TransitionError::InvalidTransition {
                transition: Transition::Revise,
                from,
            });
        }
        let draft = checked_draft(draft)?;
        self.set_equipment(draft.equipment);
        self.issue_type = draft.issue_type;
        self.description = draft.description;
        Ok(from)
    }
}

/// Applies transitions through a store with compare-and-swap on status.
#[derive(Debug)]
pub struct Lifecycle<'s, S> {
    store: &'s S,
}

impl<'s, S: ActivityStore> Lifecycle<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Creates and persists a new pending activity.
    ///
    /// # Errors
    ///
    /// Any [`TransitionError`] from [`ActivityRecord::create`], or a storage failure.
    pub fn create(
        &self,
        draft: ActivityDraft,
        created_by: &str,
    ) -> Result<ActivityRecord, LifecycleError> {
        let record = ActivityRecord::create(Uuid::new_v4(), draft, created_by, Timestamp::now())?;
        self.store.create_activity(&record)?;
        tracing::info!(id = %record.id, created_by, equipment = %record.equipment_display, "activity created");
        Ok(record)
    }

    /// # Errors
    ///
    /// See [`ActivityRecord::assign`]; a concurrent status change is
    /// reported as [`TransitionError::InvalidTransition`].
    pub fn assign(&self, id: Uuid, assignment: Assignment) -> Result<ActivityRecord, LifecycleError> {
        self.transition(id, Transition::Assign, |record| {
            let from = record.assign(assignment)?;
            Ok((from, ActivityPatch::Assignment(record.assignment.clone())))
        })
    }

    /// # Errors
    ///
    /// See [`ActivityRecord::complete`]; a concurrent status change is
    /// reported as [`TransitionError::InvalidTransition`].
    pub fn complete(&self, id: Uuid, completed_by: &str) -> Result<ActivityRecord, LifecycleError> {
        let completion = Completion {
            completed_by: completed_by.to_string(),
            completed_at: Timestamp::now(),
        };
        self.transition(id, Transition::Complete, |record| {
            let from = record.complete(&completion.completed_by, completion.completed_at)?;
            Ok((from, ActivityPatch::Completion(completion)))
        })
    }

    /// # Errors
    ///
    /// See [`ActivityRecord::revise`]; a concurrent status change is
    /// reported as [`TransitionError::InvalidTransition`].
    pub fn revise(&self, id: Uuid, draft: ActivityDraft) -> Result<ActivityRecord, LifecycleError> {
        self.transition(id, Transition::Revise, |record| {
            let from = record.revise(draft)?;
            let patch = ActivityPatch::Details {
                equipment: record.equipment.clone(),
                issue_type: record.issue_type,
                description: record.description.clone(),
            };
            Ok((from, patch))
        })
    }

    /// Reads, applies, and writes back only the patched columns. Returns
    /// the record as stored afterwards.
    fn transition(
        &self,
        id: Uuid,
        transition: Transition,
        apply: impl FnOnce(&mut ActivityRecord) -> Result<(Status, ActivityPatch), TransitionError>,
    ) -> Result<ActivityRecord, LifecycleError> {
        let mut record = self.store.find_activity(id)?;
        let (from, patch) = apply(&mut record)?;

        match self.store.update_activity(id, &patch, from) {
            Ok(()) => {
                let stored = self.store.find_activity(id)?;
                tracing::info!(%id, %transition, %from, to = %stored.status, "activity transitioned");
                Ok(stored)
            }
            Err(StorageError::StatusConflict { actual, .. }) => {
                tracing::warn!(%id, %transition, expected = %from, %actual, "concurrent status change");
                Err(TransitionError::InvalidTransition {
                    transition,
                    from: actual,
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{cell::Cell, collections::BTreeSet};

    use proptest::prelude::*;
    use tempfile::TempDir;

    use crate::storage::Storage;

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("maint.sqlite")).unwrap();
        (dir, storage)
    }

    fn draft() -> ActivityDraft {
        ActivityDraft {
            equipment: SelectionPath::new("Press Shop", "Press-01", "Motor", ""),
            issue_type: IssueType::Corrective,
            description: "  fix leak  ".into(),
        }
    }

    fn assign_to(users: &[&str]) -> Assignment {
        Assignment {
            assignees: users.iter().map(|u| (*u).to_string()).collect(),
            ..Assignment::default()
        }
    }

    fn pending() -> ActivityRecord {
        ActivityRecord::create(Uuid::new_v4(), draft(), "u1", Timestamp::now()).unwrap()
    }

    #[test]
    fn create_starts_pending() {
        let record = pending();

        assert_eq!(record.status(), Status::Pending);
        assert_eq!(record.created_by(), "u1");
        assert_eq!(record.description(), "fix leak");
        assert_eq!(record.equipment_display(), "Press Shop > Press-01 > Motor");
        assert!(record.completion().is_none());
        assert!(record.assignment().assignees.is_empty());
    }

    #[test]
    fn create_requires_area_description_and_actor() {
        let now = Timestamp::now();

        let mut no_area = draft();
        no_area.equipment = SelectionPath::default();
        assert_eq!(
            ActivityRecord::create(Uuid::new_v4(), no_area, "u1", now).unwrap_err(),
            TransitionError::MissingEquipmentArea
        );

        let mut blank = draft();
        blank.description = "   ".into();
        assert_eq!(
            ActivityRecord::create(Uuid::new_v4(), blank, "u1", now).unwrap_err(),
            TransitionError::MissingDescription
        );

        assert_eq!(
            ActivityRecord::create(Uuid::new_v4(), draft(), " ", now).unwrap_err(),
            TransitionError::MissingActor
        );
    }

    #[test]
    fn create_truncates_gapped_path() {
        let mut gapped = draft();
        gapped.equipment = SelectionPath::new("Press Shop", "", "Motor", "");

        let record = ActivityRecord::create(Uuid::new_v4(), gapped, "u1", Timestamp::now()).unwrap();

        assert_eq!(record.equipment(), &SelectionPath::new("Press Shop", "", "", ""));
        assert_eq!(record.equipment_display(), "Press Shop");
    }

    #[test]
    fn assign_requires_assignees() {
        let mut record = pending();

        assert_eq!(
            record.assign(assign_to(&[])).unwrap_err(),
            TransitionError::NoAssignees
        );
        assert_eq!(
            record.assign(assign_to(&["", "  "])).unwrap_err(),
            TransitionError::NoAssignees
        );
        assert_eq!(record.status(), Status::Pending);
    }

    #[test]
    fn reassign_replaces_assignment() {
        let mut record = pending();
        record.assign(assign_to(&["u2"])).unwrap();

        let from = record.assign(assign_to(&["u5", "u6"])).unwrap();

        assert_eq!(from, Status::Assigned);
        assert_eq!(record.status(), Status::Assigned);
        assert_eq!(record.assignment().assignees.len(), 2);
    }

    #[test]
    fn complete_directly_from_pending() {
        let mut record = pending();

        let from = record.complete("u3", Timestamp::now()).unwrap();

        assert_eq!(from, Status::Pending);
        assert_eq!(record.status(), Status::Done);
    }

    #[test]
    fn done_is_terminal() {
        let mut record = pending();
        record.complete("u3", Timestamp::now()).unwrap();

        assert_eq!(
            record.assign(assign_to(&["u2"])).unwrap_err(),
            TransitionError::InvalidTransition {
                transition: Transition::Assign,
                from: Status::Done
            }
        );
        assert_eq!(
            record.revise(draft()).unwrap_err(),
            TransitionError::InvalidTransition {
                transition: Transition::Revise,
                from: Status::Done
            }
        );
        assert_eq!(
            record.complete("u4", Timestamp::now()).unwrap_err(),
            TransitionError::AlreadyCompleted
        );
        assert_eq!(record.completion().unwrap().completed_by, "u3");
    }

    #[test]
    fn revise_recomputes_display_and_keeps_status() {
        let mut record = pending();
        record.assign(assign_to(&["u2"])).unwrap();

        record
            .revise(ActivityDraft {
                equipment: SelectionPath::new("Paint", "Booth", "", ""),
                issue_type: IssueType::Improvement,
                description: "Add a filter".into(),
            })
            .unwrap();

        assert_eq!(record.status(), Status::Assigned);
        assert_eq!(record.equipment_display(), "Paint > Booth");
        assert_eq!(record.issue_type(), IssueType::Improvement);
        assert_eq!(record.created_by(), "u1");
    }

    #[test]
    fn full_lifecycle_through_storage() {
        let (_dir, storage) = test_storage();
        let lifecycle = Lifecycle::new(&storage);

        let created = lifecycle.create(draft(), "u1").unwrap();
        assert_eq!(created.status(), Status::Pending);

        let assigned = lifecycle.assign(created.id(), assign_to(&["u2"])).unwrap();
        assert_eq!(assigned.status(), Status::Assigned);

        let done = lifecycle.complete(created.id(), "u3").unwrap();
        assert_eq!(done.status(), Status::Done);
        assert_eq!(done.completion().unwrap().completed_by, "u3");

        let err = lifecycle.complete(created.id(), "u4").unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Transition(TransitionError::AlreadyCompleted)
        ));

        let stored = storage.find_activity(created.id()).unwrap();
        assert_eq!(stored.status(), Status::Done);
        assert_eq!(stored.completion(), done.completion());
        assert_eq!(stored.assignment().assignees, assigned.assignment().assignees);
    }

    #[test]
    fn transition_on_missing_activity_fails() {
        let (_dir, storage) = test_storage();
        let lifecycle = Lifecycle::new(&storage);

        let err = lifecycle.complete(Uuid::new_v4(), "u3").unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Storage(StorageError::ActivityNotFound(_))
        ));
    }

    /// Runs `rival` against the real store right after the first read,
    /// simulating a second administrator.
    struct RacingStore<'a> {
        inner: &'a Storage,
        rival: fn(&Storage, Uuid),
        raced: Cell<bool>,
    }

    fn complete_as_rival(storage: &Storage, id: Uuid) {
        Lifecycle::new(storage).complete(id, "rival").unwrap();
    }

    fn reassign_to_u9(storage: &Storage, id: Uuid) {
        Lifecycle::new(storage).assign(id, assign_to(&["u9"])).unwrap();
    }

    impl ActivityStore for RacingStore<'_> {
        fn create_activity(&self, record: &ActivityRecord) -> storage::Result<()> {
            self.inner.create_activity(record)
        }

        fn update_activity(
            &self,
            id: Uuid,
            patch: &ActivityPatch,
            expected: Status,
        ) -> storage::Result<()> {
            self.inner.update_activity(id, patch, expected)
        }

        fn find_activity(&self, id: Uuid) -> storage::Result<ActivityRecord> {
            let record = self.inner.find_activity(id)?;
            if !self.raced.replace(true) {
                (self.rival)(self.inner, id);
            }
            Ok(record)
        }
    }

    #[test]
    fn concurrent_completion_rejects_the_loser() {
        let (_dir, storage) = test_storage();
        let created = Lifecycle::new(&storage).create(draft(), "u1").unwrap();

        let racing = RacingStore {
            inner: &storage,
            rival: complete_as_rival,
            raced: Cell::new(false),
        };
        let err = Lifecycle::new(&racing)
            .assign(created.id(), assign_to(&["u2"]))
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Transition(TransitionError::InvalidTransition {
                transition: Transition::Assign,
                from: Status::Done,
            })
        ));
        let stored = storage.find_activity(created.id()).unwrap();
        assert_eq!(stored.completion().unwrap().completed_by, "rival");
        assert!(stored.assignment().assignees.is_empty());
    }

    #[test]
    fn revise_keeps_a_concurrent_reassignment() {
        let (_dir, storage) = test_storage();
        let lifecycle = Lifecycle::new(&storage);
        let created = lifecycle.create(draft(), "u1").unwrap();
        lifecycle.assign(created.id(), assign_to(&["u2"])).unwrap();

        let racing = RacingStore {
            inner: &storage,
            rival: reassign_to_u9,
            raced: Cell::new(false),
        };
        let revised = Lifecycle::new(&racing)
            .revise(
                created.id(),
                ActivityDraft {
                    description: "Replace the seal".into(),
                    ..draft()
                },
            )
            .unwrap();

        let stored = storage.find_activity(created.id()).unwrap();
        assert_eq!(stored.description(), "Replace the seal");
        assert_eq!(stored.status(), Status::Assigned);
        assert_eq!(
            stored.assignment().assignees,
            BTreeSet::from(["u9".to_string()])
        );
        assert_eq!(revised, stored);
    }

    #[test]
    fn assign_keeps_a_concurrent_revision() {
        let (_dir, storage) = test_storage();
        let created = Lifecycle::new(&storage).create(draft(), "u1").unwrap();

        let racing = RacingStore {
            inner: &storage,
            rival: |storage, id| {
                Lifecycle::new(storage)
                    .revise(
                        id,
                        ActivityDraft {
                            description: "Rival text".into(),
                            ..draft()
                        },
                    )
                    .unwrap();
            },
            raced: Cell::new(false),
        };
        Lifecycle::new(&racing)
            .assign(created.id(), assign_to(&["u2"]))
            .unwrap();

        let stored = storage.find_activity(created.id()).unwrap();
        assert_eq!(stored.description(), "Rival text");
        assert_eq!(stored.status(), Status::Assigned);
    }

    #[test]
    fn patch_status_targets() {
        assert_eq!(
            ActivityPatch::Assignment(Assignment::default()).status(),
            Some(Status::Assigned)
        );
        let details = ActivityPatch::Details {
            equipment: SelectionPath::default(),
            issue_type: IssueType::Corrective,
            description: String::new(),
        };
        assert_eq!(details.status(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Assign(Vec<String>),
        Complete(String),
        Revise(String),
    }

    fn op() -> impl Strategy<Value = Op> {
        let user = prop::sample::select(vec!["", "u2", "u3", "u4"]).prop_map(String::from);
        prop_oneof![
            prop::collection::vec(user.clone(), 0..3).prop_map(Op::Assign),
            user.clone().prop_map(Op::Complete),
            prop::sample::select(vec!["", "new text"]).prop_map(|d| Op::Revise(d.to_string())),
        ]
    }

    fn allowed(from: Status, to: Status) -> bool {
        matches!(
            (from, to),
            (Status::Pending, Status::Pending | Status::Assigned | Status::Done)
                | (Status::Assigned, Status::Assigned | Status::Done)
                | (Status::Done, Status::Done)
        )
    }

    proptest! {
        #[test]
        fn status_only_moves_forward(ops in prop::collection::vec(op(), 1..20)) {
            let mut record = pending();
            let mut completion: Option<Completion> = None;

            for op in ops {
                let before = record.status();
                let snapshot = record.clone();
                let result = match op {
                    Op::Assign(users) => record.assign(Assignment {
                        assignees: users.into_iter().collect(),
                        ..Assignment::default()
                    }),
                    Op::Complete(user) => record.complete(&user, Timestamp::now()),
                    Op::Revise(description) => record.revise(ActivityDraft {
                        description,
                        ..draft()
                    }),
                };

                prop_assert!(allowed(before, record.status()));
                if result.is_err() {
                    prop_assert_eq!(&record, &snapshot);
                }
                prop_assert_eq!(record.equipment_display(), record.equipment().display());

                match completion.clone() {
                    Some(first) => prop_assert_eq!(Some(&first), record.completion()),
                    None => completion = record.completion().cloned(),
                }
                prop_assert_eq!(record.status() == Status::Done, record.completion().is_some());
            }
        }
    }
}
