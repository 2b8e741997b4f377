//! Core data model for maint.
//!
//! Equipment selection paths and their option sets, and the pending
//! activity record with its status, assignment, and audit fields.

mod activity;
mod path;

pub use activity::{
    ActivityDraft, ActivityRecord, Assignment, Completion, IssueType, ParseIssueTypeError, Shift,
    Status,
};
pub use path::{DISPLAY_SEPARATOR, Level, OptionSet, SelectionPath};
