//! maint: equipment maintenance activity tracking.
//!
//! A cascading equipment selector over a fixed four-level catalog
//! (area, machine, element, component), and a small lifecycle for the
//! activities reported against it: pending, assigned, done.

pub mod cascade;
pub mod cli;
pub mod config;
pub mod form;
pub mod hierarchy;
pub mod identity;
pub mod lifecycle;
pub mod model;
pub mod storage;
