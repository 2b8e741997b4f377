//! Cascading equipment selection over a [`HierarchyIndex`].
//!
//! Every change goes through one pure transition, [`apply`]: set one level,
//! clear everything below it, and recompute the options that level opens
//! up. [`restore`] is a replay of `apply` over a saved path, so restoring
//! and selecting level by level always agree.

use serde::Serialize;

use crate::{
    hierarchy::HierarchyIndex,
    model::{Level, OptionSet, SelectionPath},
};

/// A selection path together with the options it leaves open.
///
/// Only produced by [`apply`] and [`restore`], so the two always agree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cascade {
    path: SelectionPath,
    options: OptionSet,
}

impl Cascade {
    /// Nothing selected; only the areas are offered.
    #[must_use]
    pub fn initial(index: &HierarchyIndex) -> Self {
        Self {
            path: SelectionPath::default(),
            options: OptionSet {
                areas: index.children_of(&[]),
                ..OptionSet::default()
            },
        }
    }

    #[must_use]
    pub fn path(&self) -> &SelectionPath {
        &self.path
    }

    #[must_use]
    pub fn options(&self) -> &OptionSet {
        &self.options
    }
}

/// Selects `name` at `level`.
///
/// Levels below `level` are cleared, `level`'s own options are recomputed
/// from its parent, and the next level's options are recomputed from the
/// new selection. An empty name clears the level. A name not offered under
/// its parent is cleared too.
#[must_use]
pub fn apply(index: &HierarchyIndex, state: &Cascade, level: Level, name: &str) -> Cascade {
    let mut next = state.clone();
    for below in level.below() {
        next.path.get_mut(below).clear();
        next.options.get_mut(below).clear();
    }

    let parent = state.path.parent_of(level);
    let choices = if parent.iter().all(|s| !s.is_empty()) {
        index.children_of(&parent)
    } else {
        Vec::new()
    };

    let accepted = !name.is_empty() && choices.iter().any(|c| c == name);
    if !name.is_empty() && !accepted {
        tracing::warn!(%level, name, "selection not offered under its parent, cleared");
    }

    if let Some(child) = level.next() {
        // Below a leaf list the chosen name is final.
        *next.options.get_mut(child) = if accepted && !index.is_leaf_level(&parent) {
            let mut path = parent.clone();
            path.push(name);
            index.children_of(&path)
        } else {
            Vec::new()
        };
    }

    *next.path.get_mut(level) = if accepted {
        name.to_string()
    } else {
        String::new()
    };
    *next.options.get_mut(level) = choices;

    tracing::debug!(%level, name, accepted, "selection applied");
    enforce(index, next)
}

/// Sets a full saved path at once, top-down.
///
/// Defined as replaying [`apply`] for each level, so it yields exactly
/// what the equivalent sequence of single selections would. Any suffix of
/// the path may be empty.
#[must_use]
pub fn restore(index: &HierarchyIndex, path: &SelectionPath) -> Cascade {
    Level::ALL
        .into_iter()
        .fold(Cascade::initial(index), |state, level| {
            apply(index, &state, level, path.get(level))
        })
}

/// Forces back to empty any level whose parent selection is missing or
/// not listed in the hierarchy, along with everything below it.
///
/// `apply` never produces such a state; reaching the correction is a
/// defect and is logged as one.
pub(crate) fn enforce(index: &HierarchyIndex, mut state: Cascade) -> Cascade {
    let broken = Level::ALL.into_iter().find(|level| {
        let parent = state.path.parent_of(*level);
        let parent_valid = parent.iter().all(|s| !s.is_empty()) && index.contains(&parent);
        let selected = state.path.get(*level);
        let offered = state.options.get(*level);

        let mut full = parent.clone();
        full.push(selected);

        let path_ok = selected.is_empty()
            || (parent_valid && offered.iter().any(|o| o == selected) && index.contains(&full));
        let options_ok = offered.is_empty() || parent_valid;
        !path_ok || !options_ok
    });

    if let Some(level) = broken {
        tracing::error!(%level, path = %state.path.display(), "selection invariant violated, resetting");
        for reset in std::iter::once(level).chain(level.below()) {
            state.path.get_mut(reset).clear();
            state.options.get_mut(reset).clear();
        }
        // Re-offer the broken level's choices if its parent still holds.
        let parent = state.path.parent_of(level);
        if parent.iter().all(|s| !s.is_empty()) && index.contains(&parent) {
            *state.options.get_mut(level) = index.children_of(&parent);
        }
    }
    state
}

/// Stateful selection engine for one form session.
#[derive(Debug, Clone)]
pub struct CascadeSelector<'a> {
    index: &'a HierarchyIndex,
    state: Cascade,
}

impl<'a> CascadeSelector<'a> {
    #[must_use]
    pub fn new(index: &'a HierarchyIndex) -> Self {
        Self {
            index,
            state: Cascade::initial(index),
        }
    }

    pub fn set(&mut self, level: Level, name: &str) {
        self.state = apply(self.index, &self.state, level, name);
    }

    pub fn set_area(&mut self, name: &str) {
        self.set(Level::Area, name);
    }

    pub fn set_machine(&mut self, name: &str) {
        self.set(Level::Machine, name);
    }

    pub fn set_element(&mut self, name: &str) {
        self.set(Level::Element, name);
    }

    pub fn set_component(&mut self, name: &str) {
        self.set(Level::Component, name);
    }

    /// Edit mode: set the whole path at once.
    pub fn restore(&mut self, area: &str, machine: &str, element: &str, component: &str) {
        self.restore_path(&SelectionPath::new(area, machine, element, component));
    }

    pub fn restore_path(&mut self, path: &SelectionPath) {
        self.state = restore(self.index, path);
    }

    #[must_use]
    pub fn path(&self) -> &SelectionPath {
        self.state.path()
    }

    #[must_use]
    pub fn options(&self) -> &OptionSet {
        self.state.options()
    }

    #[must_use]
    pub fn state(&self) -> &Cascade {
        &self.state
    }

    /// The level a user should choose next, or `None` once selection is
    /// final (every offered level filled, or nothing further offered).
    #[must_use]
    pub fn next_level(&self) -> Option<Level> {
        Level::ALL.into_iter().find(|level| {
            self.path().get(*level).is_empty() && !self.options().get(*level).is_empty()
        })
    }
}
