//! Equipment paths: the four nominal levels of the hierarchy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between segments of a display path.
pub const DISPLAY_SEPARATOR: &str = " > ";

/// One of the four nominal hierarchy levels, top-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    Area,
    Machine,
    Element,
    Component,
}

impl Level {
    /// All levels, shallowest first.
    pub const ALL: [Self; 4] = [Self::Area, Self::Machine, Self::Element, Self::Component];

    /// Zero-based depth: area is 0, component is 3.
    #[must_use]
    pub const fn depth(self) -> usize {
        self as usize
    }

    /// The level directly below this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Area => Some(Self::Machine),
            Self::Machine => Some(Self::Element),
            Self::Element => Some(Self::Component),
            Self::Component => None,
        }
    }

    /// Levels strictly deeper than this one.
    pub fn below(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |l| *l > self)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Area => "area",
            Self::Machine => "machine",
            Self::Element => "element",
            Self::Component => "component",
        })
    }
}

/// A chosen equipment path.
///
/// Unset levels are empty strings. A consistent path never has a
/// non-empty level below an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPath {
    pub area: String,
    pub machine: String,
    pub element: String,
    pub component: String,
}

impl SelectionPath {
    pub fn new(
        area: impl Into<String>,
        machine: impl Into<String>,
        element: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            area: area.into(),
            machine: machine.into(),
            element: element.into(),
            component: component.into(),
        }
    }

    #[must_use]
    pub fn get(&self, level: Level) -> &str {
        match level {
            Level::Area => &self.area,
            Level::Machine => &self.machine,
            Level::Element => &self.element,
            Level::Component => &self.component,
        }
    }

    pub(crate) fn get_mut(&mut self, level: Level) -> &mut String {
        match level {
            Level::Area => &mut self.area,
            Level::Machine => &mut self.machine,
            Level::Element => &mut self.element,
            Level::Component => &mut self.component,
        }
    }

    /// All four segments, shallowest first.
    #[must_use]
    pub fn segments(&self) -> [&str; 4] {
        [&self.area, &self.machine, &self.element, &self.component]
    }

    /// Segments strictly above `level`, i.e. the path of its parent node.
    #[must_use]
    pub fn parent_of(&self, level: Level) -> Vec<&str> {
        self.segments()[..level.depth()].to_vec()
    }

    /// The deepest non-empty level, if any.
    #[must_use]
    pub fn deepest(&self) -> Option<Level> {
        Level::ALL
            .into_iter()
            .rev()
            .find(|l| !self.get(*l).is_empty())
    }

    /// True if no non-empty level sits below an empty one.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let segments = self.segments();
        segments
            .windows(2)
            .all(|pair| !(pair[0].is_empty() && !pair[1].is_empty()))
    }

    /// Clears every level from the first empty one down.
    ///
    /// Returns true if anything was dropped.
    pub fn truncate_at_gap(&mut self) -> bool {
        let Some(gap) = Level::ALL.into_iter().find(|l| self.get(*l).is_empty()) else {
            return false;
        };
        let mut dropped = false;
        for level in gap.below() {
            let segment = self.get_mut(level);
            dropped |= !segment.is_empty();
            segment.clear();
        }
        dropped
    }

    /// Human-readable form: non-empty segments joined by `" > "`.
    #[must_use]
    pub fn display(&self) -> String {
        self.segments()
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(DISPLAY_SEPARATOR)
    }
}

/// The valid choices at each level given the selection so far.
///
/// Recomputed on every selection change, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionSet {
    pub areas: Vec<String>,
    pub machines: Vec<String>,
    pub elements: Vec<String>,
    pub components: Vec<String>,
}

impl OptionSet {
    #[must_use]
    pub fn get(&self, level: Level) -> &[String] {
        match level {
            Level::Area => &self.areas,
            Level::Machine => &self.machines,
            Level::Element => &self.elements,
            Level::Component => &self.components,
        }
    }

    pub(crate) fn get_mut(&mut self, level: Level) -> &mut Vec<String> {
        match level {
            Level::Area => &mut self.areas,
            Level::Machine => &mut self.machines,
            Level::Element => &mut self.elements,
            Level::Component => &mut self.components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_non_empty_segments() {
        let path = SelectionPath::new("Press Shop", "Press-01", "Motor", "");
        assert_eq!(path.display(), "Press Shop > Press-01 > Motor");

        let full = SelectionPath::new("A", "M", "E", "C");
        assert_eq!(full.display(), "A > M > E > C");

        assert_eq!(SelectionPath::default().display(), "");
    }

    #[test]
    fn consistency_rejects_gaps() {
        assert!(SelectionPath::new("A", "M", "", "").is_consistent());
        assert!(SelectionPath::default().is_consistent());
        assert!(!SelectionPath::new("", "M", "", "").is_consistent());
        assert!(!SelectionPath::new("A", "", "E", "").is_consistent());
    }

    #[test]
    fn parent_of_returns_segments_above() {
        let path = SelectionPath::new("A", "M", "E", "C");
        assert!(path.parent_of(Level::Area).is_empty());
        assert_eq!(path.parent_of(Level::Element), vec!["A", "M"]);
    }

    #[test]
    fn truncate_drops_orphans() {
        let mut path = SelectionPath::new("A", "", "E", "C");
        assert!(path.truncate_at_gap());
        assert_eq!(path, SelectionPath::new("A", "", "", ""));

        let mut whole = SelectionPath::new("A", "M", "", "");
        assert!(!whole.truncate_at_gap());
    }

    #[test]
    fn deepest_level() {
        assert_eq!(SelectionPath::default().deepest(), None);
        assert_eq!(
            SelectionPath::new("A", "M", "", "").deepest(),
            Some(Level::Machine)
        );
    }

    #[test]
    fn levels_below() {
        let below: Vec<Level> = Level::Machine.below().collect();
        assert_eq!(below, vec![Level::Element, Level::Component]);
        assert_eq!(Level::Component.below().count(), 0);
    }
}
