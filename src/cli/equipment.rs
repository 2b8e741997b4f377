//! Equipment path arguments and catalog browsing.

use clap::Args;
use serde::Serialize;

use crate::{
    cascade::CascadeSelector,
    form::ActivityForm,
    hierarchy::HierarchyIndex,
    model::{Level, OptionSet, SelectionPath},
};

/// Equipment path flags, one per hierarchy level.
#[derive(Debug, Clone, Default, Args)]
pub struct PathArgs {
    /// Area (top level).
    #[arg(long)]
    pub area: Option<String>,

    /// Machine within the area.
    #[arg(long)]
    pub machine: Option<String>,

    /// Element within the machine.
    #[arg(long)]
    pub element: Option<String>,

    /// Component within the element.
    #[arg(long)]
    pub component: Option<String>,
}

impl PathArgs {
    /// Levels given on the command line, shallowest first.
    pub(super) fn given(&self) -> Vec<(Level, &str)> {
        [
            (Level::Area, &self.area),
            (Level::Machine, &self.machine),
            (Level::Element, &self.element),
            (Level::Component, &self.component),
        ]
        .into_iter()
        .filter_map(|(level, value)| value.as_deref().map(|v| (level, v)))
        .collect()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.given().is_empty()
    }
}

/// Anything equipment levels can be selected on.
pub(super) trait Selection {
    fn selector(&self) -> &CascadeSelector<'_>;

    fn select(&mut self, level: Level, name: &str);
}

impl Selection for CascadeSelector<'_> {
    fn selector(&self) -> &CascadeSelector<'_> {
        self
    }

    fn select(&mut self, level: Level, name: &str) {
        self.set(level, name);
    }
}

impl Selection for ActivityForm<'_> {
    fn selector(&self) -> &CascadeSelector<'_> {
        ActivityForm::selector(self)
    }

    fn select(&mut self, level: Level, name: &str) {
        ActivityForm::select(self, level, name);
    }
}

/// Applies each given level in order, failing on the first name the
/// catalog does not offer.
///
/// Levels below a given one that are not themselves given are cleared,
/// exactly as selecting in a form would.
pub(super) fn select_levels(target: &mut impl Selection, path: &PathArgs) -> Result<(), String> {
    for (level, name) in path.given() {
        let offered = target.selector().options().get(level).to_vec();
        target.select(level, name);
        if target.selector().path().get(level) != name {
            return Err(unavailable(level, name, &offered));
        }
    }
    Ok(())
}

fn unavailable(level: Level, name: &str, offered: &[String]) -> String {
    if offered.is_empty() {
        format!("no {level} can be chosen here (got '{name}')")
    } else {
        format!(
            "{level} '{name}' is not in the catalog here; choose one of: {}",
            offered.join(", ")
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Browse<'a> {
    path: &'a SelectionPath,
    display: String,
    options: &'a OptionSet,
    next: Option<Level>,
}

pub(super) fn cmd_browse(index: &HierarchyIndex, path: &PathArgs) -> Result<(), String> {
    let mut selector = CascadeSelector::new(index);
    select_levels(&mut selector, path)?;

    let browse = Browse {
        path: selector.path(),
        display: selector.path().display(),
        options: selector.options(),
        next: selector.next_level(),
    };
    let json = serde_json::to_string_pretty(&browse)
        .map_err(|e| format!("failed to serialize selection: {e}"))?;
    println!("{json}");
    Ok(())
}
