//! Equipment hierarchy: a read-only index over the equipment catalog.
//!
//! The catalog is an irregular tree. Nominally it runs
//! area → machine → element → component, but any node may end early as a
//! flat list of names, and depth is never fixed. Whether a node is a branch
//! or a leaf list is decided by inspecting the node at lookup time.
//!
//! Catalog files are JSON:
//!
//! ```json
//! {
//!   "Press Shop": {
//!     "Press-01": ["Motor", "Belt"],
//!     "Press-02": { "Hydraulics": ["Pump", "Valve"] }
//!   }
//! }
//! ```
//!
//! Entry order and duplicate names are kept exactly as written. Lookups
//! take the first matching name.

use std::{fmt, fs, io, path::Path};

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, SeqAccess, Visitor},
};

/// Errors loading an equipment catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A node in the equipment hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Named children, in catalog order. Names may repeat.
    Branch(Vec<(String, Node)>),

    /// Terminal names. Nothing nests below these.
    Leaf(Vec<String>),
}

impl Node {
    /// Names directly under this node, in catalog order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::Branch(children) => children.iter().map(|(name, _)| name.clone()).collect(),
            Self::Leaf(names) => names.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

/// Builds nodes straight from the map/sequence stream so that order and
/// duplicate keys survive.
struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of named children or an array of names")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut children = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((name, node)) = map.next_entry::<String, Node>()? {
            children.push((name, node));
        }
        Ok(Node::Branch(children))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut names = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(name) = seq.next_element::<String>()? {
            names.push(name);
        }
        Ok(Node::Leaf(names))
    }
}

/// Result of walking a partial path.
enum Lookup<'a> {
    /// The path ends on a node.
    Node(&'a Node),

    /// The path ends on a name inside a leaf list.
    Terminal,

    /// Some segment is not listed under its parent.
    Missing,
}

/// Read-only view over the equipment catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyIndex {
    root: Node,
}

impl HierarchyIndex {
    /// Wraps a root node. The root's children are the areas.
    #[must_use]
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// Parses a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] if the text is not a tree of objects
    /// and string arrays.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Loads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let index = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), areas = index.children_of(&[]).len(), "loaded catalog");
        Ok(index)
    }

    /// Valid next-level names under `path`.
    ///
    /// Empty if the path does not resolve or ends on a terminal name.
    /// Absent data is not an error, just no further options.
    #[must_use]
    pub fn children_of(&self, path: &[&str]) -> Vec<String> {
        match self.lookup(path) {
            Lookup::Node(node) => node.names(),
            Lookup::Terminal | Lookup::Missing => Vec::new(),
        }
    }

    /// True if the node at `path` is a leaf list, so its children are final.
    #[must_use]
    pub fn is_leaf_level(&self, path: &[&str]) -> bool {
        matches!(self.lookup(path), Lookup::Node(Node::Leaf(_)))
    }

    /// True if every segment of `path` is listed under its parent.
    #[must_use]
    pub fn contains(&self, path: &[&str]) -> bool {
        !matches!(self.lookup(path), Lookup::Missing)
    }

    fn lookup(&self, path: &[&str]) -> Lookup<'_> {
        let mut current = Lookup::Node(&self.root);
        for segment in path {
            current = match current {
                Lookup::Node(Node::Branch(children)) => children
                    .iter()
                    .find(|(name, _)| name == segment)
                    .map_or(Lookup::Missing, |(_, node)| Lookup::Node(node)),
                Lookup::Node(Node::Leaf(names)) => {
                    if names.iter().any(|name| name == segment) {
                        Lookup::Terminal
                    } else {
                        Lookup::Missing
                    }
                }
                Lookup::Terminal | Lookup::Missing => Lookup::Missing,
            };
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn catalog() -> HierarchyIndex {
        HierarchyIndex::from_json(
            r#"{
                "Press Shop": {
                    "Press-01": ["Motor", "Belt"],
                    "Press-02": {
                        "Hydraulics": ["Pump", "Valve"],
                        "Frame": {}
                    }
                },
                "Paint": {}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn areas_in_catalog_order() {
        assert_eq!(catalog().children_of(&[]), vec!["Press Shop", "Paint"]);
    }

    #[test]
    fn machine_holding_flat_element_list() {
        let index = catalog();
        assert_eq!(
            index.children_of(&["Press Shop", "Press-01"]),
            vec!["Motor", "Belt"]
        );
        assert!(index.is_leaf_level(&["Press Shop", "Press-01"]));
        assert!(index.children_of(&["Press Shop", "Press-01", "Motor"]).is_empty());
    }

    #[test]
    fn machine_with_nested_elements() {
        let index = catalog();
        assert_eq!(
            index.children_of(&["Press Shop", "Press-02"]),
            vec!["Hydraulics", "Frame"]
        );
        assert!(!index.is_leaf_level(&["Press Shop", "Press-02"]));
        assert_eq!(
            index.children_of(&["Press Shop", "Press-02", "Hydraulics"]),
            vec!["Pump", "Valve"]
        );
    }

    #[test]
    fn unresolved_path_yields_no_children() {
        let index = catalog();
        assert!(index.children_of(&["Nowhere"]).is_empty());
        assert!(index.children_of(&["Press Shop", "Press-99"]).is_empty());
        assert!(
            index
                .children_of(&["Press Shop", "Press-01", "Motor", "Coil"])
                .is_empty()
        );
        assert!(!index.is_leaf_level(&["Nowhere"]));
    }

    #[test]
    fn contains_follows_terminal_names() {
        let index = catalog();
        assert!(index.contains(&["Press Shop", "Press-01", "Motor"]));
        assert!(!index.contains(&["Press Shop", "Press-01", "Gear"]));
        assert!(!index.contains(&["Press Shop", "Press-01", "Motor", "Coil"]));
    }

    #[test]
    fn duplicates_kept_and_first_match_wins() {
        let index = HierarchyIndex::from_json(
            r#"{
                "Line": { "M1": ["first"] },
                "Line": { "M2": ["second"] },
                "": ["orphan"]
            }"#,
        )
        .unwrap();

        assert_eq!(index.children_of(&[]), vec!["Line", "Line", ""]);
        assert_eq!(index.children_of(&["Line"]), vec!["M1"]);
        assert_eq!(index.children_of(&[""]), vec!["orphan"]);
    }

    #[test]
    fn root_may_be_a_leaf_list() {
        let index = HierarchyIndex::from_json(r#"["Yard", "Dock"]"#).unwrap();
        assert!(index.is_leaf_level(&[]));
        assert_eq!(index.children_of(&[]), vec!["Yard", "Dock"]);
        assert!(index.children_of(&["Yard"]).is_empty());
    }

    #[test]
    fn rejects_scalar_nodes() {
        let err = HierarchyIndex::from_json(r#"{ "Area": 42 }"#).unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, r#"{ "Press Shop": { "Press-01": ["Motor"] } }"#).unwrap();

        let index = HierarchyIndex::load(&path).unwrap();
        assert_eq!(index.children_of(&["Press Shop"]), vec!["Press-01"]);
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = HierarchyIndex::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }
}
