//! Domain entities: core data structures

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable unique key of a category, distinct from its position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Locale code to text, e.g. `{"de": "Schuhe", "en": "Shoes"}`.
pub type LocalizedText = BTreeMap<String, String>;

/// Business validity window of a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Local mirror of a remote category.
///
/// `children` is `None` while the level below has not been fetched and
/// `Some(vec![])` once it is known to be empty. `leaf` is only ever true
/// together with `Some(vec![])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: CategoryId,
    pub position: i64,
    pub version: u64,
    #[serde(default)]
    pub localized_name: LocalizedText,
    #[serde(default)]
    pub localized_slug: LocalizedText,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub validity: Validity,
    #[serde(skip)]
    pub children: Option<Vec<CategoryNode>>,
    #[serde(skip)]
    pub leaf: bool,
}

impl CategoryNode {
    /// Bare node with no attributes and unknown children.
    pub fn new(id: impl Into<String>, position: i64, version: u64) -> Self {
        Self {
            id: CategoryId::new(id),
            position,
            version,
            localized_name: LocalizedText::new(),
            localized_slug: LocalizedText::new(),
            published: false,
            validity: Validity::default(),
            children: None,
            leaf: false,
        }
    }

    /// Attach a fetched level of children, deriving the leaf flag from it.
    pub fn with_children(mut self, children: Vec<CategoryNode>) -> Self {
        self.leaf = children.is_empty();
        self.children = Some(children);
        self
    }

    /// Forget the loaded level below this node.
    pub fn unloaded(mut self) -> Self {
        self.children = None;
        self.leaf = false;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.children.is_some()
    }

    /// Loaded children, empty while unknown.
    pub fn loaded_children(&self) -> &[CategoryNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Label for display: requested locale, then any locale, then the id.
    pub fn display_name(&self, locale: &str) -> String {
        self.localized_name
            .get(locale)
            .or_else(|| self.localized_name.values().next())
            .cloned()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Ordered root-level trees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    pub roots: Vec<CategoryNode>,
}

impl Forest {
    pub fn new(roots: Vec<CategoryNode>) -> Self {
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Depth-first iteration over all loaded nodes, parents before children.
    pub fn iter(&self) -> ForestIter<'_> {
        ForestIter::new(self)
    }
}

pub struct ForestIter<'a> {
    stack: Vec<&'a CategoryNode>,
}

impl<'a> ForestIter<'a> {
    fn new(forest: &'a Forest) -> Self {
        Self {
            stack: forest.roots.iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for ForestIter<'a> {
    type Item = &'a CategoryNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push children in reverse order for left-to-right traversal
        for child in node.loaded_children().iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}
