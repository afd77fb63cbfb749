//! Positional addressing of nodes inside a forest snapshot.
//!
//! An address is the path of sibling indices from a root down to a node:
//! `[root, child, grandchild, ...]`. It replaces parent pointers, and is only
//! meaningful against the snapshot it was computed from.

use std::fmt;
use std::str::FromStr;

use tracing::instrument;

use crate::domain::{CategoryId, CategoryNode, DomainError, DomainResult, Forest};

/// Path of sibling indices locating one node. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    segments: Vec<usize>,
}

impl NodeAddress {
    pub fn encode(root_index: usize, child_path: &[usize]) -> Self {
        let mut segments = Vec::with_capacity(child_path.len() + 1);
        segments.push(root_index);
        segments.extend_from_slice(child_path);
        Self { segments }
    }

    /// Split into the root index and the remaining child path.
    pub fn decode(&self) -> (usize, &[usize]) {
        (self.segments[0], &self.segments[1..])
    }

    pub fn is_root_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// Index of the addressed node among its siblings.
    pub fn index(&self) -> usize {
        self.segments[self.segments.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[usize] {
        &self.segments
    }

    /// Address of the sibling at `index` under the same parent.
    pub fn sibling(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        let last = segments.len() - 1;
        segments[last] = index;
        Self { segments }
    }

    /// Address of the `index`-th child of the addressed node.
    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(index);
        Self { segments }
    }

    fn not_found(&self) -> DomainError {
        DomainError::AddressNotFound {
            address: self.to_string(),
        }
    }

    /// Walk every segment but the last and return the container holding the
    /// addressed node. Root-level addresses yield the synthetic forest root.
    #[instrument(level = "trace", skip(forest))]
    pub fn resolve_parent<'f>(&self, forest: &'f Forest) -> DomainResult<ParentRef<'f>> {
        let (root_index, rest) = self.decode();
        if rest.is_empty() {
            return Ok(ParentRef::ForestRoot(forest));
        }

        let mut node = forest.roots.get(root_index).ok_or_else(|| self.not_found())?;
        for &segment in &rest[..rest.len() - 1] {
            node = node
                .children
                .as_ref()
                .and_then(|children| children.get(segment))
                .ok_or_else(|| self.not_found())?;
        }
        if node.children.is_none() {
            return Err(self.not_found());
        }
        Ok(ParentRef::Node(node))
    }

    /// Resolve the addressed node itself.
    pub fn resolve<'f>(&self, forest: &'f Forest) -> DomainResult<&'f CategoryNode> {
        self.resolve_parent(forest)?
            .children()
            .get(self.index())
            .ok_or_else(|| self.not_found())
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str("-")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for NodeAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidAddress(s.to_string()));
        }
        let segments = trimmed
            .split('-')
            .map(|part| part.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DomainError::InvalidAddress(s.to_string()))?;
        Ok(Self { segments })
    }
}

/// Container of a sibling list: either the forest itself or a loaded node.
#[derive(Debug, Clone, Copy)]
pub enum ParentRef<'f> {
    ForestRoot(&'f Forest),
    Node(&'f CategoryNode),
}

impl<'f> ParentRef<'f> {
    pub fn children(&self) -> &'f [CategoryNode] {
        match self {
            ParentRef::ForestRoot(forest) => &forest.roots,
            ParentRef::Node(node) => node.loaded_children(),
        }
    }

    /// Key of the parent node, `None` for the forest root.
    pub fn key(&self) -> Option<&'f CategoryId> {
        match self {
            ParentRef::ForestRoot(_) => None,
            ParentRef::Node(node) => Some(&node.id),
        }
    }
}
