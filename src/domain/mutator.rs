//! Pure structural operations on a forest.
//!
//! Nothing here mutates its input: every edit returns a new `Forest`, so an
//! address computed against the previous snapshot stays valid for that snapshot.

use itertools::Itertools;
use tracing::{instrument, trace};

use crate::domain::{CategoryId, CategoryNode, DomainError, DomainResult, Forest, NodeAddress};

/// Depth-first search over all loaded levels. Never triggers loading.
pub fn find_by_key<'f>(forest: &'f Forest, key: &CategoryId) -> Option<&'f CategoryNode> {
    find_in(&forest.roots, key)
}

fn find_in<'f>(nodes: &'f [CategoryNode], key: &CategoryId) -> Option<&'f CategoryNode> {
    for node in nodes {
        if &node.id == key {
            return Some(node);
        }
        if let Some(found) = find_in(node.loaded_children(), key) {
            return Some(found);
        }
    }
    None
}

/// Address of a loaded node in this snapshot.
pub fn address_of(forest: &Forest, key: &CategoryId) -> Option<NodeAddress> {
    let mut path = Vec::new();
    if path_in(&forest.roots, key, &mut path) {
        let (root, rest) = path.split_first()?;
        Some(NodeAddress::encode(*root, rest))
    } else {
        None
    }
}

fn path_in(nodes: &[CategoryNode], key: &CategoryId, path: &mut Vec<usize>) -> bool {
    for (i, node) in nodes.iter().enumerate() {
        path.push(i);
        if &node.id == key || path_in(node.loaded_children(), key, path) {
            return true;
        }
        path.pop();
    }
    false
}

/// Substitute the first node whose key matches `replacement.id`.
///
/// Returns the new forest and whether a match was replaced. No match is a
/// silent no-op returning an unchanged copy (last write wins for expansions
/// racing on different branches). The replacement keeps the index of the node
/// it replaces.
#[instrument(level = "trace", skip(forest, replacement), fields(key = %replacement.id))]
pub fn replace_by_key(forest: &Forest, replacement: CategoryNode) -> (Forest, bool) {
    let mut next = forest.clone();
    let replaced = replace_in(&mut next.roots, replacement);
    trace!(replaced, "replace_by_key");
    (next, replaced)
}

fn replace_in(nodes: &mut [CategoryNode], replacement: CategoryNode) -> bool {
    let mut pending = Some(replacement);
    replace_in_opt(nodes, &mut pending)
}

fn replace_in_opt(nodes: &mut [CategoryNode], pending: &mut Option<CategoryNode>) -> bool {
    for node in nodes.iter_mut() {
        let matches = pending.as_ref().is_some_and(|r| r.id == node.id);
        if matches {
            if let Some(replacement) = pending.take() {
                *node = replacement;
            }
            return true;
        }
        if let Some(children) = node.children.as_mut() {
            if replace_in_opt(children, pending) {
                return true;
            }
        }
    }
    false
}

/// Key of the first leaf below (or at) `node`, children visited in order.
pub fn find_first_leaf(node: &CategoryNode) -> Option<&CategoryId> {
    if node.leaf {
        return Some(&node.id);
    }
    node.loaded_children().iter().find_map(find_first_leaf)
}

/// Default selection: first leaf of the first root only.
pub fn first_leaf_in_forest(forest: &Forest) -> Option<&CategoryId> {
    forest.roots.first().and_then(find_first_leaf)
}

/// Stable ascending sort by `position`.
pub fn sort_by_position(nodes: Vec<CategoryNode>) -> Vec<CategoryNode> {
    nodes
        .into_iter()
        .sorted_by_key(|node| node.position)
        .collect()
}

/// Commit two confirmed siblings to the current forest.
///
/// The sibling list is re-located by parent key (`None` = root list) rather
/// than by address, since the forest may have changed since the address was
/// computed. Both copies replace their namesakes, and the two slots are
/// exchanged only while their order still disagrees with the confirmed
/// positions. A list refetched after the remote writes already arrives in
/// confirmed order and is left in place.
#[instrument(level = "debug", skip(forest, first, second), fields(first = %first.id, second = %second.id))]
pub fn swap_siblings(
    forest: &Forest,
    parent_key: Option<&CategoryId>,
    first: CategoryNode,
    second: CategoryNode,
) -> DomainResult<Forest> {
    let mut next = forest.clone();
    let siblings: &mut Vec<CategoryNode> = match parent_key {
        None => &mut next.roots,
        Some(key) => find_mut(&mut next.roots, key)
            .and_then(|parent| parent.children.as_mut())
            .ok_or_else(|| DomainError::NodeNotFound(key.clone()))?,
    };

    let first_index = index_of(siblings, &first.id)?;
    let second_index = index_of(siblings, &second.id)?;
    let exchange = first.position != second.position
        && (first_index < second_index) != (first.position < second.position);

    if exchange {
        siblings[second_index] = first;
        siblings[first_index] = second;
    } else {
        trace!("{} and {} already in confirmed order", first.id, second.id);
        siblings[first_index] = first;
        siblings[second_index] = second;
    }
    Ok(next)
}

fn index_of(siblings: &[CategoryNode], key: &CategoryId) -> DomainResult<usize> {
    siblings
        .iter()
        .position(|node| &node.id == key)
        .ok_or_else(|| DomainError::NodeNotFound(key.clone()))
}

fn find_mut<'f>(nodes: &'f mut [CategoryNode], key: &CategoryId) -> Option<&'f mut CategoryNode> {
    for node in nodes.iter_mut() {
        if &node.id == key {
            return Some(node);
        }
        if let Some(children) = node.children.as_mut() {
            if let Some(found) = find_mut(children, key) {
                return Some(found);
            }
        }
    }
    None
}
