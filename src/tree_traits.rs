/*
Rendering of the mirrored forest as a termtree.

Unloaded branches are shown with a trailing "…", confirmed leaves with "·",
and the current selection with a leading "*".
 */
use termtree::Tree;
use tracing::instrument;

use crate::domain::{CategoryId, CategoryNode, Forest};

/// Label and selection context for rendering.
pub struct RenderOptions<'a> {
    pub locale: &'a str,
    pub selected: Option<&'a CategoryId>,
}

pub trait TreeNodeConvert {
    fn to_tree_string(&self, options: &RenderOptions<'_>) -> Tree<String>;
}

fn label(node: &CategoryNode, options: &RenderOptions<'_>) -> String {
    let marker = if options.selected == Some(&node.id) { "* " } else { "" };
    let state = match (&node.children, node.leaf) {
        (None, _) => " …",
        (Some(_), true) => " ·",
        (Some(_), false) => "",
    };
    format!(
        "{marker}{} [{}] pos={} v={}{state}",
        node.display_name(options.locale),
        node.id,
        node.position,
        node.version
    )
}

impl TreeNodeConvert for CategoryNode {
    #[instrument(level = "trace", skip(self, options), fields(id = %self.id))]
    fn to_tree_string(&self, options: &RenderOptions<'_>) -> Tree<String> {
        let leaves: Vec<_> = self
            .loaded_children()
            .iter()
            .map(|c| c.to_tree_string(options))
            .collect();

        Tree::new(label(self, options)).with_leaves(leaves)
    }
}

impl TreeNodeConvert for Forest {
    fn to_tree_string(&self, options: &RenderOptions<'_>) -> Tree<String> {
        if self.is_empty() {
            return Tree::new("Empty forest".to_string());
        }
        let leaves: Vec<_> = self
            .roots
            .iter()
            .map(|root| root.to_tree_string(options))
            .collect();
        Tree::new("categories".to_string()).with_leaves(leaves)
    }
}
