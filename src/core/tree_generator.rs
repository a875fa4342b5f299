//! Generates an ASCII representation of a filtered tree.

use super::tree::{FilteredTree, NodeId};

/// A utility struct for generating an ASCII directory tree.
///
/// This struct is stateless and provides methods as associated functions.
pub struct TreeGenerator;

impl TreeGenerator {
    /// Renders the tree in scan order, one node per line.
    pub fn generate_tree(tree: &FilteredTree) -> String {
        let mut result = String::new();
        let root_name = tree
            .get(tree.root())
            .map(|node| node.name().to_string())
            .unwrap_or_default();
        result.push_str(&format!("{root_name}/\n"));

        // (node, prefix of its line, is last child)
        let mut stack: Vec<(NodeId, String, bool)> = Vec::new();
        Self::push_children(tree, tree.root(), "", &mut stack);

        while let Some((id, prefix, is_last)) = stack.pop() {
            let Some(node) = tree.get(id) else {
                continue;
            };

            let connector = if is_last { "└── " } else { "├── " };
            let icon = if node.is_directory() { "📁 " } else { "📄 " };
            result.push_str(&format!("{prefix}{connector}{icon}{}\n", node.name()));

            if node.is_directory() {
                let child_prefix = if is_last {
                    format!("{prefix}    ")
                } else {
                    format!("{prefix}│   ")
                };
                Self::push_children(tree, id, &child_prefix, &mut stack);
            }
        }

        result
    }

    /// Pushes children in reverse so they pop in scan order.
    fn push_children(
        tree: &FilteredTree,
        id: NodeId,
        prefix: &str,
        stack: &mut Vec<(NodeId, String, bool)>,
    ) {
        let children = tree.children(id);
        for (i, child) in children.iter().enumerate().rev() {
            stack.push((*child, prefix.to_string(), i + 1 == children.len()));
        }
    }
}
