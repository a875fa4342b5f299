//! Builds the filtered, pruned tree from a raw directory listing.
//!
//! Nodes live in an arena and refer to each other through [`NodeId`] handles:
//! a directory owns the ordered handles of its children, every node stores the
//! handle of its parent for upward lookups. Pruning a directory clears its
//! arena slot and removes its handle from the parent.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::registry::{IdentityRegistry, InputId, LookupKey, OutputId};
use super::rules::{CompiledRules, RuleDiagnostic, RuleSet};
use super::{DirectoryEntry, EntryKind};

/// Handle of a node inside a [`FilteredTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryNode {
    pub name: String,
    pub absolute_path: PathBuf,
    pub relative_path: PathBuf,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct FileNode {
    pub name: String,
    pub absolute_path: PathBuf,
    pub relative_path: PathBuf,
    pub extension: Option<String>,
    pub input_id: InputId,
    pub output_id: OutputId,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum TreeNode {
    Directory(DirectoryNode),
    File(FileNode),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Directory(dir) => &dir.name,
            TreeNode::File(file) => &file.name,
        }
    }

    pub fn absolute_path(&self) -> &Path {
        match self {
            TreeNode::Directory(dir) => &dir.absolute_path,
            TreeNode::File(file) => &file.absolute_path,
        }
    }

    pub fn relative_path(&self) -> &Path {
        match self {
            TreeNode::Directory(dir) => &dir.relative_path,
            TreeNode::File(file) => &file.relative_path,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            TreeNode::Directory(dir) => dir.parent,
            TreeNode::File(file) => file.parent,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, TreeNode::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            TreeNode::File(file) => Some(file),
            TreeNode::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            TreeNode::Directory(dir) => Some(dir),
            TreeNode::File(_) => None,
        }
    }
}

/// A non-empty filtered tree together with the registry of its files.
#[derive(Debug, Clone)]
pub struct FilteredTree {
    nodes: Vec<Option<TreeNode>>,
    root: NodeId,
    registry: IdentityRegistry,
}

impl FilteredTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Children of a directory, empty for files and unknown handles.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.get(id) {
            Some(TreeNode::Directory(dir)) => &dir.children,
            _ => &[],
        }
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Resolves a path or role identity to its file node.
    pub fn lookup(&self, key: &LookupKey) -> Option<&FileNode> {
        self.registry
            .lookup(key)
            .and_then(|id| self.get(id))
            .and_then(TreeNode::as_file)
    }

    /// Iterates the live nodes in depth-first pre-order, children in scan order.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Iterates the file nodes in tree order.
    pub fn files(&self) -> impl Iterator<Item = &FileNode> {
        self.iter().filter_map(|(_, node)| node.as_file())
    }

    pub fn file_count(&self) -> usize {
        self.registry.len()
    }
}

pub struct PreOrder<'a> {
    tree: &'a FilteredTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (NodeId, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.tree.get(id) {
                self.stack.extend(self.tree.children(id).iter().rev());
                return Some((id, node));
            }
        }
        None
    }
}

/// Result of one tree build.
#[derive(Debug)]
pub struct BuildOutput {
    /// `None` when no file survived the rules.
    pub tree: Option<FilteredTree>,
    /// Absolute paths of every surviving directory, root included, in tree order.
    pub initially_expanded: Vec<PathBuf>,
    pub diagnostics: Vec<RuleDiagnostic>,
}

struct Frame<'a> {
    entry: &'a DirectoryEntry,
    node: NodeId,
    next_child: usize,
}

/// A utility struct for building filtered trees.
///
/// This struct is stateless and provides methods as associated functions.
pub struct TreeBuilder;

impl TreeBuilder {
    pub fn build(root: &DirectoryEntry, input_root: &Path, rules: &RuleSet) -> BuildOutput {
        let compiled = CompiledRules::compile(rules);
        let (tree, pruned) = Self::build_nodes(root, input_root, &compiled);

        let initially_expanded = tree
            .as_ref()
            .map(|tree| {
                tree.iter()
                    .filter(|(_, node)| node.is_directory())
                    .map(|(_, node)| node.absolute_path().to_path_buf())
                    .collect()
            })
            .unwrap_or_default();

        tracing::debug!(
            "Built tree for {}: {} files, {} empty directories pruned",
            input_root.display(),
            tree.as_ref().map_or(0, FilteredTree::file_count),
            pruned
        );

        BuildOutput {
            tree,
            initially_expanded,
            diagnostics: compiled.diagnostics().to_vec(),
        }
    }

    /// Walks the listing with an explicit stack and prunes empty directories
    /// as soon as their last child has been processed.
    fn build_nodes(
        root: &DirectoryEntry,
        input_root: &Path,
        rules: &CompiledRules,
    ) -> (Option<FilteredTree>, usize) {
        let mut nodes: Vec<Option<TreeNode>> = Vec::new();
        let mut registry = IdentityRegistry::default();
        let mut pruned = 0;

        nodes.push(Some(TreeNode::Directory(DirectoryNode {
            name: root.name.clone(),
            absolute_path: input_root.to_path_buf(),
            relative_path: PathBuf::new(),
            children: Vec::new(),
            parent: None,
        })));
        let root_id = NodeId(0);

        let mut stack = vec![Frame {
            entry: root,
            node: root_id,
            next_child: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let entry = frame.entry;
            let parent_id = frame.node;

            if let Some(child) = entry.children.get(frame.next_child) {
                frame.next_child += 1;
                if rules.should_drop(child) {
                    continue;
                }

                let relative_path = match nodes[parent_id.0].as_ref() {
                    Some(parent) => parent.relative_path().join(&child.name),
                    None => PathBuf::from(&child.name),
                };
                let absolute_path = input_root.join(&relative_path);
                let id = NodeId(nodes.len());

                let node = match child.kind {
                    EntryKind::Directory => {
                        stack.push(Frame {
                            entry: child,
                            node: id,
                            next_child: 0,
                        });
                        TreeNode::Directory(DirectoryNode {
                            name: child.name.clone(),
                            absolute_path,
                            relative_path,
                            children: Vec::new(),
                            parent: Some(parent_id),
                        })
                    }
                    EntryKind::File => {
                        let input_id = InputId::allocate();
                        let output_id = OutputId::allocate();
                        registry.register(id, absolute_path.clone(), input_id, output_id);
                        TreeNode::File(FileNode {
                            name: child.name.clone(),
                            absolute_path,
                            relative_path,
                            extension: child.extension.clone(),
                            input_id,
                            output_id,
                            parent: Some(parent_id),
                        })
                    }
                };
                nodes.push(Some(node));
                if let Some(TreeNode::Directory(parent)) = nodes[parent_id.0].as_mut() {
                    parent.children.push(id);
                }
                continue;
            }

            // All children processed: drop the directory if nothing survived below it.
            stack.pop();
            let (is_empty, parent) = match nodes[parent_id.0].as_ref() {
                Some(TreeNode::Directory(dir)) => (dir.children.is_empty(), dir.parent),
                _ => (false, None),
            };
            if !is_empty {
                continue;
            }
            match parent {
                Some(grandparent) => {
                    nodes[parent_id.0] = None;
                    pruned += 1;
                    if let Some(TreeNode::Directory(dir)) = nodes[grandparent.0].as_mut() {
                        dir.children.retain(|child| *child != parent_id);
                    }
                }
                None => return (None, pruned),
            }
        }

        let tree = FilteredTree {
            nodes,
            root: root_id,
            registry,
        };
        (Some(tree), pruned)
    }
}
