//! Responsible for transforming the `AppState` into a `UiState` view model.
//!
//! This module acts as a presentation layer: it turns the arena tree into a
//! nested, serializable structure and computes the display-related properties.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use super::arguments::{InputRecord, OutputRecord};
use super::state::AppState;
use crate::core::{FilteredTree, InputId, NodeId, OutputId, RuleDiagnostic, RuleSet, TreeNode};

/// A serializable representation of the application state for the UI.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub current_path: Option<PathBuf>,
    pub rules: RuleSet,
    /// The root directory of the filtered tree, absent when nothing survived.
    pub tree: Option<UiTreeNode>,
    pub total_files: usize,
    pub selected_files_count: usize,
    pub is_scanning: bool,
    pub status_message: String,
    pub validation_message: Option<String>,
    pub diagnostics: Vec<RuleDiagnostic>,
    pub input_records: Vec<InputRecord>,
    pub output_records: Vec<OutputRecord>,
    pub last_scan_completed: Option<String>,
}

/// A serializable representation of a single node in the file tree for the UI.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UiTreeNode {
    pub name: String,
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub is_directory: bool,
    pub extension: Option<String>,
    pub input_id: Option<InputId>,
    pub output_id: Option<OutputId>,
    pub children: Vec<UiTreeNode>,
    /// `"none"`, `"partial"` or `"full"`. Files are either `"none"` or `"full"`.
    pub selection_state: String,
    pub is_expanded: bool,
}

/// Creates the complete `UiState` from the current `AppState`.
pub fn generate_ui_state(state: &AppState) -> UiState {
    let tree = if state.is_scanning {
        None
    } else {
        state
            .tree
            .as_ref()
            .map(|tree| build_tree_nodes(tree, &state.selected_files, &state.expanded_dirs))
    };

    let total_files = state.tree.as_ref().map_or(0, FilteredTree::file_count);
    let status_message = if state.is_scanning {
        "Scanning...".to_string()
    } else if let Some(message) = &state.validation_message {
        format!("Scan failed: {message}")
    } else if state.current_path.is_none() {
        "Ready.".to_string()
    } else if state.tree.is_none() {
        "No files match the current rules.".to_string()
    } else {
        format!(
            "{} files shown, {} selected.",
            total_files,
            state.selected_files.len()
        )
    };

    let mut input_records: Vec<InputRecord> = state.arguments.input.records().cloned().collect();
    input_records.sort_by_key(|record| record.owner_id);
    let mut output_records: Vec<OutputRecord> =
        state.arguments.output.records().cloned().collect();
    output_records.sort_by_key(|record| record.owner_id);

    UiState {
        current_path: state.current_path.clone(),
        rules: state.config.rules.clone(),
        tree,
        total_files,
        selected_files_count: state.selected_files.len(),
        is_scanning: state.is_scanning,
        status_message,
        validation_message: state.validation_message.clone(),
        diagnostics: state.diagnostics.clone(),
        input_records,
        output_records,
        last_scan_completed: state
            .last_scan_completed
            .as_ref()
            .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

/// Builds the nested view of the tree bottom-up with an explicit stack.
fn build_tree_nodes(
    tree: &FilteredTree,
    selected: &HashSet<PathBuf>,
    expanded: &HashSet<PathBuf>,
) -> UiTreeNode {
    // Finished nodes with their (selected files, total files) counts.
    let mut built: HashMap<NodeId, (UiTreeNode, usize, usize)> = HashMap::new();
    let mut stack: Vec<(NodeId, bool)> = vec![(tree.root(), false)];

    while let Some((id, children_done)) = stack.pop() {
        let Some(node) = tree.get(id) else {
            continue;
        };

        match node {
            TreeNode::File(file) => {
                let is_selected = selected.contains(&file.absolute_path);
                let ui_node = UiTreeNode {
                    name: file.name.clone(),
                    path: file.absolute_path.clone(),
                    relative_path: file.relative_path.clone(),
                    is_directory: false,
                    extension: file.extension.clone(),
                    input_id: Some(file.input_id),
                    output_id: Some(file.output_id),
                    children: Vec::new(),
                    selection_state: selection_state(usize::from(is_selected), 1),
                    is_expanded: false,
                };
                built.insert(id, (ui_node, usize::from(is_selected), 1));
            }
            TreeNode::Directory(dir) if !children_done => {
                stack.push((id, true));
                stack.extend(dir.children.iter().rev().map(|child| (*child, false)));
            }
            TreeNode::Directory(dir) => {
                let mut children = Vec::with_capacity(dir.children.len());
                let (mut selected_count, mut file_count) = (0, 0);
                for child in &dir.children {
                    if let Some((child_node, s, f)) = built.remove(child) {
                        selected_count += s;
                        file_count += f;
                        children.push(child_node);
                    }
                }
                let ui_node = UiTreeNode {
                    name: dir.name.clone(),
                    path: dir.absolute_path.clone(),
                    relative_path: dir.relative_path.clone(),
                    is_directory: true,
                    extension: None,
                    input_id: None,
                    output_id: None,
                    children,
                    selection_state: selection_state(selected_count, file_count),
                    is_expanded: expanded.contains(&dir.absolute_path),
                };
                built.insert(id, (ui_node, selected_count, file_count));
            }
        }
    }

    built
        .remove(&tree.root())
        .map(|(node, _, _)| node)
        .unwrap_or_else(|| UiTreeNode {
            name: String::new(),
            path: PathBuf::new(),
            relative_path: PathBuf::new(),
            is_directory: true,
            extension: None,
            input_id: None,
            output_id: None,
            children: Vec::new(),
            selection_state: "none".to_string(),
            is_expanded: false,
        })
}

fn selection_state(selected: usize, total: usize) -> String {
    if selected == 0 {
        "none".to_string()
    } else if selected == total {
        "full".to_string()
    } else {
        "partial".to_string()
    }
}
