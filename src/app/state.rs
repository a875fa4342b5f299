//! Defines the central, mutable state of the application.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::arguments::{ArgumentMaps, ArgumentSelection, InputRecord, OutputRecord, RecordKey};
use super::presets::{PresetCatalog, PresetSource};
use crate::config::AppConfig;
use crate::core::{
    CoreError, DirectoryEntry, DirectoryScan, DirectoryScanner, FileNode, FilteredTree,
    LookupKey, RuleDiagnostic, RuleSet, TreeBuilder,
};

/// The arguments of one selected file, ready to be turned into a task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArguments {
    pub source: PathBuf,
    pub input: InputRecord,
    pub output: OutputRecord,
}

/// Holds the complete, mutable state of the application.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` to allow for safe, shared access
/// from the command handlers and the scan task.
pub struct AppState {
    /// The application's configuration settings, including the active rule set.
    pub config: AppConfig,
    /// Where the configuration is persisted. `None` uses the platform location.
    pub config_path: Option<PathBuf>,
    /// The directory of the most recent scan request.
    pub current_path: Option<PathBuf>,
    /// Root and raw listing of the last successful scan. Rule changes rebuild from it,
    /// even while a request for another directory is in flight.
    pub scan_result: Option<(PathBuf, DirectoryEntry)>,
    /// The filtered tree. `None` when nothing survived the rules or no scan completed.
    pub tree: Option<FilteredTree>,
    /// Absolute paths of the directories expanded in the UI tree.
    pub expanded_dirs: HashSet<PathBuf>,
    /// Absolute paths of the selected files.
    pub selected_files: HashSet<PathBuf>,
    pub arguments: ArgumentMaps,
    /// `true` while a scan request is in flight.
    pub is_scanning: bool,
    /// Token of the newest scan request. Completions carrying another token are stale.
    pub scan_token: u64,
    /// Message shown to the user after a failed scan.
    pub validation_message: Option<String>,
    /// Problems found while compiling the rules of the last build.
    pub diagnostics: Vec<RuleDiagnostic>,
    pub last_scan_completed: Option<DateTime<Local>>,
    pub presets: Arc<dyn PresetSource>,
    pub scanner: Arc<dyn DirectoryScan>,
}

impl Default for AppState {
    /// Creates a default `AppState` instance, loading the configuration from disk.
    fn default() -> Self {
        Self::new(
            AppConfig::load().unwrap_or_default(),
            Arc::new(PresetCatalog::new()),
            Arc::new(DirectoryScanner),
        )
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        presets: Arc<dyn PresetSource>,
        scanner: Arc<dyn DirectoryScan>,
    ) -> Self {
        Self {
            config,
            config_path: None,
            current_path: None,
            scan_result: None,
            tree: None,
            expanded_dirs: HashSet::new(),
            selected_files: HashSet::new(),
            arguments: ArgumentMaps::default(),
            is_scanning: false,
            scan_token: 0,
            validation_message: None,
            diagnostics: Vec::new(),
            last_scan_completed: None,
            presets,
            scanner,
        }
    }

    /// Registers a new scan request and returns its token.
    ///
    /// Any request still in flight becomes stale.
    pub fn begin_scan(&mut self, path: PathBuf) -> u64 {
        self.scan_token += 1;
        self.is_scanning = true;
        self.validation_message = None;
        self.config.last_directory = Some(path.clone());
        self.current_path = Some(path);
        tracing::info!(
            "Scan #{} requested for {:?}",
            self.scan_token,
            self.current_path
        );
        self.scan_token
    }

    /// Applies the outcome of the scan request identified by `token`.
    ///
    /// Returns `false` when the result is stale and was discarded.
    pub fn complete_scan(
        &mut self,
        token: u64,
        result: Result<DirectoryEntry, CoreError>,
    ) -> bool {
        if token != self.scan_token {
            tracing::debug!(
                "Discarding stale scan #{} (current is #{})",
                token,
                self.scan_token
            );
            return false;
        }

        self.is_scanning = false;
        self.arguments.reset();
        self.selected_files.clear();
        self.expanded_dirs.clear();

        match result {
            Ok(listing) => {
                self.scan_result = self.current_path.clone().map(|root| (root, listing));
                self.expanded_dirs = self.rebuild_tree().into_iter().collect();
                self.last_scan_completed = Some(Local::now());
                tracing::info!(
                    "Scan #{} complete: {} files after filtering",
                    token,
                    self.tree.as_ref().map_or(0, FilteredTree::file_count)
                );
            }
            Err(e) => {
                tracing::error!("Scan #{} failed: {}", token, e);
                self.scan_result = None;
                self.tree = None;
                self.diagnostics.clear();
                self.validation_message = Some(e.to_string());
            }
        }
        true
    }

    /// Replaces the active rule set and rebuilds the tree from the last scan.
    ///
    /// Argument records are kept. Selected files that no longer resolve are
    /// deselected; expanded directories reset to the rebuilt tree's defaults.
    pub fn set_rule_set(&mut self, rules: RuleSet) {
        self.config.rules = rules.normalized();
        if self.scan_result.is_none() {
            return;
        }

        self.expanded_dirs = self.rebuild_tree().into_iter().collect();
        let tree = &self.tree;
        self.selected_files
            .retain(|path| resolves_to_file(tree, path));
        self.seed_selected();
        tracing::info!(
            "Rules updated: {} files visible, {} selected",
            self.tree.as_ref().map_or(0, FilteredTree::file_count),
            self.selected_files.len()
        );
    }

    /// Rebuilds the tree from the stored listing and returns the initially
    /// expanded directories.
    fn rebuild_tree(&mut self) -> Vec<PathBuf> {
        let Some((root, listing)) = &self.scan_result else {
            self.tree = None;
            self.diagnostics.clear();
            return Vec::new();
        };

        let output = TreeBuilder::build(listing, root, &self.config.rules);
        for diagnostic in &output.diagnostics {
            tracing::warn!("Rule diagnostic: {}", diagnostic.message);
        }
        self.tree = output.tree;
        self.diagnostics = output.diagnostics;
        output.initially_expanded
    }

    /// Replaces the selection with the files behind `keys`.
    ///
    /// Keys may name a file by path, input id or output id; the file's absolute
    /// path is stored. Keys that do not resolve to a visible file are ignored.
    pub fn set_selection<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = LookupKey>,
    {
        let Some(tree) = &self.tree else {
            self.selected_files.clear();
            return;
        };
        self.selected_files = keys
            .into_iter()
            .filter_map(|key| {
                let file = tree.lookup(&key);
                if file.is_none() {
                    tracing::debug!("Ignoring selection of unknown key {:?}", key);
                }
                file.map(|file| file.absolute_path.clone())
            })
            .collect();
        self.seed_selected();
    }

    pub fn toggle_selection(&mut self, path: PathBuf) {
        if self.selected_files.remove(&path) {
            return;
        }
        if resolves_to_file(&self.tree, &path) {
            self.selected_files.insert(path);
            self.seed_selected();
        } else {
            tracing::debug!("Ignoring selection of unknown file {:?}", path);
        }
    }

    /// Selects every file below `dir`, or deselects them all if they already are.
    pub fn toggle_directory_selection(&mut self, dir: &Path) {
        let files: Vec<PathBuf> = self
            .tree
            .iter()
            .flat_map(FilteredTree::files)
            .filter(|file| file.absolute_path.starts_with(dir))
            .map(|file| file.absolute_path.clone())
            .collect();

        if files.iter().all(|path| self.selected_files.contains(path)) {
            for path in &files {
                self.selected_files.remove(path);
            }
        } else {
            self.selected_files.extend(files);
            self.seed_selected();
        }
    }

    pub fn select_all(&mut self) {
        self.selected_files = self
            .tree
            .iter()
            .flat_map(FilteredTree::files)
            .map(|file| file.absolute_path.clone())
            .collect();
        self.seed_selected();
    }

    pub fn deselect_all(&mut self) {
        self.selected_files.clear();
    }

    pub fn toggle_expansion(&mut self, path: PathBuf) {
        if !self.expanded_dirs.remove(&path) {
            self.expanded_dirs.insert(path);
        }
    }

    pub fn expand_collapse_all(&mut self, expand: bool) {
        self.expanded_dirs = if expand {
            self.tree
                .iter()
                .flat_map(FilteredTree::iter)
                .filter(|(_, node)| node.is_directory())
                .map(|(_, node)| node.absolute_path().to_path_buf())
                .collect()
        } else {
            HashSet::new()
        };
    }

    /// Resets all state related to a loaded directory.
    ///
    /// A scan still in flight is invalidated.
    pub fn reset_directory_state(&mut self) {
        self.scan_token += 1;
        self.is_scanning = false;
        self.current_path = None;
        self.scan_result = None;
        self.tree = None;
        self.expanded_dirs.clear();
        self.selected_files.clear();
        self.arguments.reset();
        self.validation_message = None;
        self.diagnostics.clear();
        self.last_scan_completed = None;
    }

    /// Selected file nodes in tree order.
    pub fn selected_file_nodes(&self) -> Vec<&FileNode> {
        selected_in(&self.tree, &self.selected_files)
    }

    fn seed_selected(&mut self) {
        let files = selected_in(&self.tree, &self.selected_files);
        self.arguments
            .seed_selected(files.iter().copied(), self.presets.as_ref());
    }

    pub fn set_argument_selection(&mut self, key: RecordKey, selection: ArgumentSelection) -> bool {
        self.arguments
            .set_selection(key, selection, self.presets.as_ref())
    }

    pub fn set_custom_text(&mut self, key: RecordKey, text: String) -> bool {
        self.arguments.set_custom_text(key, text)
    }

    pub fn set_argument_path(&mut self, key: RecordKey, path: Option<String>) -> bool {
        self.arguments.set_path(key, path)
    }

    pub fn apply_to_all_selected(&mut self, key: RecordKey) -> usize {
        let files = selected_in(&self.tree, &self.selected_files);
        self.arguments
            .apply_to_all_selected(key, files, self.presets.as_ref())
    }

    pub fn convert_selection_to_custom_text(&mut self, key: RecordKey) -> bool {
        self.arguments
            .convert_selection_to_custom_text(key, self.presets.as_ref())
    }

    /// The input and output records of every selected file, in tree order.
    pub fn task_arguments(&self) -> Vec<TaskArguments> {
        self.selected_file_nodes()
            .into_iter()
            .filter_map(|file| {
                let input = self.arguments.input.get(&file.input_id)?;
                let output = self.arguments.output.get(&file.output_id)?;
                Some(TaskArguments {
                    source: file.absolute_path.clone(),
                    input: input.clone(),
                    output: output.clone(),
                })
            })
            .collect()
    }
}

fn resolves_to_file(tree: &Option<FilteredTree>, path: &Path) -> bool {
    tree.as_ref()
        .and_then(|tree| tree.lookup(&LookupKey::Path(path.to_path_buf())))
        .is_some()
}

fn selected_in<'a>(
    tree: &'a Option<FilteredTree>,
    selected: &HashSet<PathBuf>,
) -> Vec<&'a FileNode> {
    tree.iter()
        .flat_map(FilteredTree::files)
        .filter(|file| selected.contains(&file.absolute_path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExtensionMode, TextRule};
    use std::path::Path;

    fn listing() -> DirectoryEntry {
        DirectoryEntry::directory(
            "root",
            vec![
                DirectoryEntry::file("a.mp4"),
                DirectoryEntry::file("b.txt"),
                DirectoryEntry::directory("sub", vec![DirectoryEntry::file("c.mp4")]),
            ],
        )
    }

    fn state_with_presets(presets: PresetCatalog) -> AppState {
        AppState::new(
            AppConfig::default(),
            Arc::new(presets),
            Arc::new(DirectoryScanner),
        )
    }

    fn scanned_state() -> AppState {
        let presets = PresetCatalog::new()
            .with_preset("h264", "mp4", "-c:v libx264")
            .with_preset("vp9", "webm", "-c:v libvpx-vp9")
            .with_default_encode("h264");
        let mut state = state_with_presets(presets);
        let token = state.begin_scan(PathBuf::from("/media/root"));
        assert!(state.complete_scan(token, Ok(listing())));
        state
    }

    fn root() -> &'static Path {
        Path::new("/media/root")
    }

    fn mp4_only() -> RuleSet {
        RuleSet {
            extension_mode: ExtensionMode::Whitelist,
            extensions: ["mp4".to_string()].into_iter().collect(),
            ..RuleSet::default()
        }
    }

    #[test]
    fn test_complete_scan_installs_tree_and_expands_directories() {
        let state = scanned_state();
        assert!(!state.is_scanning);
        assert_eq!(state.tree.as_ref().unwrap().file_count(), 3);
        assert!(state.expanded_dirs.contains(root()));
        assert!(state.expanded_dirs.contains(&root().join("sub")));
        assert!(state.last_scan_completed.is_some());
    }

    #[test]
    fn test_stale_scan_result_is_discarded() {
        let mut state = state_with_presets(PresetCatalog::new());
        let first = state.begin_scan(PathBuf::from("/old"));
        let second = state.begin_scan(PathBuf::from("/media/root"));

        assert!(!state.complete_scan(first, Ok(DirectoryEntry::directory("old", vec![]))));
        assert!(state.is_scanning);
        assert!(state.tree.is_none());

        assert!(state.complete_scan(second, Ok(listing())));
        assert!(!state.is_scanning);
        assert_eq!(state.tree.as_ref().unwrap().file_count(), 3);
    }

    #[test]
    fn test_failed_scan_resets_tree_and_sets_message() {
        let mut state = scanned_state();
        state.select_all();
        let token = state.begin_scan(PathBuf::from("/missing"));
        state.complete_scan(
            token,
            Err(CoreError::DirectoryNotFound(PathBuf::from("/missing"))),
        );

        assert!(state.tree.is_none());
        assert!(state.selected_files.is_empty());
        assert!(state.arguments.input.is_empty());
        assert!(state
            .validation_message
            .as_deref()
            .unwrap()
            .contains("/missing"));
    }

    #[test]
    fn test_selection_seeds_records_with_defaults() {
        let mut state = scanned_state();
        let a = root().join("a.mp4");
        state.toggle_selection(a.clone());

        let file = state.selected_file_nodes()[0].clone();
        let input = state.arguments.input.get(&file.input_id).unwrap();
        let output = state.arguments.output.get(&file.output_id).unwrap();
        assert_eq!(input.selection, ArgumentSelection::Auto);
        assert_eq!(
            output.selection,
            ArgumentSelection::FromPreset("h264".into())
        );
    }

    #[test]
    fn test_records_survive_deselection_and_reselection() {
        let mut state = scanned_state();
        let a = root().join("a.mp4");
        state.toggle_selection(a.clone());
        let input_id = state.selected_file_nodes()[0].input_id;
        let key = RecordKey::Input(input_id);
        assert!(state.set_custom_text(key, "-ss 10".to_string()));

        state.toggle_selection(a.clone());
        assert!(state.selected_files.is_empty());
        state.toggle_selection(a);

        assert_eq!(
            state.arguments.input.get(&input_id).unwrap().selection,
            ArgumentSelection::Custom("-ss 10".to_string())
        );
    }

    #[test]
    fn test_unknown_paths_are_not_selected() {
        let mut state = scanned_state();
        state.set_selection([
            LookupKey::Path(root().join("nope.mp4")),
            LookupKey::Path(root().join("sub")),
        ]);
        assert!(state.selected_files.is_empty());
        assert!(state.arguments.input.is_empty());
    }

    #[test]
    fn test_selection_by_input_and_output_id() {
        let mut state = scanned_state();
        let tree = state.tree.as_ref().unwrap();
        let a = tree.lookup(&LookupKey::Path(root().join("a.mp4"))).unwrap().clone();
        let c = tree
            .lookup(&LookupKey::Path(root().join("sub/c.mp4")))
            .unwrap()
            .clone();

        state.set_selection([LookupKey::Input(a.input_id), LookupKey::Output(c.output_id)]);

        assert_eq!(
            state.selected_files,
            [a.absolute_path.clone(), c.absolute_path.clone()]
                .into_iter()
                .collect()
        );
        assert!(state.arguments.input.get(&a.input_id).is_some());
        assert!(state.arguments.output.get(&c.output_id).is_some());
        assert_eq!(state.task_arguments().len(), 2);
    }

    #[test]
    fn test_selection_by_id_from_previous_scan_is_ignored() {
        let mut state = scanned_state();
        let old_a = state
            .tree
            .as_ref()
            .unwrap()
            .lookup(&LookupKey::Path(root().join("a.mp4")))
            .unwrap()
            .clone();
        let token = state.begin_scan(PathBuf::from("/media/root"));
        state.complete_scan(token, Ok(listing()));

        state.set_selection([LookupKey::Input(old_a.input_id)]);
        assert!(state.selected_files.is_empty());
    }

    #[test]
    fn test_rule_change_keeps_records_and_resolvable_selection() {
        let mut state = scanned_state();
        state.select_all();
        let a = state
            .tree
            .as_ref()
            .unwrap()
            .lookup(&LookupKey::Path(root().join("a.mp4")))
            .unwrap()
            .clone();
        state.set_custom_text(RecordKey::Input(a.input_id), "kept".into());

        state.set_rule_set(mp4_only());

        assert_eq!(state.tree.as_ref().unwrap().file_count(), 2);
        assert!(!state.selected_files.contains(&root().join("b.txt")));
        assert!(state.selected_files.contains(&root().join("a.mp4")));
        // Old records are still stored under their old ids.
        assert_eq!(
            state.arguments.input.get(&a.input_id).unwrap().selection,
            ArgumentSelection::Custom("kept".into())
        );
        // The rebuilt tree's ids were seeded for the still selected files.
        assert_eq!(state.task_arguments().len(), 2);
    }

    #[test]
    fn test_rule_change_during_pending_scan_keeps_scanned_root() {
        let mut state = state_with_presets(PresetCatalog::new());
        let token = state.begin_scan(PathBuf::from("/old"));
        let old_listing = DirectoryEntry::directory("old", vec![DirectoryEntry::file("a.mp4")]);
        assert!(state.complete_scan(token, Ok(old_listing)));

        state.begin_scan(PathBuf::from("/new"));
        state.set_rule_set(RuleSet::default());

        let files: Vec<PathBuf> = state
            .tree
            .as_ref()
            .unwrap()
            .files()
            .map(|file| file.absolute_path.clone())
            .collect();
        assert_eq!(files, vec![PathBuf::from("/old/a.mp4")]);
        assert!(state.expanded_dirs.contains(Path::new("/old")));
        assert!(state.is_scanning);
    }

    #[test]
    fn test_rule_change_without_scan_only_stores_rules() {
        let mut state = state_with_presets(PresetCatalog::new());
        let mut rules = mp4_only();
        rules.extensions = [".MP4".to_string()].into_iter().collect();
        state.set_rule_set(rules);

        assert!(state.tree.is_none());
        assert!(state.config.rules.extensions.contains("mp4"));
    }

    #[test]
    fn test_rule_change_resets_expansion_to_rebuilt_tree() {
        let mut state = scanned_state();
        state.expand_collapse_all(false);
        assert!(state.expanded_dirs.is_empty());

        let mut rules = RuleSet::default();
        rules.text_rules = vec![TextRule::blacklist("no-sub", "sub").targets(false, true)];
        state.set_rule_set(rules);

        assert_eq!(
            state.expanded_dirs,
            [root().to_path_buf()].into_iter().collect()
        );
    }

    #[test]
    fn test_toggle_directory_selection() {
        let mut state = scanned_state();
        state.toggle_selection(root().join("sub/c.mp4"));
        state.toggle_directory_selection(root());
        assert_eq!(state.selected_files.len(), 3);

        state.toggle_directory_selection(root());
        assert!(state.selected_files.is_empty());
    }

    #[test]
    fn test_apply_to_all_selected_through_state() {
        let mut state = scanned_state();
        state.select_all();
        let files: Vec<FileNode> = state
            .selected_file_nodes()
            .into_iter()
            .cloned()
            .collect();
        let source = RecordKey::Output(files[0].output_id);
        state.set_argument_path(source, Some("/out/a.mkv".into()));
        state.set_argument_selection(source, ArgumentSelection::FromPreset("vp9".into()));

        assert_eq!(state.apply_to_all_selected(source), 2);
        for task in state.task_arguments() {
            assert_eq!(
                task.output.selection,
                ArgumentSelection::FromPreset("vp9".into())
            );
        }
        let tasks = state.task_arguments();
        assert_eq!(tasks[0].output.path.as_deref(), Some("/out/a.webm"));
        assert!(tasks[1..].iter().all(|t| t.output.path.is_none()));
    }

    #[test]
    fn test_reset_directory_state_invalidates_pending_scan() {
        let mut state = scanned_state();
        let token = state.begin_scan(PathBuf::from("/media/root"));
        state.reset_directory_state();

        assert!(!state.complete_scan(token, Ok(listing())));
        assert!(state.tree.is_none());
        assert!(state.current_path.is_none());
    }
}
