//! Per-file editable argument records for the input and output roles.
//!
//! Records are created the first time their file is selected and are never
//! removed by deselection or by rebuilding the tree, so edits survive both.
//! Only a new scan clears them (see `AppState::complete_scan`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::Path;

use super::presets::{PresetId, PresetSource};
use crate::core::{FileNode, InputId, OutputId};

/// Which arguments a record contributes to its task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ArgumentSelection {
    #[default]
    Auto,
    Custom(String),
    FromPreset(PresetId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentRecord<Id> {
    pub owner_id: Id,
    pub selection: ArgumentSelection,
    pub path: Option<String>,
}

pub type InputRecord = ArgumentRecord<InputId>;
pub type OutputRecord = ArgumentRecord<OutputId>;

/// Behaviour that differs between the input and the output role.
pub trait RoleId: Copy + Eq + Hash + fmt::Display {
    /// Whether choosing a preset rewrites the extension of the record's path.
    const SUBSTITUTES_EXTENSION: bool;

    fn default_preset(presets: &dyn PresetSource) -> Option<PresetId>;
}

impl RoleId for InputId {
    const SUBSTITUTES_EXTENSION: bool = false;

    fn default_preset(presets: &dyn PresetSource) -> Option<PresetId> {
        presets.default_decode_preset()
    }
}

impl RoleId for OutputId {
    const SUBSTITUTES_EXTENSION: bool = true;

    fn default_preset(presets: &dyn PresetSource) -> Option<PresetId> {
        presets.default_encode_preset()
    }
}

/// Replaces (or adds) the extension of `path`.
pub fn substitute_extension(path: &str, extension: &str) -> String {
    Path::new(path)
        .with_extension(extension.trim_start_matches('.'))
        .to_string_lossy()
        .to_string()
}

/// The records of one role, keyed by that role's file identity.
#[derive(Debug, Clone)]
pub struct ArgumentMap<Id> {
    records: HashMap<Id, ArgumentRecord<Id>>,
}

impl<Id> Default for ArgumentMap<Id> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<Id: RoleId> ArgumentMap<Id> {
    pub fn get(&self, id: &Id) -> Option<&ArgumentRecord<Id>> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ArgumentRecord<Id>> {
        self.records.values()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Creates a record for every id that has none yet, seeded with the
    /// role's default preset (or `Auto`). Returns how many were created.
    pub fn seed<I>(&mut self, ids: I, presets: &dyn PresetSource) -> usize
    where
        I: IntoIterator<Item = Id>,
    {
        let mut default_selection = None;
        let mut created = 0;
        for id in ids {
            if self.records.contains_key(&id) {
                continue;
            }
            let selection = default_selection
                .get_or_insert_with(|| {
                    Id::default_preset(presets)
                        .map(ArgumentSelection::FromPreset)
                        .unwrap_or_default()
                })
                .clone();
            self.records.insert(
                id,
                ArgumentRecord {
                    owner_id: id,
                    selection,
                    path: None,
                },
            );
            created += 1;
        }
        created
    }

    pub fn set_selection(
        &mut self,
        id: &Id,
        selection: ArgumentSelection,
        presets: &dyn PresetSource,
    ) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                Self::assign(record, selection, presets);
                true
            }
            None => Self::missing(id),
        }
    }

    pub fn set_custom_text(&mut self, id: &Id, text: String) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.selection = ArgumentSelection::Custom(text);
                true
            }
            None => Self::missing(id),
        }
    }

    pub fn set_path(&mut self, id: &Id, path: Option<String>) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.path = path;
                true
            }
            None => Self::missing(id),
        }
    }

    /// Copies the selection of `source` onto every other selected record.
    ///
    /// Paths are never copied. Returns the number of records updated.
    pub fn apply_to_all_selected<I>(
        &mut self,
        source: &Id,
        selected: I,
        presets: &dyn PresetSource,
    ) -> usize
    where
        I: IntoIterator<Item = Id>,
    {
        let Some(selection) = self.records.get(source).map(|r| r.selection.clone()) else {
            Self::missing(source);
            return 0;
        };

        let mut updated = 0;
        for id in selected {
            if id == *source {
                continue;
            }
            if let Some(record) = self.records.get_mut(&id) {
                Self::assign(record, selection.clone(), presets);
                updated += 1;
            }
        }
        updated
    }

    /// Replaces the selection with editable text: a preset becomes its argument
    /// template, `Auto` becomes empty text. Unresolvable presets are left alone.
    pub fn convert_selection_to_custom_text(
        &mut self,
        id: &Id,
        presets: &dyn PresetSource,
    ) -> bool {
        let Some(record) = self.records.get_mut(id) else {
            return Self::missing(id);
        };

        let text = match &record.selection {
            ArgumentSelection::Auto => String::new(),
            ArgumentSelection::Custom(_) => return true,
            ArgumentSelection::FromPreset(preset_id) => match presets.resolve_preset(preset_id) {
                Some(preset) => preset.argument_template,
                None => {
                    tracing::warn!(
                        "Cannot convert {} to custom text: unknown preset {}",
                        id,
                        preset_id
                    );
                    return false;
                }
            },
        };
        record.selection = ArgumentSelection::Custom(text);
        true
    }

    fn assign(
        record: &mut ArgumentRecord<Id>,
        selection: ArgumentSelection,
        presets: &dyn PresetSource,
    ) {
        if Id::SUBSTITUTES_EXTENSION {
            if let (ArgumentSelection::FromPreset(preset_id), Some(path)) =
                (&selection, record.path.as_mut())
            {
                match presets.resolve_preset(preset_id) {
                    Some(preset) => *path = substitute_extension(path, &preset.output_extension),
                    None => tracing::warn!("Unknown preset {} selected for {}", preset_id, record.owner_id),
                }
            }
        }
        record.selection = selection;
    }

    fn missing(id: &Id) -> bool {
        tracing::debug!("No argument record for {}, ignoring edit", id);
        false
    }
}

/// Addresses one record in either role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "camelCase")]
pub enum RecordKey {
    Input(InputId),
    Output(OutputId),
}

/// Both argument maps.
#[derive(Debug, Clone, Default)]
pub struct ArgumentMaps {
    pub input: ArgumentMap<InputId>,
    pub output: ArgumentMap<OutputId>,
}

impl ArgumentMaps {
    pub fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
    }

    /// Seeds records for the given selected files in both roles.
    pub fn seed_selected<'a, I>(&mut self, files: I, presets: &dyn PresetSource)
    where
        I: IntoIterator<Item = &'a FileNode> + Clone,
    {
        let inputs = self
            .input
            .seed(files.clone().into_iter().map(|f| f.input_id), presets);
        let outputs = self
            .output
            .seed(files.into_iter().map(|f| f.output_id), presets);
        if inputs + outputs > 0 {
            tracing::debug!(
                "Seeded {} input and {} output argument records",
                inputs,
                outputs
            );
        }
    }

    pub fn set_selection(
        &mut self,
        key: RecordKey,
        selection: ArgumentSelection,
        presets: &dyn PresetSource,
    ) -> bool {
        match key {
            RecordKey::Input(id) => self.input.set_selection(&id, selection, presets),
            RecordKey::Output(id) => self.output.set_selection(&id, selection, presets),
        }
    }

    pub fn set_custom_text(&mut self, key: RecordKey, text: String) -> bool {
        match key {
            RecordKey::Input(id) => self.input.set_custom_text(&id, text),
            RecordKey::Output(id) => self.output.set_custom_text(&id, text),
        }
    }

    pub fn set_path(&mut self, key: RecordKey, path: Option<String>) -> bool {
        match key {
            RecordKey::Input(id) => self.input.set_path(&id, path),
            RecordKey::Output(id) => self.output.set_path(&id, path),
        }
    }

    pub fn apply_to_all_selected<'a, I>(
        &mut self,
        key: RecordKey,
        selected: I,
        presets: &dyn PresetSource,
    ) -> usize
    where
        I: IntoIterator<Item = &'a FileNode>,
    {
        match key {
            RecordKey::Input(id) => {
                let ids = selected.into_iter().map(|f| f.input_id);
                self.input.apply_to_all_selected(&id, ids, presets)
            }
            RecordKey::Output(id) => {
                let ids = selected.into_iter().map(|f| f.output_id);
                self.output.apply_to_all_selected(&id, ids, presets)
            }
        }
    }

    pub fn convert_selection_to_custom_text(
        &mut self,
        key: RecordKey,
        presets: &dyn PresetSource,
    ) -> bool {
        match key {
            RecordKey::Input(id) => self.input.convert_selection_to_custom_text(&id, presets),
            RecordKey::Output(id) => self.output.convert_selection_to_custom_text(&id, presets),
        }
    }
}
