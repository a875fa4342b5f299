//! Contains all the command handlers that are callable from the frontend.
//!
//! Each function in this module corresponds to a specific `IpcMessage::command`.
//! These handlers mutate the `AppState` and send `UserEvent`s back to the UI.

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::arguments::{ArgumentSelection, RecordKey};
use super::events::UserEvent;
use super::helpers::{notify, parse_payload, with_state_and_notify};
use super::proxy::EventProxy;
use super::state::AppState;
use super::tasks::start_scan_on_path;
use crate::config;
use crate::core::{LookupKey, RuleSet};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SelectionEdit {
    key: RecordKey,
    selection: ArgumentSelection,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TextEdit {
    key: RecordKey,
    text: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PathEdit {
    key: RecordKey,
    path: Option<String>,
}

fn save_config_logged(state: &AppState, context: &str) {
    if let Err(e) = config::settings::save_config(&state.config, state.config_path.as_deref()) {
        tracing::warn!("Failed to save config {}: {}", context, e);
    }
}

/// Handles the initial request for state from the frontend when it loads.
pub fn initialize<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let state_guard = state
        .lock()
        .expect("Mutex was poisoned. This should not happen.");
    notify(&state_guard, &proxy);
}

/// Starts a scan of the directory given in the payload.
///
/// A new scan always resets the tree, the selection and both argument maps.
pub fn scan_directory<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(path) = parse_payload::<PathBuf>("scanDirectory", &payload) {
        start_scan_on_path(path, proxy, state);
    }
}

/// Re-scans the currently loaded directory path.
pub fn rescan_directory<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let current_path = state
        .lock()
        .expect("Mutex was poisoned. This should not happen.")
        .current_path
        .clone();

    match current_path {
        Some(path) => {
            start_scan_on_path(path, proxy, state);
        }
        None => tracing::info!("Rescan requested without a loaded directory."),
    }
}

/// Clears the currently loaded directory and resets the application state.
pub fn clear_directory<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        s.reset_directory_state();
        s.config.last_directory = None;
        save_config_logged(s, "after clearing directory");
    });
}

/// Replaces the rule set, rebuilds the tree from the last scan and persists the rules.
pub fn update_rules<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(rules) = parse_payload::<RuleSet>("updateRules", &payload) {
        with_state_and_notify(&state, &proxy, |s| {
            s.set_rule_set(rules);
            save_config_logged(s, "on rule update");
        });
    }
}

/// Replaces the selection with the files named in the payload.
///
/// The payload is a list of lookup keys, e.g. `{"kind": "input", "value": 3}`.
pub fn set_selection<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(keys) = parse_payload::<Vec<LookupKey>>("setSelection", &payload) {
        with_state_and_notify(&state, &proxy, |s| s.set_selection(keys));
    }
}

/// Toggles the selection state of a single file.
pub fn toggle_selection<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(path) = parse_payload::<PathBuf>("toggleSelection", &payload) {
        with_state_and_notify(&state, &proxy, |s| s.toggle_selection(path));
    }
}

/// Toggles the selection state of all files within a directory.
pub fn toggle_directory_selection<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(path) = parse_payload::<PathBuf>("toggleDirectorySelection", &payload) {
        with_state_and_notify(&state, &proxy, |s| s.toggle_directory_selection(&path));
    }
}

/// Selects every file of the filtered tree.
pub fn select_all<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, AppState::select_all);
}

pub fn deselect_all<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, AppState::deselect_all);
}

/// Toggles the expanded/collapsed state of a directory in the UI tree.
pub fn toggle_expansion<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(path) = parse_payload::<PathBuf>("toggleExpansion", &payload) {
        with_state_and_notify(&state, &proxy, |s| s.toggle_expansion(path));
    }
}

/// Expands or collapses every directory of the filtered tree.
pub fn expand_collapse_all<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(expand) = parse_payload::<bool>("expandCollapseAll", &payload) {
        with_state_and_notify(&state, &proxy, |s| s.expand_collapse_all(expand));
    }
}

pub fn set_argument_selection<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(edit) = parse_payload::<SelectionEdit>("setArgumentSelection", &payload) {
        with_state_and_notify(&state, &proxy, |s| {
            s.set_argument_selection(edit.key, edit.selection);
        });
    }
}

pub fn set_custom_text<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(edit) = parse_payload::<TextEdit>("setCustomText", &payload) {
        with_state_and_notify(&state, &proxy, |s| {
            s.set_custom_text(edit.key, edit.text);
        });
    }
}

pub fn set_argument_path<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(edit) = parse_payload::<PathEdit>("setArgumentPath", &payload) {
        with_state_and_notify(&state, &proxy, |s| {
            s.set_argument_path(edit.key, edit.path);
        });
    }
}

/// Copies the selection of one record onto the same role of every selected file.
pub fn apply_to_all_selected<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(key) = parse_payload::<RecordKey>("applyToAllSelected", &payload) {
        with_state_and_notify(&state, &proxy, |s| {
            let updated = s.apply_to_all_selected(key);
            tracing::info!("Applied selection of {:?} to {} records", key, updated);
        });
    }
}

pub fn convert_to_custom_text<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    if let Some(key) = parse_payload::<RecordKey>("convertToCustomText", &payload) {
        with_state_and_notify(&state, &proxy, |s| {
            s.convert_selection_to_custom_text(key);
        });
    }
}

/// Imports a configuration file and applies its rules to the loaded tree.
pub fn import_config<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let Some(path) = parse_payload::<PathBuf>("importConfig", &payload) else {
        return;
    };

    match config::settings::import_config(&path) {
        Ok(imported) => with_state_and_notify(&state, &proxy, |s| {
            s.config.max_scan_depth = imported.max_scan_depth;
            s.set_rule_set(imported.rules);
            save_config_logged(s, "after import");
        }),
        Err(e) => {
            tracing::warn!("Failed to import config from {:?}: {}", path, e);
            proxy.send_event(UserEvent::ShowError(format!(
                "Failed to import config: {e}"
            )));
        }
    }
}

/// Exports the current configuration to the path given in the payload.
pub fn export_config<P: EventProxy>(
    payload: serde_json::Value,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let Some(path) = parse_payload::<PathBuf>("exportConfig", &payload) else {
        return;
    };

    let state_guard = state
        .lock()
        .expect("Mutex was poisoned. This should not happen.");
    let result = match config::settings::export_config(&state_guard.config, &path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to export config to {:?}: {}", path, e);
            false
        }
    };
    proxy.send_event(UserEvent::ConfigExported(result));
}
