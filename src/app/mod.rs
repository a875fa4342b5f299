//! The application layer: shared state, command handlers and the scan task.

pub mod arguments;
pub mod commands;
pub mod events;
pub mod helpers;
pub mod presets;
pub mod proxy;
pub mod state;
pub mod tasks;
pub mod view_model;

use std::sync::{Arc, Mutex};

use events::IpcMessage;
use proxy::EventProxy;
use state::AppState;

/// The main entry point for handling messages from the frontend.
///
/// It deserializes the message and dispatches it to the appropriate command handler.
pub fn handle_ipc_message<P: EventProxy>(message: &str, proxy: P, state: Arc<Mutex<AppState>>) {
    let msg = match serde_json::from_str::<IpcMessage>(message) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::error!("Failed to parse IPC message: {}. Error: {}", message, e);
            return;
        }
    };

    tracing::debug!("IPC command received: {}", msg.command);
    let payload = msg.payload;
    match msg.command.as_str() {
        "initialize" => commands::initialize(proxy, state),
        "scanDirectory" => commands::scan_directory(payload, proxy, state),
        "rescanDirectory" => commands::rescan_directory(proxy, state),
        "clearDirectory" => commands::clear_directory(proxy, state),
        "updateRules" => commands::update_rules(payload, proxy, state),
        "setSelection" => commands::set_selection(payload, proxy, state),
        "toggleSelection" => commands::toggle_selection(payload, proxy, state),
        "toggleDirectorySelection" => commands::toggle_directory_selection(payload, proxy, state),
        "selectAll" => commands::select_all(proxy, state),
        "deselectAll" => commands::deselect_all(proxy, state),
        "toggleExpansion" => commands::toggle_expansion(payload, proxy, state),
        "expandCollapseAll" => commands::expand_collapse_all(payload, proxy, state),
        "setArgumentSelection" => commands::set_argument_selection(payload, proxy, state),
        "setCustomText" => commands::set_custom_text(payload, proxy, state),
        "setArgumentPath" => commands::set_argument_path(payload, proxy, state),
        "applyToAllSelected" => commands::apply_to_all_selected(payload, proxy, state),
        "convertToCustomText" => commands::convert_to_custom_text(payload, proxy, state),
        "importConfig" => commands::import_config(payload, proxy, state),
        "exportConfig" => commands::export_config(payload, proxy, state),
        _ => tracing::warn!("Unknown command received: {}", msg.command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::UserEvent;
    use crate::app::presets::PresetCatalog;
    use crate::config::AppConfig;
    use crate::core::DirectoryScanner;
    use tokio::sync::mpsc;

    fn shared_state() -> Arc<Mutex<AppState>> {
        Arc::new(Mutex::new(AppState::new(
            AppConfig::default(),
            Arc::new(PresetCatalog::new()),
            Arc::new(DirectoryScanner),
        )))
    }

    #[test]
    fn test_dispatches_known_commands() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_ipc_message(r#"{"command":"initialize"}"#, tx.clone(), shared_state());
        handle_ipc_message(
            r#"{"command":"expandCollapseAll","payload":true}"#,
            tx,
            shared_state(),
        );

        assert!(matches!(rx.try_recv(), Ok(UserEvent::StateUpdate(_))));
        assert!(matches!(rx.try_recv(), Ok(UserEvent::StateUpdate(_))));
    }

    #[test]
    fn test_ignores_unknown_and_malformed_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_ipc_message(r#"{"command":"launchRockets"}"#, tx.clone(), shared_state());
        handle_ipc_message("not json", tx, shared_state());

        assert!(rx.try_recv().is_err());
    }
}
