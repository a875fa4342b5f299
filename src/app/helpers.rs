//! Contains helper functions to reduce boilerplate code in other `app` modules.

use std::sync::{Arc, Mutex};

use super::events::UserEvent;
use super::proxy::EventProxy;
use super::state::AppState;
use super::view_model::generate_ui_state;

/// Locks the `AppState`, performs a mutation and then sends a `StateUpdate`
/// event to the UI.
pub fn with_state_and_notify<F, P: EventProxy>(
    state: &Arc<Mutex<AppState>>,
    proxy: &P,
    update_fn: F,
) where
    F: FnOnce(&mut AppState),
{
    let mut state_guard = state
        .lock()
        .expect("Mutex was poisoned. This should not happen.");

    update_fn(&mut state_guard);

    notify(&state_guard, proxy);
}

/// Sends the current state to the UI.
pub fn notify<P: EventProxy>(state: &AppState, proxy: &P) {
    let ui_state = generate_ui_state(state);
    proxy.send_event(UserEvent::StateUpdate(Box::new(ui_state)));
}

/// Deserializes a command payload, logging a warning when it has the wrong shape.
pub fn parse_payload<T: serde::de::DeserializeOwned>(
    command: &str,
    payload: &serde_json::Value,
) -> Option<T> {
    match serde_json::from_value::<T>(payload.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                "Failed to deserialize payload for '{}': {} ({:?})",
                command,
                e,
                payload
            );
            None
        }
    }
}
