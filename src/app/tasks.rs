//! Asynchronous directory scans.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use super::events::UserEvent;
use super::helpers::notify;
use super::proxy::EventProxy;
use super::state::AppState;
use crate::config;
use crate::core::{CoreError, DirectoryEntry, DirectoryScan};

/// Starts a scan of `path` and applies its result once it completes.
///
/// The request supersedes any scan still in flight; if another request is
/// made before this one finishes, this one's result is discarded.
pub fn start_scan_on_path<P: EventProxy>(
    path: PathBuf,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> JoinHandle<()> {
    let (token, scanner, max_depth) = {
        let mut state_guard = state
            .lock()
            .expect("Mutex was poisoned. This should not happen.");
        let token = state_guard.begin_scan(path.clone());
        if let Err(e) =
            config::settings::save_config(&state_guard.config, state_guard.config_path.as_deref())
        {
            tracing::warn!("Failed to save last directory: {}", e);
        }
        notify(&state_guard, &proxy);
        (
            token,
            state_guard.scanner.clone(),
            state_guard.config.max_scan_depth,
        )
    };

    tokio::spawn(scan_directory_task(
        path, token, scanner, max_depth, proxy, state,
    ))
}

async fn scan_directory_task<P: EventProxy>(
    path: PathBuf,
    token: u64,
    scanner: Arc<dyn DirectoryScan>,
    max_depth: usize,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    tracing::info!("Scan #{} started for {}", token, path.display());
    let result = run_scan(scanner, path, max_depth).await;
    let failure = result.as_ref().err().map(ToString::to_string);

    let mut state_guard = state
        .lock()
        .expect("Mutex was poisoned. This should not happen.");
    if !state_guard.complete_scan(token, result) {
        return;
    }

    if let Some(message) = failure {
        proxy.send_event(UserEvent::ShowError(message));
    }
    notify(&state_guard, &proxy);
}

/// Runs the blocking walk on tokio's blocking pool.
async fn run_scan(
    scanner: Arc<dyn DirectoryScan>,
    path: PathBuf,
    max_depth: usize,
) -> Result<DirectoryEntry, CoreError> {
    tokio::task::spawn_blocking(move || scanner.scan(Path::new(&path), max_depth)).await?
}
