//! Filtree CLI Binary
//!
//! Scans a directory, filters it with the configured rules and prints the pruned tree.

use clap::Parser;
use filtree::app::presets::PresetCatalog;
use filtree::app::state::AppState;
use filtree::app::view_model::generate_ui_state;
use filtree::config;
use filtree::core::{DirectoryScan, DirectoryScanner, TreeGenerator};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filtree")]
#[command(about = "Filter a directory into a pruned tree of media files")]
struct Cli {
    /// Directory to scan
    path: PathBuf,

    /// Maximum number of directory levels to descend (overrides the config)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Configuration file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Select every file so the argument records appear in the output
    #[arg(long)]
    select_all: bool,

    /// Print the full view model as JSON instead of the ASCII tree
    #[arg(long)]
    json: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut app_config = config::settings::load_config(cli.config.as_deref())?;
    if let Some(depth) = cli.max_depth {
        app_config.max_scan_depth = depth;
    }

    let scanner = DirectoryScanner;
    let mut state = AppState::new(app_config, Arc::new(PresetCatalog::new()), Arc::new(scanner));

    let token = state.begin_scan(cli.path.clone());
    let result = scanner.scan(&cli.path, state.config.max_scan_depth);
    state.complete_scan(token, result);
    if let Some(message) = &state.validation_message {
        anyhow::bail!("{message}");
    }
    if cli.select_all {
        state.select_all();
    }

    for diagnostic in &state.diagnostics {
        eprintln!("warning: {}", diagnostic.message);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&generate_ui_state(&state))?);
        return Ok(());
    }

    match &state.tree {
        Some(tree) => print!("{}", TreeGenerator::generate_tree(tree)),
        None => println!("No files match the current rules."),
    }
    Ok(())
}
