pub mod settings;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::RuleSet;

/// Default number of directory levels the scanner descends below the input root.
pub const DEFAULT_MAX_SCAN_DEPTH: usize = 32;

/// The persisted user preferences.
///
/// Stored as one flat JSON object: the rule fields (`extensionMode`,
/// `extensions`, `textRulesEnabled`, `textRules`) sit next to the scan
/// preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(flatten)]
    pub rules: RuleSet,
    pub last_directory: Option<PathBuf>,
    pub max_scan_depth: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        settings::load_config(None)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: RuleSet::default(),
            last_directory: None,
            max_scan_depth: DEFAULT_MAX_SCAN_DEPTH,
        }
    }
}
