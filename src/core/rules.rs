//! Name-based filter rules and their evaluation against scanned entries.
//!
//! A [`RuleSet`] combines an extension filter with an ordered list of text
//! rules. Before a tree is built the rule set is compiled once into
//! [`CompiledRules`], which validates regex patterns up front so that each
//! entry is evaluated without re-parsing anything.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{CoreError, DirectoryEntry, EntryKind};

/// How the extension list of a [`RuleSet`] is applied to files.
///
/// Persisted as an integer (`0`, `1`, `2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ExtensionMode {
    #[default]
    Disabled,
    Whitelist,
    Blacklist,
}

impl From<ExtensionMode> for u8 {
    fn from(mode: ExtensionMode) -> Self {
        match mode {
            ExtensionMode::Disabled => 0,
            ExtensionMode::Whitelist => 1,
            ExtensionMode::Blacklist => 2,
        }
    }
}

impl TryFrom<u8> for ExtensionMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExtensionMode::Disabled),
            1 => Ok(ExtensionMode::Whitelist),
            2 => Ok(ExtensionMode::Blacklist),
            other => Err(format!("unknown extension mode {other}")),
        }
    }
}

/// A single name pattern rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextRule {
    pub id: String,
    pub pattern: Option<String>,
    pub enabled: bool,
    pub is_regex: bool,
    /// `true` drops matching entries, `false` keeps only matching entries.
    pub is_blacklist: bool,
    pub applies_to_directories: bool,
    pub applies_to_files: bool,
}

impl Default for TextRule {
    fn default() -> Self {
        Self {
            id: String::new(),
            pattern: None,
            enabled: true,
            is_regex: false,
            is_blacklist: true,
            applies_to_directories: false,
            applies_to_files: true,
        }
    }
}

impl TextRule {
    /// A file rule that drops every file whose name contains `pattern`.
    pub fn blacklist(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: Some(pattern.into()),
            ..Default::default()
        }
    }

    /// A file rule that keeps only files whose name contains `pattern`.
    pub fn whitelist(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            is_blacklist: false,
            ..Self::blacklist(id, pattern)
        }
    }

    /// Interprets the pattern as a regular expression.
    pub fn regex(mut self) -> Self {
        self.is_regex = true;
        self
    }

    /// Selects which entry kinds the rule is evaluated against.
    pub fn targets(mut self, files: bool, directories: bool) -> Self {
        self.applies_to_files = files;
        self.applies_to_directories = directories;
        self
    }

    fn applies_to(&self, kind: EntryKind) -> bool {
        match kind {
            EntryKind::File => self.applies_to_files,
            EntryKind::Directory => self.applies_to_directories,
        }
    }
}

/// The complete filtering configuration for one tree build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleSet {
    pub extension_mode: ExtensionMode,
    pub extensions: BTreeSet<String>,
    pub text_rules_enabled: bool,
    pub text_rules: Vec<TextRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let extensions = [
            "mp4", "mkv", "mov", "avi", "webm", "m4v", "ts", "flv", "wmv", "mp3", "flac", "wav",
            "m4a", "ogg", "opus",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            extension_mode: ExtensionMode::Disabled,
            extensions,
            text_rules_enabled: true,
            text_rules: Vec::new(),
        }
    }
}

impl RuleSet {
    /// Lowercases extensions and strips leading dots and blank entries.
    pub fn normalized(mut self) -> Self {
        self.extensions = self
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }
}

/// A non-blocking problem found while compiling a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDiagnostic {
    pub rule_id: String,
    pub pattern: String,
    pub message: String,
}

impl From<&CoreError> for RuleDiagnostic {
    fn from(error: &CoreError) -> Self {
        match error {
            CoreError::InvalidPattern {
                rule_id, pattern, ..
            } => Self {
                rule_id: rule_id.clone(),
                pattern: pattern.clone(),
                message: error.to_string(),
            },
            other => Self {
                rule_id: String::new(),
                pattern: String::new(),
                message: other.to_string(),
            },
        }
    }
}

enum Matcher {
    Substring(String),
    Regex(Regex),
}

impl Matcher {
    fn is_match(&self, name: &str) -> bool {
        match self {
            Matcher::Substring(needle) => name.contains(needle.as_str()),
            Matcher::Regex(regex) => regex.is_match(name),
        }
    }
}

struct CompiledTextRule {
    is_blacklist: bool,
    applies_to_files: bool,
    applies_to_directories: bool,
    matcher: Matcher,
}

/// A [`RuleSet`] prepared for evaluation.
///
/// Only text rules that can take part in a decision are kept: disabled rules,
/// rules without a pattern and rules whose regex fails to compile are left
/// out. Each invalid regex is logged and reported through [`diagnostics`].
///
/// [`diagnostics`]: CompiledRules::diagnostics
pub struct CompiledRules {
    extension_mode: ExtensionMode,
    extensions: BTreeSet<String>,
    text_rules: Vec<CompiledTextRule>,
    diagnostics: Vec<RuleDiagnostic>,
}

impl CompiledRules {
    pub fn compile(rules: &RuleSet) -> Self {
        let mut text_rules = Vec::new();
        let mut diagnostics = Vec::new();

        if rules.text_rules_enabled {
            for rule in &rules.text_rules {
                let pattern = match rule.pattern.as_deref() {
                    Some(pattern) if rule.enabled && !pattern.is_empty() => pattern,
                    _ => continue,
                };

                let matcher = if rule.is_regex {
                    match Regex::new(pattern) {
                        Ok(regex) => Matcher::Regex(regex),
                        Err(source) => {
                            let error = CoreError::InvalidPattern {
                                rule_id: rule.id.clone(),
                                pattern: pattern.to_string(),
                                source,
                            };
                            tracing::warn!("Skipping text rule: {}", error);
                            diagnostics.push(RuleDiagnostic::from(&error));
                            continue;
                        }
                    }
                } else {
                    Matcher::Substring(pattern.to_string())
                };

                text_rules.push(CompiledTextRule {
                    is_blacklist: rule.is_blacklist,
                    applies_to_files: rule.applies_to(EntryKind::File),
                    applies_to_directories: rule.applies_to(EntryKind::Directory),
                    matcher,
                });
            }
        }

        Self {
            extension_mode: rules.extension_mode,
            extensions: rules.extensions.clone(),
            text_rules,
            diagnostics,
        }
    }

    pub fn diagnostics(&self) -> &[RuleDiagnostic] {
        &self.diagnostics
    }

    /// Decides whether `entry` is removed from the tree.
    ///
    /// Every text rule that applies to the entry's kind overwrites the running
    /// decision, so the last applicable rule wins. Extension filtering only
    /// runs for files the text rules kept.
    pub fn should_drop(&self, entry: &DirectoryEntry) -> bool {
        let mut drop = false;
        for rule in &self.text_rules {
            let applies = match entry.kind {
                EntryKind::File => rule.applies_to_files,
                EntryKind::Directory => rule.applies_to_directories,
            };
            if !applies {
                continue;
            }
            let matched = rule.matcher.is_match(&entry.name);
            drop = if rule.is_blacklist { matched } else { !matched };
        }

        if drop || entry.kind == EntryKind::Directory {
            return drop;
        }

        match (self.extension_mode, entry.extension.as_deref()) {
            (ExtensionMode::Disabled, _) => false,
            (_, None) => true,
            (ExtensionMode::Whitelist, Some(ext)) => !self.extensions.contains(ext),
            (ExtensionMode::Blacklist, Some(ext)) => self.extensions.contains(ext),
        }
    }
}

/// Evaluates a single entry against a rule set.
///
/// Compiles the rule set on every call; use [`CompiledRules`] when evaluating
/// many entries.
pub fn should_drop(entry: &DirectoryEntry, rules: &RuleSet) -> bool {
    CompiledRules::compile(rules).should_drop(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn rules_with_extensions(mode: ExtensionMode, extensions: &[&str]) -> RuleSet {
        RuleSet {
            extension_mode: mode,
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            text_rules_enabled: true,
            text_rules: Vec::new(),
        }
    }

    #[test]
    fn test_last_applicable_rule_wins() {
        let mut rules = rules_with_extensions(ExtensionMode::Disabled, &[]);
        rules.text_rules = vec![
            TextRule::whitelist("keep-nothing", "zzz-never"),
            TextRule::blacklist("drop-all", ".*").regex(),
        ];
        assert!(should_drop(&DirectoryEntry::file("movie.mp4"), &rules));

        // Reversed order: the whitelist is evaluated last and drops the non-matching file.
        rules.text_rules.reverse();
        assert!(should_drop(&DirectoryEntry::file("movie.mp4"), &rules));

        rules.text_rules = vec![
            TextRule::blacklist("drop-movies", "movie"),
            TextRule::whitelist("keep-mp4", ".mp4"),
        ];
        assert!(!should_drop(&DirectoryEntry::file("movie.mp4"), &rules));
    }

    #[test]
    fn test_no_extension_policy() {
        let readme = DirectoryEntry::file("README");

        let whitelist = rules_with_extensions(ExtensionMode::Whitelist, &["mp4"]);
        assert!(should_drop(&readme, &whitelist));

        let blacklist = rules_with_extensions(ExtensionMode::Blacklist, &["mp4"]);
        assert!(should_drop(&readme, &blacklist));

        let disabled = rules_with_extensions(ExtensionMode::Disabled, &["mp4"]);
        assert!(!should_drop(&readme, &disabled));
    }

    #[test]
    fn test_extension_whitelist_and_blacklist() {
        let whitelist = rules_with_extensions(ExtensionMode::Whitelist, &["mp4"]);
        assert!(!should_drop(&DirectoryEntry::file("a.MP4"), &whitelist));
        assert!(should_drop(&DirectoryEntry::file("b.txt"), &whitelist));

        let blacklist = rules_with_extensions(ExtensionMode::Blacklist, &["mp4"]);
        assert!(should_drop(&DirectoryEntry::file("a.mp4"), &blacklist));
        assert!(!should_drop(&DirectoryEntry::file("b.txt"), &blacklist));
    }

    #[test]
    fn test_directories_ignore_extension_rules() {
        let whitelist = rules_with_extensions(ExtensionMode::Whitelist, &["mp4"]);
        let dir = DirectoryEntry::directory("season.1", Vec::new());
        assert!(!should_drop(&dir, &whitelist));
    }

    #[test]
    fn test_rules_respect_target_kinds() {
        let mut rules = rules_with_extensions(ExtensionMode::Disabled, &[]);
        rules.text_rules = vec![TextRule::blacklist("no-sub", "sub").targets(false, true)];

        assert!(should_drop(&DirectoryEntry::directory("sub", Vec::new()), &rules));
        assert!(!should_drop(&DirectoryEntry::file("sub.mp4"), &rules));
    }

    #[test]
    fn test_disabled_rules_and_empty_patterns_are_skipped() {
        let mut rules = rules_with_extensions(ExtensionMode::Disabled, &[]);
        rules.text_rules = vec![
            TextRule {
                enabled: false,
                ..TextRule::blacklist("off", "a")
            },
            TextRule {
                pattern: Some(String::new()),
                ..TextRule::whitelist("empty", "")
            },
            TextRule {
                pattern: None,
                ..TextRule::whitelist("none", "")
            },
        ];
        assert!(!should_drop(&DirectoryEntry::file("a.mp4"), &rules));

        rules.text_rules = vec![TextRule::blacklist("on", "a")];
        rules.text_rules_enabled = false;
        assert!(!should_drop(&DirectoryEntry::file("a.mp4"), &rules));
    }

    #[test]
    fn test_text_rule_drop_skips_extension_check() {
        let mut rules = rules_with_extensions(ExtensionMode::Whitelist, &["mp4"]);
        rules.text_rules = vec![TextRule::blacklist("sample", "sample")];
        assert!(should_drop(&DirectoryEntry::file("sample.mp4"), &rules));
        assert!(!should_drop(&DirectoryEntry::file("feature.mp4"), &rules));
    }

    #[test]
    fn test_substring_match_is_case_sensitive() {
        let mut rules = rules_with_extensions(ExtensionMode::Disabled, &[]);
        rules.text_rules = vec![TextRule::blacklist("trailer", "Trailer")];
        assert!(should_drop(&DirectoryEntry::file("Trailer.mkv"), &rules));
        assert!(!should_drop(&DirectoryEntry::file("trailer.mkv"), &rules));
    }

    #[test]
    #[traced_test]
    fn test_invalid_regex_is_skipped_and_reported() {
        let mut rules = rules_with_extensions(ExtensionMode::Disabled, &[]);
        rules.text_rules = vec![
            TextRule::blacklist("drop-a", "^a").regex(),
            TextRule::whitelist("broken", "([").regex(),
        ];

        let compiled = CompiledRules::compile(&rules);
        assert_eq!(compiled.diagnostics().len(), 1);
        assert_eq!(compiled.diagnostics()[0].rule_id, "broken");
        assert_eq!(compiled.diagnostics()[0].pattern, "([");

        // The broken whitelist does not take part, so only `drop-a` decides.
        assert!(compiled.should_drop(&DirectoryEntry::file("a.mp4")));
        assert!(!compiled.should_drop(&DirectoryEntry::file("b.mp4")));
        assert!(logs_contain("Skipping text rule"));
    }

    #[test]
    fn test_normalized_extensions() {
        let rules = RuleSet {
            extensions: [".MP4", " mkv ", "", "."]
                .into_iter()
                .map(String::from)
                .collect(),
            ..Default::default()
        }
        .normalized();

        let expected: BTreeSet<String> = ["mkv", "mp4"].into_iter().map(String::from).collect();
        assert_eq!(rules.extensions, expected);
    }

    #[test]
    fn test_extension_mode_serializes_as_integer() {
        let json = serde_json::to_value(ExtensionMode::Blacklist).unwrap();
        assert_eq!(json, serde_json::json!(2));
        assert!(serde_json::from_value::<ExtensionMode>(serde_json::json!(7)).is_err());
    }
}
