pub mod error;
pub mod registry;
pub mod rules;
pub mod scanner;
pub mod tree;
pub mod tree_generator;

use serde::{Deserialize, Serialize};

/// Whether a scanned entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// One file or directory reported by a directory scan.
///
/// A scan produces a single nested `DirectoryEntry` rooted at the scanned
/// directory. The listing is never mutated after the scan completes; the tree
/// builder only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Lowercase extension without the leading dot. Always `None` for directories.
    pub extension: Option<String>,
    /// Children in scan order. Always empty for files.
    pub children: Vec<DirectoryEntry>,
}

impl DirectoryEntry {
    /// Creates a file entry, deriving its lowercase extension from the name.
    pub fn file(name: impl Into<String>) -> Self {
        let name = name.into();
        let extension = extension_of(&name);
        Self {
            name,
            kind: EntryKind::File,
            extension,
            children: Vec::new(),
        }
    }

    /// Creates a directory entry with the given children.
    pub fn directory(name: impl Into<String>, children: Vec<DirectoryEntry>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            extension: None,
            children,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Extracts the lowercase extension of a file name.
///
/// Dotfiles such as `.config` have no extension, matching `Path::extension`.
pub fn extension_of(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_lowercase())
}

pub use error::CoreError;
pub use registry::{IdentityRegistry, InputId, LookupKey, OutputId};
pub use rules::{CompiledRules, ExtensionMode, RuleDiagnostic, RuleSet, TextRule};
pub use scanner::{DirectoryScan, DirectoryScanner};
pub use tree::{BuildOutput, DirectoryNode, FileNode, FilteredTree, NodeId, TreeBuilder, TreeNode};
pub use tree_generator::TreeGenerator;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry_derives_lowercase_extension() {
        let entry = DirectoryEntry::file("Clip.MP4");
        assert_eq!(entry.extension.as_deref(), Some("mp4"));
        assert_eq!(entry.kind, EntryKind::File);
    }

    #[test]
    fn test_files_without_extension() {
        assert_eq!(DirectoryEntry::file("README").extension, None);
        assert_eq!(DirectoryEntry::file(".config").extension, None);
        assert_eq!(DirectoryEntry::file("trailing.").extension, None);
    }
}
