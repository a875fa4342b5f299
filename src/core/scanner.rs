//! Produces the raw, unfiltered directory listing the tree builder consumes.

use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{CoreError, DirectoryEntry};

/// The directory-walking collaborator.
///
/// Implementations return the complete nested listing below `path`, bounded
/// by `max_depth` levels (the root itself is depth 0).
pub trait DirectoryScan: Send + Sync + 'static {
    fn scan(&self, path: &Path, max_depth: usize) -> Result<DirectoryEntry, CoreError>;
}

/// Scans the local filesystem.
///
/// Nothing is ignored: hidden files, `.gitignore`d paths and the like are all
/// reported, since deciding what to keep is the job of the filter rules.
/// Symbolic links are reported as files and never followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryScanner;

impl DirectoryScan for DirectoryScanner {
    fn scan(&self, root_path: &Path, max_depth: usize) -> Result<DirectoryEntry, CoreError> {
        if !root_path.exists() {
            return Err(CoreError::DirectoryNotFound(root_path.to_path_buf()));
        }
        if !root_path.is_dir() {
            return Err(CoreError::NotADirectory(root_path.to_path_buf()));
        }

        let walker = WalkBuilder::new(root_path)
            .standard_filters(false)
            .follow_links(false)
            .max_depth(Some(max_depth))
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        // Entries arrive depth-first with parents before children. Each pending
        // entry remembers the index of its parent directory.
        let mut pending: Vec<(DirectoryEntry, Option<usize>)> = Vec::new();
        let mut directory_index: HashMap<PathBuf, usize> = HashMap::new();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) if pending.is_empty() => return Err(CoreError::Walk(e)),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());

            let (name, parent) = if entry.depth() == 0 {
                (root_name(root_path), None)
            } else {
                let Some(parent) = path.parent().and_then(|p| directory_index.get(p)) else {
                    continue;
                };
                (entry.file_name().to_string_lossy().to_string(), Some(*parent))
            };

            if is_dir {
                directory_index.insert(path.to_path_buf(), pending.len());
                pending.push((DirectoryEntry::directory(name, Vec::new()), parent));
            } else {
                pending.push((DirectoryEntry::file(name), parent));
            }
        }

        // Fold the flat list back into a tree. Popping from the end visits every
        // child before its parent, so children are collected in reverse order.
        let total = pending.len();
        while pending.len() > 1 {
            let Some((mut item, parent)) = pending.pop() else {
                break;
            };
            item.children.reverse();
            if let Some(parent) = parent {
                pending[parent].0.children.push(item);
            }
        }

        let (mut root, _) = pending
            .pop()
            .ok_or_else(|| CoreError::DirectoryNotFound(root_path.to_path_buf()))?;
        root.children.reverse();

        tracing::info!(
            "Scanned {}: {} entries (max depth {})",
            root_path.display(),
            total,
            max_depth
        );
        Ok(root)
    }
}

fn root_name(root_path: &Path) -> String {
    root_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| root_path.display().to_string())
}
