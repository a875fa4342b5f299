//! Defines the custom error type for the `core` module.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// This enum encapsulates the errors that can occur while scanning a directory
/// and while compiling the filter rules used to build the tree.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The scanned path does not exist.
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Represents a path that was expected to be a directory but was not.
    #[error("Path is not a valid directory: {0}")]
    NotADirectory(PathBuf),

    /// An error reported by the directory walker.
    #[error("Failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),

    /// A text rule carries a regex that does not compile.
    #[error("Invalid pattern `{pattern}` in rule {rule_id}: {source}")]
    InvalidPattern {
        rule_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Represents an error that occurred when a Tokio task was joined.
    /// This is often due to a task panicking or being cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
