//! Stable identities for file nodes and the lookup table that resolves them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::tree::NodeId;

/// Source of every file identity handed out by this process.
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

fn next_identity() -> u64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// Identity of a file in its input (decode) role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(u64);

/// Identity of a file in its output (encode) role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(u64);

impl InputId {
    pub(crate) fn allocate() -> Self {
        Self(next_identity())
    }
}

impl OutputId {
    pub(crate) fn allocate() -> Self {
        Self(next_identity())
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in-{}", self.0)
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "out-{}", self.0)
    }
}

/// Any key a file node can be looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum LookupKey {
    Path(PathBuf),
    Input(InputId),
    Output(OutputId),
}

impl From<InputId> for LookupKey {
    fn from(id: InputId) -> Self {
        LookupKey::Input(id)
    }
}

impl From<OutputId> for LookupKey {
    fn from(id: OutputId) -> Self {
        LookupKey::Output(id)
    }
}

impl From<PathBuf> for LookupKey {
    fn from(path: PathBuf) -> Self {
        LookupKey::Path(path)
    }
}

/// Maps absolute paths and both role identities to file node handles.
///
/// A registry belongs to exactly one tree and is never updated after the tree
/// is built.
#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    by_path: HashMap<PathBuf, NodeId>,
    by_input: HashMap<InputId, NodeId>,
    by_output: HashMap<OutputId, NodeId>,
}

impl IdentityRegistry {
    pub fn register(
        &mut self,
        node: NodeId,
        absolute_path: PathBuf,
        input_id: InputId,
        output_id: OutputId,
    ) {
        self.by_path.insert(absolute_path, node);
        self.by_input.insert(input_id, node);
        self.by_output.insert(output_id, node);
    }

    pub fn lookup(&self, key: &LookupKey) -> Option<NodeId> {
        match key {
            LookupKey::Path(path) => self.by_path.get(path),
            LookupKey::Input(id) => self.by_input.get(id),
            LookupKey::Output(id) => self.by_output.get(id),
        }
        .copied()
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.by_input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_input.is_empty()
    }
}
