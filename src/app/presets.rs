//! Access to the external preset collection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a decode or encode preset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(pub String);

impl From<&str> for PresetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The parts of a preset the argument records depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// Extension of files produced with this preset, without the leading dot.
    pub output_extension: String,
    pub argument_template: String,
}

/// A read-only view of the preset collection.
///
/// Every call is answered from the collection's current contents; callers
/// never hold on to the results beyond the operation that asked for them.
pub trait PresetSource: Send + Sync {
    fn default_decode_preset(&self) -> Option<PresetId>;
    fn default_encode_preset(&self) -> Option<PresetId>;
    fn resolve_preset(&self, id: &PresetId) -> Option<Preset>;
}

/// An in-memory preset collection.
#[derive(Debug, Default, Clone)]
pub struct PresetCatalog {
    presets: HashMap<PresetId, Preset>,
    default_decode: Option<PresetId>,
    default_encode: Option<PresetId>,
}

impl PresetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preset(
        mut self,
        id: impl Into<PresetId>,
        output_extension: &str,
        argument_template: &str,
    ) -> Self {
        self.presets.insert(
            id.into(),
            Preset {
                output_extension: output_extension.trim_start_matches('.').to_string(),
                argument_template: argument_template.to_string(),
            },
        );
        self
    }

    pub fn with_default_decode(mut self, id: impl Into<PresetId>) -> Self {
        self.default_decode = Some(id.into());
        self
    }

    pub fn with_default_encode(mut self, id: impl Into<PresetId>) -> Self {
        self.default_encode = Some(id.into());
        self
    }
}

impl PresetSource for PresetCatalog {
    fn default_decode_preset(&self) -> Option<PresetId> {
        self.default_decode.clone()
    }

    fn default_encode_preset(&self) -> Option<PresetId> {
        self.default_encode.clone()
    }

    fn resolve_preset(&self, id: &PresetId) -> Option<Preset> {
        self.presets.get(id).cloned()
    }
}
