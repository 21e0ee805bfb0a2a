//! Plugin descriptor records.

use serde::{Deserialize, Serialize};

/// Metadata for one registered strategy plugin.
///
/// Enabled flag and priority are operator-mutable at runtime and
/// persisted independently of the plugin code itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Stable identifier (e.g. "tiered_lay_v1").
    pub id: String,
    pub display_name: String,
    pub version: String,
    pub enabled: bool,
    /// Lower priority evaluates first.
    pub priority: u32,
    /// Strategy-specific configuration blob.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            version: version.into(),
            enabled: true,
            priority: 100,
            config: serde_json::Value::Null,
        }
    }
}
