use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Persisted extension settings, stored as camelCase JSON under the
/// `settings` key of the key-value store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSettings {
    /// Credential for the safety-verdict service. Empty means not configured.
    #[serde(default)]
    pub virus_total_api_key: String,
}

/// Default base URL of the safety-verdict service.
pub const DEFAULT_SAFETY_API_BASE: &str = "https://www.virustotal.com/api/v3";

/// Runtime knobs for a bookmark session. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How long a deletion stays undoable before it is committed.
    pub undo_window: Duration,
    /// Per-request timeout for reachability checks.
    pub status_timeout: Duration,
    /// Base URL of the safety-verdict service, without trailing slash.
    pub safety_api_base: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            undo_window: Duration::from_secs(5),
            status_timeout: Duration::from_secs(10),
            safety_api_base: DEFAULT_SAFETY_API_BASE.to_string(),
        }
    }
}
