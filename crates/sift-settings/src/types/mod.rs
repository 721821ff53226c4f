//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format. Each type implements [`Default`] with production values, and
//! `#[serde(default)]` lets a partial file fill in only what it overrides.

mod embedding;
mod logging;

pub use embedding::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

/// Root settings type for sift.
///
/// Loaded from `~/.sift/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "embedding": { "backend": "hashing" },
///   "session": { "debounceMs": 150 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiftSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Embedding model and backend selection.
    pub embedding: EmbeddingSettings,
    /// Interactive session behavior.
    pub session: SessionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for SiftSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "sift".to_string(),
            embedding: EmbeddingSettings::default(),
            session: SessionSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Interactive session behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Quiet period after the last query edit before the query is embedded.
    pub debounce_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}
