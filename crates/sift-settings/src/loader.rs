//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SiftSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `SIFT_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{EmbeddingBackend, LogLevel, SiftSettings};

/// Resolve the path to the settings file (`~/.sift/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".sift").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SiftSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SiftSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn read_settings_file(path: &Path) -> Result<SiftSettings> {
    let defaults = serde_json::to_value(SiftSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning and the file/default value is
/// kept.
pub fn apply_env_overrides(settings: &mut SiftSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`. Split out so tests do not have to
/// mutate the process environment.
fn apply_overrides_from(settings: &mut SiftSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Embedding ───────────────────────────────────────────────────
    if let Some(v) = read("SIFT_BACKEND") {
        match EmbeddingBackend::parse(&v) {
            Some(backend) => settings.embedding.backend = backend,
            None => tracing::warn!(key = "SIFT_BACKEND", value = %v, "unknown backend, ignoring"),
        }
    }
    if let Some(v) = read("SIFT_MODEL") {
        settings.embedding.model = v;
    }
    if let Some(v) = read("SIFT_DTYPE") {
        settings.embedding.dtype = v;
    }
    if let Some(v) = read("SIFT_CACHE_DIR") {
        settings.embedding.cache_dir = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = read("SIFT_DEBOUNCE_MS") {
        match parse_u64_range(&v, 1, 10_000) {
            Some(ms) => settings.session.debounce_ms = ms,
            None => tracing::warn!(key = "SIFT_DEBOUNCE_MS", value = %v, "invalid u64 env var, ignoring"),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("SIFT_LOG_LEVEL") {
        match LogLevel::parse(&v) {
            Some(level) => settings.logging.level = level,
            None => tracing::warn!(key = "SIFT_LOG_LEVEL", value = %v, "unknown log level, ignoring"),
        }
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
