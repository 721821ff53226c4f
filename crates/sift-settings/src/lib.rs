//! # sift-settings
//!
//! Layered configuration for sift.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SiftSettings::default()`]
//! 2. **User file**: `~/.sift/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SIFT_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

/// Expand a leading `~/` to `$HOME`.
pub fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = SiftSettings::default();
        assert!(settings_path().ends_with(".sift/settings.json"));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/opt/models"), "/opt/models");
        assert_eq!(expand_home("relative/dir"), "relative/dir");
    }

    #[test]
    fn expand_home_replaces_tilde() {
        let expanded = expand_home("~/.sift/models");
        if std::env::var("HOME").is_ok() {
            assert!(!expanded.starts_with('~'));
            assert!(expanded.ends_with("/.sift/models"));
        }
    }
}
