//! Command-line arguments and settings resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sift_settings::{EmbeddingBackend, LogLevel, SiftSettings};

/// Rank documents by semantic similarity to a query, locally.
#[derive(Parser, Debug)]
#[command(name = "sift", version, about)]
pub struct Cli {
    /// Settings file (defaults to `~/.sift/settings.json`).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Embedding backend (overrides settings).
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Log level for stderr output (overrides settings; `RUST_LOG` wins).
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevelArg>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to run.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Interactive session (the default).
    Repl,
    /// Rank documents once and print the ranking as JSON.
    Rank {
        /// Query text.
        #[arg(long, short)]
        query: String,
        /// Document text; repeat for each document.
        #[arg(long = "doc", short = 'd', required = true)]
        docs: Vec<String>,
    },
}

/// `--backend` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// ONNX Runtime neural model.
    Onnx,
    /// Offline feature hashing.
    Hashing,
}

impl From<BackendArg> for EmbeddingBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Onnx => Self::Onnx,
            BackendArg::Hashing => Self::Hashing,
        }
    }
}

/// `--log-level` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    /// Most verbose.
    Trace,
    /// Debug.
    Debug,
    /// Info.
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Trace => Self::Trace,
            LogLevelArg::Debug => Self::Debug,
            LogLevelArg::Info => Self::Info,
            LogLevelArg::Warn => Self::Warn,
            LogLevelArg::Error => Self::Error,
        }
    }
}

impl Cli {
    /// Load settings from file and env, then apply command-line overrides.
    pub fn resolve_settings(&self) -> Result<SiftSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(sift_settings::settings_path);
        let mut settings = sift_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply_overrides(&mut settings);
        Ok(settings)
    }

    fn apply_overrides(&self, settings: &mut SiftSettings) {
        if let Some(backend) = self.backend {
            settings.embedding.backend = backend.into();
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level.into();
        }
    }
}
