//! # sift
//!
//! Rank short documents by semantic similarity to a query, entirely on the
//! local machine. Runs an interactive session by default; `sift rank`
//! ranks once and prints JSON.

#![deny(unsafe_code)]

mod cli;
mod commands;
mod oneshot;
mod render;
mod repl;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sift_embeddings::{EmbeddingConfig, EmbeddingService};
use sift_session::SessionController;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings first: they carry the log level.
    let settings = cli.resolve_settings()?;
    sift_logging::init_subscriber(settings.logging.level.as_filter_str());
    tracing::info!(
        backend = settings.embedding.backend.as_str(),
        model = %settings.embedding.model,
        "starting sift"
    );

    let config = EmbeddingConfig::from_settings(&settings.embedding);
    let service = Arc::new(
        EmbeddingService::from_config(&config).context("Failed to set up embedding backend")?,
    );

    match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => {
            let controller = SessionController::from_settings(service, &settings.session);
            repl::run(controller).await
        }
        Command::Rank { query, docs } => {
            let json = oneshot::rank_json(&service, &query, &docs).await?;
            println!("{json}");
            Ok(())
        }
    }
}
