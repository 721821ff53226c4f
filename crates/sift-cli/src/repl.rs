//! Line-oriented interactive session.

use std::io::Write;
use std::ops::ControlFlow;

use anyhow::{Context, Result};
use sift_session::{CompareOutcome, SessionController, SessionSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::commands::{self, Command, HELP};
use crate::render;

/// Read commands from stdin until `quit`, end of input, or Ctrl-C.
pub async fn run(controller: SessionController) -> Result<()> {
    println!("sift: type `load` to load the model, `help` for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match commands::parse(&line) {
            Ok(Some(command)) => {
                if execute(&controller, command).await.is_break() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }

    debug!("interactive session ended");
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush().context("Failed to flush stdout")
}

async fn execute(controller: &SessionController, command: Command) -> ControlFlow<()> {
    match command {
        Command::Load => start_load(controller),
        Command::Add(text) => {
            if !controller.service().is_ready() {
                println!("load the model first (`load`)");
                return ControlFlow::Continue(());
            }
            match controller.add_document(&text).await {
                Ok(Some(_)) => println!(
                    "added document {}",
                    controller.snapshot().session.documents.len()
                ),
                Ok(None) => {}
                Err(e) => println!("Could not embed the document: {e} (kept without embedding)"),
            }
        }
        Command::Remove(index) => match controller.remove_document(index) {
            Some(doc) => println!("removed: {}", doc.text),
            None => println!("no document {}", index + 1),
        },
        Command::Query(text) => {
            controller.set_query(&text);
            if text.trim().is_empty() {
                println!("query cleared");
            } else if !controller.service().is_ready() {
                println!("query set; it will be embedded once the model is loaded and the query changes");
            }
        }
        Command::Compare => match controller.compare().await {
            Ok(CompareOutcome::Ranked(_)) => {
                println!("{}", render::results(&controller.snapshot().session.ranked_results));
            }
            Ok(CompareOutcome::Skipped) => println!("{}", skip_reason(&controller.snapshot())),
            Err(e) => println!("An error occurred during processing: {e}"),
        },
        Command::Docs => println!("{}", render::documents(&controller.snapshot())),
        Command::Results => {
            println!("{}", render::results(&controller.snapshot().session.ranked_results));
        }
        Command::State => println!("{}", render::state(&controller.snapshot())),
        Command::Help => println!("{HELP}"),
        Command::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

/// Load in the background so the prompt stays usable; progress is printed
/// as it arrives.
fn start_load(controller: &SessionController) {
    let state = controller.service().state();
    if state.is_ready() {
        println!("model already loaded");
        return;
    }
    if state.is_loading() {
        println!("model is already loading");
        return;
    }

    let controller = controller.clone();
    drop(tokio::spawn(async move {
        match controller.request_load_with(|p| println!("{p}")).await {
            Ok(()) => println!("model ready"),
            Err(e) => println!("Failed to load the model: {e}. Try `load` again."),
        }
    }));
}

/// Why a compare did not run.
fn skip_reason(snapshot: &SessionSnapshot) -> &'static str {
    if !snapshot.model_state.is_ready() {
        "load the model first (`load`)"
    } else if snapshot.comparing() {
        "a compare is already running"
    } else if snapshot.session.query.trim().is_empty() {
        "set a query first (`query <text>`)"
    } else if snapshot.session.documents.is_empty() {
        "add at least one document first (`add <text>`)"
    } else {
        "nothing to compare"
    }
}
