//! Interactive command parsing.

use thiserror::Error;

/// One line of interactive input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start loading the model.
    Load,
    /// Add a document.
    Add(String),
    /// Remove a document by its zero-based position.
    Remove(usize),
    /// Replace the query.
    Query(String),
    /// Rank all documents against the query.
    Compare,
    /// List documents.
    Docs,
    /// Show the last ranking.
    Results,
    /// Show model and session state.
    State,
    /// Show help.
    Help,
    /// Leave the session.
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// First word is not a command.
    #[error("unknown command `{0}`; type `help` for a list")]
    Unknown(String),
    /// Required argument missing.
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    /// Document number is not a positive integer.
    #[error("`{0}` is not a document number")]
    InvalidIndex(String),
}

/// Help text listing every command.
pub const HELP: &str = "\
commands:
  load            load the embedding model
  add <text>      add a document
  rm <n>          remove document number n
  query <text>    set the query (embedded after a short pause)
  query           clear the query
  compare         rank documents against the query
  docs            list documents
  results         show the last ranking
  state           show model and session state
  help            show this help
  quit            leave";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "load" => Command::Load,
        "add" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument("add"));
            }
            Command::Add(rest.to_string())
        }
        "rm" | "remove" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument("rm"));
            }
            match rest.parse::<usize>() {
                Ok(n) if n >= 1 => Command::Remove(n - 1),
                _ => return Err(CommandError::InvalidIndex(rest.to_string())),
            }
        }
        "query" | "q" => Command::Query(rest.to_string()),
        "compare" | "c" => Command::Compare,
        "docs" | "ls" => Command::Docs,
        "results" | "r" => Command::Results,
        "state" | "status" => Command::State,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}
