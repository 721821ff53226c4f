//! # sift-session
//!
//! Interactive ranking session: the user adds and removes documents, edits
//! a query that is embedded live after a quiet period, and asks for a full
//! compare that ranks every document against the query.
//!
//! [`SessionController`] coordinates these actions with the readiness of a
//! shared [`sift_embeddings::EmbeddingService`]. Presentation layers read
//! [`SessionSnapshot`]s and subscribe to changes; they never mutate state
//! directly.

#![deny(unsafe_code)]

pub mod controller;
pub mod debounce;

pub use controller::{
    CompareOutcome, Document, DocumentId, Phase, SessionController, SessionSnapshot, SessionState,
};
pub use debounce::Debouncer;
