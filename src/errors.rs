//! Error taxonomy for the engine.
//!
//! Precondition violations (bad index, non-contiguous append) are programmer
//! errors and are expected to `panic!` inside a `LogStore` implementation
//! rather than round-trip through `Result` — see `store::MemoryLogStore` for
//! the reference behavior. Everything a `LogStore` *does* return as an `Err`
//! is treated by the engine as fatal and bubbles out of `update`/`propose`
//! unchanged; the engine never retries I/O on its own.

use crate::types::{LogIndex, NodeId, Term};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures a `LogStore` implementation can report. Reserved for conditions a
/// caller cannot have avoided by respecting the contract in
/// [`crate::log_store::LogStore`] (i.e. not programmer errors).
#[derive(Error, Debug)]
pub enum LogStoreError {
    #[error("log index {index} is out of range (last_index = {last_index})")]
    IndexOutOfRange { index: LogIndex, last_index: LogIndex },

    #[error("term would go backward at index {index}: stored term {existing}, incoming term {incoming}")]
    TermGoesBackward {
        index: LogIndex,
        existing: Term,
        incoming: Term,
    },

    #[error("log store I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error returned by [`crate::RaftEngine::update`]. The only
/// variant the engine itself produces; a fatal log-store failure poisons the
/// engine for the rest of its lifetime, since state mutations may have been
/// applied on one side of the log-store call but not persisted.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] LogStoreError),
}

/// Returned by [`crate::RaftEngine::propose`] when the engine is not
/// currently the leader. Carries the last node this engine believes to be
/// leader, if any, so the caller can retry against it directly.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("not the leader (leader_hint = {leader_hint:?})")]
pub struct NotLeaderError {
    pub leader_hint: Option<NodeId>,
}
