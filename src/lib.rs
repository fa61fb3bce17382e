//! A single-threaded, tick-driven Raft consensus engine.
//!
//! The host owns the clock and the network: it calls [`RaftEngine::update`] in
//! a loop, handing in whatever messages arrived since the last call, and gets
//! back the messages to send out plus the time it should call `update` again
//! by. Everything in between — elections, log replication, commit advancement,
//! applying entries to the state machine — happens synchronously inside that
//! call.

pub mod config;
pub mod consensus;
pub mod errors;
pub mod log_store;
pub mod message;
mod role;
pub mod state_machine;
pub mod store;
pub mod types;

pub use config::RaftEngineBuilder;
pub use consensus::RaftEngine;
pub use errors::{EngineError, LogStoreError, NotLeaderError, Result};
pub use log_store::LogStore;
pub use message::{
    AppendEntriesRequest, AppendEntriesResponse, Message, MessageBody, RequestVoteRequest,
    RequestVoteResponse,
};
pub use state_machine::StateMachine;
pub use store::MemoryLogStore;
pub use types::{Entry, LogIndex, NodeId, Role, Term};
