//! The wire message types the engine exchanges with peers.
//!
//! Encoding is the host's concern: the engine takes already-parsed inbound
//! [`Message`] values and returns outbound ones by value. This mirrors the
//! original `pb::RaftMsg` design but drops the protobuf dependency and the
//! fields tied to membership changes and snapshots, neither of which this
//! engine implements.

use crate::types::{Entry, LogIndex, NodeId, Term};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppendEntriesRequest {
    pub term: Term,
    pub leader_id: NodeId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<Entry>,
    pub leader_commit: LogIndex,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppendEntriesResponse {
    pub term: Term,
    pub success: bool,
    /// The index of the last entry the follower now stores, regardless of
    /// success or failure. On success this lets the leader advance
    /// `match_index`/`next_index` past what it asked for if the follower
    /// already had more; on failure it lets the leader jump `next_index`
    /// down in one step instead of decrementing one at a time.
    pub ack_index: LogIndex,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestVoteRequest {
    pub term: Term,
    pub candidate_id: NodeId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestVoteResponse {
    pub term: Term,
    pub granted: bool,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageBody {
    AppendEntriesRequest(AppendEntriesRequest),
    AppendEntriesResponse(AppendEntriesResponse),
    RequestVoteRequest(RequestVoteRequest),
    RequestVoteResponse(RequestVoteResponse),
}

/// An envelope around a [`MessageBody`] carrying the sender and recipient.
/// The engine only ever sets `from` to its own id and `to` to a single peer;
/// the host is responsible for actual delivery.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    pub from: NodeId,
    pub to: NodeId,
    pub body: MessageBody,
}
