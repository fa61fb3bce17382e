//! Per-role state and the message-handling code for each of the four roles.
//!
//! The distilled spec's design notes considered two ways to re-architect the
//! original "role holds a reference back to its engine" relationship
//! (inherently cyclic, and awkward to express without unsafe code or `Rc`):
//! pass the engine into each role function, or have role functions return an
//! intent value the engine applies. This crate does both, split by what each
//! needs: role functions take `&mut RaftEngine` directly (so they can read
//! and mutate shared state like `current_term` without a parallel copy), and
//! additionally return an [`Intent`] so the engine — not the role itself —
//! is responsible for actually swapping `self.role` and invoking the new
//! role's `on_enter`. This keeps the "replace the sum variant in the owning
//! field" pattern the distilled spec recommends, while avoiding the
//! each-role-mutates-engine-state-AND-decides-its-own-successor tangle the
//! original C++ hierarchy has.

pub mod candidate;
pub mod follower;
pub mod leader;
pub mod replay;

use crate::message::Message;
use crate::types::{LogIndex, NodeId};
use std::collections::HashSet;

/// Accumulates the side effects of a single round of role handling: outbound
/// messages and whether the engine needs to be woken again immediately
/// (rather than waiting for the next computed deadline).
#[derive(Debug, Default)]
pub struct Tick {
    pub outbound: Vec<Message>,
    pub wake_immediately: bool,
}

impl Tick {
    pub fn send(&mut self, to: NodeId, from: NodeId, body: crate::message::MessageBody) {
        self.outbound.push(Message { from, to, body });
    }
}

/// What a role handler wants to happen next. The engine applies this after
/// the handler returns; it never mutates `self.role` itself.
pub enum Intent {
    Stay,
    TransitionTo(RoleState),
}

/// Per-variant bookkeeping for each of the four roles. This is the private
/// counterpart to the public, data-less [`crate::types::Role`] tag.
pub enum RoleState {
    Replay,
    Follower(FollowerState),
    Candidate(CandidateState),
    Leader(LeaderState),
}

impl RoleState {
    pub fn tag(&self) -> crate::types::Role {
        match self {
            RoleState::Replay => crate::types::Role::Replay,
            RoleState::Follower(_) => crate::types::Role::Follower,
            RoleState::Candidate(_) => crate::types::Role::Candidate,
            RoleState::Leader(_) => crate::types::Role::Leader,
        }
    }
}

pub struct FollowerState {
    pub next_election: u64,
}

pub struct CandidateState {
    pub vote_deadline: u64,
    pub votes_received: HashSet<NodeId>,
}

/// Per-follower replication bookkeeping the leader maintains. Named
/// `PeerProgress` in the spec; mirrors the original `Leader::node` struct
/// (`nextLogIndex`/`replyLogindex`/`matchLogIndex`) with the addition of
/// `wait_index`, which the distilled spec uses to bound in-flight requests
/// per peer to one at a time.
pub struct PeerProgress {
    pub next_index: LogIndex,
    pub match_index: LogIndex,
    /// `Some(index)` while an AppendEntries carrying entries up to `index`
    /// is outstanding to this peer; cleared when a response arrives or the
    /// heartbeat deadline forces a retransmit.
    pub wait_index: Option<LogIndex>,
    pub last_sent: Option<u64>,
}

impl PeerProgress {
    pub fn new(last_log_index: LogIndex) -> Self {
        PeerProgress {
            next_index: last_log_index + 1,
            match_index: 0,
            wait_index: None,
            last_sent: None,
        }
    }
}

pub struct LeaderState {
    pub peers: std::collections::HashMap<NodeId, PeerProgress>,
}
