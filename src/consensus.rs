//! The engine: owns all persistent and volatile Raft state, the log store
//! handle, and the active role, and drives both from a single [`update`]
//! entry point.
//!
//! Grounded on the original `ConsensusModule`/`Tick` pair (a `cycle()` method
//! that mutates `(meta, state)` and appends to an out-parameter) and on
//! `RaftState::update(nowTime, outMessages)` for the per-role dispatch shape.
//! The 1-based indexing and `u64` terms fixed by this spec replace the
//! original's 0-based/`u32` lineage.

use crate::config::EngineConfig;
use crate::errors::{EngineError, NotLeaderError, Result};
use crate::log_store::LogStore;
use crate::message::{Message, MessageBody};
use crate::role::{candidate, follower, leader, replay, Intent, RoleState, Tick};
use crate::state_machine::StateMachine;
use crate::types::{Entry, LogIndex, NodeId, Role, Term};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub struct RaftEngine {
    id: NodeId,
    peers: Vec<NodeId>,

    current_term: Term,
    voted_for: Option<NodeId>,
    leader_id: Option<NodeId>,

    commit_index: LogIndex,
    last_applied: LogIndex,

    log: Box<dyn LogStore>,
    state_machine: Box<dyn StateMachine>,

    pub(crate) role: RoleState,
    config: EngineConfig,
    rng: StdRng,

    started: bool,
}

impl RaftEngine {
    pub(crate) fn new(
        id: NodeId,
        peers: Vec<NodeId>,
        log: Box<dyn LogStore>,
        state_machine: Box<dyn StateMachine>,
        config: EngineConfig,
        random_seed: Option<u64>,
    ) -> Self {
        let rng = match random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        RaftEngine {
            id,
            peers,
            current_term: 0,
            voted_for: None,
            leader_id: None,
            commit_index: 0,
            last_applied: 0,
            log,
            state_machine,
            role: RoleState::Replay,
            config,
            rng,
            started: false,
        }
    }

    /// Moves the engine out of construction and into Replay. Entries
    /// already on disk are presumed committed, matching the original
    /// `ConsensusModule::new`'s treatment of a recovered log.
    pub fn start(&mut self, _now: u64) {
        self.commit_index = self.log.last_index();
        self.started = true;
        tracing::info!(
            node_id = self.id,
            last_index = self.log.last_index(),
            "engine started in replay"
        );
    }

    /// The single driver. Feeds `inbound` to the active role, runs the
    /// apply pipeline, and returns the time the host should call `update`
    /// again by along with whatever needs to go out over the network.
    pub fn update(&mut self, now: u64, inbound: &[Message]) -> Result<(u64, Vec<Message>)> {
        if !self.started {
            self.start(now);
        }

        let mut tick = Tick::default();

        for msg in inbound {
            self.dispatch_message(msg.from, msg.body.clone(), now, &mut tick);
        }

        self.run_apply_pipeline()?;
        self.dispatch_tick(now, &mut tick);
        // A transition (e.g. Replay -> Follower) may have happened inside
        // dispatch_tick without touching the log; nothing more to apply,
        // but a transition triggered by message handling above already had
        // its chance via the call before dispatch_tick.

        let next_wake = self.compute_next_wake(now);
        Ok((next_wake, tick.outbound))
    }

    /// Appends a client command to the local log if this node is currently
    /// leader. Replication happens on the next `update`.
    pub fn propose(&mut self, value: Bytes) -> std::result::Result<LogIndex, NotLeaderError> {
        match &self.role {
            RoleState::Leader(_) => Ok(self
                .append_local(value)
                .expect("appending to the local log as leader must not fail the contiguity precondition")),
            _ => Err(NotLeaderError {
                leader_hint: self.leader_id,
            }),
        }
    }

    // -- observers -----------------------------------------------------

    pub fn current_term(&self) -> Term {
        self.current_term
    }

    pub fn leader_id(&self) -> Option<NodeId> {
        self.leader_id
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn commit_index(&self) -> LogIndex {
        self.commit_index
    }

    pub fn last_applied(&self) -> LogIndex {
        self.last_applied
    }

    pub fn current_role(&self) -> Role {
        self.role.tag()
    }

    // -- dispatch --------------------------------------------------------

    fn dispatch_message(&mut self, from: NodeId, body: MessageBody, now: u64, tick: &mut Tick) {
        let mut guard = 0u8;
        loop {
            guard += 1;
            if guard > 4 {
                tracing::error!(
                    from,
                    "dropping message after repeated role transitions while handling it"
                );
                return;
            }

            let role_tag = self.role.tag();
            let intent = Self::dispatch_one(self, role_tag, from, body.clone(), now, tick);
            match intent {
                Intent::Stay => return,
                Intent::TransitionTo(new_role) => {
                    // Reprocess the same message under the new role, per
                    // the Candidate-receives-AppendEntries step-down rule
                    // (and generalized to every step-down-on-message case).
                    self.apply_transition(new_role, now, tick);
                }
            }
        }
    }

    fn dispatch_one(
        engine: &mut RaftEngine,
        role_tag: Role,
        from: NodeId,
        body: MessageBody,
        now: u64,
        tick: &mut Tick,
    ) -> Intent {
        use MessageBody::*;
        match (role_tag, body) {
            (Role::Replay, _) => Intent::Stay,

            (Role::Follower, AppendEntriesRequest(req)) => {
                follower::on_append_entries(engine, from, req, now, tick)
            }
            (Role::Follower, RequestVoteRequest(req)) => {
                follower::on_request_vote(engine, from, req, now, tick)
            }
            (Role::Follower, AppendEntriesResponse(_)) => Intent::Stay,
            (Role::Follower, RequestVoteResponse(_)) => Intent::Stay,

            (Role::Candidate, RequestVoteResponse(resp)) => {
                candidate::on_request_vote_response(engine, from, resp, now)
            }
            (Role::Candidate, RequestVoteRequest(req)) => {
                candidate::on_request_vote(engine, from, req, now, tick)
            }
            (Role::Candidate, AppendEntriesRequest(req)) => {
                candidate::on_append_entries(engine, from, req, now, tick)
            }
            (Role::Candidate, AppendEntriesResponse(_)) => Intent::Stay,

            (Role::Leader, AppendEntriesResponse(resp)) => {
                leader::on_append_entries_response(engine, from, resp, now)
            }
            (Role::Leader, RequestVoteRequest(req)) => {
                leader::on_request_vote(engine, from, req, now, tick)
            }
            (Role::Leader, AppendEntriesRequest(req)) => {
                leader::on_append_entries(engine, from, req, now, tick)
            }
            (Role::Leader, RequestVoteResponse(_)) => Intent::Stay,
        }
    }

    fn dispatch_tick(&mut self, now: u64, tick: &mut Tick) {
        let mut guard = 0u8;
        loop {
            guard += 1;
            if guard > 8 {
                tracing::error!("tick handling looped too many times in a single update");
                return;
            }

            let intent = match self.role.tag() {
                Role::Replay => replay::on_tick(self, now, tick),
                Role::Follower => follower::on_tick(self, now, tick),
                Role::Candidate => candidate::on_tick(self, now, tick),
                Role::Leader => leader::on_tick(self, now, tick),
            };

            match intent {
                Intent::Stay => return,
                Intent::TransitionTo(new_role) => self.apply_transition(new_role, now, tick),
            }
        }
    }

    fn apply_transition(&mut self, new_role: RoleState, now: u64, tick: &mut Tick) {
        let from = self.role.tag();
        self.role = new_role;
        let to = self.role.tag();
        tracing::info!(term = self.current_term, %from, %to, "role transition");

        match to {
            Role::Follower => follower::on_enter(self, now),
            Role::Candidate => candidate::on_enter(self, now, tick),
            Role::Leader => leader::on_enter(self, now, tick),
            Role::Replay => {}
        }
    }

    fn compute_next_wake(&self, now: u64) -> u64 {
        if self.last_applied < self.commit_index {
            return now;
        }

        match &self.role {
            RoleState::Replay => now,
            RoleState::Follower(s) => s.next_election,
            RoleState::Candidate(s) => s.vote_deadline,
            RoleState::Leader(s) => {
                let heartbeat = self.config.heartbeat_interval_ms as u64;
                let mut earliest = now + heartbeat;
                for progress in s.peers.values() {
                    let candidate = match progress.last_sent {
                        Some(sent) => sent + heartbeat,
                        None => now,
                    };
                    if candidate < earliest {
                        earliest = candidate;
                    }
                }
                earliest
            }
        }
    }

    // -- apply pipeline (§4.6) -------------------------------------------

    fn run_apply_pipeline(&mut self) -> Result<()> {
        let budget = self.config.max_apply_per_update as u64;
        let mut applied = 0u64;

        while self.last_applied < self.commit_index && applied < budget {
            let index = self.last_applied + 1;
            let entries = self
                .log
                .get_entries(index, index, usize::MAX)
                .map_err(EngineError::Storage)?;
            let entry = entries
                .into_iter()
                .next()
                .expect("get_entries(index, index, ..) must return the entry at a committed index");
            self.state_machine.apply(entry.index, &entry.value);
            self.last_applied = entry.index;
            applied += 1;
        }

        Ok(())
    }

    // -- helpers used by the role modules ---------------------------------

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn peers(&self) -> &[NodeId] {
        &self.peers
    }

    pub(crate) fn quorum_size(&self) -> usize {
        (self.peers.len() + 1) / 2 + 1
    }

    pub(crate) fn role(&self) -> &RoleState {
        &self.role
    }

    pub(crate) fn role_mut(&mut self) -> &mut RoleState {
        &mut self.role
    }

    pub(crate) fn set_current_term(&mut self, term: Term) {
        self.current_term = term;
    }

    pub(crate) fn set_voted_for(&mut self, voted_for: Option<NodeId>) {
        self.voted_for = voted_for;
    }

    pub(crate) fn set_leader_id(&mut self, leader_id: Option<NodeId>) {
        self.leader_id = leader_id;
    }

    /// Common Raft safety rule: whenever a higher term is observed in any
    /// request or response, adopt it and forget any vote cast in the old
    /// term.
    pub(crate) fn observe_term(&mut self, term: Term) {
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
        }
    }

    pub(crate) fn election_timeout_ms(&self) -> u32 {
        self.config.election_timeout_ms
    }

    pub(crate) fn vote_timeout_ms(&self) -> (u32, u32) {
        self.config.vote_timeout_ms
    }

    pub(crate) fn heartbeat_interval_ms(&self) -> u32 {
        self.config.heartbeat_interval_ms
    }

    pub(crate) fn max_entries_per_append(&self) -> u32 {
        self.config.max_entries_per_append
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub(crate) fn log_last_index(&self) -> LogIndex {
        self.log.last_index()
    }

    pub(crate) fn log_term_at(&self, index: LogIndex) -> Term {
        self.log
            .term_at(index)
            .expect("term_at(index) within the log's valid range must not fail")
    }

    pub(crate) fn last_log_position(&self) -> (LogIndex, Term) {
        let index = self.log.last_index();
        (index, self.log.term_at(index).unwrap_or(0))
    }

    pub(crate) fn log_entries(&self, start: LogIndex, stop: LogIndex) -> Vec<Entry> {
        if start > stop {
            return Vec::new();
        }
        self.log
            .get_entries(start, stop, usize::MAX)
            .expect("get_entries within the log's valid range must not fail")
    }

    /// Appends a single entry authored by this node (a client proposal, or
    /// the automatic no-op a freshly elected leader issues to make prior
    /// terms' entries committable) in the current term.
    pub(crate) fn append_local(&mut self, value: Bytes) -> Result<LogIndex> {
        let index = self.log.last_index() + 1;
        let term = self.current_term;
        self.log
            .append(&[Entry::new(index, term, value)])
            .map_err(EngineError::Storage)?;
        Ok(index)
    }

    /// Reconciles an AppendEntries request's entries against the local log:
    /// skips already-present matching entries, truncates a conflicting
    /// suffix, and appends whatever is new. Grounded on §4.3 step 5 / the
    /// Log Matching property.
    pub(crate) fn reconcile_entries(&mut self, incoming: &[Entry]) {
        let mut first_new = 0;
        for entry in incoming {
            if entry.index > self.log.last_index() {
                break;
            }
            let existing_term = self
                .log
                .term_at(entry.index)
                .expect("index already checked to be within the log's range");
            if existing_term == entry.term {
                first_new += 1;
            } else {
                self.log
                    .remove_suffix(entry.index)
                    .expect("entry.index is within 1..=last_index by the loop guard above");
                break;
            }
        }

        if first_new < incoming.len() {
            self.log
                .append(&incoming[first_new..])
                .expect("the leader is only ever asked to reconcile a contiguous, term-monotone suffix");
        }
    }

    pub(crate) fn advance_commit_index(&mut self, new_commit: LogIndex) {
        if new_commit > self.commit_index {
            tracing::debug!(commit_index = new_commit, "commit index advanced");
            self.commit_index = new_commit;
        }
    }

    /// Leader-only: recomputes the highest index replicated on a quorum
    /// under the current term and, if higher than the current commit
    /// index, advances it. This is Raft's safety rule that forbids
    /// committing a previous term's entry by replica count alone (§4.5).
    pub(crate) fn recompute_commit_index(&mut self) {
        let quorum = self.quorum_size();
        let last_index = self.log.last_index();
        let current_term = self.current_term;

        let match_indices: Vec<LogIndex> = match &self.role {
            RoleState::Leader(s) => s.peers.values().map(|p| p.match_index).collect(),
            _ => return,
        };

        let mut candidate_commit = self.commit_index;
        let mut probe = last_index;
        while probe > self.commit_index {
            if self.log.term_at(probe).unwrap_or(0) != current_term {
                probe -= 1;
                continue;
            }
            // Count replicas at or beyond `probe`, including ourselves.
            let count = 1 + match_indices.iter().filter(|&&m| m >= probe).count();
            if count >= quorum {
                candidate_commit = probe;
                break;
            }
            probe -= 1;
        }

        self.advance_commit_index(candidate_commit);
    }
}
