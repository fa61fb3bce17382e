//! Follower: the passive, default role. Waits for AppendEntries from the
//! current leader; starts an election if none arrives before the election
//! deadline.

use super::Intent;
use crate::consensus::RaftEngine;
use crate::message::{
    AppendEntriesRequest, AppendEntriesResponse, MessageBody, RequestVoteRequest,
    RequestVoteResponse,
};
use crate::role::{candidate, FollowerState, RoleState, Tick};
use crate::types::NodeId;

/// Builds a fresh `FollowerState` with the election deadline reset from
/// `now`.
pub(crate) fn new_state(engine: &RaftEngine, now: u64) -> FollowerState {
    FollowerState {
        next_election: now + engine.election_timeout_ms() as u64,
    }
}

pub(crate) fn on_enter(engine: &mut RaftEngine, now: u64) {
    tracing::debug!(term = engine.current_term(), "became follower");
    let state = new_state(engine, now);
    if let RoleState::Follower(s) = engine.role_mut() {
        *s = state;
    }
}

pub(crate) fn on_tick(engine: &mut RaftEngine, now: u64, _tick: &mut Tick) -> Intent {
    let next_election = match &engine.role() {
        RoleState::Follower(s) => s.next_election,
        _ => unreachable!("on_tick dispatched to follower while role is not Follower"),
    };

    if now >= next_election {
        tracing::info!(term = engine.current_term(), "election timeout elapsed");
        Intent::TransitionTo(candidate::begin(engine, now))
    } else {
        Intent::Stay
    }
}

pub(crate) fn on_request_vote(
    engine: &mut RaftEngine,
    from: NodeId,
    req: RequestVoteRequest,
    now: u64,
    tick: &mut Tick,
) -> Intent {
    if req.term < engine.current_term() {
        tick.send(
            from,
            engine.id(),
            MessageBody::RequestVoteResponse(RequestVoteResponse {
                term: engine.current_term(),
                granted: false,
            }),
        );
        return Intent::Stay;
    }

    if req.term > engine.current_term() {
        engine.observe_term(req.term);
    }

    let (last_log_index, last_log_term) = engine.last_log_position();
    let log_up_to_date = req.last_log_term > last_log_term
        || (req.last_log_term == last_log_term && req.last_log_index >= last_log_index);

    let already_voted_for_other = matches!(engine.voted_for(), Some(id) if id != req.candidate_id);
    let granted = !already_voted_for_other && log_up_to_date;

    if granted {
        engine.set_voted_for(Some(req.candidate_id));
        if let RoleState::Follower(s) = engine.role_mut() {
            s.next_election = now + engine.election_timeout_ms() as u64;
        }
        tracing::debug!(candidate = req.candidate_id, term = req.term, "granted vote");
    }

    tick.send(
        from,
        engine.id(),
        MessageBody::RequestVoteResponse(RequestVoteResponse {
            term: engine.current_term(),
            granted,
        }),
    );
    Intent::Stay
}

pub(crate) fn on_append_entries(
    engine: &mut RaftEngine,
    from: NodeId,
    req: AppendEntriesRequest,
    now: u64,
    tick: &mut Tick,
) -> Intent {
    if req.term < engine.current_term() {
        tick.send(
            from,
            engine.id(),
            MessageBody::AppendEntriesResponse(AppendEntriesResponse {
                term: engine.current_term(),
                success: false,
                ack_index: engine.log_last_index(),
            }),
        );
        return Intent::Stay;
    }

    if req.term > engine.current_term() {
        engine.observe_term(req.term);
    }

    engine.set_leader_id(Some(req.leader_id));
    if let RoleState::Follower(s) = engine.role_mut() {
        s.next_election = now + engine.election_timeout_ms() as u64;
    }

    if req.prev_log_index > 0
        && (req.prev_log_index > engine.log_last_index()
            || engine.log_term_at(req.prev_log_index) != req.prev_log_term)
    {
        tick.send(
            from,
            engine.id(),
            MessageBody::AppendEntriesResponse(AppendEntriesResponse {
                term: engine.current_term(),
                success: false,
                ack_index: engine.log_last_index(),
            }),
        );
        return Intent::Stay;
    }

    engine.reconcile_entries(&req.entries);

    if req.leader_commit > engine.commit_index() {
        let new_commit = req.leader_commit.min(engine.log_last_index());
        engine.advance_commit_index(new_commit);
    }

    tick.send(
        from,
        engine.id(),
        MessageBody::AppendEntriesResponse(AppendEntriesResponse {
            term: engine.current_term(),
            success: true,
            ack_index: engine.log_last_index(),
        }),
    );
    Intent::Stay
}
