//! Candidate: campaigning for votes in a freshly incremented term.

use super::Intent;
use crate::consensus::RaftEngine;
use crate::message::{
    AppendEntriesRequest, MessageBody, RequestVoteRequest, RequestVoteResponse,
};
use crate::role::{follower, CandidateState, RoleState, Tick};
use crate::types::NodeId;
use rand::Rng;
use std::collections::HashSet;

/// Starts (or restarts) an election: increments the term, votes for self,
/// and picks a fresh randomized vote deadline. Does not itself broadcast
/// `RequestVote` — that happens in [`on_enter`], once the engine has
/// actually swapped `self.role` to the returned state, so the broadcast
/// reads consistent, already-updated engine state.
pub(crate) fn begin(engine: &mut RaftEngine, now: u64) -> RoleState {
    engine.set_current_term(engine.current_term() + 1);
    engine.set_voted_for(Some(engine.id()));
    engine.set_leader_id(None);

    let (lo, hi) = engine.vote_timeout_ms();
    let jitter = if hi > lo {
        engine.rng_mut().gen_range(lo..hi)
    } else {
        lo
    };

    let mut votes_received = HashSet::new();
    votes_received.insert(engine.id());

    tracing::info!(term = engine.current_term(), "starting election");

    RoleState::Candidate(CandidateState {
        vote_deadline: now + jitter as u64,
        votes_received,
    })
}

pub(crate) fn on_enter(engine: &mut RaftEngine, now: u64, tick: &mut Tick) {
    let (last_log_index, last_log_term) = engine.last_log_position();
    let req = RequestVoteRequest {
        term: engine.current_term(),
        candidate_id: engine.id(),
        last_log_index,
        last_log_term,
    };
    let self_id = engine.id();
    for peer in engine.peers().to_vec() {
        tick.send(peer, self_id, MessageBody::RequestVoteRequest(req.clone()));
    }
    let _ = now;
}

pub(crate) fn on_tick(engine: &mut RaftEngine, now: u64, _tick: &mut Tick) -> Intent {
    let vote_deadline = match engine.role() {
        RoleState::Candidate(s) => s.vote_deadline,
        _ => unreachable!("on_tick dispatched to candidate while role is not Candidate"),
    };

    if now >= vote_deadline {
        Intent::TransitionTo(begin(engine, now))
    } else {
        Intent::Stay
    }
}

pub(crate) fn on_request_vote_response(
    engine: &mut RaftEngine,
    from: NodeId,
    resp: RequestVoteResponse,
    _now: u64,
) -> Intent {
    if resp.term > engine.current_term() {
        engine.observe_term(resp.term);
        return Intent::TransitionTo(RoleState::Follower(follower::new_state(engine, _now)));
    }

    if resp.term != engine.current_term() || !resp.granted {
        return Intent::Stay;
    }

    if from == engine.id() {
        return Intent::Stay;
    }

    let became_leader = match engine.role_mut() {
        RoleState::Candidate(s) => {
            s.votes_received.insert(from);
            s.votes_received.len() >= engine.quorum_size()
        }
        _ => false,
    };

    if became_leader {
        Intent::TransitionTo(super::leader::begin(engine))
    } else {
        Intent::Stay
    }
}

/// Candidates never grant votes to anyone but themselves within the same
/// term: a server only becomes a candidate after voting for itself in that
/// term, so there is nothing left to decide here unless the requester's
/// term is strictly newer, in which case stepping down to Follower lets
/// that role's own handler decide.
pub(crate) fn on_request_vote(
    engine: &mut RaftEngine,
    from: NodeId,
    req: RequestVoteRequest,
    now: u64,
    tick: &mut Tick,
) -> Intent {
    if req.term > engine.current_term() {
        return Intent::TransitionTo(RoleState::Follower(follower::new_state(engine, now)));
    }

    tick.send(
        from,
        engine.id(),
        MessageBody::RequestVoteResponse(RequestVoteResponse {
            term: engine.current_term(),
            granted: false,
        }),
    );
    Intent::Stay
}

/// If another node claims leadership at or above our term, it wins: we
/// step down and let Follower's handler reply. Otherwise it's a stale
/// leader and we refuse.
pub(crate) fn on_append_entries(
    engine: &mut RaftEngine,
    from: NodeId,
    req: AppendEntriesRequest,
    now: u64,
    tick: &mut Tick,
) -> Intent {
    if req.term >= engine.current_term() {
        return Intent::TransitionTo(RoleState::Follower(follower::new_state(engine, now)));
    }

    use crate::message::AppendEntriesResponse;
    tick.send(
        from,
        engine.id(),
        MessageBody::AppendEntriesResponse(AppendEntriesResponse {
            term: engine.current_term(),
            success: false,
            ack_index: engine.log_last_index(),
        }),
    );
    Intent::Stay
}
