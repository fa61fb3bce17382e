//! Leader: replicates the log to every peer and advances the commit index
//! once a quorum has durably stored an entry from the current term.

use super::Intent;
use crate::consensus::RaftEngine;
use crate::message::{
    AppendEntriesRequest, AppendEntriesResponse, MessageBody, RequestVoteRequest,
    RequestVoteResponse,
};
use crate::role::{follower, LeaderState, PeerProgress, RoleState, Tick};
use crate::types::NodeId;
use std::collections::HashMap;

/// Builds the peer progress table for a freshly elected leader. Broadcasting
/// the initial heartbeat happens in [`on_enter`], once the role swap has
/// actually taken effect.
pub(crate) fn begin(engine: &mut RaftEngine) -> RoleState {
    let last_log_index = engine.log_last_index();
    let mut peers = HashMap::new();
    for peer in engine.peers().to_vec() {
        peers.insert(peer, PeerProgress::new(last_log_index));
    }
    engine.set_leader_id(Some(engine.id()));
    tracing::info!(term = engine.current_term(), "became leader");
    RoleState::Leader(LeaderState { peers })
}

pub(crate) fn on_enter(engine: &mut RaftEngine, now: u64, tick: &mut Tick) {
    // A newly elected leader may hold uncommitted entries from a prior term
    // that can never be committed by replica count alone (the current-term
    // safety rule in `recompute_commit_index` forbids it). Proposing an
    // empty entry in the new term gives those older entries a current-term
    // entry after them to "ride along" with once a quorum has replicated up
    // to and past them.
    if engine.log_last_index() > engine.commit_index() {
        let _ = engine.append_local(bytes::Bytes::new());
    }
    replicate(engine, now, tick);
}

pub(crate) fn on_tick(engine: &mut RaftEngine, now: u64, tick: &mut Tick) -> Intent {
    replicate(engine, now, tick);
    Intent::Stay
}

/// Sends AppendEntries (possibly empty, i.e. a heartbeat) to every peer that
/// is not currently owed a response and is either behind or overdue for a
/// heartbeat.
fn replicate(engine: &mut RaftEngine, now: u64, tick: &mut Tick) {
    let heartbeat_interval = engine.heartbeat_interval_ms() as u64;
    let max_entries = engine.max_entries_per_append() as u64;
    let term = engine.current_term();
    let leader_id = engine.id();
    let leader_commit = engine.commit_index();
    let last_log_index = engine.log_last_index();

    let peer_ids: Vec<NodeId> = match engine.role() {
        RoleState::Leader(s) => s.peers.keys().copied().collect(),
        _ => return,
    };

    for peer in peer_ids {
        let should_send = {
            let progress = match engine.role() {
                RoleState::Leader(s) => s.peers.get(&peer).expect("peer progress must exist"),
                _ => return,
            };
            if progress.wait_index.is_some() {
                // Still waiting on a reply; only retransmit once the
                // heartbeat deadline has elapsed.
                match progress.last_sent {
                    Some(sent) => now.saturating_sub(sent) >= heartbeat_interval,
                    None => true,
                }
            } else if progress.match_index < last_log_index {
                true
            } else {
                match progress.last_sent {
                    Some(sent) => now.saturating_sub(sent) >= heartbeat_interval,
                    None => true,
                }
            }
        };

        if !should_send {
            continue;
        }

        let next_index = match engine.role() {
            RoleState::Leader(s) => s.peers[&peer].next_index,
            _ => return,
        };
        let prev_log_index = next_index - 1;
        let prev_log_term = engine.log_term_at(prev_log_index);
        let stop = last_log_index.min(prev_log_index + max_entries);
        let entries = if next_index <= last_log_index {
            engine.log_entries(next_index, stop)
        } else {
            Vec::new()
        };
        let send_up_to = entries.last().map(|e| e.index).unwrap_or(prev_log_index);

        tick.send(
            peer,
            leader_id,
            MessageBody::AppendEntriesRequest(AppendEntriesRequest {
                term,
                leader_id,
                prev_log_index,
                prev_log_term,
                entries,
                leader_commit,
            }),
        );

        if let RoleState::Leader(s) = engine.role_mut() {
            if let Some(progress) = s.peers.get_mut(&peer) {
                progress.wait_index = Some(send_up_to);
                progress.last_sent = Some(now);
            }
        }
    }
}

pub(crate) fn on_append_entries_response(
    engine: &mut RaftEngine,
    from: NodeId,
    resp: AppendEntriesResponse,
    now: u64,
) -> Intent {
    if resp.term > engine.current_term() {
        engine.observe_term(resp.term);
        return Intent::TransitionTo(RoleState::Follower(follower::new_state(engine, now)));
    }

    if resp.success {
        if let RoleState::Leader(s) = engine.role_mut() {
            if let Some(progress) = s.peers.get_mut(&from) {
                progress.match_index = progress.match_index.max(resp.ack_index);
                progress.next_index = progress.match_index + 1;
                progress.wait_index = None;
            }
        }
        engine.recompute_commit_index();
    } else if let RoleState::Leader(s) = engine.role_mut() {
        if let Some(progress) = s.peers.get_mut(&from) {
            progress.next_index = progress.next_index.saturating_sub(1).max(1);
            progress.wait_index = None;
        }
    }

    Intent::Stay
}

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
