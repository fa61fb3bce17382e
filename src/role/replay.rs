//! Replay: the engine's initial role, responsible for applying entries that
//! were already committed before the process started (as found on disk) to
//! the state machine, before joining the cluster as Follower.
//!
//! Grounded on the original `Replay::update`, which ignores whatever message
//! it is handed and just returns the current time: messages received while
//! replaying are discarded rather than buffered, since replay is bounded by
//! local disk reads and finishes quickly.

use super::Intent;
use crate::consensus::RaftEngine;
use crate::role::{follower, RoleState, Tick};

/// The apply pipeline (§4.6) has already run earlier in this `update` call
/// (`RaftEngine::update` runs it centrally, right after message handling, so
/// every role sees committed entries applied before its own tick logic
/// runs). Replay's own job is just to notice once it is fully caught up and
/// hand off to Follower; until then it keeps requesting an immediate wake so
/// the host keeps calling in and draining the backlog.
pub(crate) fn on_tick(engine: &mut RaftEngine, now: u64, _tick: &mut Tick) -> Intent {
    if engine.last_applied() == engine.commit_index() {
        Intent::TransitionTo(RoleState::Follower(follower::new_state(engine, now)))
    } else {
        Intent::Stay
    }
}
