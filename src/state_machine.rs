//! The state-machine sink committed entries are applied to.
//!
//! Grounded on the original `StateMachine::execute` interface, trimmed of the
//! `instanceId`/`ctx` parameters this crate has no use for (one engine per
//! state machine, no out-of-band context threading).

use crate::types::LogIndex;

pub trait StateMachine: Send {
    /// Applies the value committed at `index`. Invoked synchronously from
    /// [`crate::RaftEngine::update`], in strictly ascending contiguous index
    /// order, exactly once per index over the engine's lifetime. Must not
    /// call back into the engine.
    fn apply(&mut self, index: LogIndex, value: &[u8]);
}
