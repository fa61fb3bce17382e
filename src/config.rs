//! The builder used to construct a [`RaftEngine`](crate::RaftEngine).
//!
//! Grounded on the original `RaftEngineBuilder`: a setter per option, with
//! the peer set, log store, and state machine mandatory and everything else
//! defaulted. Missing a mandatory field is a programmer error and panics,
//! exactly as the original `build()` requires its mandatory fields to have
//! been set.

use crate::consensus::RaftEngine;
use crate::log_store::LogStore;
use crate::state_machine::StateMachine;
use crate::types::NodeId;

/// Timing and batching parameters, fixed for the lifetime of the engine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineConfig {
    pub election_timeout_ms: u32,
    pub vote_timeout_ms: (u32, u32),
    pub heartbeat_interval_ms: u32,
    pub max_entries_per_append: u32,
    pub max_apply_per_update: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            election_timeout_ms: 150,
            vote_timeout_ms: (150, 300),
            heartbeat_interval_ms: 50,
            max_entries_per_append: 64,
            max_apply_per_update: 10,
        }
    }
}

pub struct RaftEngineBuilder {
    node_id: Option<NodeId>,
    other_node_ids: Vec<NodeId>,
    log_store: Option<Box<dyn LogStore>>,
    state_machine: Option<Box<dyn StateMachine>>,
    config: EngineConfig,
    random_seed: Option<u64>,
}

impl Default for RaftEngineBuilder {
    fn default() -> Self {
        RaftEngineBuilder {
            node_id: None,
            other_node_ids: Vec::new(),
            log_store: None,
            state_machine: None,
            config: EngineConfig::default(),
            random_seed: None,
        }
    }
}

impl RaftEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn other_node_ids(mut self, other_node_ids: Vec<NodeId>) -> Self {
        self.other_node_ids = other_node_ids;
        self
    }

    pub fn log_store(mut self, log_store: Box<dyn LogStore>) -> Self {
        self.log_store = Some(log_store);
        self
    }

    pub fn state_machine(mut self, state_machine: Box<dyn StateMachine>) -> Self {
        self.state_machine = Some(state_machine);
        self
    }

    pub fn election_timeout_ms(mut self, ms: u32) -> Self {
        self.config.election_timeout_ms = ms;
        self
    }

    pub fn vote_timeout_ms(mut self, lo: u32, hi: u32) -> Self {
        self.config.vote_timeout_ms = (lo, hi);
        self
    }

    pub fn heartbeat_interval_ms(mut self, ms: u32) -> Self {
        self.config.heartbeat_interval_ms = ms;
        self
    }

    pub fn max_entries_per_append(mut self, n: u32) -> Self {
        self.config.max_entries_per_append = n;
        self
    }

    pub fn max_apply_per_update(mut self, n: u32) -> Self {
        self.config.max_apply_per_update = n;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Builds the engine. Does not start it — call
    /// [`RaftEngine::start`](crate::RaftEngine::start) with the initial time
    /// before the first [`crate::RaftEngine::update`].
    ///
    /// # Panics
    ///
    /// Panics if `node_id` was never set, `other_node_ids` is empty or
    /// contains `node_id`, or `log_store`/`state_machine` were never set.
    /// These are all programmer errors: the host is expected to know its own
    /// cluster topology before constructing the engine.
    pub fn build(self) -> RaftEngine {
        let node_id = self.node_id.expect("RaftEngineBuilder: node_id is required");
        assert!(
            !self.other_node_ids.is_empty(),
            "RaftEngineBuilder: other_node_ids must be non-empty"
        );
        assert!(
            !self.other_node_ids.contains(&node_id),
            "RaftEngineBuilder: other_node_ids must not contain node_id"
        );
        let log_store = self
            .log_store
            .expect("RaftEngineBuilder: log_store is required");
        let state_machine = self
            .state_machine
            .expect("RaftEngineBuilder: state_machine is required");

        RaftEngine::new(
            node_id,
            self.other_node_ids,
            log_store,
            state_machine,
            self.config,
            self.random_seed,
        )
    }
}
