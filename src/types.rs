//! The data types shared across the engine: node identity, log position, and
//! the immutable log entry itself.
//!
//! This fixes 1-based log indexing and `u64` terms. An earlier lineage of the
//! source this crate is descended from indexed logs from 0 and used `u32`
//! terms for one of its two storage abstractions; that lineage is not carried
//! forward here.

use bytes::Bytes;

/// Uniquely identifies a server within a cluster. Assigned out of band by the
/// host; the engine never allocates one.
pub type NodeId = u32;

/// A monotonically increasing election epoch.
pub type Term = u64;

/// A 1-based position in a node's log. Index 0 is reserved to mean "before the
/// start of the log" and is never the index of a real entry.
pub type LogIndex = u64;

/// A single record in the replicated log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry {
    pub index: LogIndex,
    pub term: Term,
    pub value: Bytes,
}

impl Entry {
    pub fn new(index: LogIndex, term: Term, value: impl Into<Bytes>) -> Self {
        Entry {
            index,
            term,
            value: value.into(),
        }
    }
}

/// The four roles a node can be in. This is the externally observable tag;
/// each role's internal bookkeeping (election deadlines, vote sets, peer
/// progress) lives in the private `role` module and is never exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Applying previously-committed entries from disk before joining the
    /// cluster as a voting member.
    Replay,
    Follower,
    Candidate,
    Leader,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Replay => "replay",
            Role::Follower => "follower",
            Role::Candidate => "candidate",
            Role::Leader => "leader",
        };
        f.write_str(s)
    }
}
