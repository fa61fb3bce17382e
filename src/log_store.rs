//! The log-store contract.
//!
//! A `LogStore` is the only collaborator the engine mutates. It owns the
//! durable sequence of [`Entry`] values for this node and nothing else —
//! `current_term`/`voted_for` persistence, if any, is the concern of whatever
//! concrete store the host plugs in (the simplest approach, as in the
//! original design, is to write them as dedicated records through the same
//! store).
//!
//! All operations are synchronous. Implementations that violate a
//! precondition (non-contiguous append, out-of-range truncation) should
//! `panic!`: these are programmer errors, not conditions the engine is
//! expected to recover from. Genuine I/O failures should be returned as
//! `Err(LogStoreError::Io(..))`, which the engine treats as fatal.

use crate::errors::LogStoreError;
use crate::types::{Entry, LogIndex, Term};

type Result<T> = std::result::Result<T, LogStoreError>;

pub trait LogStore: Send {
    /// Appends `entries` to the end of the log. `entries` must be
    /// contiguous and the first entry's index must equal `last_index() + 1`;
    /// every entry's term must be `>= last_term()`. Violating either
    /// precondition is a programmer error.
    fn append(&mut self, entries: &[Entry]) -> Result<()>;

    /// Deletes entries `from_index..=last_index()`. `from_index` must be in
    /// `1..=last_index()`.
    fn remove_suffix(&mut self, from_index: LogIndex) -> Result<()>;

    /// Returns entries in the inclusive range `[start, stop]`. May return
    /// fewer than the full range if `max_bytes` (measured over entry
    /// values) would be exceeded, but always returns at least one entry
    /// when the range is non-empty and `start <= last_index()`.
    fn get_entries(&self, start: LogIndex, stop: LogIndex, max_bytes: usize) -> Result<Vec<Entry>>;

    /// The term of the entry at `index`, or `0` if `index == 0` (the
    /// convention used for "before the start of the log").
    fn term_at(&self, index: LogIndex) -> Result<Term>;

    /// The index of the last entry in the log, or `0` if the log is empty.
    fn last_index(&self) -> LogIndex;

    /// The term of the last entry in the log, or `0` if the log is empty.
    fn last_term(&self) -> Term;
}
