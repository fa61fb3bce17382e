//! An in-memory [`LogStore`], mainly for tests.
//!
//! Grounded on the original `MemStorage`/`MemLogStorage` reference
//! implementation: a flat vector of entries with no persistence across
//! restarts. Production hosts are expected to supply their own durable
//! implementation of the trait.

use crate::errors::LogStoreError;
use crate::log_store::LogStore;
use crate::types::{Entry, LogIndex, Term};

type Result<T> = std::result::Result<T, LogStoreError>;

#[derive(Debug, Default)]
pub struct MemoryLogStore {
    /// `entries[i]` holds the entry at index `i + 1`.
    entries: Vec<Entry>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        MemoryLogStore {
            entries: Vec::new(),
        }
    }

    /// Seeds the store with entries already presumed committed, as if
    /// recovered from disk at boot. Panics if `entries` is not contiguous
    /// starting at index 1 or term-monotone, since that would mean the host
    /// handed us a corrupt log.
    pub fn seeded(entries: Vec<Entry>) -> Self {
        let mut store = MemoryLogStore::new();
        if !entries.is_empty() {
            store.append(&entries).expect("seed entries must be contiguous and term-monotone");
        }
        store
    }
}

impl LogStore for MemoryLogStore {
    fn append(&mut self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let expected_first = self.last_index() + 1;
        if entries[0].index != expected_first {
            panic!(
                "append must start at index {}, got {}",
                expected_first, entries[0].index
            );
        }
        if entries[0].term < self.last_term() {
            return Err(LogStoreError::TermGoesBackward {
                index: entries[0].index,
                existing: self.last_term(),
                incoming: entries[0].term,
            });
        }

        for pair in entries.windows(2) {
            if pair[1].index != pair[0].index + 1 {
                panic!(
                    "append entries must be contiguous: {} followed by {}",
                    pair[0].index, pair[1].index
                );
            }
            if pair[1].term < pair[0].term {
                return Err(LogStoreError::TermGoesBackward {
                    index: pair[1].index,
                    existing: pair[0].term,
                    incoming: pair[1].term,
                });
            }
        }

        self.entries.extend_from_slice(entries);
        Ok(())
    }

    fn remove_suffix(&mut self, from_index: LogIndex) -> Result<()> {
        let last = self.last_index();
        if from_index == 0 || from_index > last {
            panic!(
                "remove_suffix({}) out of range (last_index = {})",
                from_index, last
            );
        }
        self.entries.truncate((from_index - 1) as usize);
        Ok(())
    }

    fn get_entries(&self, start: LogIndex, stop: LogIndex, max_bytes: usize) -> Result<Vec<Entry>> {
        if start == 0 || start > stop {
            return Ok(Vec::new());
        }
        let last = self.last_index();
        if start > last {
            return Err(LogStoreError::IndexOutOfRange {
                index: start,
                last_index: last,
            });
        }

        let stop = stop.min(last);
        let mut out = Vec::new();
        let mut used = 0usize;
        for index in start..=stop {
            let entry = &self.entries[(index - 1) as usize];
            if !out.is_empty() && used + entry.value.len() > max_bytes {
                break;
            }
            used += entry.value.len();
            out.push(entry.clone());
        }
        Ok(out)
    }

    fn term_at(&self, index: LogIndex) -> Result<Term> {
        if index == 0 {
            return Ok(0);
        }
        let last = self.last_index();
        if index > last {
            return Err(LogStoreError::IndexOutOfRange {
                index,
                last_index: last,
            });
        }
        Ok(self.entries[(index - 1) as usize].term)
    }

    fn last_index(&self) -> LogIndex {
        self.entries.last().map(|e| e.index).unwrap_or(0)
    }

    fn last_term(&self) -> Term {
        self.entries.last().map(|e| e.term).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: LogIndex, term: Term) -> Entry {
        Entry::new(index, term, format!("v{}", index))
    }

    #[test]
    fn empty_store_reports_zero() {
        let store = MemoryLogStore::new();
        assert_eq!(store.last_index(), 0);
        assert_eq!(store.last_term(), 0);
        assert_eq!(store.term_at(0).unwrap(), 0);
    }

    #[test]
    fn append_and_round_trip() {
        let mut store = MemoryLogStore::new();
        let e = entry(1, 1);
        store.append(&[e.clone()]).unwrap();
        assert_eq!(store.get_entries(1, 1, usize::MAX).unwrap(), vec![e]);
    }

    #[test]
    fn remove_suffix_truncates() {
        let mut store = MemoryLogStore::new();
        store
            .append(&[entry(1, 1), entry(2, 1), entry(3, 1)])
            .unwrap();
        store.remove_suffix(2).unwrap();
        assert_eq!(store.last_index(), 1);
    }

    #[test]
    fn get_entries_respects_byte_budget_but_returns_at_least_one() {
        let mut store = MemoryLogStore::new();
        store
            .append(&[entry(1, 1), entry(2, 1), entry(3, 1)])
            .unwrap();
        let got = store.get_entries(1, 3, 1).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].index, 1);
    }

    #[test]
    #[should_panic]
    fn append_rejects_non_contiguous_start() {
        let mut store = MemoryLogStore::new();
        store.append(&[entry(2, 1)]).unwrap();
    }

    #[test]
    fn append_rejects_term_regression() {
        let mut store = MemoryLogStore::new();
        store.append(&[entry(1, 5)]).unwrap();
        let err = store.append(&[entry(2, 4)]);
        assert!(err.is_err());
    }
}
