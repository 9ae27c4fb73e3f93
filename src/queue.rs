//! Ordered queue of blocked lock requests.
//!
//! Entries keep arrival order and are deduplicated by the full
//! (transaction, resource, mode) triple.  The queue itself is passive; the
//! restart-on-success reprocessing policy lives in the lock manager.

use std::collections::VecDeque;

use crate::mode::LockMode;

// ---------------------------------------------------------------------------
//  Wait entry
// ---------------------------------------------------------------------------

/// A blocked lock request awaiting retry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WaitEntry {
    /// Requesting transaction.
    pub tx: u64,
    /// Resource the request targets.
    pub resource: String,
    /// Requested mode.
    pub mode: LockMode,
}

// ---------------------------------------------------------------------------
//  Wait queue
// ---------------------------------------------------------------------------

/// Arrival-ordered, deduplicated queue of blocked requests.
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<WaitEntry>,
}

impl WaitQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request unless an identical entry is already queued.
    /// Returns whether the entry was added.
    pub fn enqueue(&mut self, tx: u64, resource: &str, mode: LockMode) -> bool {
        let entry = WaitEntry {
            tx,
            resource: resource.to_string(),
            mode,
        };
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    /// Remove the first entry equal to `entry`.  Returns whether one was found.
    pub fn remove(&mut self, entry: &WaitEntry) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| e == entry) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Remove the entry at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<WaitEntry> {
        self.entries.remove(index)
    }

    /// Remove every entry belonging to `tx`.
    pub fn remove_transaction(&mut self, tx: u64) {
        self.entries.retain(|e| e.tx != tx);
    }

    /// Whether `tx` has at least one queued entry.
    pub fn contains_transaction(&self, tx: u64) -> bool {
        self.entries.iter().any(|e| e.tx == tx)
    }

    /// Entry at `index` in arrival order.
    pub fn get(&self, index: usize) -> Option<&WaitEntry> {
        self.entries.get(index)
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &WaitEntry> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::LockMode::{Exclusive, Share};

    #[test]
    fn keeps_arrival_order() {
        let mut queue = WaitQueue::new();
        queue.enqueue(1, "A", Exclusive);
        queue.enqueue(2, "A", Share);
        assert_eq!(queue.get(0).unwrap().tx, 1);
        assert_eq!(queue.get(1).unwrap().tx, 2);
    }

    #[test]
    fn deduplicates_by_full_triple() {
        let mut queue = WaitQueue::new();
        assert!(queue.enqueue(1, "A", Exclusive));
        assert!(!queue.enqueue(1, "A", Exclusive));
        // Same transaction and resource but a different mode is distinct.
        assert!(queue.enqueue(1, "A", Share));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn remove_transaction_purges_all_entries() {
        let mut queue = WaitQueue::new();
        queue.enqueue(1, "A", Exclusive);
        queue.enqueue(2, "A", Share);
        queue.enqueue(1, "B", Share);
        queue.remove_transaction(1);
        assert_eq!(queue.len(), 1);
        assert!(!queue.contains_transaction(1));
        assert!(queue.contains_transaction(2));
    }

    #[test]
    fn remove_specific_entry() {
        let mut queue = WaitQueue::new();
        queue.enqueue(1, "A", Exclusive);
        queue.enqueue(2, "A", Share);
        let entry = WaitEntry {
            tx: 1,
            resource: "A".to_string(),
            mode: Exclusive,
        };
        assert!(queue.remove(&entry));
        assert!(!queue.remove(&entry));
        assert_eq!(queue.len(), 1);
    }
}
