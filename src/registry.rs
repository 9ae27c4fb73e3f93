//! Transaction states and pending-commit tracking.
//!
//! Transactions are created implicitly on first reference and are Active
//! until they reach a terminal state.  A commit issued while the
//! transaction still has queued lock requests is deferred: the registry
//! remembers the pending flag and the manager executes the commit once the
//! last queue entry clears.

use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
//  Transaction state
// ---------------------------------------------------------------------------

/// Lifecycle state of a transaction.  Waiting is not a stored state; it is
/// observable only through wait-queue membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TxState {
    /// Running (or never seen, since transactions are implicit).
    Active,
    /// Terminal: committed and all locks released.
    Committed,
    /// Terminal: aborted and all locks released.
    Aborted,
}

// ---------------------------------------------------------------------------
//  Transaction registry
// ---------------------------------------------------------------------------

/// Terminal-state and pending-commit bookkeeping.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    committed: BTreeSet<u64>,
    aborted: BTreeSet<u64>,
    pending_commit: BTreeSet<u64>,
}

impl TransactionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `tx`.
    pub fn state_of(&self, tx: u64) -> TxState {
        if self.committed.contains(&tx) {
            TxState::Committed
        } else if self.aborted.contains(&tx) {
            TxState::Aborted
        } else {
            TxState::Active
        }
    }

    /// Whether `tx` has reached a terminal state.
    pub fn is_terminal(&self, tx: u64) -> bool {
        self.state_of(tx) != TxState::Active
    }

    /// Mark `tx` committed.
    pub fn mark_committed(&mut self, tx: u64) {
        self.committed.insert(tx);
        self.pending_commit.remove(&tx);
    }

    /// Mark `tx` aborted and discard any pending commit.
    pub fn mark_aborted(&mut self, tx: u64) {
        self.aborted.insert(tx);
        self.pending_commit.remove(&tx);
    }

    /// Flag `tx` for commit once its queued requests clear.
    pub fn set_pending_commit(&mut self, tx: u64) {
        self.pending_commit.insert(tx);
    }

    /// Whether `tx` has a deferred commit outstanding.
    pub fn is_pending_commit(&self, tx: u64) -> bool {
        self.pending_commit.contains(&tx)
    }

    /// Consume the pending-commit flag for `tx`.  Returns whether it was set.
    pub fn take_pending_commit(&mut self, tx: u64) -> bool {
        self.pending_commit.remove(&tx)
    }

    /// Transactions with a deferred commit outstanding, ascending.
    pub fn pending_commits(&self) -> Vec<u64> {
        self.pending_commit.iter().copied().collect()
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
