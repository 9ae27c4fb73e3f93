//! The lock manager -- the cohesive owned structure every mutation goes
//! through.
//!
//! Composes the lock table, wait queue, wait-for graph, transaction
//! registry, and history log, and implements the multiple-granularity
//! protocol on top of them: ancestor intention acquisition, in-place
//! upgrades, the restart-on-success wait-queue reprocessing policy,
//! deadlock resolution, and commit/abort with child-before-parent lock
//! release.
//!
//! Processing never blocks the caller: a request either completes or is
//! recorded in the wait queue (or as a pending commit) and control returns
//! immediately.

use tracing::{debug, info};

use crate::event::{AbortReason, Event, History};
use crate::graph::WaitForGraph;
use crate::hierarchy::ResourceHierarchy;
use crate::mode::LockMode;
use crate::queue::{WaitEntry, WaitQueue};
use crate::registry::{TransactionRegistry, TxState};
use crate::table::LockTable;

// ---------------------------------------------------------------------------
//  Lock result
// ---------------------------------------------------------------------------

/// Outcome of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockResult {
    /// Granted (or already covered by a held mode) in this call.
    Granted,
    /// Could not be granted now; recorded in the wait queue.
    Blocked,
    /// Silently discarded: the transaction is already terminal.
    Ignored,
}

impl LockResult {
    /// Whether the request succeeded in this call.
    pub fn is_granted(self) -> bool {
        self == LockResult::Granted
    }
}

// ---------------------------------------------------------------------------
//  Lock manager
// ---------------------------------------------------------------------------

/// Multiple-granularity lock manager under two-phase locking.
#[derive(Debug)]
pub struct LockManager {
    hierarchy: ResourceHierarchy,
    table: LockTable,
    queue: WaitQueue,
    graph: WaitForGraph,
    registry: TransactionRegistry,
    history: History,
}

impl LockManager {
    /// Create a manager over an injected resource hierarchy.
    pub fn new(hierarchy: ResourceHierarchy) -> Self {
        Self {
            hierarchy,
            table: LockTable::new(),
            queue: WaitQueue::new(),
            graph: WaitForGraph::new(),
            registry: TransactionRegistry::new(),
            history: History::new(),
        }
    }

    /// The injected resource hierarchy.
    pub fn hierarchy(&self) -> &ResourceHierarchy {
        &self.hierarchy
    }

    /// The execution history so far.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The lock table (read-only).
    pub fn table(&self) -> &LockTable {
        &self.table
    }

    /// The wait queue (read-only).
    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }

    /// The wait-for graph (read-only).
    pub fn graph(&self) -> &WaitForGraph {
        &self.graph
    }

    /// The transaction registry (read-only).
    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Current lifecycle state of `tx`.
    pub fn state_of(&self, tx: u64) -> TxState {
        self.registry.state_of(tx)
    }

    /// Whether `tx` has a queued lock request outstanding.
    pub fn is_waiting(&self, tx: u64) -> bool {
        self.queue.contains_transaction(tx)
    }

    // -----------------------------------------------------------------------
    //  Lock acquisition
    // -----------------------------------------------------------------------

    /// Request `mode` on `resource` for `tx`.
    ///
    /// Handles the no-op and in-place upgrade rules for modes the
    /// transaction already holds, acquires ancestor intention locks
    /// root-to-leaf for S/U/X requests, and enqueues the request when it
    /// cannot be granted.  Ancestor intention locks already acquired are
    /// retained even when the terminal acquisition blocks.
    pub fn request(&mut self, tx: u64, resource: &str, mode: LockMode) -> LockResult {
        if self.registry.is_terminal(tx) {
            return LockResult::Ignored;
        }

        if let Some(held) = self.table.mode_of(tx, resource) {
            return self.request_with_held(tx, resource, mode, held);
        }

        // Fresh request: intention locks on every ancestor first.
        if let Some(intent) = mode.required_intent() {
            if !self.acquire_ancestor_intents(tx, resource, intent) {
                // An ancestor blocked.  Queue the terminal request for
                // retry; the ancestor's own enqueue recorded the edge.
                self.queue.enqueue(tx, resource, mode);
                return LockResult::Blocked;
            }
        }

        let others = self.table.other_holders(resource, tx);
        if mode.compatible_with_all(others.iter().map(|&(_, m)| m)) {
            self.table.grant(tx, resource, mode);
            debug!("T{} granted {} on {}", tx, mode, resource);
            self.history.push(Event::Granted {
                tx,
                resource: resource.to_string(),
                mode,
            });
            LockResult::Granted
        } else {
            self.enqueue_wait(tx, resource, mode, &others)
        }
    }

    /// Request handling when `tx` already holds `held` on `resource`.
    fn request_with_held(
        &mut self,
        tx: u64,
        resource: &str,
        mode: LockMode,
        held: LockMode,
    ) -> LockResult {
        if held.covers(mode) {
            return LockResult::Granted;
        }

        if held.upgrades_to(mode) {
            if let Some(intent) = mode.required_intent() {
                if !self.acquire_ancestor_intents(tx, resource, intent) {
                    // The upgrade blocks as a whole; the wait is recorded
                    // against the resource's other holders, not the
                    // ancestor's.
                    let others = self.table.other_holders(resource, tx);
                    return self.enqueue_wait(tx, resource, mode, &others);
                }
            }
            let others = self.table.other_holders(resource, tx);
            if mode.compatible_with_all(others.iter().map(|&(_, m)| m)) {
                self.table.grant(tx, resource, mode);
                debug!("T{} upgraded {} from {} to {}", tx, resource, held, mode);
                self.history.push(Event::Upgraded {
                    tx,
                    resource: resource.to_string(),
                    from: held,
                    to: mode,
                });
                return LockResult::Granted;
            }
            return self.enqueue_wait(tx, resource, mode, &others);
        }

        // Neither covered nor upgradeable: an ordinary wait request against
        // the resource's current holders.
        let others = self.table.other_holders(resource, tx);
        self.enqueue_wait(tx, resource, mode, &others)
    }

    /// Acquire `intent` on every ancestor of `resource`, root first.
    /// Returns false as soon as one ancestor blocks; locks acquired up to
    /// that point are retained.
    fn acquire_ancestor_intents(&mut self, tx: u64, resource: &str, intent: LockMode) -> bool {
        for ancestor in self.hierarchy.ancestors_of(resource) {
            if !self.request(tx, &ancestor, intent).is_granted() {
                return false;
            }
        }
        true
    }

    /// Enqueue a blocked request and, when the blocking set is non-empty,
    /// record the block event and one wait-for edge per blocker.
    fn enqueue_wait(
        &mut self,
        tx: u64,
        resource: &str,
        mode: LockMode,
        holders: &[(u64, LockMode)],
    ) -> LockResult {
        self.queue.enqueue(tx, resource, mode);

        let blockers: Vec<u64> = holders
            .iter()
            .map(|&(holder, _)| holder)
            .filter(|&holder| holder != tx)
            .collect();
        if !blockers.is_empty() {
            debug!("T{} blocked on {} for {} by {:?}", tx, resource, mode, blockers);
            self.history.push(Event::Blocked {
                tx,
                resource: resource.to_string(),
                mode,
                blocked_on: blockers.clone(),
            });
            for blocker in blockers {
                self.graph.add_edge(tx, blocker);
            }
        }
        LockResult::Blocked
    }

    // -----------------------------------------------------------------------
    //  Read / update / write
    // -----------------------------------------------------------------------

    /// Read `resource` under a share lock.
    pub fn read(&mut self, tx: u64, resource: &str) -> LockResult {
        self.access(tx, resource, LockMode::Share)
    }

    /// Update `resource` under an update lock.
    pub fn update(&mut self, tx: u64, resource: &str) -> LockResult {
        self.access(tx, resource, LockMode::Update)
    }

    /// Write `resource` under an exclusive lock.
    pub fn write(&mut self, tx: u64, resource: &str) -> LockResult {
        self.access(tx, resource, LockMode::Exclusive)
    }

    /// The operation event is recorded only when the underlying request
    /// succeeded synchronously in this call.
    fn access(&mut self, tx: u64, resource: &str, mode: LockMode) -> LockResult {
        let result = self.request(tx, resource, mode);
        if result.is_granted() {
            self.history.push(Event::Operation {
                tx,
                resource: resource.to_string(),
                mode,
            });
        }
        result
    }

    // -----------------------------------------------------------------------
    //  Commit / abort
    // -----------------------------------------------------------------------

    /// Commit `tx`, releasing all of its locks and reprocessing the queue.
    ///
    /// If `tx` still has queued lock requests the commit is deferred: a
    /// pending flag is set and the commit executes exactly once when the
    /// last queue entry clears.  Committing a terminal transaction is a
    /// no-op.
    pub fn commit(&mut self, tx: u64) {
        if self.queue.contains_transaction(tx) {
            if !self.registry.is_terminal(tx) {
                debug!("T{} commit deferred behind queued requests", tx);
                self.registry.set_pending_commit(tx);
            }
            return;
        }
        if self.registry.is_terminal(tx) {
            return;
        }

        self.registry.mark_committed(tx);
        self.history.push(Event::Committed { tx });
        self.release_locks(tx);
        self.reprocess_queue();
    }

    /// Abort `tx`: release its locks, purge its queued requests, discard
    /// any pending commit, and reprocess the queue.  A no-op on terminal
    /// transactions.
    pub fn abort(&mut self, tx: u64, reason: AbortReason) {
        if self.registry.is_terminal(tx) {
            return;
        }

        debug!("T{} aborted ({})", tx, reason);
        self.registry.mark_aborted(tx);
        self.history.push(Event::Aborted { tx, reason });
        self.release_locks(tx);
        self.queue.remove_transaction(tx);
        self.reprocess_queue();
    }

    /// Release every lock held by `tx` in decreasing hierarchy depth
    /// (deepest resource first, ties broken by id), and drop the
    /// transaction from the wait-for graph.
    fn release_locks(&mut self, tx: u64) {
        let mut held = self.table.locks_held_by(tx);
        held.sort_by(|(a, _), (b, _)| {
            self.hierarchy
                .depth(b)
                .cmp(&self.hierarchy.depth(a))
                .then_with(|| a.cmp(b))
        });
        for (resource, mode) in held {
            self.table.release(tx, &resource);
            self.history.push(Event::Unlocked { tx, resource, mode });
        }
        self.graph.remove_transaction(tx);
    }

    // -----------------------------------------------------------------------
    //  Queue reprocessing
    // -----------------------------------------------------------------------

    /// Retry queued requests, front first.
    ///
    /// Any entry that now succeeds is removed and the scan restarts from
    /// the front, giving earlier arrivals repeated first refusal.  Before
    /// each retry the transaction's outgoing wait-for edges are cleared; a
    /// failed retry re-records edges against the current holders.  The scan
    /// ends when a full pass grants nothing, after which deferred commits
    /// whose transactions left the queue are executed.
    fn reprocess_queue(&mut self) {
        let mut index = 0;
        while index < self.queue.len() {
            let Some(entry) = self.queue.get(index).cloned() else {
                break;
            };

            if self.registry.is_terminal(entry.tx) {
                self.queue.remove(&entry);
                continue;
            }

            self.graph.clear_edges_from(entry.tx);
            if self.retry(&entry).is_granted() {
                self.queue.remove(&entry);
                index = 0;
            } else {
                index += 1;
            }
        }

        for tx in self.registry.pending_commits() {
            // Re-check: a nested reprocess may already have consumed it.
            if self.registry.is_pending_commit(tx) && !self.queue.contains_transaction(tx) {
                self.registry.take_pending_commit(tx);
                debug!("T{} no longer waiting, executing deferred commit", tx);
                self.commit(tx);
            }
        }
    }

    /// Retry one queued entry.  S/U/X entries go back through the operation
    /// paths so the operation event is recorded on success; intention
    /// entries retry the bare request.
    fn retry(&mut self, entry: &WaitEntry) -> LockResult {
        match entry.mode {
            LockMode::Share => self.read(entry.tx, &entry.resource),
            LockMode::Update => self.update(entry.tx, &entry.resource),
            LockMode::Exclusive => self.write(entry.tx, &entry.resource),
            LockMode::IntentShare | LockMode::IntentExclusive => {
                self.request(entry.tx, &entry.resource, entry.mode)
            }
        }
    }

    // -----------------------------------------------------------------------
    //  Deadlock resolution
    // -----------------------------------------------------------------------

    /// Detect and resolve deadlocks until the wait-for graph is acyclic.
    /// Returns the number of victims aborted.
    pub fn resolve_deadlocks(&mut self) -> usize {
        let mut victims = 0;
        while self.resolve_one_deadlock() {
            victims += 1;
        }
        victims
    }

    /// Resolve at most one cycle: the victim is the cycle member with the
    /// maximum transaction id, aborted with reason deadlock (which also
    /// reprocesses the queue).
    fn resolve_one_deadlock(&mut self) -> bool {
        let Some(cycle) = self.graph.find_cycle() else {
            return false;
        };
        let Some(&victim) = cycle.iter().max() else {
            return false;
        };

        info!("deadlock detected: cycle {:?}, victim T{}", cycle, victim);
        self.history.push(Event::Deadlock {
            cycle: cycle.clone(),
            victim,
        });
        self.abort(victim, AbortReason::Deadlock);
        true
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
