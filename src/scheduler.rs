//! Top-level orchestrator: replays an ordered operation stream through the
//! lock manager.
//!
//! One operation is consumed at a time.  Operations of terminal
//! transactions are discarded; a transaction with a queued lock request may
//! issue nothing but commit (which is itself deferred).  After each
//! dispatched operation the scheduler runs deadlock resolution.  When the
//! stream ends, every transaction still active is force-aborted.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::event::{AbortReason, History};
use crate::hierarchy::ResourceHierarchy;
use crate::manager::LockManager;
use crate::registry::TxState;

// ---------------------------------------------------------------------------
//  Operation
// ---------------------------------------------------------------------------

/// Kind of a schedule operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OpKind {
    /// Read a resource (share lock).
    Read,
    /// Update a resource (update lock).
    Update,
    /// Write a resource (exclusive lock).
    Write,
    /// Commit the transaction.
    Commit,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Read => f.write_str("read"),
            OpKind::Update => f.write_str("update"),
            OpKind::Write => f.write_str("write"),
            OpKind::Commit => f.write_str("commit"),
        }
    }
}

/// One already-parsed schedule operation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Operation {
    /// What to do.
    pub kind: OpKind,
    /// Issuing transaction.
    pub tx: u64,
    /// Target resource; required for read/update/write, absent for commit.
    pub resource: Option<String>,
}

impl Operation {
    /// A read operation.
    pub fn read(tx: u64, resource: &str) -> Self {
        Self {
            kind: OpKind::Read,
            tx,
            resource: Some(resource.to_string()),
        }
    }

    /// An update operation.
    pub fn update(tx: u64, resource: &str) -> Self {
        Self {
            kind: OpKind::Update,
            tx,
            resource: Some(resource.to_string()),
        }
    }

    /// A write operation.
    pub fn write(tx: u64, resource: &str) -> Self {
        Self {
            kind: OpKind::Write,
            tx,
            resource: Some(resource.to_string()),
        }
    }

    /// A commit operation.
    pub fn commit(tx: u64) -> Self {
        Self {
            kind: OpKind::Commit,
            tx,
            resource: None,
        }
    }
}

// ---------------------------------------------------------------------------
//  Scheduler
// ---------------------------------------------------------------------------

/// Replays operations through a [`LockManager`], one at a time.
#[derive(Debug)]
pub struct Scheduler {
    manager: LockManager,
    /// Every transaction id seen in the stream, for end-of-stream cleanup.
    seen: BTreeSet<u64>,
}

impl Scheduler {
    /// Create a scheduler over an injected resource hierarchy.
    pub fn new(hierarchy: ResourceHierarchy) -> Self {
        Self {
            manager: LockManager::new(hierarchy),
            seen: BTreeSet::new(),
        }
    }

    /// The underlying lock manager.
    pub fn manager(&self) -> &LockManager {
        &self.manager
    }

    /// The execution history so far.
    pub fn history(&self) -> &History {
        self.manager.history()
    }

    /// Apply a single operation, then resolve any deadlock it produced.
    ///
    /// Stray operations (terminal transaction, or a waiting transaction
    /// issuing anything but commit) are discarded without effect.
    pub fn apply(&mut self, op: &Operation) -> Result<(), SchedulerError> {
        self.seen.insert(op.tx);

        if self.manager.state_of(op.tx) != TxState::Active {
            debug!("T{} is terminal, ignoring {}", op.tx, op.kind);
            return Ok(());
        }
        if self.manager.is_waiting(op.tx) && op.kind != OpKind::Commit {
            debug!("T{} is waiting, ignoring {}", op.tx, op.kind);
            return Ok(());
        }

        match op.kind {
            OpKind::Read => {
                let resource = self.required_resource(op)?;
                self.manager.read(op.tx, &resource);
            }
            OpKind::Update => {
                let resource = self.required_resource(op)?;
                self.manager.update(op.tx, &resource);
            }
            OpKind::Write => {
                let resource = self.required_resource(op)?;
                self.manager.write(op.tx, &resource);
            }
            OpKind::Commit => self.manager.commit(op.tx),
        }

        self.manager.resolve_deadlocks();
        Ok(())
    }

    /// Apply every operation in order, then [`finish`](Self::finish).
    pub fn run(&mut self, ops: &[Operation]) -> Result<(), SchedulerError> {
        for op in ops {
            self.apply(op)?;
        }
        self.finish();
        Ok(())
    }

    /// Force-abort every transaction from the stream that is still active.
    pub fn finish(&mut self) {
        for tx in self.seen.clone() {
            if self.manager.state_of(tx) == TxState::Active {
                self.manager.abort(tx, AbortReason::Incomplete);
            }
        }
    }

    fn required_resource(&self, op: &Operation) -> Result<String, SchedulerError> {
        let resource = op
            .resource
            .as_deref()
            .ok_or(SchedulerError::MissingResource { kind: op.kind })?;
        if !self.manager.hierarchy().contains(resource) {
            return Err(SchedulerError::UnknownResource {
                resource: resource.to_string(),
            });
        }
        Ok(resource.to_string())
    }
}

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Errors from dispatching operations.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SchedulerError {
    /// A read/update/write operation carried no resource.
    #[error("{kind} operation requires a resource")]
    MissingResource { kind: OpKind },
    /// The named resource is not part of the injected hierarchy.
    #[error("unknown resource '{resource}'")]
    UnknownResource { resource: String },
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::mode::LockMode::Exclusive;

    fn hierarchy() -> ResourceHierarchy {
        let mut h = ResourceHierarchy::new();
        h.add_root("DB").unwrap();
        h.add_child("DB", "T1").unwrap();
        h.add_child("DB", "T2").unwrap();
        h.add_child("T1", "T1.R1").unwrap();
        h.add_child("T1", "T1.R2").unwrap();
        h
    }

    #[test]
    fn operations_after_commit_are_ignored() {
        let mut s = Scheduler::new(hierarchy());
        s.apply(&Operation::read(1, "T1.R1")).unwrap();
        s.apply(&Operation::commit(1)).unwrap();
        let events = s.history().len();
        s.apply(&Operation::write(1, "T1.R1")).unwrap();
        assert_eq!(s.history().len(), events);
        assert_eq!(s.manager().state_of(1), TxState::Committed);
    }

    #[test]
    fn waiting_transaction_may_only_commit() {
        let mut s = Scheduler::new(hierarchy());
        s.apply(&Operation::write(1, "T1.R1")).unwrap();
        s.apply(&Operation::write(2, "T1.R1")).unwrap();
        assert!(s.manager().is_waiting(2));

        // Further operations from the waiting transaction are dropped.
        let events = s.history().len();
        s.apply(&Operation::read(2, "T1.R2")).unwrap();
        assert_eq!(s.history().len(), events);

        // But a commit is accepted and deferred.
        s.apply(&Operation::commit(2)).unwrap();
        assert!(s.manager().registry().is_pending_commit(2));

        s.apply(&Operation::commit(1)).unwrap();
        assert_eq!(s.manager().state_of(2), TxState::Committed);
    }

    #[test]
    fn finish_aborts_incomplete_transactions() {
        let mut s = Scheduler::new(hierarchy());
        let ops = [
            Operation::read(1, "T1.R1"),
            Operation::write(2, "T1.R2"),
            Operation::commit(1),
        ];
        s.run(&ops).unwrap();
        assert_eq!(s.manager().state_of(1), TxState::Committed);
        assert_eq!(s.manager().state_of(2), TxState::Aborted);
        assert!(s.history().iter().any(|e| matches!(
            e,
            Event::Aborted {
                tx: 2,
                reason: AbortReason::Incomplete
            }
        )));
        assert_eq!(s.manager().table().lock_count(), 0);
    }

    #[test]
    fn abort_at_end_of_stream_drains_the_queue() {
        // w1 holds the row; w2 and w3 queue behind it; only 2 and 3 commit.
        let mut s = Scheduler::new(hierarchy());
        let ops = [
            Operation::write(1, "T1.R1"),
            Operation::write(2, "T1.R1"),
            Operation::write(3, "T1.R1"),
            Operation::commit(2),
            Operation::commit(3),
        ];
        s.run(&ops).unwrap();
        // Aborting 1 at end of stream let 2 then 3 acquire and commit.
        assert_eq!(s.manager().state_of(1), TxState::Aborted);
        assert_eq!(s.manager().state_of(2), TxState::Committed);
        assert_eq!(s.manager().state_of(3), TxState::Committed);
        let grants: Vec<_> = s
            .history()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::Granted {
                        resource,
                        mode: Exclusive,
                        ..
                    } if resource == "T1.R1"
                )
            })
            .collect();
        assert_eq!(grants.len(), 3);
    }

    #[test]
    fn unknown_resource_is_an_error() {
        let mut s = Scheduler::new(hierarchy());
        let err = s.apply(&Operation::read(1, "NOPE")).unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownResource { .. }));
    }

    #[test]
    fn read_without_resource_is_an_error() {
        let mut s = Scheduler::new(hierarchy());
        let op = Operation {
            kind: OpKind::Read,
            tx: 1,
            resource: None,
        };
        let err = s.apply(&op).unwrap_err();
        assert!(matches!(err, SchedulerError::MissingResource { .. }));
    }
}
