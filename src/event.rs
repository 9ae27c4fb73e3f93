//! Structured execution events and the append-only history log.
//!
//! The core emits events rather than text; an external formatter renders
//! them (see [`crate::trace`]).  The content and ordering of the log is part
//! of the operation contracts: grants appear for every lock taken (ancestor
//! intention locks included), operations only when they completed
//! synchronously, and unlock events in child-before-parent order.

use std::fmt;

use crate::mode::LockMode;

// ---------------------------------------------------------------------------
//  Abort reason
// ---------------------------------------------------------------------------

/// Why a transaction was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AbortReason {
    /// Chosen as the victim of a detected deadlock cycle.
    Deadlock,
    /// Still active when the operation stream ended.
    Incomplete,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Deadlock => f.write_str("deadlock"),
            AbortReason::Incomplete => f.write_str("incomplete"),
        }
    }
}

// ---------------------------------------------------------------------------
//  Event
// ---------------------------------------------------------------------------

/// A single entry in the execution history.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Event {
    /// A lock was granted and inserted into the lock table.
    Granted {
        tx: u64,
        resource: String,
        mode: LockMode,
    },
    /// A held lock was replaced in place by a stronger mode.
    Upgraded {
        tx: u64,
        resource: String,
        from: LockMode,
        to: LockMode,
    },
    /// A request could not be granted and was enqueued; `blocked_on` is the
    /// sorted set of transactions holding conflicting locks.
    Blocked {
        tx: u64,
        resource: String,
        mode: LockMode,
        blocked_on: Vec<u64>,
    },
    /// A read (`S`), update (`U`), or write (`X`) completed synchronously.
    Operation {
        tx: u64,
        resource: String,
        mode: LockMode,
    },
    /// A lock was released.
    Unlocked {
        tx: u64,
        resource: String,
        mode: LockMode,
    },
    /// The transaction committed.
    Committed { tx: u64 },
    /// The transaction aborted.
    Aborted { tx: u64, reason: AbortReason },
    /// A wait-for cycle was found and a victim chosen.
    Deadlock { cycle: Vec<u64>, victim: u64 },
}

// ---------------------------------------------------------------------------
//  History
// ---------------------------------------------------------------------------

/// Append-only log of everything the manager did, in execution order.
#[derive(Debug, Clone, Default)]
pub struct History {
    events: Vec<Event>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub(crate) fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// All events in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Iterate over the events in order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_preserves_order() {
        let mut history = History::new();
        history.push(Event::Committed { tx: 1 });
        history.push(Event::Aborted {
            tx: 2,
            reason: AbortReason::Deadlock,
        });
        assert_eq!(history.len(), 2);
        assert_eq!(history.events()[0], Event::Committed { tx: 1 });
        assert_eq!(
            history.events()[1],
            Event::Aborted {
                tx: 2,
                reason: AbortReason::Deadlock
            }
        );
    }

    #[test]
    fn abort_reason_display() {
        assert_eq!(AbortReason::Deadlock.to_string(), "deadlock");
        assert_eq!(AbortReason::Incomplete.to_string(), "incomplete");
    }
}
