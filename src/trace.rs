//! Render structured events as a human-readable execution trace.
//!
//! This is the formatter collaborator around the core: it consumes
//! [`Event`] values and produces the compact trace dialect
//! (`s1(TB1.P1)`, `upgrade1(X): S->X`, `unlockx1(A)`, ...).  The core
//! never makes control decisions from these strings.

use crate::event::Event;
use crate::mode::LockMode;

// ---------------------------------------------------------------------------
//  Rendering
// ---------------------------------------------------------------------------

/// Render a single event as one trace line.
pub fn render(event: &Event) -> String {
    match event {
        Event::Granted { tx, resource, mode } => {
            format!("{}{tx}({resource})", mode_tag(*mode))
        }
        Event::Upgraded {
            tx,
            resource,
            from,
            to,
        } => format!("upgrade{tx}({resource}): {from}->{to}"),
        Event::Blocked {
            tx,
            resource,
            mode,
            blocked_on,
        } => format!("T{tx} waits for {mode} on {resource} (blocked by T{blocked_on:?})"),
        Event::Operation { tx, resource, mode } => {
            format!("{}{tx}({resource})", op_tag(*mode))
        }
        Event::Unlocked { tx, resource, mode } => {
            format!("unlock{}{tx}({resource})", mode_tag(*mode))
        }
        Event::Committed { tx } => format!("c{tx}"),
        Event::Aborted { tx, reason } => format!("abort{tx} ({reason})"),
        Event::Deadlock { cycle, victim } => {
            format!("DEADLOCK detected: {cycle:?}. Victim: T{victim}")
        }
    }
}

/// Render the full numbered trace, one line per event.
pub fn render_trace(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .enumerate()
        .map(|(i, event)| format!("{:02}. {}", i + 1, render(event)))
        .collect()
}

/// The final equivalent schedule: successful operations, upgrades, and
/// commits in history order.
pub fn equivalent_schedule(events: &[Event]) -> String {
    events
        .iter()
        .filter(|event| {
            matches!(
                event,
                Event::Operation { .. } | Event::Upgraded { .. } | Event::Committed { .. }
            )
        })
        .map(render)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase mode tag used for grant and unlock lines.
fn mode_tag(mode: LockMode) -> &'static str {
    match mode {
        LockMode::IntentShare => "is",
        LockMode::IntentExclusive => "ix",
        LockMode::Share => "s",
        LockMode::Update => "u",
        LockMode::Exclusive => "x",
    }
}

/// Operation letter for the mode an operation acquired.
fn op_tag(mode: LockMode) -> &'static str {
    match mode {
        LockMode::Exclusive => "w",
        LockMode::Update => "u",
        _ => "r",
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AbortReason;
    use crate::mode::LockMode::{Exclusive, IntentShare, Share};

    #[test]
    fn renders_each_event_kind() {
        let cases = [
            (
                Event::Granted {
                    tx: 1,
                    resource: "DB".to_string(),
                    mode: IntentShare,
                },
                "is1(DB)",
            ),
            (
                Event::Upgraded {
                    tx: 1,
                    resource: "X".to_string(),
                    from: Share,
                    to: Exclusive,
                },
                "upgrade1(X): S->X",
            ),
            (
                Event::Blocked {
                    tx: 2,
                    resource: "A".to_string(),
                    mode: Exclusive,
                    blocked_on: vec![1],
                },
                "T2 waits for X on A (blocked by T[1])",
            ),
            (
                Event::Operation {
                    tx: 1,
                    resource: "A".to_string(),
                    mode: Share,
                },
                "r1(A)",
            ),
            (
                Event::Unlocked {
                    tx: 1,
                    resource: "A".to_string(),
                    mode: Exclusive,
                },
                "unlockx1(A)",
            ),
            (Event::Committed { tx: 1 }, "c1"),
            (
                Event::Aborted {
                    tx: 2,
                    reason: AbortReason::Deadlock,
                },
                "abort2 (deadlock)",
            ),
            (
                Event::Deadlock {
                    cycle: vec![1, 2],
                    victim: 2,
                },
                "DEADLOCK detected: [1, 2]. Victim: T2",
            ),
        ];
        for (event, expected) in cases {
            assert_eq!(render(&event), expected);
        }
    }

    #[test]
    fn trace_lines_are_numbered() {
        let events = [Event::Committed { tx: 1 }, Event::Committed { tx: 2 }];
        assert_eq!(render_trace(&events), vec!["01. c1", "02. c2"]);
    }

    #[test]
    fn equivalent_schedule_keeps_only_successful_work() {
        let events = [
            Event::Granted {
                tx: 1,
                resource: "A".to_string(),
                mode: Share,
            },
            Event::Operation {
                tx: 1,
                resource: "A".to_string(),
                mode: Share,
            },
            Event::Blocked {
                tx: 2,
                resource: "A".to_string(),
                mode: Exclusive,
                blocked_on: vec![1],
            },
            Event::Committed { tx: 1 },
        ];
        assert_eq!(equivalent_schedule(&events), "r1(A) c1");
    }
}
