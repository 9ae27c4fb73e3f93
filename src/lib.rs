#![forbid(unsafe_code)]
//! Multiple-granularity locking (MGL) under two-phase locking (2PL).
//!
//! This crate provides:
//!
//! - **Lock Modes** -- IS/IX/S/U/X with table-driven compatibility and upgrade rules
//! - **Resource Hierarchy** -- arbitrary-depth tree with root-first ancestor walk
//! - **Lock Table** -- per-resource grants with in-place mode upgrades
//! - **Wait Queue** -- arrival-ordered blocked requests with front-priority retry
//! - **Wait-For Graph** -- transaction-blocks-on-transaction edges with cycle detection
//! - **Deadlock Resolution** -- max-id victim selection and forced abort
//! - **Transaction Registry** -- commit/abort lifecycle with deferred commits
//! - **Scheduler** -- synchronous replay of an ordered operation stream
//! - **Schedule Parser & Trace Formatter** -- the textual collaborators around the core

pub mod event;
pub mod graph;
pub mod hierarchy;
pub mod manager;
pub mod mode;
pub mod queue;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod table;
pub mod trace;

pub use event::{AbortReason, Event, History};
pub use graph::WaitForGraph;
pub use hierarchy::{HierarchyError, ResourceHierarchy};
pub use manager::{LockManager, LockResult};
pub use mode::LockMode;
pub use queue::{WaitEntry, WaitQueue};
pub use registry::{TransactionRegistry, TxState};
pub use schedule::{parse_schedule, ParseError};
pub use scheduler::{OpKind, Operation, Scheduler, SchedulerError};
pub use table::LockTable;
pub use trace::{equivalent_schedule, render, render_trace};
