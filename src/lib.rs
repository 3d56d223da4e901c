//! Per-teacher lesson timeline and cross-teacher bulk adjustment engine.
//!
//! The core is a pure in-memory model with two edge contracts: a day
//! snapshot read (`model::DaySnapshot` → `engine::build_teacher_queues`) and
//! a bulk change-set write (`engine::CommitSink`). One [`engine::GlobalFlag`]
//! per day view coordinates the teachers' queues through an adjustment
//! session: enter, propose times/locations, optionally lock all pending
//! teachers to one value, then submit the accumulated diffs or discard them.
//!
//! No I/O happens here — fetching snapshots, persisting mutations, and
//! rendering timelines are the caller's collaborators.

pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
