//! Persistence of closed activities.
//!
//! The log is a single `activities.csv` under the application directory, one
//! row per closed activity, append-only for the live tracker. Tag edits and
//! end-time extensions rewrite the whole log under an exclusive file lock.

pub mod activity;
pub mod store;
