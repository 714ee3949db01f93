//! Automated productivity tracker. A background daemon polls the foreground
//! window on a fixed interval, classifies the active application, runs the
//! activity-session state machine, and appends closed records to a csv log;
//! the cli reads that log for reports and supports manual entries, tag
//! edits, and settings.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod editor;
pub mod probe;
pub mod storage;
pub mod utils;
