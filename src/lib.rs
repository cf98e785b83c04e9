#![forbid(unsafe_code)]

//! `taskgrid` — in-process task scheduler.
//!
//! Coordinates batches of work ("sessions") across a bounded pool of
//! execution slots ("workers"): session lifecycle and progress
//! accounting, exclusive file locks across independently-progressing
//! sessions, FIFO task queueing with heartbeat-based failure detection,
//! and durable session snapshots.

pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
