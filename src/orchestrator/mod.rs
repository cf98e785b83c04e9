//! Scheduler core modules.
//!
//! Covers session lifecycle and file-lock arbitration, worker pool
//! coordination, and the periodic health-check driver.

pub mod health_monitor;
pub mod session_manager;
pub mod worker_coordinator;
