//! Jupiter round-trip arbitrage bot
//!
//! Features:
//! - Environment configuration loaded once at startup
//! - Explicit run state owned by the polling loop
//! - Rate-limited polling loop with single-flight trade execution
//! - Manual control commands (force execute, revert, toggle, rotate, stop)

pub mod settings;
pub mod state;
pub mod control;
pub mod runner;

pub use settings::Settings;
pub use state::{RunState, RunStats, SideStats};
pub use control::{spawn_stdin_reader, ControlCommand};
pub use runner::{CycleOutcome, Runner, StopReason};
