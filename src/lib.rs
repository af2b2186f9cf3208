//! # Slumbr Library
//!
//! Internal library for the slumbr binary.
//!
//! This library exists to enable testing of the scheduling internals and to
//! provide a clean separation between CLI dispatch (main.rs) and application
//! logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Slumbr` struct provides the application API with
//!   resource management (lock file, signal handlers, collaborators)
//! - **Core Logic**: `core` module runs the polling loop; `scheduler` holds
//!   the per-tick smart sleep state machine
//! - **Schedule Math**: `schedule` computes the daily window, including
//!   windows that wrap past midnight
//! - **Collaborators**: `display` (countdown/debug surfaces) and `power`
//!   (best-effort power commands) behind trait seams
//! - **Infrastructure**: settings store, signal handling, single-instance
//!   locking, logging, and the time-source abstraction

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

// Public API modules
pub mod args;
pub mod display;
pub mod lock;
pub mod power;
pub mod schedule;
pub mod scheduler;
pub mod settings;
pub mod signals;
pub mod time_source;

// Internal modules
mod core;
mod slumbr;

// Re-export for binary
pub use slumbr::Slumbr;
