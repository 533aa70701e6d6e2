//! Timed-multitasking runtime: a deadline-aware task scheduler driven by port writes,
//! plus the shared-memory and UDP transports its processes use to talk to each other.

pub mod actors;
pub mod config;
pub mod error;
pub mod ports;
pub mod processes;
pub mod runtime;
pub mod scheduler;
pub mod transport;
pub mod utils;

pub use error::{Result, RuntimeError};
