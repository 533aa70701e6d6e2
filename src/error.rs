//! error.rs
//! Error taxonomy for the runtime and its transports.
//!
//! - `Ok(_)`            -> OK
//! - `Err(RuntimeError)` -> ERROR (socket / shared-memory / thread setup failures)
//! - `Ok(None)` / `None` -> NO_DATA, a normal steady state for readers and listeners
//!
//! Task-level "not ready" is not an error at all: the scheduler just discards the trigger.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Creating, configuring or binding a datagram socket failed.
    #[error("socket setup failed for {addr}: {source}")]
    Socket {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// `send_to` / `recv_from` failed on an already-initialised socket.
    #[error("datagram I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("datagram too short: expected {expected} bytes, got {actual}")]
    ShortDatagram { expected: usize, actual: usize },

    /// `ftok` / `shmget` / `shmat` / `shmctl` failed for the segment with this id.
    #[error("shared memory '{id}' {op} failed: {source}")]
    SharedMemory {
        id: char,
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    /// Thread creation failed (deadline monitor, listener, scheduler).
    #[error("failed to spawn {what} thread: {source}")]
    Spawn {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid address '{0}'")]
    Address(String),

    /// A worker thread unwound instead of returning.
    #[error("{0} thread panicked")]
    Panicked(&'static str),

    /// The receiving end of an in-process output channel is gone.
    #[error("{0} output disconnected")]
    Disconnected(&'static str),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
