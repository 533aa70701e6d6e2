//! Observability: counters, lifecycle trace, end-of-run export.

pub mod events;
pub mod export;
pub mod metrics;
