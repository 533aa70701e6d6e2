pub mod cancel;
pub mod executor;
pub mod monitor;
pub mod queue;
pub mod task;
