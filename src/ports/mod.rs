pub mod mailbox;
pub mod registry;

pub use mailbox::Port;
pub use registry::{PortRegistry, StateEstimate};
