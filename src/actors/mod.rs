//! Concrete `Schedulable` actors of the controller and the listener threads that feed them.

pub mod actuator_output;
pub mod filter;
pub mod sensor_listener;
pub mod state_feedback;

pub use actuator_output::{ActuatorOutput, OutputSink};
pub use filter::Filter;
pub use sensor_listener::SensorListener;
pub use state_feedback::{HoverTarget, StateFeedback};
