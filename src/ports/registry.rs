//! registry.rs
//! The controller's fixed set of ports.
//!
//! ```text
//! gps ─┐
//!      ├─> Filter ─> state_feedback ─> StateFeedback ─> actuator ─> ActuatorOutput
//! ins ─┘ (trigger)
//! ```

use std::sync::Arc;

use super::Port;
use crate::scheduler::queue::TaskQueue;
use crate::transport::messages::{ActuatorMessage, GpsMessage, InsMessage};
use crate::utils::{events::EventRecorder, metrics::SharedMetrics};

/// Fused pose produced by the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateEstimate {
    pub north: f64,
    pub east: f64,
    pub down: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    /// A GPS fix newer than the previous estimate was blended in.
    pub gps_fused: bool,
}

impl From<&InsMessage> for StateEstimate {
    fn from(ins: &InsMessage) -> Self {
        Self {
            north: ins.north as f64,
            east: ins.east as f64,
            down: ins.down as f64,
            roll: ins.roll as f64,
            pitch: ins.pitch as f64,
            yaw: ins.yaw as f64,
            gps_fused: false,
        }
    }
}

pub struct PortRegistry {
    pub gps: Arc<Port<GpsMessage>>,
    pub ins: Arc<Port<InsMessage>>,
    pub state_feedback: Arc<Port<StateEstimate>>,
    pub actuator: Arc<Port<ActuatorMessage>>,
}

impl PortRegistry {
    pub fn new(
        queue: Arc<TaskQueue>,
        metrics: SharedMetrics,
        recorder: Option<EventRecorder>,
    ) -> Self {
        fn port<T: Clone + Send>(
            name: &'static str,
            queue: &Arc<TaskQueue>,
            metrics: &SharedMetrics,
            recorder: &Option<EventRecorder>,
        ) -> Arc<Port<T>> {
            let port = Port::new(name, queue.clone(), metrics.clone());
            Arc::new(port.with_recorder(recorder.clone()))
        }

        Self {
            gps: port("gps", &queue, &metrics, &recorder),
            ins: port("ins", &queue, &metrics, &recorder),
            state_feedback: port("state_feedback", &queue, &metrics, &recorder),
            actuator: port("actuator", &queue, &metrics, &recorder),
        }
    }

    pub fn set_gps(&self, msg: GpsMessage) -> Option<u64> {
        self.gps.set(msg)
    }

    pub fn set_ins(&self, msg: InsMessage) -> Option<u64> {
        self.ins.set(msg)
    }

    pub fn set_state_feedback(&self, estimate: StateEstimate) -> Option<u64> {
        self.state_feedback.set(estimate)
    }

    pub fn set_actuator(&self, msg: ActuatorMessage) -> Option<u64> {
        self.actuator.set(msg)
    }

    /// Drops every actor binding. Actors hold the ports they read, so this breaks
    /// the reference cycle at shutdown.
    pub fn unbind_all(&self) {
        self.gps.unbind();
        self.ins.unbind();
        self.state_feedback.unbind();
        self.actuator.unbind();
    }
}
