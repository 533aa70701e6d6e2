//! filter.rs
//! Navigation filter: turns each new INS sample into a state estimate, pulling the
//! horizontal position toward the latest GPS fix when one has arrived since the last run.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use log::debug;
use parking_lot::Mutex;

use crate::ports::{Port, PortRegistry, StateEstimate};
use crate::scheduler::{
    cancel::CancelToken,
    task::{ExecOutput, Schedulable},
};
use crate::transport::messages::{GpsMessage, InsMessage};

/// Weight of a fresh GPS fix against the INS position.
pub const GPS_WEIGHT: f64 = 0.3;

pub struct Filter {
    ins: Arc<Port<InsMessage>>,
    gps: Arc<Port<GpsMessage>>,
    output: Arc<Port<StateEstimate>>,
    budget: Duration,
    released: Mutex<Instant>,
    // sample admitted by the last `is_ready`, taken by the `exec` that follows it
    sample: Mutex<Option<InsMessage>>,
}

impl Filter {
    pub fn new(ports: &PortRegistry, budget: Duration) -> Arc<Self> {
        Arc::new(Self {
            ins: ports.ins.clone(),
            gps: ports.gps.clone(),
            output: ports.state_feedback.clone(),
            budget,
            released: Mutex::new(Instant::now()),
            sample: Mutex::new(None),
        })
    }

    fn blend(ins: &InsMessage, gps: Option<GpsMessage>) -> StateEstimate {
        let mut est = StateEstimate::from(ins);
        if let Some(fix) = gps {
            est.north = est.north * (1.0 - GPS_WEIGHT) + fix.north as f64 * GPS_WEIGHT;
            est.east = est.east * (1.0 - GPS_WEIGHT) + fix.east as f64 * GPS_WEIGHT;
            est.gps_fused = true;
        }
        est
    }
}

impl Schedulable for Filter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn is_ready(&self) -> bool {
        let Some(sample) = self.ins.take_if_new() else {
            return false;
        };
        *self.sample.lock() = Some(sample);
        *self.released.lock() = Instant::now();
        true
    }

    fn exec(&self, cancel: &CancelToken) -> Option<ExecOutput> {
        let sample = self.sample.lock().take()?;
        // a cancelled run still publishes the unfused INS pose
        let gps = if cancel.is_cancelled() {
            None
        } else {
            self.gps.take_if_new()
        };
        Some(Box::new(Self::blend(&sample, gps)))
    }

    fn stop_exec(&self) {
        debug!("[filter] over budget");
    }

    fn produce_output(&self, output: Option<ExecOutput>) {
        if let Some(est) = output.and_then(|o| o.downcast::<StateEstimate>().ok()) {
            self.output.set(*est);
        }
    }

    fn deadline(&self) -> Instant {
        *self.released.lock() + self.budget
    }

    fn has_deadline(&self) -> bool {
        true
    }
}
