//! state_feedback.rs
//! Hover controller: four independent PID loops, one per control axis.
//!
//! | axis                | measured | command               |
//! |---------------------|----------|-----------------------|
//! | altitude            | `down`   | `collective`          |
//! | longitudinal        | `north`  | `longitudinal_cyclic` |
//! | lateral             | `east`   | `lateral_cyclic`      |
//! | heading             | `yaw`    | `pedal`               |
//!
//! The cancel token is checked between axes. Axes not reached keep their previous
//! command, so a cut-short run still publishes a consistent (if stale) command.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use log::{debug, warn};
use parking_lot::Mutex;
use pidgeon::{ControllerConfig, PidController};

use crate::ports::{Port, PortRegistry, StateEstimate};
use crate::scheduler::{
    cancel::CancelToken,
    task::{ExecOutput, Schedulable},
};
use crate::transport::messages::ActuatorMessage;

/// Commands are normalised to [-1, 1].
const COMMAND_LIMIT: f64 = 1.0;

/// Pose the controller holds. `down` is negative above the ground reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverTarget {
    pub north: f64,
    pub east: f64,
    pub down: f64,
    pub yaw: f64,
}

impl Default for HoverTarget {
    fn default() -> Self {
        Self {
            north: 0.0,
            east: 0.0,
            down: -10.0,
            yaw: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Altitude,
    Longitudinal,
    Lateral,
    Heading,
}

impl Axis {
    const ALL: [Axis; 4] = [Axis::Altitude, Axis::Longitudinal, Axis::Lateral, Axis::Heading];

    fn gains(self) -> (f64, f64, f64) {
        match self {
            Axis::Altitude => (0.8, 0.05, 0.3),
            Axis::Longitudinal | Axis::Lateral => (0.15, 0.01, 0.2),
            Axis::Heading => (1.0, 0.0, 0.1),
        }
    }

    fn setpoint(self, target: &HoverTarget) -> f64 {
        match self {
            Axis::Altitude => target.down,
            Axis::Longitudinal => target.north,
            Axis::Lateral => target.east,
            Axis::Heading => target.yaw,
        }
    }

    fn measured(self, est: &StateEstimate) -> f64 {
        match self {
            Axis::Altitude => est.down,
            Axis::Longitudinal => est.north,
            Axis::Lateral => est.east,
            Axis::Heading => est.yaw,
        }
    }

    fn apply(self, cmd: &mut ActuatorMessage, value: f64) {
        let v = value as f32;
        match self {
            // pushing collective up reduces `down`
            Axis::Altitude => cmd.collective = -v,
            Axis::Longitudinal => cmd.longitudinal_cyclic = v,
            Axis::Lateral => cmd.lateral_cyclic = v,
            Axis::Heading => cmd.pedal = v,
        }
    }

    fn controller(self, target: &HoverTarget) -> PidController {
        let (kp, ki, kd) = self.gains();
        let config = ControllerConfig::new()
            .with_kp(kp)
            .with_ki(ki)
            .with_kd(kd)
            .with_output_limits(-COMMAND_LIMIT, COMMAND_LIMIT)
            .with_anti_windup(true);
        let mut pid = PidController::new(config);
        if pid.set_setpoint(self.setpoint(target)).is_err() {
            warn!("[state_feedback] rejected setpoint for {:?}", self);
        }
        pid
    }
}

struct FeedbackState {
    last_update: Instant,
    estimate: Option<StateEstimate>,
    loops: Vec<(Axis, PidController)>,
    command: ActuatorMessage,
}

pub struct StateFeedback {
    input: Arc<Port<StateEstimate>>,
    output: Arc<Port<ActuatorMessage>>,
    budget: Duration,
    // release time of the last admitted trigger
    released: Mutex<Instant>,
    state: Mutex<FeedbackState>,
    partial_runs: AtomicU64,
}

impl StateFeedback {
    pub fn new(ports: &PortRegistry, target: HoverTarget, budget: Duration) -> Arc<Self> {
        let now = Instant::now();
        Arc::new(Self {
            input: ports.state_feedback.clone(),
            output: ports.actuator.clone(),
            budget,
            released: Mutex::new(now),
            state: Mutex::new(FeedbackState {
                last_update: now,
                estimate: None,
                loops: Axis::ALL.iter().map(|a| (*a, a.controller(&target))).collect(),
                command: ActuatorMessage::default(),
            }),
            partial_runs: AtomicU64::new(0),
        })
    }

    /// Runs that were cut short before every axis was updated.
    pub fn partial_runs(&self) -> u64 {
        self.partial_runs.load(Ordering::Relaxed)
    }
}

impl Schedulable for StateFeedback {
    fn name(&self) -> &'static str {
        "state_feedback"
    }

    fn is_ready(&self) -> bool {
        let Some(est) = self.input.take_if_new() else {
            return false;
        };
        self.state.lock().estimate = Some(est);
        *self.released.lock() = Instant::now();
        true
    }

    fn exec(&self, cancel: &CancelToken) -> Option<ExecOutput> {
        let mut st = self.state.lock();
        let est = st.estimate.take()?;

        let now = Instant::now();
        let dt = now
            .duration_since(st.last_update)
            .as_secs_f64()
            .clamp(1e-3, 0.1);
        st.last_update = now;

        let mut cmd = st.command;
        let mut updated = 0;
        for (axis, pid) in st.loops.iter_mut() {
            if cancel.is_cancelled() {
                break;
            }
            let u = pid.compute(axis.measured(&est), dt);
            axis.apply(&mut cmd, u);
            updated += 1;
        }
        if updated < Axis::ALL.len() {
            self.partial_runs.fetch_add(1, Ordering::Relaxed);
            debug!("[state_feedback] cut short after {} axes", updated);
        }

        st.command = cmd;
        Some(Box::new(cmd))
    }

    fn stop_exec(&self) {
        debug!("[state_feedback] over budget, holding remaining axes");
    }

    fn produce_output(&self, output: Option<ExecOutput>) {
        if let Some(cmd) = output.and_then(|o| o.downcast::<ActuatorMessage>().ok()) {
            self.output.set(*cmd);
        }
    }

    fn deadline(&self) -> Instant {
        *self.released.lock() + self.budget
    }

    fn has_deadline(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::queue::TaskQueue;
    use crate::utils::metrics::RuntimeMetrics;

    fn setup() -> (PortRegistry, Arc<StateFeedback>) {
        let ports = PortRegistry::new(
            Arc::new(TaskQueue::new(10).unwrap()),
            RuntimeMetrics::new(),
            None,
        );
        let ctl = StateFeedback::new(&ports, HoverTarget::default(), Duration::from_millis(5));
        (ports, ctl)
    }

    fn run_once(
        ports: &PortRegistry,
        ctl: &StateFeedback,
        est: StateEstimate,
        cancel: &CancelToken,
    ) -> ActuatorMessage {
        ports.set_state_feedback(est);
        assert!(ctl.is_ready());
        ctl.produce_output(ctl.exec(cancel));
        ports.actuator.take_if_new().unwrap()
    }

    #[test]
    fn below_target_raises_collective() {
        let (ports, ctl) = setup();
        // 5 m below the 10 m hover height
        let est = StateEstimate {
            down: -5.0,
            ..Default::default()
        };
        let cmd = run_once(&ports, &ctl, est, &CancelToken::new());
        assert!(cmd.collective > 0.0);
        assert!(cmd.collective <= COMMAND_LIMIT as f32);
    }

    #[test]
    fn commands_stay_within_limits() {
        let (ports, ctl) = setup();
        let est = StateEstimate {
            north: 500.0,
            east: -500.0,
            down: 100.0,
            yaw: 3.0,
            ..Default::default()
        };
        let cmd = run_once(&ports, &ctl, est, &CancelToken::new());
        for v in [cmd.collective, cmd.longitudinal_cyclic, cmd.lateral_cyclic, cmd.pedal] {
            assert!(v.abs() <= COMMAND_LIMIT as f32);
        }
    }

    #[test]
    fn cancelled_run_holds_previous_command() {
        let (ports, ctl) = setup();
        let est = StateEstimate {
            north: 3.0,
            down: -5.0,
            ..Default::default()
        };
        let first = run_once(&ports, &ctl, est, &CancelToken::new());

        let cancel = CancelToken::new();
        cancel.cancel();
        let held = run_once(&ports, &ctl, est, &cancel);
        assert_eq!(held, first);
        assert_eq!(ctl.partial_runs(), 1);
    }

    #[test]
    fn each_run_publishes_its_own_command() {
        let (ports, ctl) = setup();
        let low = StateEstimate {
            down: -5.0,
            ..Default::default()
        };
        let high = StateEstimate {
            down: -15.0,
            ..Default::default()
        };

        ports.set_state_feedback(low);
        assert!(ctl.is_ready());
        let first = ctl.exec(&CancelToken::new());
        ports.set_state_feedback(high);
        assert!(ctl.is_ready());
        let second = ctl.exec(&CancelToken::new());

        // published in trigger order, each with the command its own run computed
        ctl.produce_output(first);
        let climb = ports.actuator.take_if_new().unwrap();
        ctl.produce_output(second);
        let descend = ports.actuator.take_if_new().unwrap();
        assert!(climb.collective > descend.collective);
    }

    #[test]
    fn not_ready_without_new_estimate() {
        let (_, ctl) = setup();
        assert!(!ctl.is_ready());
    }
}
