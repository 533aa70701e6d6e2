//! runtime.rs
//! Everything one scheduler instance needs, owned in one place instead of globals:
//! the task queue, the port registry, metrics and the optional event trace.

use std::{sync::Arc, thread::JoinHandle};

use log::info;

use crate::actors::{ActuatorOutput, Filter, HoverTarget, OutputSink, StateFeedback};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::ports::PortRegistry;
use crate::scheduler::{executor::Scheduler, queue::TaskQueue};
use crate::utils::{
    events::EventRecorder,
    metrics::{RuntimeMetrics, SharedMetrics},
};

/// The three controller actors after they were bound to their trigger ports.
pub struct ControllerActors {
    pub filter: Arc<Filter>,
    pub state_feedback: Arc<StateFeedback>,
    pub actuator_output: Arc<ActuatorOutput>,
}

pub struct Runtime {
    config: RuntimeConfig,
    queue: Arc<TaskQueue>,
    ports: Arc<PortRegistry>,
    metrics: SharedMetrics,
    recorder: Option<EventRecorder>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::build(config, None)
    }

    pub fn with_recorder(config: RuntimeConfig, recorder: EventRecorder) -> Result<Self> {
        Self::build(config, Some(recorder))
    }

    fn build(config: RuntimeConfig, recorder: Option<EventRecorder>) -> Result<Self> {
        let queue = Arc::new(TaskQueue::new(config.queue_capacity)?);
        let metrics = RuntimeMetrics::new();
        let ports = Arc::new(PortRegistry::new(
            queue.clone(),
            metrics.clone(),
            recorder.clone(),
        ));
        Ok(Self {
            config,
            queue,
            ports,
            metrics,
            recorder,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn ports(&self) -> &Arc<PortRegistry> {
        &self.ports
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn recorder(&self) -> Option<&EventRecorder> {
        self.recorder.as_ref()
    }

    /// Creates the filter -> state feedback -> actuator chain and binds each actor
    /// to the port that triggers it.
    pub fn wire_controller(
        &self,
        sink: Box<dyn OutputSink>,
        target: HoverTarget,
    ) -> ControllerActors {
        let filter = Filter::new(&self.ports, self.config.filter_budget);
        let state_feedback = StateFeedback::new(&self.ports, target, self.config.controller_budget);
        let actuator_output = ActuatorOutput::new(&self.ports, sink);

        self.ports.ins.bind(filter.clone());
        self.ports.state_feedback.bind(state_feedback.clone());
        self.ports.actuator.bind(actuator_output.clone());

        ControllerActors {
            filter,
            state_feedback,
            actuator_output,
        }
    }

    pub fn scheduler(&self) -> Scheduler {
        let sched = Scheduler::new(self.queue.clone(), self.metrics.clone());
        match &self.recorder {
            Some(rec) => sched.with_recorder(rec.clone()),
            None => sched,
        }
    }

    /// Starts the scheduler on its own max-priority thread.
    pub fn spawn_scheduler(&self) -> Result<JoinHandle<Result<()>>> {
        self.scheduler().spawn(self.config.scheduler_core)
    }

    /// Closes the queue so the scheduler loop drains and returns, and releases the
    /// actor bindings.
    pub fn shutdown(&self) {
        info!(
            "[Runtime] shutting down ({} triggers pending)",
            self.queue.len()
        );
        self.queue.close();
        self.ports.unbind_all();
    }
}
