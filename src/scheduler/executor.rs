//! executor.rs
//! The scheduler loop: dequeue a trigger, ask the actor whether it is ready, then
//! discard it or run it.
//!
//! - Not ready: remove from the queue, finish as discarded.
//! - Ready, no deadline: `exec` then `produce_output` on this thread.
//! - Ready, deadline: pin the deadline on the entry, mark `Executing`, start a
//!   `DeadlineMonitor`, yield once so it can start, run `exec` here, stage its result
//!   on the entry and mark `ExecDone`. The monitor produces the output.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

use log::{debug, error, info, warn};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::error::{Result, RuntimeError};
use crate::scheduler::{
    monitor::DeadlineMonitor,
    queue::TaskQueue,
    task::{ScheduleEntry, TaskStatus},
};
use crate::utils::{
    events::{EventKind, EventRecorder},
    metrics::SharedMetrics,
};

#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<TaskQueue>,
    metrics: SharedMetrics,
    recorder: Option<EventRecorder>,
}

impl Scheduler {
    pub fn new(queue: Arc<TaskQueue>, metrics: SharedMetrics) -> Self {
        Self {
            queue,
            metrics,
            recorder: None,
        }
    }

    pub fn with_recorder(mut self, recorder: EventRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Runs until the queue is closed and drained, or a monitor thread cannot be started.
    pub fn run(&self) -> Result<()> {
        info!(
            "[Scheduler] started (queue capacity {})",
            self.queue.capacity()
        );
        while let Some(entry) = self.queue.dequeue_blocking() {
            if !entry.actor().is_ready() {
                self.queue.remove_head();
                entry.set_status(TaskStatus::Finished);
                self.metrics.record_discarded(entry.name());
                self.record(&entry, EventKind::Discarded, 0);
                debug!("[Scheduler] {} #{} not ready, discarded", entry.name(), entry.seq());
                continue;
            }
            self.queue.remove_head();
            self.run_task(entry)?;
        }
        info!("[Scheduler] queue closed, exiting");
        Ok(())
    }

    /// Executes one admitted entry. Must run right after `is_ready` returned true:
    /// a deadline entry pins `actor.deadline()` here, before any later trigger of the
    /// same actor can move its release time.
    pub fn run_task(&self, entry: Arc<ScheduleEntry>) -> Result<()> {
        let actor = entry.actor().clone();

        if !entry.task().has_deadline() {
            let started = Instant::now();
            self.record(&entry, EventKind::ExecStart, 0);
            let output = actor.exec(entry.cancel_token());
            let exec_us = started.elapsed().as_micros() as u64;
            self.metrics.record_executed(actor.name(), exec_us);
            self.record(&entry, EventKind::ExecDone, exec_us);

            actor.produce_output(output);
            self.metrics.record_output();
            self.record(&entry, EventKind::OutputProduced, 0);
            entry.set_status(TaskStatus::Finished);
            return Ok(());
        }

        entry.fix_deadline(actor.deadline());
        entry.set_status(TaskStatus::Executing);
        DeadlineMonitor::new(entry.clone(), self.metrics.clone(), self.recorder.clone())
            .spawn()?;
        thread::yield_now();

        let done = ExecDoneOnDrop(&entry);
        let started = Instant::now();
        self.record(&entry, EventKind::ExecStart, 0);
        entry.stage_output(actor.exec(entry.cancel_token()));
        let exec_us = started.elapsed().as_micros() as u64;
        self.metrics.record_executed(actor.name(), exec_us);
        self.record(&entry, EventKind::ExecDone, exec_us);
        drop(done);
        Ok(())
    }

    /// Runs the loop on a dedicated max-priority thread, optionally pinned to `core`.
    pub fn spawn(self, core: Option<usize>) -> Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name("tm-scheduler".into())
            .spawn_with_priority(ThreadPriority::Max, move |prio| {
                if let Err(e) = prio {
                    warn!("[Scheduler] could not raise priority: {:?}", e);
                }
                if let Some(core) = core {
                    pin_to_core(core);
                }
                let result = self.run();
                if let Err(e) = &result {
                    error!("[Scheduler] stopped: {}", e);
                }
                result
            })
            .map_err(|e| RuntimeError::Spawn {
                what: "scheduler".into(),
                source: e,
            })
    }

    fn record(&self, entry: &ScheduleEntry, kind: EventKind, value: u64) {
        if let Some(rec) = &self.recorder {
            rec.record(entry.seq(), entry.name(), kind, value);
        }
    }
}

/// Marks the entry `ExecDone` when dropped, including while unwinding out of a
/// panicking `exec`, so its monitor never waits on a dead scheduler.
struct ExecDoneOnDrop<'a>(&'a ScheduleEntry);

impl Drop for ExecDoneOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set_status(TaskStatus::ExecDone);
    }
}

fn pin_to_core(core: usize) {
    let core_ids = core_affinity::get_core_ids().unwrap_or_default();
    match core_ids.get(core) {
        Some(id) if core_affinity::set_for_current(*id) => {
            info!("[Scheduler] pinned to core {}", core)
        }
        Some(_) => error!("[Scheduler] failed to pin to core {}", core),
        None => error!("[Scheduler] core {} not among available cores", core),
    }
}
