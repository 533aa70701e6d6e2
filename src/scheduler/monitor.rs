//! monitor.rs
//! Deadline monitor: one detached thread per executing deadline task.
//!
//! The scheduler thread runs `exec` to completion; this thread only bounds it:
//! sleep until the deadline, and if `exec` is still running cancel its token, call
//! `stop_exec` once, then yield-spin until the scheduler marks `ExecDone`. Either way
//! the monitor is the one thread that calls `produce_output` for the entry, handing it
//! the output that entry's `exec` staged. The deadline was pinned on the entry by the
//! scheduler at admission; the actor is not asked again.

use std::{
    sync::Arc,
    thread,
    time::Instant,
};

use crossbeam::utils::Backoff;
use log::debug;
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::error::{Result, RuntimeError};
use crate::scheduler::task::{ScheduleEntry, TaskStatus};
use crate::utils::{
    events::{EventKind, EventRecorder},
    metrics::SharedMetrics,
};

pub struct DeadlineMonitor {
    entry: Arc<ScheduleEntry>,
    metrics: SharedMetrics,
    recorder: Option<EventRecorder>,
}

impl DeadlineMonitor {
    pub fn new(
        entry: Arc<ScheduleEntry>,
        metrics: SharedMetrics,
        recorder: Option<EventRecorder>,
    ) -> Self {
        Self {
            entry,
            metrics,
            recorder,
        }
    }

    /// Starts the monitor thread. The handle is not kept: the thread is detached.
    pub fn spawn(self) -> Result<()> {
        let name = format!("tm-deadline-{}", self.entry.seq());
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run())
            .map(|_detached| ())
            .map_err(|e| RuntimeError::Spawn {
                what: "deadline monitor".into(),
                source: e,
            })
    }

    fn run(self) {
        let actor = self.entry.actor().clone();
        let deadline = self.entry.deadline().unwrap_or_else(Instant::now);

        // a deadline already in the past means no sleep at all
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            SpinSleeper::new(100_000)
                .with_spin_strategy(SpinStrategy::YieldThread)
                .sleep(remaining);
        }

        if self.entry.time_out_unless_done() {
            debug!(
                "[monitor] {} #{} missed its deadline, stopping",
                actor.name(),
                self.entry.seq()
            );
            self.entry.cancel_token().cancel();
            actor.stop_exec();
            self.metrics.record_timeout(actor.name());
            self.record(EventKind::TimedOut, 0);

            let backoff = Backoff::new();
            while self.entry.status() != TaskStatus::ExecDone {
                backoff.snooze();
            }
        }

        actor.produce_output(self.entry.take_output());
        self.metrics.record_output();
        self.record(EventKind::OutputProduced, 0);
        self.entry.set_status(TaskStatus::Finished);
    }

    fn record(&self, kind: EventKind, value: u64) {
        if let Some(rec) = &self.recorder {
            rec.record(self.entry.seq(), self.entry.name(), kind, value);
        }
    }
}
