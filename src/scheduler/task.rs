//! task.rs
//! The actor capability contract and the per-trigger bookkeeping around it.
//!
//! Status machine of one schedule entry:
//!
//! ```text
//! Triggered --is_ready()=false------------------------------> Finished (discarded)
//! Triggered --ready, no deadline--> exec + produce_output ---> Finished
//! Triggered --ready, deadline-----> Executing --> ExecDone --> Finished
//!                                      |            ^
//!                                      +-> TimedOut-+   (monitor: stop_exec, wait)
//! ```

use std::{
    any::Any,
    fmt,
    sync::{Arc, OnceLock},
    time::Instant,
};

use parking_lot::Mutex;

use crate::scheduler::cancel::CancelToken;

/// What one `exec` computed, held by its schedule entry until `produce_output`.
pub type ExecOutput = Box<dyn Any + Send>;

/// Anything the scheduler can run.
///
/// `is_ready` is called once per dequeued trigger and usually consumes the "new data"
/// flag of the port the actor depends on. `exec` does the work and should return early
/// once `cancel` fires; `stop_exec` is the advisory hook the deadline monitor calls at
/// the same moment. `produce_output` is called exactly once per executed trigger and
/// receives that trigger's own `exec` result (`None` if `exec` staged nothing or
/// panicked), so overlapping triggers of one actor never publish each other's data.
pub trait Schedulable: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_ready(&self) -> bool;

    fn exec(&self, cancel: &CancelToken) -> Option<ExecOutput>;

    fn stop_exec(&self) {}

    fn produce_output(&self, output: Option<ExecOutput>);

    /// Absolute (monotonic) deadline of the release `is_ready` just admitted.
    /// Read once per trigger, on the scheduler thread, right after admission.
    fn deadline(&self) -> Instant;

    fn has_deadline(&self) -> bool;
}

/// One trigger of one actor, created on the port-write path.
#[derive(Clone)]
pub struct Task {
    actor: Arc<dyn Schedulable>,
    has_deadline: bool,
    triggered_at: Instant,
}

impl Task {
    pub fn new(actor: Arc<dyn Schedulable>) -> Self {
        let has_deadline = actor.has_deadline();
        Self {
            actor,
            has_deadline,
            triggered_at: Instant::now(),
        }
    }

    pub fn actor(&self) -> &Arc<dyn Schedulable> {
        &self.actor
    }

    pub fn name(&self) -> &'static str {
        self.actor.name()
    }

    pub fn has_deadline(&self) -> bool {
        self.has_deadline
    }

    pub fn triggered_at(&self) -> Instant {
        self.triggered_at
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("actor", &self.actor.name())
            .field("has_deadline", &self.has_deadline)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Triggered,
    Executing,
    ExecDone,
    TimedOut,
    Finished,
}

/// A queued task plus its status. Shared between the scheduler thread and, for
/// deadline tasks, one monitor thread; freed when the last handle drops.
pub struct ScheduleEntry {
    seq: u64,
    task: Task,
    status: Mutex<TaskStatus>,
    cancel: CancelToken,
    deadline: OnceLock<Instant>,
    output: Mutex<Option<ExecOutput>>,
}

impl ScheduleEntry {
    pub fn new(seq: u64, task: Task) -> Self {
        Self {
            seq,
            task,
            status: Mutex::new(TaskStatus::Triggered),
            cancel: CancelToken::new(),
            deadline: OnceLock::new(),
            output: Mutex::new(None),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn actor(&self) -> &Arc<dyn Schedulable> {
        self.task.actor()
    }

    pub fn name(&self) -> &'static str {
        self.task.name()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn status(&self) -> TaskStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: TaskStatus) {
        *self.status.lock() = status;
    }

    /// Pins the deadline of this trigger. Later calls keep the first value.
    pub fn fix_deadline(&self, at: Instant) -> Instant {
        *self.deadline.get_or_init(|| at)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.get().copied()
    }

    pub fn stage_output(&self, output: Option<ExecOutput>) {
        *self.output.lock() = output;
    }

    pub fn take_output(&self) -> Option<ExecOutput> {
        self.output.lock().take()
    }

    /// Monitor side: if exec has not finished, flip to `TimedOut` and return true.
    pub fn time_out_unless_done(&self) -> bool {
        let mut status = self.status.lock();
        if *status == TaskStatus::ExecDone {
            return false;
        }
        *status = TaskStatus::TimedOut;
        true
    }
}

impl fmt::Debug for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleEntry")
            .field("seq", &self.seq)
            .field("task", &self.task)
            .field("status", &self.status())
            .field("deadline", &self.deadline())
            .finish()
    }
}
