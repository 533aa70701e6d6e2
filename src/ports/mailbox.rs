//! mailbox.rs
//! Single-slot typed mailbox with an edge-triggered "new data" flag.
//!
//! Writing a port stores the value and, when an actor is bound to it, enqueues one
//! trigger for that actor. Readers consume the flag with `take_if_new`.

use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::scheduler::{
    queue::TaskQueue,
    task::{Schedulable, Task},
};
use crate::utils::{
    events::{EventKind, EventRecorder},
    metrics::SharedMetrics,
};

struct Mailbox<T> {
    value: Option<T>,
    is_new: bool,
}

pub struct Port<T> {
    name: &'static str,
    mailbox: Mutex<Mailbox<T>>,
    dependent: RwLock<Option<Arc<dyn Schedulable>>>,
    queue: Arc<TaskQueue>,
    metrics: SharedMetrics,
    recorder: Option<EventRecorder>,
}

impl<T: Clone + Send> Port<T> {
    pub fn new(name: &'static str, queue: Arc<TaskQueue>, metrics: SharedMetrics) -> Self {
        Self {
            name,
            mailbox: Mutex::new(Mailbox {
                value: None,
                is_new: false,
            }),
            dependent: RwLock::new(None),
            queue,
            metrics,
            recorder: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Option<EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Makes `actor` the dependent of this port. Replaces any previous binding.
    pub fn bind(&self, actor: Arc<dyn Schedulable>) {
        *self.dependent.write() = Some(actor);
    }

    pub fn unbind(&self) {
        *self.dependent.write() = None;
    }

    pub fn is_bound(&self) -> bool {
        self.dependent.read().is_some()
    }

    /// Stores `value`, marks it new and triggers the dependent actor.
    /// Returns the trigger's sequence number, or `None` if nothing was enqueued.
    pub fn set(&self, value: T) -> Option<u64> {
        {
            let mut mb = self.mailbox.lock();
            mb.value = Some(value);
            mb.is_new = true;
        }

        let actor = self.dependent.read().clone()?;
        let actor_name = actor.name();
        match self.queue.enqueue(Task::new(actor)) {
            Ok(seq) => {
                self.metrics.record_triggered();
                if let Some(rec) = &self.recorder {
                    rec.record(seq, actor_name, EventKind::Triggered, 0);
                }
                Some(seq)
            }
            Err(task) => {
                debug!("[port {}] queue full, trigger for {} dropped", self.name, task.name());
                self.metrics.record_dropped(task.name());
                if let Some(rec) = &self.recorder {
                    rec.record(0, task.name(), EventKind::Dropped, self.queue.len() as u64);
                }
                None
            }
        }
    }

    /// Returns the value if it has not been consumed yet, clearing the flag.
    pub fn take_if_new(&self) -> Option<T> {
        let mut mb = self.mailbox.lock();
        if !mb.is_new {
            return None;
        }
        mb.is_new = false;
        mb.value.clone()
    }

    /// Last written value regardless of the flag.
    pub fn latest(&self) -> Option<T> {
        self.mailbox.lock().value.clone()
    }

    pub fn is_new(&self) -> bool {
        self.mailbox.lock().is_new
    }
}
