//! queue.rs
//! Fixed-capacity circular table of triggered tasks.
//!
//! - `enqueue` never blocks: a full table drops the new trigger (counted in `dropped()`).
//! - `dequeue_blocking` waits on a condition variable and only *peeks* at the head;
//!   `remove_head` commits the removal, so the scheduler can inspect before committing.
//! - `remove_point == None` means empty; `insert_point == remove_point` means full.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::error::{Result, RuntimeError};
use crate::scheduler::task::{ScheduleEntry, Task};

struct TaskTable {
    slots: Vec<Option<Arc<ScheduleEntry>>>,
    insert_point: usize,
    remove_point: Option<usize>,
    next_seq: u64,
    closed: bool,
}

impl TaskTable {
    fn is_full(&self) -> bool {
        self.remove_point == Some(self.insert_point)
    }

    fn len(&self) -> usize {
        let cap = self.slots.len();
        match self.remove_point {
            None => 0,
            Some(rp) if self.insert_point > rp => self.insert_point - rp,
            Some(rp) => cap - rp + self.insert_point,
        }
    }
}

pub struct TaskQueue {
    table: Mutex<TaskTable>,
    not_empty: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RuntimeError::InvalidCapacity(capacity));
        }
        Ok(Self {
            table: Mutex::new(TaskTable {
                slots: vec![None; capacity],
                insert_point: 0,
                remove_point: None,
                next_seq: 1,
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        })
    }

    /// Appends a trigger. On a full (or closed) table the task is handed back and
    /// counted as dropped; otherwise returns the entry's sequence number.
    pub fn enqueue(&self, task: Task) -> std::result::Result<u64, Task> {
        let mut table = self.table.lock();
        if table.closed || table.is_full() {
            drop(table);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("[queue] full, dropping trigger for {}", task.name());
            return Err(task);
        }

        let seq = table.next_seq;
        table.next_seq += 1;

        let slot = table.insert_point;
        table.slots[slot] = Some(Arc::new(ScheduleEntry::new(seq, task)));
        table.insert_point = (slot + 1) % self.capacity;
        if table.remove_point.is_none() {
            table.remove_point = Some(slot);
        }

        self.not_empty.notify_all();
        Ok(seq)
    }

    /// Waits until an entry is available and returns the head without removing it.
    /// Returns `None` once the queue is closed and drained.
    pub fn dequeue_blocking(&self) -> Option<Arc<ScheduleEntry>> {
        let mut table = self.table.lock();
        loop {
            if let Some(rp) = table.remove_point {
                return table.slots[rp].clone();
            }
            if table.closed {
                return None;
            }
            self.not_empty.wait(&mut table);
        }
    }

    /// Removes the head entry. No-op on an empty queue.
    pub fn remove_head(&self) {
        let mut table = self.table.lock();
        let Some(rp) = table.remove_point else {
            return;
        };
        table.slots[rp] = None;
        let next = (rp + 1) % self.capacity;
        table.remove_point = if next == table.insert_point {
            None
        } else {
            Some(next)
        };
    }

    /// Rejects further triggers and wakes a blocked `dequeue_blocking`.
    pub fn close(&self) {
        self.table.lock().closed = true;
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().remove_point.is_none()
    }

    pub fn is_full(&self) -> bool {
        self.table.lock().is_full()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Triggers lost to a full or closed table since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{
        cancel::CancelToken,
        task::{ExecOutput, Schedulable},
    };
    use std::{
        thread,
        time::{Duration, Instant},
    };

    struct Named(&'static str);

    impl Schedulable for Named {
        fn name(&self) -> &'static str {
            self.0
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn exec(&self, _cancel: &CancelToken) -> Option<ExecOutput> {
            None
        }
        fn produce_output(&self, _output: Option<ExecOutput>) {}
        fn deadline(&self) -> Instant {
            Instant::now()
        }
        fn has_deadline(&self) -> bool {
            false
        }
    }

    fn task(name: &'static str) -> Task {
        Task::new(Arc::new(Named(name)))
    }

    fn drain(q: &TaskQueue) -> Vec<u64> {
        let mut out = Vec::new();
        while !q.is_empty() {
            out.push(q.dequeue_blocking().unwrap().seq());
            q.remove_head();
        }
        out
    }

    #[test]
    fn empty_and_full_are_distinguished() {
        let q = TaskQueue::new(3).unwrap();
        assert!(q.is_empty());
        assert!(!q.is_full());

        for _ in 0..3 {
            q.enqueue(task("t")).unwrap();
        }
        assert!(q.is_full());
        assert!(!q.is_empty());
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn eleventh_trigger_is_dropped_and_fifo_is_kept() {
        let q = TaskQueue::new(10).unwrap();
        let seqs: Vec<u64> = (0..10).map(|_| q.enqueue(task("t")).unwrap()).collect();

        let rejected = q.enqueue(task("late"));
        assert_eq!(rejected.unwrap_err().name(), "late");
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.len(), 10);

        assert_eq!(drain(&q), seqs);
        assert!(q.is_empty());
    }

    #[test]
    fn dequeue_peeks_until_removed() {
        let q = TaskQueue::new(4).unwrap();
        q.enqueue(task("a")).unwrap();
        q.enqueue(task("b")).unwrap();

        assert_eq!(q.dequeue_blocking().unwrap().name(), "a");
        assert_eq!(q.dequeue_blocking().unwrap().name(), "a");
        q.remove_head();
        assert_eq!(q.dequeue_blocking().unwrap().name(), "b");
    }

    #[test]
    fn remove_head_on_empty_is_noop() {
        let q = TaskQueue::new(2).unwrap();
        q.remove_head();
        assert!(q.is_empty());
        q.enqueue(task("a")).unwrap();
        q.remove_head();
        q.remove_head();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn wraps_around_without_losing_order() {
        let q = TaskQueue::new(3).unwrap();
        for _ in 0..5 {
            let first = q.enqueue(task("t")).unwrap();
            let second = q.enqueue(task("t")).unwrap();
            assert_eq!(q.dequeue_blocking().unwrap().seq(), first);
            q.remove_head();
            assert_eq!(q.dequeue_blocking().unwrap().seq(), second);
            q.remove_head();
            assert!(q.is_empty());
        }
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let q = TaskQueue::new(4).unwrap();
        for i in 0..50 {
            if i % 3 == 0 {
                q.remove_head();
            } else {
                let _ = q.enqueue(task("t"));
            }
            assert!(q.len() <= 4);
            assert_eq!(q.is_empty(), q.len() == 0);
            assert_eq!(q.is_full(), q.len() == 4);
        }
    }

    #[test]
    fn blocked_dequeue_wakes_on_enqueue() {
        let q = Arc::new(TaskQueue::new(2).unwrap());
        let consumer = {
            let q = q.clone();
            thread::spawn(move || q.dequeue_blocking().map(|e| e.name()))
        };
        thread::sleep(Duration::from_millis(20));
        q.enqueue(task("wake")).unwrap();
        assert_eq!(consumer.join().unwrap(), Some("wake"));
    }

    #[test]
    fn close_releases_blocked_consumer() {
        let q = Arc::new(TaskQueue::new(2).unwrap());
        let consumer = {
            let q = q.clone();
            thread::spawn(move || q.dequeue_blocking().is_none())
        };
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert!(consumer.join().unwrap());
        assert!(q.enqueue(task("after")).is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(TaskQueue::new(0).is_err());
    }
}
