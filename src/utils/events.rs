//! Task lifecycle trace: lock-free queue -> background CSV exporter.
//!
//! `record()` never blocks the scheduler or a monitor thread; if the queue is full the
//! event is dropped and counted.

use std::{
    fs::File,
    io::BufWriter,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_queue::ArrayQueue;
use csv::Writer;
use log::{debug, error};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{Result, RuntimeError};

const EVENT_QUEUE_CAPACITY: usize = 16_384;
const EXPORTER_POLL_MS: u64 = 10;
const FLUSH_BATCHES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Triggered,
    Dropped,
    Discarded,
    ExecStart,
    ExecDone,
    TimedOut,
    OutputProduced,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Triggered => "triggered",
            EventKind::Dropped => "dropped",
            EventKind::Discarded => "discarded",
            EventKind::ExecStart => "exec_start",
            EventKind::ExecDone => "exec_done",
            EventKind::TimedOut => "timed_out",
            EventKind::OutputProduced => "output",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub seq: u64,
    pub ts_ns: u64,
    pub actor: &'static str,
    pub kind: EventKind,
    pub value: u64,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    seq: u64,
    ts_ns: u64,
    actor: &'a str,
    event: &'a str,
    value: u64,
}

impl TaskEvent {
    fn row(&self) -> CsvRow<'_> {
        CsvRow {
            seq: self.seq,
            ts_ns: self.ts_ns,
            actor: self.actor,
            event: self.kind.as_str(),
            value: self.value,
        }
    }
}

/// Non-blocking recorder. Clones share the same queue and clock.
#[derive(Clone)]
pub struct EventRecorder {
    queue: Arc<ArrayQueue<TaskEvent>>,
    dropped: Arc<AtomicU64>,
    run_start: Instant,
    running: Arc<AtomicBool>,
    exporter: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            dropped: Arc::new(AtomicU64::new(0)),
            run_start: Instant::now(),
            running: Arc::new(AtomicBool::new(false)),
            exporter: Arc::new(Mutex::new(None)),
        }
    }

    /// Nanoseconds since the recorder was created.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    #[inline]
    pub fn record(&self, seq: u64, actor: &'static str, kind: EventKind, value: u64) {
        let event = TaskEvent {
            seq,
            ts_ns: self.now_ns(),
            actor,
            kind,
            value,
        };
        if self.queue.push(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Removes and returns everything queued so far (used when no exporter runs).
    pub fn drain(&self) -> Vec<TaskEvent> {
        let mut out = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.queue.pop() {
            out.push(e);
        }
        out
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Spawns the thread draining the queue into `output_csv`.
    pub fn start_exporter(&self, output_csv: PathBuf) -> Result<()> {
        let mut guard = self.exporter.lock();
        if guard.is_some() {
            return Ok(());
        }

        let file = File::create(&output_csv)?;
        let queue = self.queue.clone();
        let running = self.running.clone();
        let dropped = self.dropped.clone();
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("tm-event-exporter".into())
            .spawn(move || {
                let mut wtr = Writer::from_writer(BufWriter::new(file));
                let mut batches = 0usize;

                while running.load(Ordering::SeqCst) {
                    let mut any = false;
                    for _ in 0..256 {
                        let Some(event) = queue.pop() else { break };
                        any = true;
                        if let Err(e) = wtr.serialize(event.row()) {
                            error!("[events] csv write failed: {}", e);
                        }
                    }
                    if any {
                        batches += 1;
                        if batches >= FLUSH_BATCHES {
                            wtr.flush().ok();
                            batches = 0;
                        }
                    } else {
                        thread::sleep(Duration::from_millis(EXPORTER_POLL_MS));
                    }
                }

                while let Some(event) = queue.pop() {
                    wtr.serialize(event.row()).ok();
                }
                wtr.flush().ok();
                debug!(
                    "[events] exporter exiting, dropped={}",
                    dropped.load(Ordering::Relaxed)
                );
            })
            .map_err(|e| RuntimeError::Spawn {
                what: "event exporter".into(),
                source: e,
            })?;

        *guard = Some(handle);
        Ok(())
    }

    /// Stops the exporter after a final drain. No-op if none is running.
    pub fn stop_exporter(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.exporter.lock().take() {
            let _ = h.join();
        }
    }
}
