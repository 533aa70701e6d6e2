//! Runtime counters for the scheduler and its triggers.
//!
//! Two layers:
//! - **Global counters:** atomics bumped on every trigger, drop, discard, run,
//!   timeout and output.
//! - **Per-actor counters:** `DashMap` keyed by actor name, contention-free increments.
//!
//! Exec latency history is bounded to `MAX_POINTS` samples.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

pub const MAX_POINTS: usize = 1_000;

#[derive(Debug, Default)]
pub struct ActorCounters {
    pub runs: AtomicU64,
    pub discarded: AtomicU64,
    pub dropped: AtomicU64,
    pub deadline_misses: AtomicU64,
}

#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    triggered: AtomicU64,
    dropped: AtomicU64,
    discarded: AtomicU64,
    executed: AtomicU64,
    timed_out: AtomicU64,
    outputs: AtomicU64,
    per_actor: DashMap<&'static str, ActorCounters>,
    exec_us: Mutex<VecDeque<u64>>,
}

pub type SharedMetrics = Arc<RuntimeMetrics>;

/// Point-in-time copy of the global counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub triggered: u64,
    pub dropped: u64,
    pub discarded: u64,
    pub executed: u64,
    pub timed_out: u64,
    pub outputs: u64,
    pub exec_samples: usize,
    pub exec_avg_us: u64,
    pub exec_max_us: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorSnapshot {
    pub actor: String,
    pub runs: u64,
    pub discarded: u64,
    pub dropped: u64,
    pub deadline_misses: u64,
}

impl RuntimeMetrics {
    pub fn new() -> SharedMetrics {
        Arc::new(Self::default())
    }

    pub fn record_triggered(&self) {
        self.triggered.fetch_add(1, Ordering::Relaxed);
    }

    /// Trigger lost because the task queue was full.
    pub fn record_dropped(&self, actor: &'static str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.actor(actor, |c| c.dropped.fetch_add(1, Ordering::Relaxed));
    }

    /// Trigger dequeued but the actor was not ready.
    pub fn record_discarded(&self, actor: &'static str) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        self.actor(actor, |c| c.discarded.fetch_add(1, Ordering::Relaxed));
    }

    pub fn record_executed(&self, actor: &'static str, exec_us: u64) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.actor(actor, |c| c.runs.fetch_add(1, Ordering::Relaxed));
        push_capped_u64(&mut self.exec_us.lock(), exec_us);
    }

    pub fn record_timeout(&self, actor: &'static str) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
        self.actor(actor, |c| c.deadline_misses.fetch_add(1, Ordering::Relaxed));
    }

    pub fn record_output(&self) {
        self.outputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn outputs(&self) -> u64 {
        self.outputs.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (exec_samples, exec_avg_us, exec_max_us) = {
            let hist = self.exec_us.lock();
            let avg = if hist.is_empty() {
                0
            } else {
                hist.iter().sum::<u64>() / hist.len() as u64
            };
            (hist.len(), avg, hist.iter().copied().max().unwrap_or(0))
        };

        MetricsSnapshot {
            triggered: self.triggered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            outputs: self.outputs.load(Ordering::Relaxed),
            exec_samples,
            exec_avg_us,
            exec_max_us,
        }
    }

    /// Per-actor counters, sorted by actor name.
    pub fn actor_snapshots(&self) -> Vec<ActorSnapshot> {
        let mut out: Vec<ActorSnapshot> = self
            .per_actor
            .iter()
            .map(|r| ActorSnapshot {
                actor: r.key().to_string(),
                runs: r.value().runs.load(Ordering::Relaxed),
                discarded: r.value().discarded.load(Ordering::Relaxed),
                dropped: r.value().dropped.load(Ordering::Relaxed),
                deadline_misses: r.value().deadline_misses.load(Ordering::Relaxed),
            })
            .collect();
        out.sort_by(|a, b| a.actor.cmp(&b.actor));
        out
    }

    fn actor<F: FnOnce(&ActorCounters) -> u64>(&self, name: &'static str, f: F) {
        let entry = self.per_actor.entry(name).or_default();
        f(entry.value());
    }
}

/// Appends u64 value to metrics buffer; removes oldest if at capacity.
#[inline]
pub fn push_capped_u64(buf: &mut VecDeque<u64>, val: u64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_actor() {
        let m = RuntimeMetrics::new();
        m.record_triggered();
        m.record_triggered();
        m.record_executed("filter", 40);
        m.record_discarded("filter");
        m.record_dropped("controller");
        m.record_timeout("controller");

        let snap = m.snapshot();
        assert_eq!(snap.triggered, 2);
        assert_eq!(snap.executed, 1);
        assert_eq!(snap.discarded, 1);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.timed_out, 1);
        assert_eq!(snap.exec_avg_us, 40);

        let actors = m.actor_snapshots();
        assert_eq!(actors.len(), 2);
        assert_eq!(actors[0].actor, "controller");
        assert_eq!(actors[0].deadline_misses, 1);
        assert_eq!(actors[1].runs, 1);
    }

    #[test]
    fn exec_history_is_capped() {
        let m = RuntimeMetrics::new();
        for i in 0..(MAX_POINTS as u64 + 10) {
            m.record_executed("a", i);
        }
        let snap = m.snapshot();
        assert_eq!(snap.exec_samples, MAX_POINTS);
        assert_eq!(snap.exec_max_us, MAX_POINTS as u64 + 9);
    }
}
