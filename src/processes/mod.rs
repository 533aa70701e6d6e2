//! Process roles of the helicopter demo. Each `run_*` function owns one role until
//! `running` is cleared and returns how many cycles or messages it handled.
//!
//! ```text
//! gps/ins sensors --UDP--> controller --UDP--> actuator sink --shm 'd'--> plant
//!        ^                                                                  |
//!        +------------------------- shm 'c' --------------------------------+
//!                                                   plant --UDP--> display
//! ```

pub mod actuator;
pub mod controller;
pub mod display;
pub mod plant;
pub mod sensors;

use std::time::{Duration, Instant};

use spin_sleep::{SpinSleeper, SpinStrategy};

/// Fixed-rate release schedule for the periodic roles.
pub struct Periodic {
    period: Duration,
    sleeper: SpinSleeper,
    next_release: Instant,
    late: u64,
}

impl Periodic {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            sleeper: SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread),
            next_release: Instant::now() + period,
            late: 0,
        }
    }

    /// Sleeps until the next release. A release that is already past counts as late
    /// and restarts the schedule from now.
    pub fn wait(&mut self) -> bool {
        let now = Instant::now();
        let on_time = now < self.next_release;
        if on_time {
            self.sleeper.sleep(self.next_release - now);
            self.next_release += self.period;
        } else {
            self.late += 1;
            self.next_release = now + self.period;
        }
        on_time
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn late(&self) -> u64 {
        self.late
    }
}
