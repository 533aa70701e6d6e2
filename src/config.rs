//! config.rs
//! Well-known endpoints, shared-memory ids, capacities and timing for every process role.
//!
//! All processes of one deployment must agree on these values, so they live here as
//! constants; `RuntimeConfig` bundles them so tests and the demo binary can override
//! individual fields without touching globals.

use std::{path::PathBuf, time::Duration};

/// Hard upper bound on pending triggers in one scheduler.
pub const TASK_QUEUE_CAPACITY: usize = 10;

/// Slots per shared-memory ring buffer.
pub const RING_ENTRIES: usize = 8;

/// Directory handed to `ftok` when deriving shared-memory keys.
pub const SHM_DIRECTORY: &str = "/tmp";

pub const GPS_RING_ID: u8 = b'a';
pub const INS_RING_ID: u8 = b'b';
pub const PLANT_OUTPUTS_RING_ID: u8 = b'c';
pub const PLANT_INPUTS_RING_ID: u8 = b'd';

pub const CONTROLLER_IP: &str = "127.0.0.1";
pub const PLANT_IP: &str = "127.0.0.1";
pub const DISPLAY_IP: &str = "127.0.0.1";

pub const CONTROLLER_GPS_PORT: u16 = 4950;
pub const CONTROLLER_INS_PORT: u16 = 4951;
pub const PLANT_ACTUATORS_PORT: u16 = 4952;
pub const DISPLAY_PORT: u16 = 4953;

pub const PLANT_PERIOD_MS: u64 = 10;
pub const INS_PERIOD_MS: u64 = 20;
pub const GPS_PERIOD_MS: u64 = 100;

/// Execution budgets; an actor's deadline is its release time plus its budget.
pub const FILTER_BUDGET_US: u64 = 5_000;
pub const CONTROLLER_BUDGET_US: u64 = 5_000;

/// How long listener threads block in `recv_from` before re-checking the running flag.
pub const LISTENER_POLL_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub queue_capacity: usize,
    pub ring_entries: usize,
    pub shm_directory: PathBuf,

    pub controller_ip: String,
    pub plant_ip: String,
    pub display_ip: String,
    pub controller_gps_port: u16,
    pub controller_ins_port: u16,
    pub plant_actuators_port: u16,
    pub display_port: u16,

    pub plant_period: Duration,
    pub ins_period: Duration,
    pub gps_period: Duration,
    pub filter_budget: Duration,
    pub controller_budget: Duration,
    pub listener_poll: Duration,

    /// Pin the scheduler thread to this core (None = leave it to the OS).
    pub scheduler_core: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: TASK_QUEUE_CAPACITY,
            ring_entries: RING_ENTRIES,
            shm_directory: PathBuf::from(SHM_DIRECTORY),
            controller_ip: CONTROLLER_IP.to_string(),
            plant_ip: PLANT_IP.to_string(),
            display_ip: DISPLAY_IP.to_string(),
            controller_gps_port: CONTROLLER_GPS_PORT,
            controller_ins_port: CONTROLLER_INS_PORT,
            plant_actuators_port: PLANT_ACTUATORS_PORT,
            display_port: DISPLAY_PORT,
            plant_period: Duration::from_millis(PLANT_PERIOD_MS),
            ins_period: Duration::from_millis(INS_PERIOD_MS),
            gps_period: Duration::from_millis(GPS_PERIOD_MS),
            filter_budget: Duration::from_micros(FILTER_BUDGET_US),
            controller_budget: Duration::from_micros(CONTROLLER_BUDGET_US),
            listener_poll: Duration::from_millis(LISTENER_POLL_MS),
            scheduler_core: None,
        }
    }
}
