//! sensors.rs
//! Simulated GPS and INS: sample the plant state from shared memory at a fixed rate,
//! add noise and send the reading to the controller.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{debug, info, warn};
use rand::random_range;

use crate::config::{PLANT_OUTPUTS_RING_ID, RuntimeConfig};
use crate::error::Result;
use crate::processes::Periodic;
use crate::transport::{
    messages::{GpsMessage, InsMessage, PlantOutputs, WireMessage},
    ring_buffer::RingBuffer,
    shm::SegmentKey,
    udp::UdpClient,
};

/// Position noise amplitude in metres.
pub const GPS_NOISE_M: f32 = 0.5;
pub const INS_NOISE_M: f32 = 0.05;
/// Attitude noise amplitude in radians.
pub const INS_NOISE_RAD: f32 = 0.002;

fn noise(amplitude: f32) -> f32 {
    random_range(-amplitude..=amplitude)
}

pub fn sample_gps(state: &PlantOutputs) -> GpsMessage {
    GpsMessage {
        north: state.north + noise(GPS_NOISE_M),
        east: state.east + noise(GPS_NOISE_M),
    }
}

pub fn sample_ins(state: &PlantOutputs) -> InsMessage {
    InsMessage {
        north: state.north + noise(INS_NOISE_M),
        east: state.east + noise(INS_NOISE_M),
        down: state.down + noise(INS_NOISE_M),
        roll: state.roll + noise(INS_NOISE_RAD),
        pitch: state.pitch + noise(INS_NOISE_RAD),
        yaw: state.yaw + noise(INS_NOISE_RAD),
    }
}

pub fn run_gps_sensor(cfg: &RuntimeConfig, running: Arc<AtomicBool>) -> Result<u64> {
    run_sensor("gps", cfg, cfg.gps_period, cfg.controller_gps_port, sample_gps, running)
}

pub fn run_ins_sensor(cfg: &RuntimeConfig, running: Arc<AtomicBool>) -> Result<u64> {
    run_sensor("ins", cfg, cfg.ins_period, cfg.controller_ins_port, sample_ins, running)
}

fn run_sensor<M: WireMessage>(
    name: &'static str,
    cfg: &RuntimeConfig,
    period: Duration,
    port: u16,
    sample: fn(&PlantOutputs) -> M,
    running: Arc<AtomicBool>,
) -> Result<u64> {
    let plant = RingBuffer::<PlantOutputs>::open_reader(
        &SegmentKey::new(&cfg.shm_directory, PLANT_OUTPUTS_RING_ID),
        cfg.ring_entries,
    )?;
    let client = UdpClient::init(&cfg.controller_ip, port)?;

    let mut schedule = Periodic::new(period);
    let mut sent = 0u64;
    info!("[{}] up, period {:?} -> {}", name, period, client.destination());

    while running.load(Ordering::Relaxed) {
        schedule.wait();

        let Some(state) = plant.read() else {
            debug!("[{}] plant has not published yet", name);
            continue;
        };
        match client.send(&sample(&state)) {
            Ok(()) => sent += 1,
            Err(e) => warn!("[{}] send failed: {}", name, e),
        }
    }

    info!("[{}] stopped after {} readings ({} late)", name, sent, schedule.late());
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PlantOutputs {
        PlantOutputs {
            north: 10.0,
            east: -4.0,
            down: -12.0,
            yaw: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn gps_noise_is_bounded() {
        for _ in 0..200 {
            let fix = sample_gps(&state());
            assert!((fix.north - 10.0).abs() <= GPS_NOISE_M + 1e-6);
            assert!((fix.east + 4.0).abs() <= GPS_NOISE_M + 1e-6);
        }
    }

    #[test]
    fn ins_tracks_pose() {
        for _ in 0..200 {
            let s = sample_ins(&state());
            assert!((s.down + 12.0).abs() <= INS_NOISE_M + 1e-6);
            assert!((s.yaw - 0.5).abs() <= INS_NOISE_RAD + 1e-6);
        }
    }
}
