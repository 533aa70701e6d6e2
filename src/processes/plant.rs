//! plant.rs
//! The plant process: reads the latest control inputs from shared memory, advances a
//! `PlantModel` by one period and publishes the new state to shared memory and the display.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::{debug, info, warn};

use crate::config::{PLANT_INPUTS_RING_ID, PLANT_OUTPUTS_RING_ID, RuntimeConfig};
use crate::error::Result;
use crate::processes::Periodic;
use crate::transport::{
    messages::{DisplayMessage, PlantInputs, PlantOutputs},
    ring_buffer::RingBuffer,
    shm::SegmentKey,
    udp::UdpClient,
};

/// Vehicle dynamics. Implementations only need to be deterministic in `inputs` and `dt`.
pub trait PlantModel: Send {
    fn step(&mut self, inputs: &PlantInputs, dt: f64) -> PlantOutputs;
}

const MAIN_ROTOR_RPM: f32 = 400.0;
const TAIL_ROTOR_RPM: f32 = 2_000.0;

/// First-order point mass: each command accelerates one axis against linear drag.
#[derive(Debug, Clone)]
pub struct KinematicPlant {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub yaw: f64,
    pub accel_gain: f64,
    pub drag: f64,
    pub yaw_rate_gain: f64,
}

impl Default for KinematicPlant {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, -8.0],
            velocity: [0.0; 3],
            yaw: 0.0,
            accel_gain: 4.0,
            drag: 0.8,
            yaw_rate_gain: 1.0,
        }
    }
}

impl PlantModel for KinematicPlant {
    fn step(&mut self, inputs: &PlantInputs, dt: f64) -> PlantOutputs {
        let accel = [
            inputs.longitudinal_cyclic as f64 * self.accel_gain,
            inputs.lateral_cyclic as f64 * self.accel_gain,
            // collective lifts, so it pushes `down` negative
            -(inputs.collective as f64) * self.accel_gain,
        ];
        for i in 0..3 {
            self.velocity[i] += (accel[i] - self.drag * self.velocity[i]) * dt;
            self.position[i] += self.velocity[i] * dt;
        }
        self.yaw += inputs.pedal as f64 * self.yaw_rate_gain * dt;

        PlantOutputs {
            north: self.position[0] as f32,
            east: self.position[1] as f32,
            down: self.position[2] as f32,
            vel_north: self.velocity[0] as f32,
            vel_east: self.velocity[1] as f32,
            vel_down: self.velocity[2] as f32,
            roll: inputs.lateral_cyclic * 0.1,
            pitch: -inputs.longitudinal_cyclic * 0.1,
            yaw: self.yaw as f32,
            main_rotor_speed: MAIN_ROTOR_RPM,
            tail_rotor_speed: TAIL_ROTOR_RPM,
        }
    }
}

pub fn run_plant(
    cfg: &RuntimeConfig,
    running: Arc<AtomicBool>,
    model: &mut dyn PlantModel,
) -> Result<u64> {
    let inputs = RingBuffer::<PlantInputs>::open_reader(
        &SegmentKey::new(&cfg.shm_directory, PLANT_INPUTS_RING_ID),
        cfg.ring_entries,
    )?;
    let outputs = RingBuffer::<PlantOutputs>::open_writer(
        &SegmentKey::new(&cfg.shm_directory, PLANT_OUTPUTS_RING_ID),
        cfg.ring_entries,
    )?;
    let display = UdpClient::init(&cfg.display_ip, cfg.display_port)?;

    let mut schedule = Periodic::new(cfg.plant_period);
    let dt = cfg.plant_period.as_secs_f64();
    let mut cycles = 0u64;
    info!("[plant] up, period {:?}", cfg.plant_period);

    while running.load(Ordering::Relaxed) {
        schedule.wait();

        // no command yet means zero inputs
        let cmd = inputs.read().unwrap_or_default();
        let state = model.step(&cmd, dt);
        outputs.write(&state);

        if let Err(e) = display.send(&DisplayMessage::from(&state)) {
            warn!("[plant] display send failed: {}", e);
        }
        cycles += 1;
        debug!("[plant] #{} down={:.2}", cycles, state.down);
    }

    info!("[plant] stopped after {} steps ({} late)", cycles, schedule.late());
    Ok(cycles)
}
