//! actuator.rs
//! Actuator sink: receives controller commands over UDP and publishes them to the
//! plant-inputs ring buffer, where the plant picks up the latest one each step.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::{debug, info, warn};

use crate::config::{PLANT_INPUTS_RING_ID, RuntimeConfig};
use crate::error::Result;
use crate::transport::{
    messages::{ActuatorMessage, PlantInputs},
    ring_buffer::RingBuffer,
    shm::SegmentKey,
    udp::UdpServer,
};

pub fn run_actuator_sink(cfg: &RuntimeConfig, running: Arc<AtomicBool>) -> Result<u64> {
    let server = UdpServer::init(cfg.plant_actuators_port)?;
    let ring = RingBuffer::<PlantInputs>::open_writer(
        &SegmentKey::new(&cfg.shm_directory, PLANT_INPUTS_RING_ID),
        cfg.ring_entries,
    )?;
    serve(&server, &ring, cfg, &running)
}

/// Receive loop, split out so tests can drive it with their own socket and buffer.
pub fn serve(
    server: &UdpServer,
    ring: &RingBuffer<PlantInputs>,
    cfg: &RuntimeConfig,
    running: &AtomicBool,
) -> Result<u64> {
    info!("[actuator] listening on {}", server.local_addr()?);
    let mut received = 0u64;

    while running.load(Ordering::Relaxed) {
        match server.receive_timeout::<ActuatorMessage>(cfg.listener_poll) {
            Ok(Some(cmd)) => {
                ring.write(&PlantInputs::from(cmd));
                received += 1;
                debug!("[actuator] #{} collective={:.3}", received, cmd.collective);
            }
            Ok(None) => {}
            Err(e) => warn!("[actuator] {}", e),
        }
    }

    info!("[actuator] stopped after {} commands", received);
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::udp::UdpClient;
    use std::{thread, time::Duration};

    #[test]
    fn command_reaches_plant_inputs() {
        let server = UdpServer::init(0).unwrap();
        let port = server.local_addr().unwrap().port();
        let ring = RingBuffer::<PlantInputs>::in_process(8).unwrap();
        let cfg = RuntimeConfig {
            listener_poll: Duration::from_millis(20),
            ..Default::default()
        };
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let ring = ring.clone();
            let running = running.clone();
            thread::spawn(move || serve(&server, &ring, &cfg, &running).unwrap())
        };

        let cmd = ActuatorMessage {
            collective: 0.7,
            pedal: -0.2,
            ..Default::default()
        };
        UdpClient::init("127.0.0.1", port).unwrap().send(&cmd).unwrap();

        let until = std::time::Instant::now() + Duration::from_secs(2);
        while ring.read().is_none() && std::time::Instant::now() < until {
            thread::sleep(Duration::from_millis(5));
        }
        running.store(false, Ordering::Relaxed);

        assert_eq!(ring.read(), Some(PlantInputs::from(cmd)));
        assert_eq!(worker.join().unwrap(), 1);
    }
}
