//! controller.rs
//! The controller process: GPS/INS listeners feed the port registry, the scheduler
//! runs filter -> state feedback -> actuator output, commands leave over UDP.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{error, info};

use crate::actors::{HoverTarget, SensorListener};
use crate::config::{GPS_RING_ID, INS_RING_ID, RuntimeConfig};
use crate::error::{Result, RuntimeError};
use crate::runtime::Runtime;
use crate::transport::{
    messages::{GpsMessage, InsMessage},
    ring_buffer::RingBuffer,
    shm::SegmentKey,
    udp::{UdpClient, UdpServer},
};
use crate::utils::{events::EventRecorder, metrics::SharedMetrics};

pub fn run_controller(
    cfg: &RuntimeConfig,
    running: Arc<AtomicBool>,
    recorder: Option<EventRecorder>,
) -> Result<SharedMetrics> {
    let rt = match recorder {
        Some(rec) => Runtime::with_recorder(cfg.clone(), rec)?,
        None => Runtime::new(cfg.clone())?,
    };

    let sink = UdpClient::init(&cfg.plant_ip, cfg.plant_actuators_port)?;
    let actors = rt.wire_controller(Box::new(sink), HoverTarget::default());

    let gps = SensorListener::new(
        "gps",
        UdpServer::init(cfg.controller_gps_port)?,
        RingBuffer::<GpsMessage>::open_writer(
            &SegmentKey::new(&cfg.shm_directory, GPS_RING_ID),
            cfg.ring_entries,
        )?,
        rt.ports().gps.clone(),
        cfg.listener_poll,
    );
    let ins = SensorListener::new(
        "ins",
        UdpServer::init(cfg.controller_ins_port)?,
        RingBuffer::<InsMessage>::open_writer(
            &SegmentKey::new(&cfg.shm_directory, INS_RING_ID),
            cfg.ring_entries,
        )?,
        rt.ports().ins.clone(),
        cfg.listener_poll,
    );

    let listeners = start_listeners(gps, ins, &running)?;
    let scheduler = match rt.spawn_scheduler() {
        Ok(handle) => handle,
        Err(e) => {
            stop_listeners(&running, listeners);
            return Err(e);
        }
    };
    info!(
        "[controller] up: gps :{} ins :{} -> plant {}:{}",
        cfg.controller_gps_port, cfg.controller_ins_port, cfg.plant_ip, cfg.plant_actuators_port
    );

    while running.load(Ordering::Relaxed) && !scheduler.is_finished() {
        thread::sleep(Duration::from_millis(50));
    }

    stop_listeners(&running, listeners);
    rt.shutdown();

    let outcome = join_scheduler(scheduler);

    info!(
        "[controller] sent {} commands, {} partial control runs",
        actors.actuator_output.sent(),
        actors.state_feedback.partial_runs()
    );
    outcome.map(|()| rt.metrics().clone())
}

/// A panicked scheduler is an error of the whole role, not a clean stop.
fn join_scheduler(handle: JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => {
            error!("[controller] scheduler thread panicked");
            Err(RuntimeError::Panicked("scheduler"))
        }
    }
}

fn start_listeners(
    gps: SensorListener<GpsMessage>,
    ins: SensorListener<InsMessage>,
    running: &Arc<AtomicBool>,
) -> Result<Vec<JoinHandle<u64>>> {
    let gps = gps.spawn(running.clone())?;
    match ins.spawn(running.clone()) {
        Ok(ins) => Ok(vec![gps, ins]),
        Err(e) => {
            stop_listeners(running, vec![gps]);
            Err(e)
        }
    }
}

fn stop_listeners(running: &AtomicBool, listeners: Vec<JoinHandle<u64>>) {
    running.store(false, Ordering::Relaxed);
    for h in listeners {
        if h.join().is_err() {
            error!("[controller] listener thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_panic_is_an_error() {
        let handle = thread::spawn(|| -> Result<()> { panic!("scheduler died") });
        let err = join_scheduler(handle).unwrap_err();
        assert!(matches!(err, RuntimeError::Panicked("scheduler")));
    }

    #[test]
    fn scheduler_result_passes_through() {
        assert!(join_scheduler(thread::spawn(|| Ok(()))).is_ok());

        let failed = thread::spawn(|| Err(RuntimeError::InvalidCapacity(0)));
        assert!(matches!(
            join_scheduler(failed),
            Err(RuntimeError::InvalidCapacity(0))
        ));
    }
}
