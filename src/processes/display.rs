//! display.rs
//! Display stand-in: logs the pose the plant publishes.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::transport::{messages::DisplayMessage, udp::UdpServer};

/// Log one pose at `info` every this many frames.
const LOG_EVERY: u64 = 100;

pub fn run_display(cfg: &RuntimeConfig, running: Arc<AtomicBool>) -> Result<u64> {
    let server = UdpServer::init(cfg.display_port)?;
    info!("[display] listening on {}", server.local_addr()?);
    let mut frames = 0u64;

    while running.load(Ordering::Relaxed) {
        match server.receive_timeout::<DisplayMessage>(cfg.listener_poll) {
            Ok(Some(pose)) => {
                frames += 1;
                if frames % LOG_EVERY == 1 {
                    info!(
                        "[display] N {:7.2} E {:7.2} D {:7.2} | roll {:5.2} pitch {:5.2} \
                         yaw {:5.2}",
                        pose.north, pose.east, pose.down, pose.roll, pose.pitch, pose.yaw
                    );
                } else {
                    debug!("[display] frame {}", frames);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("[display] {}", e),
        }
    }

    info!("[display] stopped after {} frames", frames);
    Ok(frames)
}
