//! actuator_output.rs
//! Last stage of the controller chain: forwards each new command to the plant side.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use crossbeam::channel::{Sender, TrySendError};
use log::warn;
use parking_lot::Mutex;

use crate::error::{Result, RuntimeError};
use crate::ports::{Port, PortRegistry};
use crate::scheduler::{
    cancel::CancelToken,
    task::{ExecOutput, Schedulable},
};
use crate::transport::{messages::ActuatorMessage, udp::UdpClient};

/// Where actuator commands leave the controller.
pub trait OutputSink: Send + Sync {
    fn emit(&self, cmd: &ActuatorMessage) -> Result<()>;
}

impl OutputSink for UdpClient {
    fn emit(&self, cmd: &ActuatorMessage) -> Result<()> {
        self.send(cmd)
    }
}

impl OutputSink for Sender<ActuatorMessage> {
    fn emit(&self, cmd: &ActuatorMessage) -> Result<()> {
        match self.try_send(*cmd) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(RuntimeError::Disconnected("actuator")),
        }
    }
}

pub struct ActuatorOutput {
    input: Arc<Port<ActuatorMessage>>,
    sink: Box<dyn OutputSink>,
    pending: Mutex<Option<ActuatorMessage>>,
    sent: AtomicU64,
}

impl ActuatorOutput {
    pub fn new(ports: &PortRegistry, sink: Box<dyn OutputSink>) -> Arc<Self> {
        Arc::new(Self {
            input: ports.actuator.clone(),
            sink,
            pending: Mutex::new(None),
            sent: AtomicU64::new(0),
        })
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl Schedulable for ActuatorOutput {
    fn name(&self) -> &'static str {
        "actuator_output"
    }

    fn is_ready(&self) -> bool {
        match self.input.take_if_new() {
            Some(cmd) => {
                *self.pending.lock() = Some(cmd);
                true
            }
            None => false,
        }
    }

    fn exec(&self, _cancel: &CancelToken) -> Option<ExecOutput> {
        let cmd = self.pending.lock().take()?;
        Some(Box::new(cmd))
    }

    fn produce_output(&self, output: Option<ExecOutput>) {
        let Some(cmd) = output.and_then(|o| o.downcast::<ActuatorMessage>().ok()) else {
            return;
        };
        match self.sink.emit(&cmd) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!("[actuator_output] {}", e),
        }
    }

    // never consulted: has_deadline() is false
    fn deadline(&self) -> Instant {
        Instant::now()
    }

    fn has_deadline(&self) -> bool {
        false
    }
}
