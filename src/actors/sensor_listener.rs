//! sensor_listener.rs
//! One thread per inbound sensor stream: datagram -> ring buffer -> port.
//!
//! The port write is what triggers the dependent actor; the ring buffer keeps the
//! recent history visible to other processes attached to the same segment.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{info, warn};

use crate::error::{Result, RuntimeError};
use crate::ports::Port;
use crate::transport::{messages::WireMessage, ring_buffer::RingBuffer, udp::UdpServer};

pub struct SensorListener<M: WireMessage> {
    name: &'static str,
    server: UdpServer,
    ring: RingBuffer<M>,
    port: Arc<Port<M>>,
    poll: Duration,
}

impl<M: WireMessage> SensorListener<M> {
    pub fn new(
        name: &'static str,
        server: UdpServer,
        ring: RingBuffer<M>,
        port: Arc<Port<M>>,
        poll: Duration,
    ) -> Self {
        Self {
            name,
            server,
            ring,
            port,
            poll,
        }
    }

    /// Waits up to one poll interval for a datagram. `Ok(false)` means nothing arrived.
    pub fn poll_once(&self) -> Result<bool> {
        let Some(msg) = self.server.receive_timeout::<M>(self.poll)? else {
            return Ok(false);
        };
        self.ring.write(&msg);
        self.port.set(msg);
        Ok(true)
    }

    /// Runs `poll_once` until `running` is cleared. Receive errors are logged and skipped.
    pub fn spawn(self, running: Arc<AtomicBool>) -> Result<JoinHandle<u64>> {
        let name = self.name;
        thread::Builder::new()
            .name(format!("tm-listener-{}", name))
            .spawn(move || {
                info!("[listener {}] up", self.name);
                let mut received = 0u64;
                while running.load(Ordering::Relaxed) {
                    match self.poll_once() {
                        Ok(true) => received += 1,
                        Ok(false) => {}
                        Err(e) => warn!("[listener {}] {}", self.name, e),
                    }
                }
                info!("[listener {}] stopped after {} messages", self.name, received);
                received
            })
            .map_err(|e| RuntimeError::Spawn {
                what: format!("{} listener", name),
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::queue::TaskQueue;
    use crate::transport::{messages::GpsMessage, udp::UdpClient};
    use crate::utils::metrics::RuntimeMetrics;

    type Fixture = (
        SensorListener<GpsMessage>,
        UdpClient,
        RingBuffer<GpsMessage>,
        Arc<Port<GpsMessage>>,
    );

    fn listener() -> Fixture {
        let server = UdpServer::init(0).unwrap();
        let client = UdpClient::init("127.0.0.1", server.local_addr().unwrap().port()).unwrap();
        let ring = RingBuffer::in_process(8).unwrap();
        let port = Arc::new(Port::new(
            "gps",
            Arc::new(TaskQueue::new(4).unwrap()),
            RuntimeMetrics::new(),
        ));
        let poll = Duration::from_millis(200);
        let l = SensorListener::new("gps", server, ring.clone(), port.clone(), poll);
        (l, client, ring, port)
    }

    #[test]
    fn datagram_lands_in_ring_and_port() {
        let (l, client, ring, port) = listener();
        let fix = GpsMessage { north: 12.0, east: -3.0 };
        client.send(&fix).unwrap();

        let mut got = false;
        for _ in 0..10 {
            if l.poll_once().unwrap() {
                got = true;
                break;
            }
        }
        assert!(got);
        assert_eq!(ring.read(), Some(fix));
        assert_eq!(port.take_if_new(), Some(fix));
    }

    #[test]
    fn quiet_socket_is_no_data() {
        let (l, _client, ring, port) = listener();
        assert!(!l.poll_once().unwrap());
        assert_eq!(ring.read(), None);
        assert!(!port.is_new());
    }

    #[test]
    fn thread_stops_when_flag_cleared() {
        let (l, client, _ring, _port) = listener();
        let running = Arc::new(AtomicBool::new(true));
        let handle = l.spawn(running.clone()).unwrap();

        client.send(&GpsMessage { north: 1.0, east: 1.0 }).unwrap();
        thread::sleep(Duration::from_millis(300));
        running.store(false, Ordering::Relaxed);
        assert_eq!(handle.join().unwrap(), 1);
    }
}
