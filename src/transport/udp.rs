//! udp.rs
//! Thin datagram wrappers: one client per destination, one server per well-known port.
//!
//! No retry, no acknowledgement, no ordering beyond what UDP gives. Loss is tolerated
//! by callers, who treat "nothing new" as the normal steady state.

use std::{
    io::ErrorKind,
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket},
    time::Duration,
};

use log::debug;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{Result, RuntimeError};
use crate::transport::messages::WireMessage;

/// Largest payload any role expects; anything longer is truncated by the kernel.
const MAX_DATAGRAM: usize = 512;

/// Sends fixed-size messages to one destination.
#[derive(Debug)]
pub struct UdpClient {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpClient {
    /// Creates an unbound datagram socket and remembers `ip:port` as the destination.
    pub fn init(ip: &str, port: u16) -> Result<Self> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| RuntimeError::Address(format!("{}:{}", ip, port)))?;
        let dest = SocketAddr::new(addr, port);

        let socket = Socket::new(Domain::for_address(dest), Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| RuntimeError::Socket {
                addr: dest.to_string(),
                source: e,
            })?;

        Ok(Self {
            socket: socket.into(),
            dest,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.dest
    }

    pub fn send<M: WireMessage>(&self, msg: &M) -> Result<()> {
        let bytes = msg.to_bytes();
        let sent = self.socket.send_to(&bytes, self.dest)?;
        if sent != bytes.len() {
            debug!("[udp] short send to {}: {}/{}", self.dest, sent, bytes.len());
        }
        Ok(())
    }
}

/// Receives fixed-size messages on `0.0.0.0:port`.
#[derive(Debug)]
pub struct UdpServer {
    socket: UdpSocket,
}

impl UdpServer {
    /// Binds a datagram socket to `INADDR_ANY:port` (port 0 picks an ephemeral port).
    pub fn init(port: u16) -> Result<Self> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let socket_err = |e: std::io::Error| RuntimeError::Socket {
            addr: addr.to_string(),
            source: e,
        };

        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(socket_err)?;
        socket.set_reuse_address(true).map_err(socket_err)?;
        socket.bind(&SockAddr::from(addr)).map_err(socket_err)?;

        Ok(Self {
            socket: socket.into(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocks until one datagram arrives.
    pub fn receive<M: WireMessage>(&self) -> Result<M> {
        self.socket.set_read_timeout(None)?;
        let mut buf = [0u8; MAX_DATAGRAM];
        let (len, from) = self.socket.recv_from(&mut buf)?;
        debug!("[udp] {} bytes from {}", len, from);
        M::decode(&buf[..len])
    }

    /// Like `receive`, but gives up after `timeout` with `Ok(None)`.
    pub fn receive_timeout<M: WireMessage>(&self, timeout: Duration) -> Result<Option<M>> {
        self.socket.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        let mut buf = [0u8; MAX_DATAGRAM];
        match self.socket.recv_from(&mut buf) {
            Ok((len, _)) => M::decode(&buf[..len]).map(Some),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::messages::{ActuatorMessage, GpsMessage, InsMessage};

    fn loopback_pair() -> (UdpServer, UdpClient) {
        let server = UdpServer::init(0).unwrap();
        let port = server.local_addr().unwrap().port();
        let client = UdpClient::init("127.0.0.1", port).unwrap();
        (server, client)
    }

    #[test]
    fn datagram_round_trips_over_loopback() {
        let (server, client) = loopback_pair();
        let msg = InsMessage {
            north: 1.0,
            east: 2.0,
            down: -3.0,
            roll: 0.1,
            pitch: 0.2,
            yaw: 0.3,
        };
        client.send(&msg).unwrap();
        let got: InsMessage = server.receive().unwrap();
        assert_eq!(got, msg);
    }

    #[test]
    fn receive_timeout_reports_no_data() {
        let server = UdpServer::init(0).unwrap();
        let got = server
            .receive_timeout::<GpsMessage>(Duration::from_millis(20))
            .unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn short_datagram_is_an_error() {
        let (server, client) = loopback_pair();
        client.send(&GpsMessage::default()).unwrap();
        let err = server
            .receive_timeout::<ActuatorMessage>(Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ShortDatagram { expected: 16, actual: 8 }));
    }

    #[test]
    fn bad_address_is_rejected() {
        assert!(matches!(
            UdpClient::init("not-an-ip", 1),
            Err(RuntimeError::Address(_))
        ));
    }
}
