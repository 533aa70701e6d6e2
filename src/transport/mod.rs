//! Transport primitives between processes: fixed-size wire messages carried either as
//! UDP datagrams or through shared-memory ring buffers.

pub mod messages;
pub mod ring_buffer;
pub mod shm;
pub mod udp;
