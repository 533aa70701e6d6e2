//! messages.rs
//! Fixed-size message records exchanged between processes.
//!
//! Every record is a flat run of `f32` fields in host byte order, no framing, no
//! versioning. The same encoding is used for UDP payloads and ring-buffer slots.

use crate::error::{Result, RuntimeError};

/// A fixed-size record that can be copied into a datagram or a shared-memory slot.
pub trait WireMessage: Copy + Default + Send + Sync + 'static {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Writes exactly `SIZE` bytes into the front of `buf`.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a record from the first `SIZE` bytes of `buf`.
    fn decode(buf: &[u8]) -> Result<Self>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.encode(&mut buf);
        buf
    }
}

macro_rules! wire_message {
    ($(#[$meta:meta])* $name:ident { $($field:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq)]
        pub struct $name {
            $(pub $field: f32,)+
        }

        impl WireMessage for $name {
            const SIZE: usize = [$(stringify!($field)),+].len() * 4;

            fn encode(&self, buf: &mut [u8]) {
                let mut off = 0;
                $(
                    buf[off..off + 4].copy_from_slice(&self.$field.to_ne_bytes());
                    off += 4;
                )+
                let _ = off;
            }

            fn decode(buf: &[u8]) -> Result<Self> {
                if buf.len() < Self::SIZE {
                    return Err(RuntimeError::ShortDatagram {
                        expected: Self::SIZE,
                        actual: buf.len(),
                    });
                }
                let mut off = 0;
                $(
                    let $field = f32::from_ne_bytes([
                        buf[off],
                        buf[off + 1],
                        buf[off + 2],
                        buf[off + 3],
                    ]);
                    off += 4;
                )+
                let _ = off;
                Ok(Self { $($field),+ })
            }
        }
    };
}

wire_message!(
    /// GPS fix: horizontal position only.
    GpsMessage { north, east }
);

wire_message!(
    /// Inertial navigation sample: position and attitude.
    InsMessage { north, east, down, roll, pitch, yaw }
);

wire_message!(
    /// Full plant state published by the plant process.
    PlantOutputs {
        north,
        east,
        down,
        vel_north,
        vel_east,
        vel_down,
        roll,
        pitch,
        yaw,
        main_rotor_speed,
        tail_rotor_speed,
    }
);

wire_message!(
    /// Control inputs as seen by the plant.
    PlantInputs { collective, longitudinal_cyclic, lateral_cyclic, pedal }
);

wire_message!(
    /// Control command sent by the controller to the actuator sink.
    ActuatorMessage { collective, longitudinal_cyclic, lateral_cyclic, pedal }
);

wire_message!(
    /// Pose shown by the display process.
    DisplayMessage { north, east, down, roll, pitch, yaw }
);

impl From<ActuatorMessage> for PlantInputs {
    fn from(a: ActuatorMessage) -> Self {
        Self {
            collective: a.collective,
            longitudinal_cyclic: a.longitudinal_cyclic,
            lateral_cyclic: a.lateral_cyclic,
            pedal: a.pedal,
        }
    }
}

impl From<&PlantOutputs> for DisplayMessage {
    fn from(p: &PlantOutputs) -> Self {
        Self {
            north: p.north,
            east: p.east,
            down: p.down,
            roll: p.roll,
            pitch: p.pitch,
            yaw: p.yaw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_field_counts() {
        assert_eq!(GpsMessage::SIZE, 8);
        assert_eq!(InsMessage::SIZE, 24);
        assert_eq!(PlantOutputs::SIZE, 44);
        assert_eq!(PlantInputs::SIZE, 16);
        assert_eq!(ActuatorMessage::SIZE, 16);
        assert_eq!(DisplayMessage::SIZE, 24);
    }

    #[test]
    fn fields_are_laid_out_in_declaration_order() {
        let msg = GpsMessage { north: 1.5, east: -2.0 };
        let bytes = msg.to_bytes();
        assert_eq!(&bytes[0..4], &1.5f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &(-2.0f32).to_ne_bytes());
        assert_eq!(GpsMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = InsMessage::decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::ShortDatagram { expected: 24, actual: 10 }
        ));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = ActuatorMessage { collective: 0.25, ..Default::default() }.to_bytes();
        bytes.extend_from_slice(&[0xff; 4]);
        let decoded = ActuatorMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.collective, 0.25);
        assert_eq!(decoded.pedal, 0.0);
    }
}
