//! Typed payloads carried by Sphero frames
//!
//! Outgoing settings ([`CollisionConfig`], [`DataStreamingSetting`]) know their
//! body encoding; incoming records ([`CollisionPacket`], [`DataStreamingPacket`])
//! decode from the data section of an async notification. All multi-byte
//! fields are big-endian.

use super::constants::*;
use crate::core::events::Topic;
use serde::{Deserialize, Serialize};

/// Topic for transmit failures
pub const TOPIC_ERROR: &str = "error";
/// Topic for decoded collisions
pub const TOPIC_COLLISION: &str = "collision";
/// Topic for decoded sensor stream samples
pub const TOPIC_SENSOR_DATA: &str = "sensordata";

/// Events published by the Sphero driver
#[derive(Debug, Clone, PartialEq)]
pub enum SpheroEvent {
    /// A queued packet could not be written
    Error(String),
    /// Collision notification
    Collision(CollisionPacket),
    /// Streaming sensor sample
    SensorData(Box<DataStreamingPacket>),
}

impl Topic for SpheroEvent {
    fn topic(&self) -> &'static str {
        match self {
            SpheroEvent::Error(_) => TOPIC_ERROR,
            SpheroEvent::Collision(_) => TOPIC_COLLISION,
            SpheroEvent::SensorData(_) => TOPIC_SENSOR_DATA,
        }
    }
}

// ============================================================================
// Outgoing settings
// ============================================================================

/// Collision detection parameters (CMD 0x12)
///
/// Thresholds are the minimum impact per axis; speeds scale the threshold
/// with ball speed; `dead_time` is the post-collision blackout in 10 ms units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    pub method: u8,
    pub x_threshold: u8,
    pub y_threshold: u8,
    pub x_speed: u8,
    pub y_speed: u8,
    pub dead_time: u8,
}

impl CollisionConfig {
    pub fn to_body(&self) -> Vec<u8> {
        vec![
            self.method,
            self.x_threshold,
            self.y_threshold,
            self.x_speed,
            self.y_speed,
            self.dead_time,
        ]
    }
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            method: COLLISION_METHOD_DEFAULT,
            x_threshold: COLLISION_THRESHOLD_DEFAULT,
            y_threshold: COLLISION_THRESHOLD_DEFAULT,
            x_speed: COLLISION_SPEED_DEFAULT,
            y_speed: COLLISION_SPEED_DEFAULT,
            dead_time: COLLISION_DEAD_TIME_DEFAULT,
        }
    }
}

/// Data streaming request (CMD 0x11)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataStreamingSetting {
    /// Divisor of the maximum sample rate
    pub n: u16,
    /// Samples aggregated per frame
    pub m: u16,
    /// Sensor groups, first word
    pub mask: u32,
    /// Frames to send; 0 streams forever
    pub pcnt: u8,
    /// Sensor groups, second word
    pub mask2: u32,
}

impl DataStreamingSetting {
    /// Build a request from a sample frequency in Hz
    ///
    /// A frequency of 0 or at/above [`SENSOR_FREQUENCY_MAX`] falls back to
    /// [`SENSOR_FREQUENCY_DEFAULT`]; a frame count of 0 becomes 1.
    pub fn new(freq: u16, frames: u16, mask: u32, count: u8, mask2: u32) -> Self {
        let n = if freq == 0 || freq >= SENSOR_FREQUENCY_MAX {
            log::warn!(
                "Invalid data streaming frequency {} Hz, using default ({} Hz)",
                freq,
                SENSOR_FREQUENCY_DEFAULT
            );
            SENSOR_FREQUENCY_MAX / SENSOR_FREQUENCY_DEFAULT
        } else {
            SENSOR_FREQUENCY_MAX / freq
        };

        Self {
            n,
            m: frames.max(1),
            mask,
            pcnt: count,
            mask2,
        }
    }

    /// Request that turns streaming off
    pub fn disabled() -> Self {
        Self::new(SENSOR_FREQUENCY_DEFAULT, 0, 0, 0, 0)
    }

    pub fn to_body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(13);
        body.extend_from_slice(&self.n.to_be_bytes());
        body.extend_from_slice(&self.m.to_be_bytes());
        body.extend_from_slice(&self.mask.to_be_bytes());
        body.push(self.pcnt);
        body.extend_from_slice(&self.mask2.to_be_bytes());
        body
    }
}

// ============================================================================
// Incoming records
// ============================================================================

/// Big-endian cursor over a notification's data section
struct BeReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BeReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take<const K: usize>(&mut self) -> [u8; K] {
        let mut out = [0u8; K];
        out.copy_from_slice(&self.data[self.pos..self.pos + K]);
        self.pos += K;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn i16(&mut self) -> i16 {
        i16::from_be_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }
}

/// Collision notification (async ID 0x07)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionPacket {
    /// Impact components per axis
    pub x: i16,
    pub y: i16,
    pub z: i16,
    /// Bit 0 = X axis triggered, bit 1 = Y axis triggered
    pub axis: u8,
    /// Power of the impact per axis
    pub x_magnitude: i16,
    pub y_magnitude: i16,
    /// Ball speed at impact
    pub speed: u8,
    /// Robot clock in milliseconds
    pub timestamp: u32,
}

impl CollisionPacket {
    /// Data bytes consumed by [`CollisionPacket::decode`]
    pub const SIZE: usize = 16;

    /// Decode from a notification's data section
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut r = BeReader::new(data);
        Some(Self {
            x: r.i16(),
            y: r.i16(),
            z: r.i16(),
            axis: r.u8(),
            x_magnitude: r.i16(),
            y_magnitude: r.i16(),
            speed: r.u8(),
            timestamp: r.u32(),
        })
    }
}

/// Streaming sensor sample (async ID 0x03)
///
/// Field order follows the mask bit order, first mask word then second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataStreamingPacket {
    pub raw_accel_x: i16,
    pub raw_accel_y: i16,
    pub raw_accel_z: i16,
    pub raw_gyro_x: i16,
    pub raw_gyro_y: i16,
    pub raw_gyro_z: i16,
    pub reserved1: [i16; 3],
    pub raw_right_motor_emf: i16,
    pub raw_left_motor_emf: i16,
    pub raw_left_motor_pwm: i16,
    pub raw_right_motor_pwm: i16,
    pub imu_pitch: i16,
    pub imu_roll: i16,
    pub imu_yaw: i16,
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
    pub gyro_x: i16,
    pub gyro_y: i16,
    pub gyro_z: i16,
    pub reserved2: [i16; 3],
    pub right_motor_emf: i16,
    pub left_motor_emf: i16,
    pub reserved3: [i16; 5],
    pub quaternion: [i16; 4],
    pub odometer_x: i16,
    pub odometer_y: i16,
    pub accel_one: i16,
    pub velocity_x: i16,
    pub velocity_y: i16,
}

impl DataStreamingPacket {
    /// Data bytes consumed by [`DataStreamingPacket::decode`] (41 words)
    pub const SIZE: usize = 82;

    /// Decode from a notification's data section
    ///
    /// Trailing bytes beyond [`DataStreamingPacket::SIZE`] are ignored.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut r = BeReader::new(data);
        Some(Self {
            raw_accel_x: r.i16(),
            raw_accel_y: r.i16(),
            raw_accel_z: r.i16(),
            raw_gyro_x: r.i16(),
            raw_gyro_y: r.i16(),
            raw_gyro_z: r.i16(),
            reserved1: [r.i16(), r.i16(), r.i16()],
            raw_right_motor_emf: r.i16(),
            raw_left_motor_emf: r.i16(),
            raw_left_motor_pwm: r.i16(),
            raw_right_motor_pwm: r.i16(),
            imu_pitch: r.i16(),
            imu_roll: r.i16(),
            imu_yaw: r.i16(),
            accel_x: r.i16(),
            accel_y: r.i16(),
            accel_z: r.i16(),
            gyro_x: r.i16(),
            gyro_y: r.i16(),
            gyro_z: r.i16(),
            reserved2: [r.i16(), r.i16(), r.i16()],
            right_motor_emf: r.i16(),
            left_motor_emf: r.i16(),
            reserved3: [r.i16(), r.i16(), r.i16(), r.i16(), r.i16()],
            quaternion: [r.i16(), r.i16(), r.i16(), r.i16()],
            odometer_x: r.i16(),
            odometer_y: r.i16(),
            accel_one: r.i16(),
            velocity_x: r.i16(),
            velocity_y: r.i16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_decode() {
        let data = [
            0x00, 0x10, // x = 16
            0xFF, 0xF0, // y = -16
            0x00, 0x02, // z = 2
            0x01, // axis
            0x01, 0x00, // x_magnitude = 256
            0x00, 0x80, // y_magnitude = 128
            0x2A, // speed
            0x00, 0x01, 0x00, 0x00, // timestamp = 65536
        ];
        let c = CollisionPacket::decode(&data).unwrap();
        assert_eq!(c.x, 16);
        assert_eq!(c.y, -16);
        assert_eq!(c.z, 2);
        assert_eq!(c.axis, 1);
        assert_eq!(c.x_magnitude, 256);
        assert_eq!(c.y_magnitude, 128);
        assert_eq!(c.speed, 42);
        assert_eq!(c.timestamp, 65536);

        assert!(CollisionPacket::decode(&data[..15]).is_none());
    }

    #[test]
    fn test_streaming_decode_field_order() {
        // Word i holds value i
        let data: Vec<u8> = (0..42i16).flat_map(|i| i.to_be_bytes()).collect();
        let s = DataStreamingPacket::decode(&data).unwrap();

        assert_eq!(s.raw_accel_x, 0);
        assert_eq!(s.raw_gyro_z, 5);
        assert_eq!(s.raw_right_motor_emf, 9);
        assert_eq!(s.imu_pitch, 13);
        assert_eq!(s.imu_yaw, 15);
        assert_eq!(s.right_motor_emf, 25);
        assert_eq!(s.quaternion, [32, 33, 34, 35]);
        assert_eq!(s.odometer_x, 36);
        assert_eq!(s.velocity_y, 40);

        assert!(DataStreamingPacket::decode(&data[..81]).is_none());
    }

    #[test]
    fn test_streaming_divisor() {
        let s = DataStreamingSetting::new(20, 2, 0xAA, 3, 0xBB);
        assert_eq!(s.n, 21);
        assert_eq!(s.m, 2);

        // Both fall back to the default divisor, no divide by zero
        let zero = DataStreamingSetting::new(0, 0, 0x1234, 0, 0x5678);
        let ten = DataStreamingSetting::new(10, 1, 0x1234, 0, 0x5678);
        assert_eq!(zero, ten);
        assert_eq!(zero.n, 42);
        assert_eq!(zero.m, 1);

        assert_eq!(DataStreamingSetting::new(420, 1, 0, 0, 0).n, 42);
        assert_eq!(DataStreamingSetting::new(419, 1, 0, 0, 0).n, 1);
    }

    #[test]
    fn test_streaming_body() {
        let s = DataStreamingSetting::new(10, 1, 0x8000_0001, 5, 0x0180_0000);
        assert_eq!(
            s.to_body(),
            vec![0x00, 0x2A, 0x00, 0x01, 0x80, 0x00, 0x00, 0x01, 0x05, 0x01, 0x80, 0x00, 0x00]
        );
    }

    #[test]
    fn test_collision_config_default_body() {
        assert_eq!(
            CollisionConfig::default().to_body(),
            vec![0x01, 0x80, 0x80, 0x80, 0x80, 0x60]
        );
    }

    #[test]
    fn test_event_topics() {
        assert_eq!(SpheroEvent::Error("x".into()).topic(), TOPIC_ERROR);
        assert_eq!(
            SpheroEvent::SensorData(Box::default()).topic(),
            TOPIC_SENSOR_DATA
        );
    }
}
