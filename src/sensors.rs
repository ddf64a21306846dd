// Sensor collaborators: ultrasonic ranging, 6-axis IMU and the mine detector input.
//
// None of these feed the control core directly. The runtime polls them outside
// the command path and forwards the values as telemetry.

use serde::Serialize;

use crate::config::RANGING_SENTINEL_CM;

/// Speed of sound in cm per microsecond
const SOUND_CM_PER_US: f32 = 0.0343;

/// Distance source. Never fails: a missing echo reads as `RANGING_SENTINEL_CM`.
pub trait Ranging {
    fn distance_cm(&mut self) -> f32;
}

/// Raw 6-axis inertial source
pub trait Inertial {
    /// Startup diagnostic only
    fn test_connection(&mut self) -> bool;
    fn motion6(&mut self) -> Option<Motion6>;
}

pub trait MineDetector {
    fn mine_detected(&mut self) -> bool;
}

impl<T: Ranging + ?Sized> Ranging for Box<T> {
    fn distance_cm(&mut self) -> f32 {
        (**self).distance_cm()
    }
}

impl<T: Inertial + ?Sized> Inertial for Box<T> {
    fn test_connection(&mut self) -> bool {
        (**self).test_connection()
    }

    fn motion6(&mut self) -> Option<Motion6> {
        (**self).motion6()
    }
}

impl<T: MineDetector + ?Sized> MineDetector for Box<T> {
    fn mine_detected(&mut self) -> bool {
        (**self).mine_detected()
    }
}

/// Raw accelerometer and gyro samples, as the sensor reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Motion6 {
    pub ax: i16,
    pub ay: i16,
    pub az: i16,
    pub gx: i16,
    pub gy: i16,
    pub gz: i16,
}

impl Motion6 {
    /// Decode six big-endian words in register order (accel xyz, gyro xyz)
    pub fn from_be_bytes(bytes: [u8; 12]) -> Self {
        let word = |i: usize| i16::from_be_bytes([bytes[i], bytes[i + 1]]);
        Self {
            ax: word(0),
            ay: word(2),
            az: word(4),
            gx: word(6),
            gy: word(8),
            gz: word(10),
        }
    }
}

/// Convert an echo pulse width into a one-way distance
pub fn echo_to_cm(echo_us: u32) -> f32 {
    let distance = echo_us as f32 * SOUND_CM_PER_US / 2.0;
    if distance > 0.0 {
        distance
    } else {
        RANGING_SENTINEL_CM
    }
}

/// True when a reading is the no-echo placeholder rather than a measurement
pub fn is_sentinel(distance_cm: f32) -> bool {
    distance_cm == RANGING_SENTINEL_CM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_conversion() {
        // 1000 us round trip -> 17.15 cm
        let d = echo_to_cm(1000);
        assert!((d - 17.15).abs() < 1e-3, "got {}", d);
    }

    #[test]
    fn test_missing_echo_is_sentinel() {
        assert_eq!(echo_to_cm(0), RANGING_SENTINEL_CM);
        assert!(is_sentinel(echo_to_cm(0)));
        assert!(!is_sentinel(echo_to_cm(500)));
    }

    #[test]
    fn test_motion6_decoding() {
        let bytes = [
            0x00, 0x10, // ax = 16
            0xFF, 0xF0, // ay = -16
            0x40, 0x00, // az = 16384
            0x00, 0x00, // gx = 0
            0x80, 0x00, // gy = -32768
            0x7F, 0xFF, // gz = 32767
        ];
        let m = Motion6::from_be_bytes(bytes);
        assert_eq!(
            m,
            Motion6 {
                ax: 16,
                ay: -16,
                az: 16384,
                gx: 0,
                gy: -32768,
                gz: 32767
            }
        );
    }
}
