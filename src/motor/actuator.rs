// Single H-bridge motor channel: one PWM magnitude pin plus a forward/reverse enable pair.
//
// Nothing here can fail. Out-of-range intensities are clamped because this sits on the
// control loop's hot path.

use serde::{Deserialize, Serialize};

use crate::config::MAX_INTENSITY;

/// Output side of the hardware: anything that can drive PWM and digital pins
pub trait PinSink {
    fn analog_write(&mut self, pin: u8, duty: u8);
    fn digital_write(&mut self, pin: u8, high: bool);
}

impl<T: PinSink + ?Sized> PinSink for Box<T> {
    fn analog_write(&mut self, pin: u8, duty: u8) {
        (**self).analog_write(pin, duty)
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        (**self).digital_write(pin, high)
    }
}

/// Requested output of one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorDirection {
    Forward(f32),
    Backward(f32),
    Release,
}

/// Pin assignment of one physical motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MotorChannel {
    pub pwm: u8,
    pub forward: u8,
    pub reverse: u8,
}

impl MotorChannel {
    pub fn new(pwm: u8, forward: u8, reverse: u8) -> Self {
        Self {
            pwm,
            forward,
            reverse,
        }
    }
}

/// Last output levels written to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorState {
    pub magnitude: u8,
    pub forward: bool,
    pub reverse: bool,
}

impl MotorState {
    pub const STOPPED: MotorState = MotorState {
        magnitude: 0,
        forward: false,
        reverse: false,
    };

    /// Both enables low means the bridge is released, whatever the duty says
    pub fn is_stopped(&self) -> bool {
        !self.forward && !self.reverse
    }

    /// Signed view of the output: positive forward, negative reverse, zero when released
    pub fn signed(&self) -> i16 {
        match (self.forward, self.reverse) {
            (true, false) => self.magnitude as i16,
            (false, true) => -(self.magnitude as i16),
            _ => 0,
        }
    }
}

/// Clamp a requested intensity into a PWM duty in [0, MAX_INTENSITY]
pub fn clamp_intensity(intensity: f32) -> u8 {
    // NaN survives clamp() and then saturates to 0 on the cast
    intensity.clamp(0.0, MAX_INTENSITY as f32) as u8
}

pub struct MotorActuator {
    channel: MotorChannel,
    state: MotorState,
}

impl MotorActuator {
    pub fn new(channel: MotorChannel) -> Self {
        Self {
            channel,
            state: MotorState::STOPPED,
        }
    }

    pub fn forward(&mut self, pins: &mut impl PinSink, intensity: f32) {
        self.apply(
            pins,
            MotorState {
                magnitude: clamp_intensity(intensity),
                forward: true,
                reverse: false,
            },
        );
    }

    pub fn backward(&mut self, pins: &mut impl PinSink, intensity: f32) {
        self.apply(
            pins,
            MotorState {
                magnitude: clamp_intensity(intensity),
                forward: false,
                reverse: true,
            },
        );
    }

    pub fn stop(&mut self, pins: &mut impl PinSink) {
        self.apply(pins, MotorState::STOPPED);
    }

    pub fn drive(&mut self, pins: &mut impl PinSink, direction: MotorDirection) {
        match direction {
            MotorDirection::Forward(intensity) => self.forward(pins, intensity),
            MotorDirection::Backward(intensity) => self.backward(pins, intensity),
            MotorDirection::Release => self.stop(pins),
        }
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn channel(&self) -> MotorChannel {
        self.channel
    }

    fn apply(&mut self, pins: &mut impl PinSink, state: MotorState) {
        pins.analog_write(self.channel.pwm, state.magnitude);

        // Release the enable being dropped before raising the other one,
        // so the bridge never sees both sides enabled at once
        if state.forward {
            pins.digital_write(self.channel.reverse, false);
            pins.digital_write(self.channel.forward, true);
        } else {
            pins.digital_write(self.channel.forward, false);
            pins.digital_write(self.channel.reverse, state.reverse);
        }

        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::SimPins;

    fn channel() -> MotorChannel {
        MotorChannel::new(5, 9, 10)
    }

    #[test]
    fn test_forward_sets_pins() {
        let mut pins = SimPins::new();
        let mut motor = MotorActuator::new(channel());
        motor.forward(&mut pins, 200.0);

        assert_eq!(pins.analog(5), 200);
        assert!(pins.digital(9));
        assert!(!pins.digital(10));
        assert_eq!(motor.state().signed(), 200);
    }

    #[test]
    fn test_backward_sets_pins() {
        let mut pins = SimPins::new();
        let mut motor = MotorActuator::new(channel());
        motor.backward(&mut pins, 120.0);

        assert_eq!(pins.analog(5), 120);
        assert!(!pins.digital(9));
        assert!(pins.digital(10));
        assert_eq!(motor.state().signed(), -120);
    }

    #[test]
    fn test_intensity_clamped() {
        let mut pins = SimPins::new();
        let mut motor = MotorActuator::new(channel());

        for (requested, expected) in [
            (-50.0, 0),
            (300.0, MAX_INTENSITY),
            (f32::INFINITY, MAX_INTENSITY),
            (f32::NEG_INFINITY, 0),
            (f32::NAN, 0),
            (127.9, 127),
        ] {
            motor.forward(&mut pins, requested);
            assert_eq!(
                motor.state().magnitude,
                expected,
                "forward({}) should clamp to {}",
                requested,
                expected
            );
            motor.backward(&mut pins, requested);
            assert_eq!(
                motor.state().magnitude,
                expected,
                "backward({}) should clamp to {}",
                requested,
                expected
            );
            assert_eq!(pins.analog(5), expected);
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut pins = SimPins::new();
        let mut motor = MotorActuator::new(channel());

        motor.backward(&mut pins, 255.0);
        motor.stop(&mut pins);
        let first = (pins.analog(5), pins.digital(9), pins.digital(10));
        motor.stop(&mut pins);
        let second = (pins.analog(5), pins.digital(9), pins.digital(10));

        assert_eq!(first, (0, false, false));
        assert_eq!(first, second);
        assert_eq!(motor.state(), MotorState::STOPPED);
        assert!(motor.state().is_stopped());
    }

    #[test]
    fn test_direction_change_never_enables_both() {
        let mut pins = SimPins::new();
        let mut motor = MotorActuator::new(channel());

        motor.backward(&mut pins, 100.0);
        pins.clear_log();
        motor.forward(&mut pins, 100.0);

        // Reverse enable must drop before forward enable rises
        assert_eq!(pins.digital_log(), vec![(10, false), (9, true)]);
    }
}
