// Role-partitioned motor set and the maneuver primitives built on it.
//
// The layout (two or four wheels) is a type parameter, so strafing is only
// available on four-wheel drive trains. No maneuver depends on the previous one.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::actuator::{MotorActuator, MotorChannel, MotorDirection, MotorState, PinSink};

/// Named maneuver, also used as the dead-reckoning move tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    Forward,
    Backward,
    RotateClockwise,
    RotateCounterClockwise,
    StrafeLeft,
    StrafeRight,
    #[default]
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Left,
    Right,
    LeftFront,
    RightFront,
    LeftBack,
    RightBack,
}

impl Role {
    pub fn side(self) -> Side {
        match self {
            Role::Left | Role::LeftFront | Role::LeftBack => Side::Left,
            Role::Right | Role::RightFront | Role::RightBack => Side::Right,
        }
    }
}

/// Two motors: one per side
pub struct TwoWheel;
/// Four motors: one per corner
pub struct FourWheel;

/// Maneuvers every drive train supports
pub trait Maneuvers {
    fn move_forward(&mut self, speed: f32, left_coef: f32, right_coef: f32);
    fn move_backward(&mut self, speed: f32, left_coef: f32, right_coef: f32);
    fn rotate_clockwise(&mut self, speed: f32);
    fn rotate_counter_clockwise(&mut self, speed: f32);
    fn stop_motors(&mut self);
}

/// Lateral maneuvers, only meaningful with independent front and back pairs
pub trait Strafe: Maneuvers {
    fn strafe_left(&mut self, speed: f32);
    fn strafe_right(&mut self, speed: f32);
}

pub struct DriveTrain<S: PinSink, L> {
    pins: S,
    motors: Vec<(Role, MotorActuator)>,
    _layout: PhantomData<L>,
}

impl<S: PinSink> DriveTrain<S, TwoWheel> {
    pub fn two_wheel(pins: S, left: MotorChannel, right: MotorChannel) -> Self {
        Self::with_roles(pins, vec![(Role::Left, left), (Role::Right, right)])
    }
}

impl<S: PinSink> DriveTrain<S, FourWheel> {
    pub fn four_wheel(
        pins: S,
        left_front: MotorChannel,
        right_front: MotorChannel,
        left_back: MotorChannel,
        right_back: MotorChannel,
    ) -> Self {
        Self::with_roles(
            pins,
            vec![
                (Role::LeftFront, left_front),
                (Role::RightFront, right_front),
                (Role::LeftBack, left_back),
                (Role::RightBack, right_back),
            ],
        )
    }
}

impl<S: PinSink, L> DriveTrain<S, L> {
    fn with_roles(pins: S, channels: Vec<(Role, MotorChannel)>) -> Self {
        let motors = channels
            .into_iter()
            .map(|(role, channel)| (role, MotorActuator::new(channel)))
            .collect();

        let mut drive = Self {
            pins,
            motors,
            _layout: PhantomData,
        };
        // Start from a known released state
        drive.stop_all();
        drive
    }

    /// Current output of every motor, in construction order
    pub fn states(&self) -> Vec<(Role, MotorState)> {
        self.motors
            .iter()
            .map(|(role, motor)| (*role, motor.state()))
            .collect()
    }

    pub fn state(&self, role: Role) -> Option<MotorState> {
        self.motors
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, motor)| motor.state())
    }

    pub fn motor_count(&self) -> usize {
        self.motors.len()
    }

    pub fn pins(&self) -> &S {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut S {
        &mut self.pins
    }

    /// Drive every motor with the direction chosen for its role
    fn drive_roles(&mut self, direction_for: impl Fn(Role) -> MotorDirection) {
        for (role, motor) in &mut self.motors {
            motor.drive(&mut self.pins, direction_for(*role));
        }
    }

    fn drive_sides(&mut self, left: MotorDirection, right: MotorDirection) {
        debug!("Driving sides: left={:?}, right={:?}", left, right);
        self.drive_roles(|role| match role.side() {
            Side::Left => left,
            Side::Right => right,
        });
    }

    fn stop_all(&mut self) {
        self.drive_roles(|_| MotorDirection::Release);
    }
}

impl<S: PinSink, L> Maneuvers for DriveTrain<S, L> {
    fn move_forward(&mut self, speed: f32, left_coef: f32, right_coef: f32) {
        self.drive_sides(
            MotorDirection::Forward(speed * left_coef),
            MotorDirection::Forward(speed * right_coef),
        );
    }

    fn move_backward(&mut self, speed: f32, left_coef: f32, right_coef: f32) {
        self.drive_sides(
            MotorDirection::Backward(speed * left_coef),
            MotorDirection::Backward(speed * right_coef),
        );
    }

    fn rotate_clockwise(&mut self, speed: f32) {
        self.drive_sides(
            MotorDirection::Forward(speed),
            MotorDirection::Backward(speed),
        );
    }

    fn rotate_counter_clockwise(&mut self, speed: f32) {
        self.drive_sides(
            MotorDirection::Backward(speed),
            MotorDirection::Forward(speed),
        );
    }

    fn stop_motors(&mut self) {
        debug!("Stopping {} motors", self.motors.len());
        self.stop_all();
    }
}

impl<S: PinSink> Strafe for DriveTrain<S, FourWheel> {
    // Front-right and back-left pull, front-left and back-right push
    fn strafe_left(&mut self, speed: f32) {
        self.drive_roles(|role| match role {
            Role::RightFront | Role::LeftBack => MotorDirection::Forward(speed),
            _ => MotorDirection::Backward(speed),
        });
    }

    fn strafe_right(&mut self, speed: f32) {
        self.drive_roles(|role| match role {
            Role::LeftFront | Role::RightBack => MotorDirection::Forward(speed),
            _ => MotorDirection::Backward(speed),
        });
    }
}

impl<S: PinSink, L> Drop for DriveTrain<S, L> {
    fn drop(&mut self) {
        // Never leave the bridge driving once the owner is gone
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::SimPins;

    fn two_wheel() -> DriveTrain<SimPins, TwoWheel> {
        DriveTrain::two_wheel(
            SimPins::new(),
            MotorChannel::new(5, 9, 10),
            MotorChannel::new(6, 12, 11),
        )
    }

    fn four_wheel() -> DriveTrain<SimPins, FourWheel> {
        DriveTrain::four_wheel(
            SimPins::new(),
            MotorChannel::new(2, 22, 23),
            MotorChannel::new(3, 24, 25),
            MotorChannel::new(4, 26, 27),
            MotorChannel::new(5, 28, 29),
        )
    }

    fn signed<S: PinSink, L>(drive: &DriveTrain<S, L>, role: Role) -> i16 {
        drive.state(role).unwrap().signed()
    }

    #[test]
    fn test_starts_released() {
        let drive = four_wheel();
        assert_eq!(drive.motor_count(), 4);
        assert!(drive.states().iter().all(|(_, s)| s.is_stopped()));
    }

    #[test]
    fn test_forward_applies_side_coefficients() {
        let mut drive = two_wheel();
        drive.move_forward(200.0, 1.0, 0.5);
        assert_eq!(signed(&drive, Role::Left), 200);
        assert_eq!(signed(&drive, Role::Right), 100);

        // Pin level view agrees with the actuator state
        assert_eq!(drive.pins().analog(6), 100);
        assert!(drive.pins().digital(12));
    }

    #[test]
    fn test_backward_four_wheel_sides_match() {
        let mut drive = four_wheel();
        drive.move_backward(100.0, 0.8, 1.0);
        assert_eq!(signed(&drive, Role::LeftFront), -80);
        assert_eq!(signed(&drive, Role::LeftBack), -80);
        assert_eq!(signed(&drive, Role::RightFront), -100);
        assert_eq!(signed(&drive, Role::RightBack), -100);
    }

    #[test]
    fn test_rotation_drives_sides_opposite() {
        let mut drive = four_wheel();
        drive.rotate_clockwise(150.0);
        for (role, state) in drive.states() {
            match role.side() {
                Side::Left => assert_eq!(state.signed(), 150, "{:?}", role),
                Side::Right => assert_eq!(state.signed(), -150, "{:?}", role),
            }
        }

        drive.rotate_counter_clockwise(150.0);
        for (role, state) in drive.states() {
            match role.side() {
                Side::Left => assert_eq!(state.signed(), -150, "{:?}", role),
                Side::Right => assert_eq!(state.signed(), 150, "{:?}", role),
            }
        }
    }

    #[test]
    fn test_rotations_do_not_cancel_without_stop() {
        let mut drive = two_wheel();
        drive.rotate_clockwise(255.0);
        drive.rotate_counter_clockwise(255.0);
        assert!(
            drive.states().iter().all(|(_, s)| !s.is_stopped()),
            "Rotation commands alone should leave motors running"
        );

        drive.stop_motors();
        assert!(drive.states().iter().all(|(_, s)| *s == MotorState::STOPPED));
    }

    #[test]
    fn test_strafe_uses_diagonal_pairs() {
        let mut drive = four_wheel();
        drive.strafe_left(120.0);
        assert_eq!(signed(&drive, Role::RightFront), 120);
        assert_eq!(signed(&drive, Role::LeftBack), 120);
        assert_eq!(signed(&drive, Role::LeftFront), -120);
        assert_eq!(signed(&drive, Role::RightBack), -120);

        drive.strafe_right(120.0);
        assert_eq!(signed(&drive, Role::LeftFront), 120);
        assert_eq!(signed(&drive, Role::RightBack), 120);
        assert_eq!(signed(&drive, Role::RightFront), -120);
        assert_eq!(signed(&drive, Role::LeftBack), -120);
    }

    #[test]
    fn test_maneuvers_are_idempotent() {
        let mut drive = four_wheel();
        drive.move_forward(90.0, 1.0, 1.0);
        let once = drive.states();
        drive.move_forward(90.0, 1.0, 1.0);
        assert_eq!(once, drive.states());
    }

    #[test]
    fn test_excess_speed_clamped_per_motor() {
        let mut drive = two_wheel();
        drive.move_forward(255.0, 1.5, -1.0);
        assert_eq!(signed(&drive, Role::Left), 255);
        // Negative coefficient clamps to zero duty, direction stays forward
        assert_eq!(drive.state(Role::Right).unwrap().magnitude, 0);
        assert!(drive.state(Role::Right).unwrap().forward);
    }
}
