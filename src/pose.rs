// Open-loop dead reckoning from elapsed time and the last issued maneuver.
//
// Velocities are fixed calibration constants and are not scaled by the commanded
// speed. dt is not clamped: a stalled caller gets one large step.

use std::time::Instant;

use serde::Serialize;
use tracing::trace;

use crate::config::RobotConfig;
use crate::motor::Maneuver;

/// Planar pose in distance units and radians (counter-clockwise positive)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

pub struct PoseEstimator {
    pose: Pose,
    last_move: Maneuver,
    last_update: Instant,
    linear_velocity: f32,
    angular_velocity: f32,
}

impl PoseEstimator {
    pub fn new(linear_velocity: f32, angular_velocity: f32, now: Instant) -> Self {
        Self {
            pose: Pose::default(),
            last_move: Maneuver::Stop,
            last_update: now,
            linear_velocity,
            angular_velocity,
        }
    }

    pub fn from_config(config: &RobotConfig, now: Instant) -> Self {
        Self::new(config.linear_velocity, config.angular_velocity, now)
    }

    /// Record the maneuver now in effect. Does not integrate.
    pub fn set_last_move(&mut self, tag: Maneuver) {
        self.last_move = tag;
    }

    /// Integrate the last move over the time since the previous update
    pub fn update_coordinates(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        let step = self.linear_velocity * dt;
        let turn = self.angular_velocity * dt;
        let (sin, cos) = self.pose.heading.sin_cos();

        match self.last_move {
            Maneuver::Forward => {
                self.pose.x += step * cos;
                self.pose.y += step * sin;
            }
            Maneuver::Backward => {
                self.pose.x -= step * cos;
                self.pose.y -= step * sin;
            }
            Maneuver::RotateClockwise => self.pose.heading -= turn,
            Maneuver::RotateCounterClockwise => self.pose.heading += turn,
            // Lateral motion is not modelled
            Maneuver::StrafeLeft | Maneuver::StrafeRight | Maneuver::Stop => {}
        }

        trace!("Pose after {:.3}s of {:?}: {:?}", dt, self.last_move, self.pose);
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn last_move(&self) -> Maneuver {
        self.last_move
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;
    use std::time::Duration;

    const EPS: f32 = 1e-5;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_starts_at_origin_stopped() {
        let estimator = PoseEstimator::new(1.0, 1.0, Instant::now());
        assert_eq!(estimator.pose(), Pose::default());
        assert_eq!(estimator.last_move(), Maneuver::Stop);
    }

    #[test]
    fn test_forward_one_second() {
        let t0 = Instant::now();
        let mut estimator = PoseEstimator::new(1.0, 1.0, t0);
        estimator.set_last_move(Maneuver::Forward);
        estimator.update_coordinates(t0 + Duration::from_secs(1));

        let pose = estimator.pose();
        assert!(close(pose.x, 1.0), "x = {}", pose.x);
        assert!(close(pose.y, 0.0), "y = {}", pose.y);
        assert!(close(pose.heading, 0.0));
    }

    #[test]
    fn test_counter_clockwise_turns_heading_only() {
        let t0 = Instant::now();
        let mut estimator = PoseEstimator::new(1.0, 1.0, t0);
        estimator.set_last_move(Maneuver::RotateCounterClockwise);
        estimator.update_coordinates(t0 + Duration::from_secs(1));

        let pose = estimator.pose();
        assert!(close(pose.heading, 1.0), "heading = {}", pose.heading);
        assert_eq!((pose.x, pose.y), (0.0, 0.0));
    }

    #[test]
    fn test_clockwise_decreases_heading() {
        let t0 = Instant::now();
        let mut estimator = PoseEstimator::new(1.0, 2.0, t0);
        estimator.set_last_move(Maneuver::RotateClockwise);
        estimator.update_coordinates(t0 + Duration::from_millis(500));
        assert!(close(estimator.pose().heading, -1.0));
    }

    #[test]
    fn test_forward_follows_heading() {
        let t0 = Instant::now();
        let mut estimator = PoseEstimator::new(1.0, FRAC_PI_2, t0);

        estimator.set_last_move(Maneuver::RotateCounterClockwise);
        let t1 = t0 + Duration::from_secs(1);
        estimator.update_coordinates(t1);

        estimator.set_last_move(Maneuver::Forward);
        estimator.update_coordinates(t1 + Duration::from_secs(2));

        let pose = estimator.pose();
        assert!(close(pose.x, 0.0), "x = {}", pose.x);
        assert!(close(pose.y, 2.0), "y = {}", pose.y);
    }

    #[test]
    fn test_backward_reverses_along_heading() {
        let t0 = Instant::now();
        let mut estimator = PoseEstimator::new(0.5, 1.0, t0);
        estimator.set_last_move(Maneuver::Backward);
        estimator.update_coordinates(t0 + Duration::from_secs(4));
        assert!(close(estimator.pose().x, -2.0));
    }

    #[test]
    fn test_stop_and_strafe_leave_pose_unchanged() {
        let t0 = Instant::now();
        let mut estimator = PoseEstimator::new(1.0, 1.0, t0);
        let mut t = t0;
        for tag in [Maneuver::Stop, Maneuver::StrafeLeft, Maneuver::StrafeRight] {
            estimator.set_last_move(tag);
            t += Duration::from_secs(3);
            estimator.update_coordinates(t);
            assert_eq!(estimator.pose(), Pose::default(), "{:?} moved the pose", tag);
        }
    }

    #[test]
    fn test_set_last_move_has_no_time_effect() {
        let t0 = Instant::now();
        let mut estimator = PoseEstimator::new(1.0, 1.0, t0);
        estimator.set_last_move(Maneuver::Forward);
        estimator.set_last_move(Maneuver::Stop);
        estimator.update_coordinates(t0 + Duration::from_secs(10));
        assert_eq!(estimator.pose(), Pose::default());
    }

    #[test]
    fn test_long_stall_integrates_in_one_step() {
        let t0 = Instant::now();
        let mut estimator = PoseEstimator::new(1.0, 1.0, t0);
        estimator.set_last_move(Maneuver::Forward);
        estimator.update_coordinates(t0 + Duration::from_secs(60));
        assert!(close(estimator.pose().x, 60.0));
    }
}
