// Motor control module for the sapper base
//
// Provides:
// - H-bridge channel actuator (PWM magnitude + direction enables)
// - Role-partitioned drive train for two- and four-wheel frames
// - In-memory pin sink for simulation and tests

mod actuator;
mod drivetrain;
mod sim;

pub use actuator::{
    MotorActuator, MotorChannel, MotorDirection, MotorState, PinSink, clamp_intensity,
};
pub use drivetrain::{
    DriveTrain, FourWheel, Maneuver, Maneuvers, Role, Side, Strafe, TwoWheel,
};
pub use sim::SimPins;
