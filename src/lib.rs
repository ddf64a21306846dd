//! Motion control and dead-reckoning runtime for a small skid-steer robot.
//!
//! Command symbols come in over Zenoh or a serial line, are turned into per-wheel
//! H-bridge outputs on a serial pin bridge, and a watchdog halts the robot when
//! the command link goes quiet.

pub mod bridge;
pub mod config;
pub mod interpreter;
pub mod messages;
pub mod motor;
pub mod pose;
pub mod runtime;
pub mod sensors;
pub mod transport;
