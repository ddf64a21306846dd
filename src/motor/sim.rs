// In-memory stand-in for the pin bridge, used in simulation mode and tests

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use super::actuator::PinSink;
use crate::config::RANGING_SENTINEL_CM;
use crate::sensors::{Inertial, MineDetector, Motion6, Ranging};

const LOG_CAPACITY: usize = 256;

/// Remembers the last level written to every pin
#[derive(Debug, Default)]
pub struct SimPins {
    analog: HashMap<u8, u8>,
    digital: HashMap<u8, bool>,
    digital_log: VecDeque<(u8, bool)>,
    writes: usize,
    distance_cm: Option<f32>,
    motion: Option<Motion6>,
    mine: bool,
}

impl SimPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last PWM duty written to `pin` (0 if never written)
    pub fn analog(&self, pin: u8) -> u8 {
        self.analog.get(&pin).copied().unwrap_or(0)
    }

    /// Last digital level written to `pin` (low if never written)
    pub fn digital(&self, pin: u8) -> bool {
        self.digital.get(&pin).copied().unwrap_or(false)
    }

    /// Most recent digital writes, oldest first
    pub fn digital_log(&self) -> Vec<(u8, bool)> {
        self.digital_log.iter().copied().collect()
    }

    pub fn clear_log(&mut self) {
        self.digital_log.clear();
    }

    /// Total pin writes since creation
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Echo distance the simulated ranger reports; `None` simulates a missing echo
    pub fn set_distance(&mut self, distance_cm: Option<f32>) {
        self.distance_cm = distance_cm;
    }

    /// Sample the simulated IMU reports; `None` simulates an absent sensor
    pub fn set_motion(&mut self, motion: Option<Motion6>) {
        self.motion = motion;
    }

    pub fn set_mine(&mut self, detected: bool) {
        self.mine = detected;
    }
}

impl PinSink for SimPins {
    fn analog_write(&mut self, pin: u8, duty: u8) {
        trace!("sim analog pin {} = {}", pin, duty);
        self.analog.insert(pin, duty);
        self.writes += 1;
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        trace!("sim digital pin {} = {}", pin, high);
        self.digital.insert(pin, high);
        if self.digital_log.len() == LOG_CAPACITY {
            self.digital_log.pop_front();
        }
        self.digital_log.push_back((pin, high));
        self.writes += 1;
    }
}

impl Ranging for SimPins {
    fn distance_cm(&mut self) -> f32 {
        self.distance_cm.unwrap_or(RANGING_SENTINEL_CM)
    }
}

impl Inertial for SimPins {
    fn test_connection(&mut self) -> bool {
        self.motion.is_some()
    }

    fn motion6(&mut self) -> Option<Motion6> {
        self.motion
    }
}

impl MineDetector for SimPins {
    fn mine_detected(&mut self) -> bool {
        self.mine
    }
}
