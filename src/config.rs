// Timeouts, topics, calibration defaults and the robot configuration file
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::motor::MotorChannel;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(3000);

// Telemetry broadcast period (pose, mine flag, last distance)
pub const TELEMETRY_PERIOD: Duration = Duration::from_millis(500);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "sapper/cmd/drive"; // commands
pub const TOPIC_STATE_POSE: &str = "sapper/state/pose"; // telemetry
pub const TOPIC_HEALTH: &str = "sapper/state/health"; // health status

// Serial port for the pin bridge microcontroller
pub const BRIDGE_PORT: &str = "/dev/ttyUSB0";

// Serial port carrying raw single-byte commands
pub const COMMAND_PORT: &str = "/dev/ttyUSB1";

// Baudrate of the raw single-byte command line
pub const COMMAND_BAUDRATE: u32 = 115_200;

/// Full-scale PWM duty accepted by a motor channel
pub const MAX_INTENSITY: u8 = 255;

/// Speed handed to every maneuver issued by the command interpreter
pub const REFERENCE_SPEED: f32 = 255.0;

/// Dead-reckoning calibration: distance units per second while driving straight
pub const LINEAR_VELOCITY: f32 = 1.0;
/// Dead-reckoning calibration: radians per second while pivoting
pub const ANGULAR_VELOCITY: f32 = 1.0;

/// Distance reported when the ultrasonic echo never arrives
pub const RANGING_SENTINEL_CM: f32 = 100.0;
/// Echo listening window in microseconds (roughly 1.5 m round trip)
pub const ECHO_TIMEOUT_US: u32 = 8746;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Pin {pin} is assigned more than once")]
    DuplicatePin { pin: u8 },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Motor wiring, selected once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveLayout {
    TwoWheel {
        left: MotorChannel,
        right: MotorChannel,
    },
    FourWheel {
        left_front: MotorChannel,
        right_front: MotorChannel,
        left_back: MotorChannel,
        right_back: MotorChannel,
    },
}

impl DriveLayout {
    pub fn channels(&self) -> Vec<MotorChannel> {
        match self {
            DriveLayout::TwoWheel { left, right } => vec![*left, *right],
            DriveLayout::FourWheel {
                left_front,
                right_front,
                left_back,
                right_back,
            } => vec![*left_front, *right_front, *left_back, *right_back],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DriveLayout::TwoWheel { .. } => "two-wheel",
            DriveLayout::FourWheel { .. } => "four-wheel",
        }
    }
}

impl Default for DriveLayout {
    // Wiring of the two-motor Uno build
    fn default() -> Self {
        DriveLayout::TwoWheel {
            left: MotorChannel::new(5, 9, 10),
            right: MotorChannel::new(6, 12, 11),
        }
    }
}

/// Ultrasonic ranger wiring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangingPins {
    pub trigger: u8,
    pub echo: u8,
}

impl Default for RangingPins {
    fn default() -> Self {
        Self {
            trigger: 7,
            echo: 8,
        }
    }
}

/// Robot configuration, loaded from JSON. Missing fields fall back to the defaults above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub layout: DriveLayout,
    pub reference_speed: f32,
    /// Trim applied to the left side when driving straight
    pub left_coef: f32,
    /// Trim applied to the right side when driving straight
    pub right_coef: f32,
    pub linear_velocity: f32,
    pub angular_velocity: f32,
    pub command_timeout_ms: u64,
    pub ranging: RangingPins,
    /// Digital input wired to the mine detector, if fitted
    pub mine_pin: Option<u8>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            layout: DriveLayout::default(),
            reference_speed: REFERENCE_SPEED,
            left_coef: 1.0,
            right_coef: 1.0,
            linear_velocity: LINEAR_VELOCITY,
            angular_velocity: ANGULAR_VELOCITY,
            command_timeout_ms: CMD_TIMEOUT.as_millis() as u64,
            ranging: RangingPins::default(),
            mine_pin: None,
        }
    }
}

impl RobotConfig {
    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut pins = Vec::new();
        for channel in self.layout.channels() {
            pins.extend([channel.pwm, channel.forward, channel.reverse]);
        }
        pins.extend([self.ranging.trigger, self.ranging.echo]);
        pins.extend(self.mine_pin);

        let mut seen = HashSet::new();
        for pin in pins {
            if !seen.insert(pin) {
                return Err(ConfigError::DuplicatePin { pin });
            }
        }

        if !(self.reference_speed > 0.0 && self.reference_speed <= MAX_INTENSITY as f32) {
            return Err(ConfigError::InvalidValue {
                field: "reference_speed",
                reason: format!("{} is outside (0, {}]", self.reference_speed, MAX_INTENSITY),
            });
        }
        for (field, coef) in [("left_coef", self.left_coef), ("right_coef", self.right_coef)] {
            if !(coef.is_finite() && coef >= 0.0) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("{} must be a non-negative number", coef),
                });
            }
        }
        for (field, velocity) in [
            ("linear_velocity", self.linear_velocity),
            ("angular_velocity", self.angular_velocity),
        ] {
            if !(velocity.is_finite() && velocity > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("{} must be positive", velocity),
                });
            }
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "command_timeout_ms",
                reason: "watchdog timeout cannot be zero".to_string(),
            });
        }
        Ok(())
    }
}
