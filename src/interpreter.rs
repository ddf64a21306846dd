// Command symbol state machine with the idle-timeout safety stop.
//
// The interpreter owns no hardware. The drive train and pose estimator belong to
// the runtime and are lent in for each call.

use std::time::{Duration, Instant};

use tracing::{info, trace, warn};

use crate::config::RobotConfig;
use crate::motor::{Maneuver, Maneuvers, Strafe};
use crate::pose::PoseEstimator;

/// Command symbols accepted on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    Forward,
    Backward,
    /// Pivot counter-clockwise
    Left,
    /// Pivot clockwise
    Right,
    #[default]
    Stop,
    StrafeLeft,
    StrafeRight,
}

impl Command {
    /// Map a raw symbol byte. `q`/`e` form the extended (strafe) set.
    pub fn from_symbol(symbol: u8) -> Option<Self> {
        match symbol {
            b'f' => Some(Command::Forward),
            b'b' => Some(Command::Backward),
            b'l' => Some(Command::Left),
            b'r' => Some(Command::Right),
            b's' => Some(Command::Stop),
            b'q' => Some(Command::StrafeLeft),
            b'e' => Some(Command::StrafeRight),
            _ => None,
        }
    }

    pub fn symbol(self) -> u8 {
        match self {
            Command::Forward => b'f',
            Command::Backward => b'b',
            Command::Left => b'l',
            Command::Right => b'r',
            Command::Stop => b's',
            Command::StrafeLeft => b'q',
            Command::StrafeRight => b'e',
        }
    }

    pub fn is_extended(self) -> bool {
        matches!(self, Command::StrafeLeft | Command::StrafeRight)
    }

    pub fn maneuver(self) -> Maneuver {
        match self {
            Command::Forward => Maneuver::Forward,
            Command::Backward => Maneuver::Backward,
            Command::Left => Maneuver::RotateCounterClockwise,
            Command::Right => Maneuver::RotateClockwise,
            Command::Stop => Maneuver::Stop,
            Command::StrafeLeft => Maneuver::StrafeLeft,
            Command::StrafeRight => Maneuver::StrafeRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandState {
    pub current_movement: Command,
    /// Arrival of the last recognized symbol, repeated or not
    pub last_command_time: Instant,
}

pub struct CommandInterpreter {
    state: CommandState,
    timeout: Duration,
    speed: f32,
    left_coef: f32,
    right_coef: f32,
}

impl CommandInterpreter {
    pub fn new(timeout: Duration, speed: f32, left_coef: f32, right_coef: f32, now: Instant) -> Self {
        Self {
            state: CommandState {
                current_movement: Command::Stop,
                last_command_time: now,
            },
            timeout,
            speed,
            left_coef,
            right_coef,
        }
    }

    pub fn from_config(config: &RobotConfig, now: Instant) -> Self {
        Self::new(
            config.command_timeout(),
            config.reference_speed,
            config.left_coef,
            config.right_coef,
            now,
        )
    }

    /// Apply one symbol from the base set (`f b l r s`).
    /// Returns true when a maneuver was issued.
    pub fn on_symbol<D: Maneuvers>(
        &mut self,
        symbol: u8,
        now: Instant,
        drive: &mut D,
        pose: &mut PoseEstimator,
    ) -> bool {
        let Some(command) = self.accept(symbol, now, false) else {
            return false;
        };
        self.drive_base(command, drive);
        pose.set_last_move(command.maneuver());
        true
    }

    /// Same as `on_symbol`, additionally honoring the strafe symbols (`q e`)
    pub fn on_extended_symbol<D: Strafe>(
        &mut self,
        symbol: u8,
        now: Instant,
        drive: &mut D,
        pose: &mut PoseEstimator,
    ) -> bool {
        let Some(command) = self.accept(symbol, now, true) else {
            return false;
        };
        match command {
            Command::StrafeLeft => drive.strafe_left(self.speed),
            Command::StrafeRight => drive.strafe_right(self.speed),
            other => self.drive_base(other, drive),
        }
        pose.set_last_move(command.maneuver());
        true
    }

    /// Watchdog check. Returns true when it forced a stop.
    pub fn on_tick<D: Maneuvers>(
        &mut self,
        now: Instant,
        drive: &mut D,
        pose: &mut PoseEstimator,
    ) -> bool {
        if self.state.current_movement == Command::Stop || !self.is_stale(now) {
            return false;
        }

        warn!(
            "Command stale ({:?} old), stopping robot",
            self.command_age(now)
        );
        self.state.current_movement = Command::Stop;
        drive.stop_motors();
        pose.set_last_move(Maneuver::Stop);
        true
    }

    /// No recognized symbol within the timeout
    pub fn is_stale(&self, now: Instant) -> bool {
        self.command_age(now) > self.timeout
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command_age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.last_command_time)
    }

    /// Filter a symbol. Returns the command only when it changes the movement.
    fn accept(&mut self, symbol: u8, now: Instant, extended: bool) -> Option<Command> {
        let command = match Command::from_symbol(symbol) {
            Some(command) if extended || !command.is_extended() => command,
            _ => {
                trace!("Ignoring symbol 0x{:02X}", symbol);
                return None;
            }
        };

        // Any recognized symbol proves the link is alive
        self.state.last_command_time = now;

        if command == self.state.current_movement {
            return None;
        }

        info!("Received command: {:?}", command);
        self.state.current_movement = command;
        Some(command)
    }

    fn drive_base<D: Maneuvers>(&self, command: Command, drive: &mut D) {
        match command {
            Command::Forward => drive.move_forward(self.speed, self.left_coef, self.right_coef),
            Command::Backward => drive.move_backward(self.speed, self.left_coef, self.right_coef),
            Command::Left => drive.rotate_counter_clockwise(self.speed),
            Command::Right => drive.rotate_clockwise(self.speed),
            // Strafe never reaches here through accept(); halting is the safe fallback
            Command::Stop | Command::StrafeLeft | Command::StrafeRight => drive.stop_motors(),
        }
    }
}
