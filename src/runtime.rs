// 50 Hz control loop with watchdog
// Each tick: drain commands, apply at most one maneuver change, run the watchdog,
// integrate the pose. Sensors are polled on the slower telemetry cadence only,
// since a ranging read can stall for the whole echo window.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::bridge::PinBus;
use crate::config::{
    COMMAND_BAUDRATE, DriveLayout, LOOP_HZ, RobotConfig, TELEMETRY_PERIOD, TOPIC_CMD_DRIVE,
    TOPIC_HEALTH, TOPIC_STATE_POSE,
};
use crate::interpreter::CommandInterpreter;
use crate::messages::{RuntimeHealth, Telemetry};
use crate::motor::{DriveTrain, FourWheel, Maneuvers, MotorState, PinSink, Role, SimPins, TwoWheel};
use crate::pose::{Pose, PoseEstimator};
use crate::sensors::{Inertial, MineDetector, Ranging, is_sentinel};
use crate::transport::{CommandSource, SerialCommandSource, ZenohCommandSource, coalesce};

/// Everything the runtime needs from the board: motor pins plus sensors
pub trait Hardware: PinSink + Ranging + Inertial + MineDetector {}

impl<T: PinSink + Ranging + Inertial + MineDetector> Hardware for T {}

/// Board chosen at startup (pin bridge or simulation)
pub type Board = Box<dyn Hardware + Send>;

/// Drive train in the layout selected by configuration
pub enum Rig<H: Hardware> {
    TwoWheel(DriveTrain<H, TwoWheel>),
    FourWheel(DriveTrain<H, FourWheel>),
}

impl<H: Hardware> Rig<H> {
    pub fn build(layout: &DriveLayout, board: H) -> Self {
        match *layout {
            DriveLayout::TwoWheel { left, right } => {
                Rig::TwoWheel(DriveTrain::two_wheel(board, left, right))
            }
            DriveLayout::FourWheel {
                left_front,
                right_front,
                left_back,
                right_back,
            } => Rig::FourWheel(DriveTrain::four_wheel(
                board,
                left_front,
                right_front,
                left_back,
                right_back,
            )),
        }
    }

    pub fn supports_strafe(&self) -> bool {
        matches!(self, Rig::FourWheel(_))
    }

    pub fn states(&self) -> Vec<(Role, MotorState)> {
        match self {
            Rig::TwoWheel(drive) => drive.states(),
            Rig::FourWheel(drive) => drive.states(),
        }
    }

    pub fn board(&self) -> &H {
        match self {
            Rig::TwoWheel(drive) => drive.pins(),
            Rig::FourWheel(drive) => drive.pins(),
        }
    }

    pub fn board_mut(&mut self) -> &mut H {
        match self {
            Rig::TwoWheel(drive) => drive.pins_mut(),
            Rig::FourWheel(drive) => drive.pins_mut(),
        }
    }

    pub fn stop_motors(&mut self) {
        match self {
            Rig::TwoWheel(drive) => drive.stop_motors(),
            Rig::FourWheel(drive) => drive.stop_motors(),
        }
    }
}

/// Application context: owns the drive train, interpreter state and pose
pub struct Runtime<H: Hardware> {
    rig: Rig<H>,
    interpreter: CommandInterpreter,
    pose: PoseEstimator,
    health: RuntimeHealth,
    last_distance: Option<f32>,
    mine: bool,
}

impl<H: Hardware> Runtime<H> {
    pub fn new(config: &RobotConfig, board: H, now: Instant) -> Self {
        Self {
            rig: Rig::build(&config.layout, board),
            interpreter: CommandInterpreter::from_config(config, now),
            pose: PoseEstimator::from_config(config, now),
            health: RuntimeHealth::Ok,
            last_distance: None,
            mine: false,
        }
    }

    /// Startup checks. Failures are reported, never fatal.
    pub fn diagnostics(&mut self) {
        let board = self.rig.board_mut();
        if board.test_connection() {
            info!("IMU connected successfully");
            if let Some(sample) = board.motion6() {
                debug!("IMU sample: {:?}", sample);
            }
        } else {
            warn!("IMU connection failed, continuing without it");
        }
    }

    /// One control tick over the symbols received since the previous one
    pub fn tick(&mut self, symbols: &[u8], now: Instant) {
        // 1. Apply the last recognized symbol of the burst
        if let Some(symbol) = coalesce(symbols, self.rig.supports_strafe()) {
            match &mut self.rig {
                Rig::TwoWheel(drive) => {
                    self.interpreter
                        .on_symbol(symbol, now, drive, &mut self.pose);
                }
                Rig::FourWheel(drive) => {
                    self.interpreter
                        .on_extended_symbol(symbol, now, drive, &mut self.pose);
                }
            }
        }

        // 2. Watchdog
        match &mut self.rig {
            Rig::TwoWheel(drive) => self.interpreter.on_tick(now, drive, &mut self.pose),
            Rig::FourWheel(drive) => self.interpreter.on_tick(now, drive, &mut self.pose),
        };

        // 3. Dead reckoning
        self.pose.update_coordinates(now);

        self.health = if self.interpreter.is_stale(now) {
            RuntimeHealth::CmdStale
        } else {
            RuntimeHealth::Ok
        };
    }

    /// Read the slow sensors; kept off the command path
    pub fn poll_sensors(&mut self) {
        let board = self.rig.board_mut();
        let distance = board.distance_cm();
        self.mine = board.mine_detected();
        self.last_distance = (!is_sentinel(distance)).then_some(distance);
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry::new(self.pose.pose(), self.mine, self.last_distance)
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn pose(&self) -> Pose {
        self.pose.pose()
    }

    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.interpreter
    }

    pub fn rig(&self) -> &Rig<H> {
        &self.rig
    }

    pub fn stop(&mut self) {
        info!("Stopping all motors");
        self.rig.stop_motors();
    }
}

/// Where drive commands come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Link {
    /// JSON commands on the Zenoh command topic
    Zenoh,
    /// Raw single-byte commands on a serial port
    Serial,
}

pub struct RunOptions {
    pub config: RobotConfig,
    /// Use in-memory pins instead of the serial bridge
    pub sim: bool,
    pub bridge_port: String,
    pub link: Link,
    pub command_port: String,
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let RunOptions {
        config,
        sim,
        bridge_port,
        link,
        command_port,
    } = options;

    let board: Board = if sim {
        info!("Simulation mode: motor outputs stay in memory");
        Box::new(SimPins::new())
    } else {
        info!("Opening pin bridge on {}", bridge_port);
        Box::new(PinBus::open(&bridge_port, config.ranging, config.mine_pin)?)
    };

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and command source...");
    let pub_pose = session.declare_publisher(TOPIC_STATE_POSE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;
    let mut source: Box<dyn CommandSource + Send> = match link {
        Link::Zenoh => {
            let subscriber = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
            info!("Subscribed to: {}", TOPIC_CMD_DRIVE);
            Box::new(ZenohCommandSource::new(subscriber))
        }
        Link::Serial => Box::new(SerialCommandSource::open(&command_port, COMMAND_BAUDRATE)?),
    };

    let mut runtime = Runtime::new(&config, board, Instant::now());
    runtime.diagnostics();

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    let mut telemetry_tick = interval(TELEMETRY_PERIOD);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, {} drive",
        LOOP_HZ,
        config.command_timeout_ms,
        config.layout.name()
    );
    info!("Publishing to: {}, {}", TOPIC_STATE_POSE, TOPIC_HEALTH);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                // 1. Drain all pending commands (non-blocking), apply, watchdog, pose
                let symbols = source.poll();
                runtime.tick(&symbols, Instant::now());

                // 2. Publish health
                let health_json = serde_json::to_string(&runtime.health())?;
                pub_health.put(health_json).await?;
            }
            _ = telemetry_tick.tick() => {
                runtime.poll_sensors();
                let telemetry_json = serde_json::to_string(&runtime.telemetry())?;
                pub_pose.put(telemetry_json).await?;
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                runtime.stop();
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Command;
    use crate::motor::MotorChannel;

    fn two_wheel_runtime(t0: Instant) -> Runtime<SimPins> {
        Runtime::new(&RobotConfig::default(), SimPins::new(), t0)
    }

    fn four_wheel_config() -> RobotConfig {
        RobotConfig {
            layout: DriveLayout::FourWheel {
                left_front: MotorChannel::new(2, 22, 23),
                right_front: MotorChannel::new(3, 24, 25),
                left_back: MotorChannel::new(4, 26, 27),
                right_back: MotorChannel::new(5, 28, 29),
            },
            ..RobotConfig::default()
        }
    }

    #[test]
    fn test_burst_applies_last_symbol_only() {
        let t0 = Instant::now();
        let mut runtime = two_wheel_runtime(t0);

        runtime.tick(b"fffl", t0);
        assert_eq!(runtime.interpreter().state().current_movement, Command::Left);
        let left = runtime.rig().states()[0].1;
        assert_eq!(left.signed(), -255, "left motor reverses for a CCW pivot");
    }

    #[test]
    fn test_watchdog_stops_and_reports_stale() {
        let t0 = Instant::now();
        let mut runtime = two_wheel_runtime(t0);

        runtime.tick(b"f", t0);
        assert_eq!(runtime.health(), RuntimeHealth::Ok);

        runtime.tick(b"", t0 + Duration::from_millis(3001));
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
        assert!(runtime.rig().states().iter().all(|(_, s)| s.is_stopped()));
    }

    #[test]
    fn test_pose_follows_ticks() {
        let t0 = Instant::now();
        let mut runtime = two_wheel_runtime(t0);

        runtime.tick(b"f", t0);
        runtime.tick(b"", t0 + Duration::from_millis(500));
        runtime.tick(b"", t0 + Duration::from_millis(1000));
        assert!((runtime.pose().x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_strafe_only_on_four_wheel() {
        let t0 = Instant::now();
        let mut two = two_wheel_runtime(t0);
        two.tick(b"q", t0);
        assert_eq!(two.interpreter().state().current_movement, Command::Stop);

        let mut four = Runtime::new(&four_wheel_config(), SimPins::new(), t0);
        four.tick(b"q", t0);
        assert_eq!(four.interpreter().state().current_movement, Command::StrafeLeft);
        // Pose does not model lateral motion
        four.tick(b"", t0 + Duration::from_secs(1));
        assert_eq!(four.pose(), Pose::default());
    }

    #[test]
    fn test_sensor_poll_feeds_telemetry() {
        let t0 = Instant::now();
        let mut runtime = two_wheel_runtime(t0);

        runtime.poll_sensors();
        assert_eq!(runtime.telemetry().distance, None, "sentinel is not reported");
        assert_eq!(runtime.telemetry().mine, 0);

        runtime.rig.board_mut().set_distance(Some(35.0));
        runtime.rig.board_mut().set_mine(true);
        runtime.poll_sensors();
        let telemetry = runtime.telemetry();
        assert_eq!(telemetry.distance, Some(35.0));
        assert_eq!(telemetry.mine, 1);
    }

    #[test]
    fn test_boxed_board_drives_pins() {
        let t0 = Instant::now();
        let board: Board = Box::new(SimPins::new());
        let mut runtime = Runtime::new(&RobotConfig::default(), board, t0);
        runtime.diagnostics();
        runtime.tick(b"b", t0);
        assert!(runtime.rig().states().iter().all(|(_, s)| s.signed() == -255));

        runtime.stop();
        assert!(runtime.rig().states().iter().all(|(_, s)| s.is_stopped()));
    }
}
