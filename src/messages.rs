// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Named drive command sent by the remote console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveCmd {
    Forward,
    Backward,
    Left,
    Right,
    #[serde(rename = "none")]
    Halt,
    StrafeLeft,
    StrafeRight,
}

// Command from console/scripts -> runtime
// Older autopilot scripts send the same value under "direction"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveCommand {
    #[serde(alias = "direction")]
    pub cmd: DriveCmd,
}

impl DriveCommand {
    /// Normalize into the single-character command symbol
    pub fn symbol(&self) -> u8 {
        match self.cmd {
            DriveCmd::Forward => b'f',
            DriveCmd::Backward => b'b',
            DriveCmd::Left => b'l',
            DriveCmd::Right => b'r',
            DriveCmd::Halt => b's',
            DriveCmd::StrafeLeft => b'q',
            DriveCmd::StrafeRight => b'e',
        }
    }
}

// Telemetry from runtime -> console, broadcast on a fixed cadence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Telemetry {
    pub x: f32,
    pub y: f32,
    /// 1 when the mine detector fires, 0 otherwise
    pub mine: u8,
    pub heading: f32,
    /// Last ranging reading; absent until the first poll or when it was a sentinel
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distance: Option<f32>,
}

impl Telemetry {
    pub fn new(pose: Pose, mine: bool, distance: Option<f32>) -> Self {
        Self {
            x: pose.x,
            y: pose.y,
            mine: mine as u8,
            heading: pose.heading,
            distance,
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
