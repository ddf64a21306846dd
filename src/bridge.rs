// Serial pin bridge: a microcontroller that exposes its PWM, GPIO, ultrasonic
// and IMU to the host over a small packet protocol.
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Status format: [0xFF, 0xFF, ID, Length, Error, Params..., Checksum]
// Writes are fire-and-forget, reads answer with a status packet.

use serialport::{self, ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ECHO_TIMEOUT_US, RangingPins};
use crate::motor::PinSink;
use crate::sensors::{Inertial, MineDetector, Motion6, Ranging, echo_to_cm};

/// Default serial configuration for the bridge
pub const DEFAULT_BAUDRATE: u32 = 115_200;
// Must cover the echo window plus the status packet
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

/// Bridge ID the firmware answers to
pub const BRIDGE_ID: u8 = 0x01;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    AnalogWrite = 0x10,  // pin, duty
    DigitalWrite = 0x11, // pin, level
    DigitalRead = 0x12,  // pin -> level
    EchoPulse = 0x20,    // trigger, echo, timeout_us (u32 LE) -> pulse_us (u32 LE)
    ReadMotion6 = 0x30,  // -> 12 bytes, six big-endian i16
}

/// Error types for bridge communication
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from bridge {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for bridge {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Bridge {id} returned error status: 0x{status:02X}")]
    BridgeError { id: u8, status: u8 },

    #[error("Timeout waiting for response from bridge {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Pin bridge connection, plus the wiring of the sensors hanging off it
pub struct PinBus {
    port: Box<dyn SerialPort>,
    id: u8,
    ranging: RangingPins,
    mine_pin: Option<u8>,
}

impl PinBus {
    /// Open a new connection to the bridge
    pub fn open(port_name: &str, ranging: RangingPins, mine_pin: Option<u8>) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE, ranging, mine_pin)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(
        port_name: &str,
        baudrate: u32,
        ranging: RangingPins,
        mine_pin: Option<u8>,
    ) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            port,
            id: BRIDGE_ID,
            ranging,
            mine_pin,
        })
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        // Checksum over id, length, instruction, params
        let checksum_data = &packet[2..];
        packet.push(Self::checksum(checksum_data));

        packet
    }

    /// Check a status body (error + params + checksum) and return its params
    fn verify_status(expected_id: u8, id: u8, body: &[u8]) -> Result<Vec<u8>> {
        if id != expected_id {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }
        if body.len() < 2 {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("Status too short: {} bytes", body.len()),
            });
        }

        let mut checksum_data = vec![id, body.len() as u8];
        checksum_data.extend_from_slice(&body[..body.len() - 1]);
        if Self::checksum(&checksum_data) != body[body.len() - 1] {
            return Err(BusError::ChecksumMismatch { id });
        }

        let error_status = body[0];
        if error_status != 0 {
            return Err(BusError::BridgeError {
                id,
                status: error_status,
            });
        }

        Ok(body[1..body.len() - 1].to_vec())
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Send a request and wait for its status packet
    fn request(&mut self, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        // Drop anything stale so the reply lines up with this request
        self.port.clear(ClearBuffer::Input)?;
        let packet = Self::build_packet(self.id, instruction, params);
        self.send_packet(&packet)?;
        self.read_response()
    }

    fn read_response(&mut self) -> Result<Vec<u8>> {
        let expected_id = self.id;
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BusError::Timeout { id: expected_id }
            } else {
                BusError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let mut body = vec![0u8; id_length[1] as usize];
        self.port.read_exact(&mut body)?;

        Self::verify_status(expected_id, id_length[0], &body)
    }

    /// Ping the bridge to check it is alive
    pub fn ping(&mut self) -> Result<bool> {
        match self.request(Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(BusError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_analog(&mut self, pin: u8, duty: u8) -> Result<()> {
        let packet = Self::build_packet(self.id, Instruction::AnalogWrite, &[pin, duty]);
        self.send_packet(&packet)
    }

    pub fn write_digital(&mut self, pin: u8, high: bool) -> Result<()> {
        let packet = Self::build_packet(self.id, Instruction::DigitalWrite, &[pin, high as u8]);
        self.send_packet(&packet)
    }

    pub fn read_digital(&mut self, pin: u8) -> Result<bool> {
        let response = self.request(Instruction::DigitalRead, &[pin])?;
        match response.first() {
            Some(&level) => Ok(level != 0),
            None => Err(BusError::InvalidResponse {
                id: self.id,
                reason: "Empty response".to_string(),
            }),
        }
    }

    /// Fire the ultrasonic trigger and return the echo pulse width (0 = no echo)
    pub fn echo_pulse(&mut self, trigger: u8, echo: u8, timeout_us: u32) -> Result<u32> {
        let mut params = vec![trigger, echo];
        params.extend_from_slice(&timeout_us.to_le_bytes());
        let response = self.request(Instruction::EchoPulse, &params)?;

        let bytes: [u8; 4] =
            response
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| BusError::InvalidResponse {
                    id: self.id,
                    reason: format!("Expected 4 bytes, got {}", response.len()),
                })?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_motion6(&mut self) -> Result<Motion6> {
        let response = self.request(Instruction::ReadMotion6, &[])?;
        let bytes: [u8; 12] =
            response
                .get(..12)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| BusError::InvalidResponse {
                    id: self.id,
                    reason: format!("Expected 12 bytes, got {}", response.len()),
                })?;
        Ok(Motion6::from_be_bytes(bytes))
    }
}

// Motor outputs must never fail the control loop: log and carry on
impl PinSink for PinBus {
    fn analog_write(&mut self, pin: u8, duty: u8) {
        if let Err(e) = self.write_analog(pin, duty) {
            warn!("Pin bridge analog write to {} failed: {}", pin, e);
        }
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        if let Err(e) = self.write_digital(pin, high) {
            warn!("Pin bridge digital write to {} failed: {}", pin, e);
        }
    }
}

impl Ranging for PinBus {
    fn distance_cm(&mut self) -> f32 {
        let RangingPins { trigger, echo } = self.ranging;
        match self.echo_pulse(trigger, echo, ECHO_TIMEOUT_US) {
            Ok(echo_us) => echo_to_cm(echo_us),
            Err(e) => {
                debug!("Ranging read failed, reporting sentinel: {}", e);
                echo_to_cm(0)
            }
        }
    }
}

impl Inertial for PinBus {
    fn test_connection(&mut self) -> bool {
        matches!(self.ping(), Ok(true)) && self.read_motion6().is_ok()
    }

    fn motion6(&mut self) -> Option<Motion6> {
        match self.read_motion6() {
            Ok(sample) => Some(sample),
            Err(e) => {
                debug!("IMU read failed: {}", e);
                None
            }
        }
    }
}

impl MineDetector for PinBus {
    fn mine_detected(&mut self) -> bool {
        let Some(pin) = self.mine_pin else {
            return false;
        };
        match self.read_digital(pin) {
            Ok(level) => level,
            Err(e) => {
                debug!("Mine detector read failed: {}", e);
                false
            }
        }
    }
}
