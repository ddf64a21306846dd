// Raw single-byte command line over a serial port (radio modem, USB console)

use serialport::{self, SerialPort};
use std::io::Read;
use std::time::Duration;
use tracing::{info, warn};

use super::CommandSource;

pub struct SerialCommandSource {
    port: Box<dyn SerialPort>,
}

impl SerialCommandSource {
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self, serialport::Error> {
        info!("Opening command line on {} at {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(1))
            .open()?;
        Ok(Self { port })
    }
}

impl CommandSource for SerialCommandSource {
    fn poll(&mut self) -> Vec<u8> {
        // Only read what is already buffered so the tick never waits
        let pending = match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                warn!("Command line unavailable: {}", e);
                return Vec::new();
            }
        };
        if pending == 0 {
            return Vec::new();
        }

        let mut buf = vec![0u8; pending];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                buf
            }
            Err(e) => {
                warn!("Failed to read command line: {}", e);
                Vec::new()
            }
        }
    }
}
