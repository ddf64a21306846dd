// Bridge diagnostic: READ-ONLY check of the pin bridge and its sensors
//
// Nothing is written to the motor pins - it's completely safe to run with the
// wheels on the ground.
//
// Usage: cargo run --example bridge_check -- [port] [config.json]
// Example: cargo run --example bridge_check -- /dev/ttyUSB0

use sapper_runtime::bridge::PinBus;
use sapper_runtime::config::{BRIDGE_PORT, ECHO_TIMEOUT_US, RobotConfig};
use sapper_runtime::sensors::{Inertial, echo_to_cm, is_sentinel};
use tracing_subscriber::filter::LevelFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(LevelFilter::DEBUG.into()),
        )
        .init();

    // Get port from args or use default
    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| BRIDGE_PORT.to_string());
    let config = match std::env::args().nth(2) {
        Some(path) => RobotConfig::load(path)?,
        None => RobotConfig::default(),
    };

    println!("Sapper bridge check (read-only)");
    println!("Serial port: {}", port);
    println!();

    println!("Step 1: Opening serial port...");
    let mut bus = match PinBus::open(&port, config.ranging, config.mine_pin) {
        Ok(bus) => {
            println!("  ok: serial port opened");
            bus
        }
        Err(e) => {
            println!("  FAILED to open serial port: {}", e);
            println!("  - Check the port path and the USB cable");
            return Err(e.into());
        }
    };
    println!();

    println!("Step 2: Pinging bridge...");
    match bus.ping() {
        Ok(true) => println!("  ok: bridge responding"),
        Ok(false) => println!("  NO RESPONSE (check firmware and baudrate)"),
        Err(e) => println!("  ERROR: {}", e),
    }
    println!();

    println!("Step 3: Inertial sensor...");
    if bus.test_connection() {
        match bus.read_motion6() {
            Ok(m) => println!(
                "  accel: {:6} {:6} {:6}   gyro: {:6} {:6} {:6}",
                m.ax, m.ay, m.az, m.gx, m.gy, m.gz
            ),
            Err(e) => println!("  read ERROR: {}", e),
        }
    } else {
        println!("  not connected (the drive runtime works without it)");
    }
    println!();

    println!(
        "Step 4: Ultrasonic ranger (trigger {}, echo {})...",
        config.ranging.trigger, config.ranging.echo
    );
    for _ in 0..5 {
        match bus.echo_pulse(config.ranging.trigger, config.ranging.echo, ECHO_TIMEOUT_US) {
            Ok(echo_us) => {
                let distance = echo_to_cm(echo_us);
                if is_sentinel(distance) {
                    println!("  no echo");
                } else {
                    println!("  {:6.1} cm ({} us)", distance, echo_us);
                }
            }
            Err(e) => println!("  ERROR: {}", e),
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    println!();

    println!("Step 5: Mine detector...");
    match config.mine_pin {
        Some(pin) => match bus.read_digital(pin) {
            Ok(level) => println!("  pin {}: {}", pin, if level { "MINE" } else { "clear" }),
            Err(e) => println!("  ERROR: {}", e),
        },
        None => println!("  no mine pin configured"),
    }
    println!();

    println!("Diagnostic complete.");
    Ok(())
}
