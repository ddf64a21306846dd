// Keyboard teleop: W/S drive, A/D pivot, Q/E strafe (four-wheel only), Space stop, Esc quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use sapper_runtime::config::TOPIC_CMD_DRIVE;
use sapper_runtime::messages::{DriveCmd, DriveCommand};

const PUBLISH_PERIOD_MS: u64 = 100;
// Longer than the terminal's initial key-repeat delay
const INPUT_TIMEOUT_MS: u64 = 600;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_DRIVE).await?;

    info!("Controls: W/S=drive, A/D=pivot, Q/E=strafe, Space=stop, Esc=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

fn key_to_cmd(code: KeyCode) -> Option<DriveCmd> {
    match code {
        KeyCode::Char('w') | KeyCode::Up => Some(DriveCmd::Forward),
        KeyCode::Char('s') | KeyCode::Down => Some(DriveCmd::Backward),
        KeyCode::Char('a') | KeyCode::Left => Some(DriveCmd::Left),
        KeyCode::Char('d') | KeyCode::Right => Some(DriveCmd::Right),
        KeyCode::Char('q') => Some(DriveCmd::StrafeLeft),
        KeyCode::Char('e') => Some(DriveCmd::StrafeRight),
        KeyCode::Char(' ') => Some(DriveCmd::Halt),
        _ => None,
    }
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut current = DriveCmd::Halt;
    let mut last_movement_input = Instant::now();
    let mut last_publish = Instant::now();

    loop {
        // Poll for key with 20ms timeout
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                if pressed {
                    if matches!(code, KeyCode::Esc | KeyCode::Char('x')) {
                        break;
                    }
                    if let Some(cmd) = key_to_cmd(code) {
                        if cmd != current {
                            info!("Command: {:?}", cmd);
                        }
                        current = cmd;
                        last_movement_input = Instant::now();
                    }
                }
            }
        }

        // Fall back to stop when keys are released
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            current = DriveCmd::Halt;
        }

        // Repeats keep the runtime watchdog fed
        if last_publish.elapsed() >= Duration::from_millis(PUBLISH_PERIOD_MS) {
            let payload = serde_json::to_string(&DriveCommand { cmd: current })?;
            publisher.put(payload).await?;
            last_publish = Instant::now();
        }
    }

    // Leave the robot halted
    let payload = serde_json::to_string(&DriveCommand {
        cmd: DriveCmd::Halt,
    })?;
    publisher.put(payload).await?;

    Ok(())
}
