use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use sapper_runtime::config::{BRIDGE_PORT, COMMAND_PORT, RobotConfig};
use sapper_runtime::runtime::{self, Link, RunOptions};

#[derive(Parser, Debug)]
#[command(version, about = "Motion control runtime for the sapper robot")]
struct Args {
    /// Robot configuration (JSON); built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep motor outputs in memory instead of driving the pin bridge
    #[arg(long)]
    sim: bool,

    /// Serial port of the pin bridge
    #[arg(long, default_value = BRIDGE_PORT)]
    bridge_port: String,

    /// Where drive commands come from
    #[arg(long, value_enum, default_value_t = Link::Zenoh)]
    link: Link,

    /// Serial port for raw single-byte commands (with --link serial)
    #[arg(long, default_value = COMMAND_PORT)]
    command_port: String,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match RobotConfig::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => RobotConfig::default(),
    };

    let options = RunOptions {
        config,
        sim: args.sim,
        bridge_port: args.bridge_port,
        link: args.link,
        command_port: args.command_port,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
