//! dronelink - terminal remote control for a BLE drone

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dronelink_ble::BtleplugTransport;
use dronelink_cli::{
    cli::{Cli, Commands},
    commands::CommandDispatcher,
    config::{AppConfig, ConfigOverrides},
    error::Result,
};
use dronelink_core::{DroneSession, DroneTransport, MockTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let overrides = ConfigOverrides {
        config_file: cli.config.as_ref().map(PathBuf::from),
        device_name: cli.device_name.clone(),
        scan_timeout_ms: cli.scan_timeout_ms,
    };
    let config = match AppConfig::load(&overrides) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // Nothing to connect to when only printing configuration
    if let Commands::Config { example } = cli.command {
        return CommandDispatcher::show_config(&config, example);
    }

    let outcome = if cli.simulate {
        info!("Using simulated drone \"{}\"", config.drone.device_name);
        let transport = MockTransport::simulated_drone(&config.drone.device_name);
        run(cli.command, transport, &config).await
    } else {
        match BtleplugTransport::new(config.ble.clone()).await {
            Ok(transport) => run(cli.command, transport, &config).await,
            Err(e) => Err(e.into()),
        }
    };

    if let Err(e) = outcome {
        error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run<T: DroneTransport>(command: Commands, transport: T, config: &AppConfig) -> Result<()> {
    let session = DroneSession::new(transport, config.drone.clone());
    CommandDispatcher::execute(command, session, config).await
}

/// Setup logging from `RUST_LOG`, falling back to the verbosity flag
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
