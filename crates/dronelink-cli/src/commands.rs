//! Command handlers for the dronelink CLI

use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use dronelink_core::codec::{encode_movement, encode_parameter, encode_pid};
use dronelink_core::{
    DiscreteCommand, DisconnectOutcome, DroneSession, DroneTransport, MovementUpdate, PidParams,
};

use crate::cli::Commands;
use crate::config::AppConfig;
use crate::console::{parse_console_line, ConsoleInput, HELP};
use crate::error::{CliError, Result};

/// How long `send` waits for the drone to acknowledge before disconnecting
const ACK_WAIT: Duration = Duration::from_secs(1);

/// Whether the console keeps reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command, releasing the link afterwards
    pub async fn execute<T: DroneTransport>(
        command: Commands,
        session: DroneSession<T>,
        config: &AppConfig,
    ) -> Result<()> {
        let result = match command {
            Commands::Scan => Self::handle_scan(&session, config).await,
            Commands::State { watch } => Self::handle_state(&session, watch).await,
            Commands::Send { command } => {
                Self::handle_send(&session, config, &command.join(" ")).await
            }
            Commands::Status => Self::handle_status(&session).await,
            Commands::Interactive => Self::handle_interactive(&session, config).await,
            Commands::Config { example } => Self::show_config(config, example),
        };

        if let DisconnectOutcome::ReleasedWithWarning(reason) = session.teardown().await {
            warn!("Link released with a warning: {}", reason);
        }
        result
    }

    /// Print the effective configuration, or an example file
    pub fn show_config(config: &AppConfig, example: bool) -> Result<()> {
        if example {
            println!("{}", AppConfig::example_config());
        } else {
            println!("{}", config.to_toml()?);
        }
        Ok(())
    }

    async fn handle_scan<T: DroneTransport>(
        session: &DroneSession<T>,
        config: &AppConfig,
    ) -> Result<()> {
        info!(
            "Scanning for {} ms",
            config.drone.scan_window.as_millis()
        );
        let devices = session.scan().await?;
        if devices.is_empty() {
            println!("No devices found");
            return Ok(());
        }

        println!("{:<2} {:<24} {:<40} {:>5}", "", "NAME", "ID", "RSSI");
        for device in devices {
            let marker = if device.name == config.drone.device_name { "*" } else { "" };
            let rssi = device
                .rssi
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<2} {:<24} {:<40} {:>5}", marker, device.name, device.id, rssi);
        }
        Ok(())
    }

    async fn handle_state<T: DroneTransport>(session: &DroneSession<T>, watch: bool) -> Result<()> {
        println!("Bluetooth adapter: {}", session.adapter_state().await);
        if !watch {
            return Ok(());
        }

        let mut states = session.observe_adapter_state().skip(1);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                next = states.next() => match next {
                    Some(state) => println!("Bluetooth adapter: {}", state),
                    None => break,
                },
            }
        }
        Ok(())
    }

    async fn handle_send<T: DroneTransport>(
        session: &DroneSession<T>,
        config: &AppConfig,
        text: &str,
    ) -> Result<()> {
        let input = parse_console_line(text)?;
        let mut status = session.watch_status();

        let device = session.connect().await?;
        info!("Connected to {}", device);
        Self::apply(session, config, input).await?;

        if config.cli.show_status {
            if let Ok(Ok(())) = tokio::time::timeout(ACK_WAIT, status.changed()).await {
                if let Some(message) = status.borrow_and_update().clone() {
                    println!("[status] {}", message);
                }
            }
        }
        Ok(())
    }

    async fn handle_status<T: DroneTransport>(session: &DroneSession<T>) -> Result<()> {
        session.connect().await?;
        let status = session.read_status().await?;
        println!("{} ({:?})", status, status.kind());
        Ok(())
    }

    async fn handle_interactive<T: DroneTransport>(
        session: &DroneSession<T>,
        config: &AppConfig,
    ) -> Result<()> {
        println!(
            "dronelink console ({} profile), type `help` for commands",
            config.drone.profile
        );
        match session.connect().await {
            Ok(device) => println!("Connected to {}", device),
            Err(e) => println!("{} (type `connect` to retry)", e),
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut status = session.watch_status();
        prompt(&config.cli.prompt)?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match parse_console_line(&line) {
                        Ok(input) => match Self::apply(session, config, input).await {
                            Ok(Flow::Quit) => break,
                            Ok(Flow::Continue) => {}
                            Err(e) => println!("Error: {}", e),
                        },
                        Err(e) => println!("{}", e),
                    }
                    prompt(&config.cli.prompt)?;
                }
                Ok(()) = status.changed(), if config.cli.show_status => {
                    let latest = status.borrow_and_update().clone();
                    if let Some(message) = latest {
                        println!("\n[status] {}", message);
                        prompt(&config.cli.prompt)?;
                    }
                }
            }
        }

        debug!("Console closed");
        Ok(())
    }

    /// Carry out one console input against the session
    pub async fn apply<T: DroneTransport>(
        session: &DroneSession<T>,
        config: &AppConfig,
        input: ConsoleInput,
    ) -> Result<Flow> {
        match input {
            ConsoleInput::Empty => {}
            ConsoleInput::Help => println!("{}", HELP),
            ConsoleInput::Quit => return Ok(Flow::Quit),
            ConsoleInput::Connect => {
                let device = session.connect().await?;
                println!("Connected to {}", device);
            }
            ConsoleInput::Disconnect => match session.disconnect().await {
                DisconnectOutcome::Released => println!("Disconnected"),
                DisconnectOutcome::AlreadyDisconnected => println!("Not connected"),
                DisconnectOutcome::ReleasedWithWarning(reason) => {
                    println!("Disconnected ({})", reason)
                }
            },
            ConsoleInput::State => {
                let device = session
                    .device()
                    .await
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "adapter: {}, link: {}, device: {}, throttle: {}",
                    session.adapter_state().await,
                    session.connection_state(),
                    device,
                    session.throttle().await.value()
                );
            }
            ConsoleInput::Read => {
                let status = session.read_status().await?;
                println!("[status] {}", status);
            }
            ConsoleInput::Up => Self::step(session, config, true).await?,
            ConsoleInput::Down => Self::step(session, config, false).await?,
            ConsoleInput::Stop => {
                session.send_stop().await?;
                println!("Sent STOP");
            }
            ConsoleInput::Movement(update) => {
                let sent = session.send_movement(update).await?;
                println!("Sent {}", encode_movement(&sent));
            }
            ConsoleInput::Pid(params) => {
                session.send_pid(params).await?;
                println!("Sent {}", encode_pid(&params));
            }
            ConsoleInput::PidDefault(axis) => {
                let params = PidParams::default_for(axis);
                session.send_pid(params).await?;
                println!("Sent {}", encode_pid(&params));
            }
            ConsoleInput::Set { name, value } => {
                session.send_parameter(&name, value).await?;
                println!("Sent {}", encode_parameter(&name, value)?);
            }
            ConsoleInput::Discrete(command) => {
                session.send_discrete(command).await?;
                println!("Sent {}", command);
            }
            ConsoleInput::Wire(command) => {
                let text = session.send_command(command).await?;
                println!("Sent {}", text);
            }
        }
        Ok(Flow::Continue)
    }

    /// `up`/`down`: throttle steps when axis commands are allowed, literals otherwise
    async fn step<T: DroneTransport>(
        session: &DroneSession<T>,
        config: &AppConfig,
        up: bool,
    ) -> Result<()> {
        if !config.drone.profile.allows_axis() {
            let command = if up { DiscreteCommand::Up } else { DiscreteCommand::Down };
            session.send_discrete(command).await?;
            println!("Sent {}", command);
            return Ok(());
        }

        let delta = i64::from(config.cli.throttle_step);
        let throttle = session
            .throttle()
            .await
            .step(if up { delta } else { -delta });
        let sent = session
            .send_movement(MovementUpdate::new().with_throttle(throttle))
            .await?;
        println!("Sent {}", encode_movement(&sent));
        Ok(())
    }
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    std::io::stdout().flush().map_err(CliError::from)
}

#[cfg(test)]
mod tests {
    use dronelink_core::{CommandProfile, MockTransport, SessionError};

    use super::*;

    fn setup(profile: CommandProfile) -> (MockTransport, DroneSession<MockTransport>, AppConfig) {
        let mut config = AppConfig::default();
        config.drone.profile = profile;
        let transport = MockTransport::simulated_drone(&config.drone.device_name)
            .with_discovery_delay(Duration::ZERO);
        let session = DroneSession::new(transport.clone(), config.drone.clone());
        (transport, session, config)
    }

    #[tokio::test]
    async fn test_up_down_step_throttle_in_axis_profiles() {
        let (transport, session, config) = setup(CommandProfile::Mixed);
        session.connect().await.unwrap();

        for line in ["up", "up", "down", "pitch 5"] {
            let input = parse_console_line(line).unwrap();
            CommandDispatcher::apply(&session, &config, input).await.unwrap();
        }

        assert_eq!(
            transport.writes().await,
            vec!["T10,P0,R0,Y0", "T20,P0,R0,Y0", "T10,P0,R0,Y0", "T10,P5,R0,Y0"]
        );
    }

    #[tokio::test]
    async fn test_up_down_send_literals_in_discrete_profile() {
        let (transport, session, config) = setup(CommandProfile::Discrete);
        session.connect().await.unwrap();

        for line in ["up", "down", "fwd"] {
            let input = parse_console_line(line).unwrap();
            CommandDispatcher::apply(&session, &config, input).await.unwrap();
        }
        assert_eq!(transport.writes().await, vec!["UP", "DOWN", "FWD"]);

        let input = parse_console_line("throttle 30").unwrap();
        let err = CommandDispatcher::apply(&session, &config, input).await.unwrap_err();
        assert!(matches!(
            err,
            CliError::Session(SessionError::InvalidCommand(_))
        ));
    }

    #[tokio::test]
    async fn test_commands_require_a_link() {
        let (transport, session, config) = setup(CommandProfile::Mixed);
        let input = parse_console_line("stop").unwrap();
        let err = CommandDispatcher::apply(&session, &config, input).await.unwrap_err();
        assert!(matches!(err, CliError::Session(SessionError::NotConnected { .. })));
        assert!(transport.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_quit_and_disconnect() {
        let (transport, session, config) = setup(CommandProfile::Mixed);
        CommandDispatcher::apply(&session, &config, ConsoleInput::Connect)
            .await
            .unwrap();
        assert_eq!(
            CommandDispatcher::apply(&session, &config, ConsoleInput::Disconnect)
                .await
                .unwrap(),
            Flow::Continue
        );
        assert_eq!(transport.subscriber_count().await, 0);
        assert_eq!(
            CommandDispatcher::apply(&session, &config, ConsoleInput::Quit)
                .await
                .unwrap(),
            Flow::Quit
        );
    }

    #[tokio::test]
    async fn test_send_command_round_trip_with_echo() {
        let (transport, session, config) = setup(CommandProfile::Mixed);
        CommandDispatcher::execute(
            Commands::Send {
                command: vec!["pid".into(), "roll".into(), "2.0".into(), "0.0".into(), "2.0".into()],
            },
            session,
            &config,
        )
        .await
        .unwrap();

        let writes = transport.writes().await;
        assert_eq!(writes.len(), 1);
        assert!(writes[0].starts_with("PID_ROLL "));
    }
}
