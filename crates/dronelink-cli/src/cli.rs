//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Advertised name of the drone to connect to
    #[arg(short, long, global = true)]
    pub device_name: Option<String>,

    /// How long to look for the drone before giving up
    #[arg(long, global = true)]
    pub scan_timeout_ms: Option<u64>,

    /// Use a simulated drone instead of the Bluetooth adapter
    #[arg(long, global = true)]
    pub simulate: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List nearby BLE devices
    Scan,
    /// Show the Bluetooth adapter state
    State {
        /// Keep printing changes until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Connect, send one command and disconnect
    Send {
        /// Console command or wire text, e.g. `throttle 30` or `T30,P0,R0,Y0`
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Connect and read the drone's status text
    Status,
    /// Line-oriented remote control console
    Interactive,
    /// Show the effective configuration
    Config {
        /// Print an example configuration file instead
        #[arg(long)]
        example: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_with_overrides() {
        let cli = Cli::try_parse_from([
            "dronelink",
            "--simulate",
            "--device-name",
            "Quad",
            "send",
            "pid",
            "roll",
            "2.0",
            "0.0",
            "2.0",
        ])
        .unwrap();
        assert!(cli.simulate);
        assert_eq!(cli.device_name.as_deref(), Some("Quad"));
        match cli.command {
            Commands::Send { command } => assert_eq!(command.join(" "), "pid roll 2.0 0.0 2.0"),
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["dronelink", "state", "--watch", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::State { watch: true }));
    }

    #[test]
    fn test_send_requires_a_command() {
        assert!(Cli::try_parse_from(["dronelink", "send"]).is_err());
    }
}
