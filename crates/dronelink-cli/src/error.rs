//! Error handling for the dronelink CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Session(#[from] dronelink_core::SessionError),

    #[error("Invalid command: {0}")]
    Command(#[from] dronelink_core::CommandError),

    #[error("Transport initialization failed: {0}")]
    TransportInit(#[from] dronelink_ble::BleTransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unrecognized input: {0}")]
    Input(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
