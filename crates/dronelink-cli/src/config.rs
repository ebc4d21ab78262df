//! dronelink CLI configuration
//!
//! Configuration is layered with figment, lowest priority first:
//! - Built-in defaults
//! - `dronelink.toml` in the working directory
//! - `~/.dronelink/config.toml` (or the file given with `--config`)
//! - Environment variables (`DRONELINK_DRONE__DEVICE_NAME=Quad`)
//! - Command line flags

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use dronelink_ble::BleTransportConfig;
use dronelink_core::protocol::THROTTLE_STEP;
use dronelink_core::DroneConfig;

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the dronelink CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session settings: device name, timeouts, GATT layout, command profile
    pub drone: DroneConfig,
    /// Radio settings
    pub ble: BleTransportConfig,
    /// Console settings
    pub cli: CliConfig,
}

/// Console options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Prompt shown by the interactive console
    pub prompt: String,
    /// Throttle change applied by `up` and `down`
    pub throttle_step: u8,
    /// Print status notifications as they arrive
    pub show_status: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            prompt: "drone> ".to_string(),
            throttle_step: THROTTLE_STEP,
            show_status: true,
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub device_name: Option<String>,
    pub scan_timeout_ms: Option<u64>,
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration with the standard priority order
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let config: AppConfig = Self::figment(overrides)
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn figment(overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        figment = match &overrides.config_file {
            Some(path) => figment.merge(Toml::file(path)),
            None => {
                let figment = figment.merge(Toml::file("dronelink.toml"));
                match Self::default_config_path() {
                    Some(path) => figment.merge(Toml::file(path)),
                    None => figment,
                }
            }
        };

        figment = figment.merge(Env::prefixed("DRONELINK_").split("__"));

        if let Some(name) = &overrides.device_name {
            figment = figment.merge(("drone.device_name", name));
        }
        if let Some(ms) = overrides.scan_timeout_ms {
            figment = figment.merge(("drone.scan_timeout_ms", ms));
        }
        figment
    }

    /// `~/.dronelink/config.toml`, when a home directory is known
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".dronelink").join("config.toml"))
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drone.device_name.trim().is_empty() {
            return Err(ConfigError::Validation("Device name must not be empty".to_string()));
        }
        if self.drone.scan_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "Scan timeout must be greater than 0".to_string(),
            ));
        }
        if self.drone.scan_window.is_zero() {
            return Err(ConfigError::Validation(
                "Scan window must be greater than 0".to_string(),
            ));
        }
        if self.drone.command_characteristic_uuid == self.drone.status_characteristic_uuid {
            return Err(ConfigError::Validation(
                "Command and status characteristics must differ".to_string(),
            ));
        }
        if self.ble.connection_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "Connection timeout must be greater than 0".to_string(),
            ));
        }
        if !(1..=100).contains(&self.cli.throttle_step) {
            return Err(ConfigError::Validation(format!(
                "Throttle step must be between 1 and 100, got {}",
                self.cli.throttle_step
            )));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        let header = "# dronelink configuration\n\
                      # Save as ./dronelink.toml or ~/.dronelink/config.toml\n\n";
        match Self::default().to_toml() {
            Ok(body) => format!("{}{}", header, body),
            Err(_) => "# Failed to generate example config".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
