//! Session configuration

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::{
    GattTarget, COMMAND_CHARACTERISTIC_UUID, DEFAULT_DEVICE_NAME, DEFAULT_SCAN_TIMEOUT,
    DEFAULT_SCAN_WINDOW, DRONE_SERVICE_UUID, STATUS_CHARACTERISTIC_UUID,
};

// ----------------------------------------------------------------------------
// Command Profiles
// ----------------------------------------------------------------------------

/// Which command vocabulary the session accepts
///
/// `STOP` and PID tuning are accepted in every profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandProfile {
    /// Typed throttle/pitch/roll/yaw commands only
    Axis,
    /// Fixed direction and mode literals only
    Discrete,
    /// Both vocabularies on the same link
    #[default]
    Mixed,
}

impl CommandProfile {
    pub fn allows_axis(self) -> bool {
        matches!(self, CommandProfile::Axis | CommandProfile::Mixed)
    }

    pub fn allows_discrete(self) -> bool {
        matches!(self, CommandProfile::Discrete | CommandProfile::Mixed)
    }
}

impl fmt::Display for CommandProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandProfile::Axis => "axis",
            CommandProfile::Discrete => "discrete",
            CommandProfile::Mixed => "mixed",
        })
    }
}

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for a drone session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DroneConfig {
    /// Advertised local name to connect to
    pub device_name: String,
    /// Maximum time to wait for the named device during `connect()`
    #[serde(with = "duration_ms", rename = "scan_timeout_ms")]
    pub scan_timeout: Duration,
    /// How long a plain device scan listens
    #[serde(with = "duration_ms", rename = "scan_window_ms")]
    pub scan_window: Duration,
    /// Drone control service
    pub service_uuid: Uuid,
    /// Write-without-response command characteristic
    pub command_characteristic_uuid: Uuid,
    /// Read/notify status characteristic
    pub status_characteristic_uuid: Uuid,
    /// Accepted command vocabulary
    pub profile: CommandProfile,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            scan_window: DEFAULT_SCAN_WINDOW,
            service_uuid: DRONE_SERVICE_UUID,
            command_characteristic_uuid: COMMAND_CHARACTERISTIC_UUID,
            status_characteristic_uuid: STATUS_CHARACTERISTIC_UUID,
            profile: CommandProfile::default(),
        }
    }
}

impl DroneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised device name
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Set the discovery timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the plain scan window
    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }

    /// Set the accepted command vocabulary
    pub fn with_profile(mut self, profile: CommandProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn command_target(&self) -> GattTarget {
        GattTarget::new(self.service_uuid, self.command_characteristic_uuid)
    }

    pub fn status_target(&self) -> GattTarget {
        GattTarget::new(self.service_uuid, self.status_characteristic_uuid)
    }
}

/// Serialize a [`Duration`] as whole milliseconds
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DroneConfig::default();
        assert_eq!(config.device_name, "RaspberryPiDrone");
        assert_eq!(config.scan_timeout, Duration::from_millis(10_000));
        assert_eq!(config.profile, CommandProfile::Mixed);
        assert_eq!(
            config.status_target().characteristic.to_string(),
            "6e400003-b5a3-f393-e0a9-e50e24dcca9e"
        );
    }

    #[test]
    fn test_config_toml_uses_milliseconds() {
        let config = DroneConfig::new()
            .with_device_name("BenchDrone")
            .with_scan_timeout(Duration::from_millis(2500))
            .with_profile(CommandProfile::Discrete);

        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("scan_timeout_ms = 2500"));
        assert!(text.contains("profile = \"discrete\""));

        let parsed: DroneConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: DroneConfig = toml::from_str("device_name = \"Quad\"").unwrap();
        assert_eq!(parsed.device_name, "Quad");
        assert_eq!(parsed.scan_timeout, DEFAULT_SCAN_TIMEOUT);
        assert_eq!(parsed.service_uuid, DRONE_SERVICE_UUID);
    }

    #[test]
    fn test_profile_permissions() {
        assert!(CommandProfile::Axis.allows_axis());
        assert!(!CommandProfile::Axis.allows_discrete());
        assert!(CommandProfile::Discrete.allows_discrete());
        assert!(CommandProfile::Mixed.allows_axis() && CommandProfile::Mixed.allows_discrete());
    }
}
