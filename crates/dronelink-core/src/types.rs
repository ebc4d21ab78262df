//! Core value types for the drone link
//!
//! Range-checked control values, the movement command assembled from them,
//! PID tuning parameters, connection/adapter state enums and the device and
//! status records exchanged with the transport.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::errors::CommandError;

// ----------------------------------------------------------------------------
// Range-Checked Control Values
// ----------------------------------------------------------------------------

macro_rules! bounded_value {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $field:literal, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name($repr);

        impl $name {
            pub const MIN: $repr = $min;
            pub const MAX: $repr = $max;

            /// Construct a value, rejecting anything outside the allowed range
            pub fn new(value: i64) -> Result<Self, CommandError> {
                if value < Self::MIN as i64 || value > Self::MAX as i64 {
                    return Err(CommandError::OutOfRange {
                        field: $field,
                        value,
                        min: Self::MIN as i64,
                        max: Self::MAX as i64,
                    });
                }
                Ok(Self(value as $repr))
            }

            /// Construct a value, clamping into the allowed range
            pub fn saturating(value: i64) -> Self {
                Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as $repr)
            }

            pub fn value(self) -> $repr {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = CommandError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> i64 {
                value.0 as i64
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

bounded_value!(
    /// Throttle percentage, 0 to 100
    Throttle, u8, "throttle", 0, 100
);
bounded_value!(
    /// Pitch or roll angle in degrees, -45 to 45
    Tilt, i8, "tilt", -45, 45
);
bounded_value!(
    /// Yaw angle in degrees, -180 to 180
    Yaw, i16, "yaw", -180, 180
);

impl Throttle {
    pub const ZERO: Throttle = Throttle(0);

    /// Step the throttle by `delta`, clamped to the valid range
    pub fn step(self, delta: i64) -> Self {
        Self::saturating(self.0 as i64 + delta)
    }
}

// ----------------------------------------------------------------------------
// Movement Commands
// ----------------------------------------------------------------------------

/// A complete movement command
///
/// Built fresh for every user action; never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DroneCommand {
    pub throttle: Throttle,
    pub pitch: Tilt,
    pub roll: Tilt,
    pub yaw: Yaw,
}

impl DroneCommand {
    pub fn new(throttle: Throttle, pitch: Tilt, roll: Tilt, yaw: Yaw) -> Self {
        Self {
            throttle,
            pitch,
            roll,
            yaw,
        }
    }

    /// Validate raw integers into a command
    pub fn from_values(throttle: i64, pitch: i64, roll: i64, yaw: i64) -> Result<Self, CommandError> {
        Ok(Self {
            throttle: Throttle::new(throttle)?,
            pitch: Tilt::new(pitch)?,
            roll: Tilt::new(roll)?,
            yaw: Yaw::new(yaw)?,
        })
    }
}

/// A partial movement command; unspecified fields are filled in on merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovementUpdate {
    pub throttle: Option<Throttle>,
    pub pitch: Option<Tilt>,
    pub roll: Option<Tilt>,
    pub yaw: Option<Yaw>,
}

impl MovementUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn with_pitch(mut self, pitch: Tilt) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn with_roll(mut self, roll: Tilt) -> Self {
        self.roll = Some(roll);
        self
    }

    pub fn with_yaw(mut self, yaw: Yaw) -> Self {
        self.yaw = Some(yaw);
        self
    }

    /// Merge over `{throttle, 0, 0, 0}`
    pub fn merge_over(self, throttle: Throttle) -> DroneCommand {
        DroneCommand {
            throttle: self.throttle.unwrap_or(throttle),
            pitch: self.pitch.unwrap_or_default(),
            roll: self.roll.unwrap_or_default(),
            yaw: self.yaw.unwrap_or_default(),
        }
    }
}

// ----------------------------------------------------------------------------
// PID Tuning
// ----------------------------------------------------------------------------

/// Axis addressed by a PID tuning command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PidAxis {
    Roll,
    Pitch,
    Yaw,
}

impl PidAxis {
    pub const ALL: [PidAxis; 3] = [PidAxis::Roll, PidAxis::Pitch, PidAxis::Yaw];

    /// Upper-case wire name
    pub fn wire_name(self) -> &'static str {
        match self {
            PidAxis::Roll => "ROLL",
            PidAxis::Pitch => "PITCH",
            PidAxis::Yaw => "YAW",
        }
    }
}

impl fmt::Display for PidAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for PidAxis {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ROLL" => Ok(PidAxis::Roll),
            "PITCH" => Ok(PidAxis::Pitch),
            "YAW" => Ok(PidAxis::Yaw),
            _ => Err(CommandError::UnknownAxis(s.to_string())),
        }
    }
}

/// PID gains for one axis
///
/// Sent once and not retained; the flight controller is the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidParams {
    axis: PidAxis,
    kp: f64,
    ki: f64,
    kd: f64,
}

impl PidParams {
    pub fn new(axis: PidAxis, kp: f64, ki: f64, kd: f64) -> Result<Self, CommandError> {
        for (field, value) in [("kp", kp), ("ki", ki), ("kd", kd)] {
            if !value.is_finite() {
                return Err(CommandError::NonFinite { field });
            }
        }
        Ok(Self { axis, kp, ki, kd })
    }

    /// Firmware defaults for an axis
    pub fn default_for(axis: PidAxis) -> Self {
        let (kp, ki, kd) = match axis {
            PidAxis::Roll | PidAxis::Pitch => (2.0, 0.0, 2.0),
            PidAxis::Yaw => (3.0, 0.1, 0.8),
        };
        Self { axis, kp, ki, kd }
    }

    pub fn axis(&self) -> PidAxis {
        self.axis
    }

    pub fn kp(&self) -> f64 {
        self.kp
    }

    pub fn ki(&self) -> f64 {
        self.ki
    }

    pub fn kd(&self) -> f64 {
        self.kd
    }
}

// ----------------------------------------------------------------------------
// Discrete Commands
// ----------------------------------------------------------------------------

/// Fixed literals of the discrete (legacy) command vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscreteCommand {
    Run,
    Stop,
    Forward,
    Back,
    Left,
    Right,
    Level,
    Up,
    Down,
    PidOn,
    PidOff,
    PidGentle,
    PidNormal,
    PidAggressive,
    DerivativeOnGyro,
    DerivativeOnError,
    Status,
}

impl DiscreteCommand {
    pub const ALL: [DiscreteCommand; 17] = [
        DiscreteCommand::Run,
        DiscreteCommand::Stop,
        DiscreteCommand::Forward,
        DiscreteCommand::Back,
        DiscreteCommand::Left,
        DiscreteCommand::Right,
        DiscreteCommand::Level,
        DiscreteCommand::Up,
        DiscreteCommand::Down,
        DiscreteCommand::PidOn,
        DiscreteCommand::PidOff,
        DiscreteCommand::PidGentle,
        DiscreteCommand::PidNormal,
        DiscreteCommand::PidAggressive,
        DiscreteCommand::DerivativeOnGyro,
        DiscreteCommand::DerivativeOnError,
        DiscreteCommand::Status,
    ];

    /// Wire literal
    pub fn as_str(self) -> &'static str {
        match self {
            DiscreteCommand::Run => "RUN",
            DiscreteCommand::Stop => "STOP",
            DiscreteCommand::Forward => "FWD",
            DiscreteCommand::Back => "BACK",
            DiscreteCommand::Left => "LEFT",
            DiscreteCommand::Right => "RIGHT",
            // Firmware spelling
            DiscreteCommand::Level => "PARALEL",
            DiscreteCommand::Up => "UP",
            DiscreteCommand::Down => "DOWN",
            DiscreteCommand::PidOn => "PID_ON",
            DiscreteCommand::PidOff => "PID_OFF",
            DiscreteCommand::PidGentle => "PID_GENTLE",
            DiscreteCommand::PidNormal => "PID_NORMAL",
            DiscreteCommand::PidAggressive => "PID_AGGRESSIVE",
            DiscreteCommand::DerivativeOnGyro => "D_GYRO",
            DiscreteCommand::DerivativeOnError => "D_ERROR",
            DiscreteCommand::Status => "STATUS",
        }
    }

    /// Look up a literal exactly as it appears on the wire
    pub fn from_wire(literal: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == literal)
    }
}

impl fmt::Display for DiscreteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Connection and Adapter State
// ----------------------------------------------------------------------------

/// Session connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// A connect attempt is in flight
    pub fn is_busy(self) -> bool {
        matches!(self, ConnectionState::Scanning | ConnectionState::Connecting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Radio power state reported by the platform adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdapterState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    pub fn is_ready(self) -> bool {
        self == AdapterState::PoweredOn
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdapterState::Unknown => "unknown",
            AdapterState::Resetting => "resetting",
            AdapterState::Unsupported => "unsupported",
            AdapterState::Unauthorized => "unauthorized",
            AdapterState::PoweredOff => "poweredOff",
            AdapterState::PoweredOn => "poweredOn",
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Devices and Status
// ----------------------------------------------------------------------------

/// A discovered peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Platform identifier (address or UUID depending on OS)
    pub id: String,
    /// Advertised local name
    pub name: String,
    /// Signal strength at discovery, if reported
    pub rssi: Option<i16>,
}

impl DeviceHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rssi: None,
        }
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Coarse classification of firmware status text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Ok,
    Error,
    CommandReceived,
    Ascii,
    SensorData,
    Other,
}

/// Free-text status pushed by the drone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    text: String,
    received_at: SystemTime,
}

impl StatusMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: SystemTime::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// Best-effort classification by prefix; the text itself stays verbatim
    pub fn kind(&self) -> StatusKind {
        let prefixes = [
            ("OK:", StatusKind::Ok),
            ("ERR:", StatusKind::Error),
            ("CMD_RX:", StatusKind::CommandReceived),
            ("ASCII:", StatusKind::Ascii),
            ("I2C_DATA:", StatusKind::SensorData),
        ];
        prefixes
            .into_iter()
            .find(|(prefix, _)| self.text.starts_with(prefix))
            .map(|(_, kind)| kind)
            .unwrap_or(StatusKind::Other)
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
