//! Command codec
//!
//! Pure translation between typed control intents and the drone's plain-text
//! wire vocabulary. Nothing here performs I/O.
//!
//! Wire forms:
//!
//! | Intent          | Text                          |
//! |-----------------|-------------------------------|
//! | movement        | `T<thr>,P<pitch>,R<roll>,Y<yaw>` |
//! | stop            | `STOP`                        |
//! | PID gains       | `PID_<AXIS> <kp> <ki> <kd>`   |
//! | parameter       | `SET_<NAME> <value>`          |
//! | motor test      | `TEST<n>`                     |
//! | motor offset    | `OFFSET<n> <offset>`          |
//! | discrete        | `RUN`, `FWD`, `PARALEL`, ...  |

use tracing::debug;

use crate::errors::CommandError;
use crate::protocol::MOTOR_OFFSET_RANGE;
use crate::types::{DiscreteCommand, DroneCommand, PidAxis, PidParams};

/// Fixed stop literal
pub const STOP: &str = "STOP";

// ----------------------------------------------------------------------------
// Wire Commands
// ----------------------------------------------------------------------------

/// Any command the drone understands, in typed form
#[derive(Debug, Clone, PartialEq)]
pub enum WireCommand {
    Movement(DroneCommand),
    Stop,
    Pid(PidParams),
    Discrete(DiscreteCommand),
    Parameter { name: String, value: f64 },
    MotorTest(u8),
    MotorOffset { motor: u8, offset: i16 },
    /// Text outside the known vocabulary, sent verbatim
    Raw(String),
}

impl WireCommand {
    /// Encode to wire text
    pub fn encode(&self) -> String {
        match self {
            WireCommand::Movement(command) => encode_movement(command),
            WireCommand::Stop => encode_stop().to_string(),
            WireCommand::Pid(params) => encode_pid(params),
            WireCommand::Discrete(command) => command.as_str().to_string(),
            WireCommand::Parameter { name, value } => format!("SET_{} {}", name, value),
            WireCommand::MotorTest(motor) => encode_motor_test(*motor),
            WireCommand::MotorOffset { motor, offset } => format!("OFFSET{} {}", motor, offset),
            WireCommand::Raw(text) => text.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------------

/// `T<throttle>,P<pitch>,R<roll>,Y<yaw>` with plain integers
pub fn encode_movement(command: &DroneCommand) -> String {
    format!(
        "T{},P{},R{},Y{}",
        command.throttle, command.pitch, command.roll, command.yaw
    )
}

pub fn encode_stop() -> &'static str {
    STOP
}

/// `PID_<AXIS> <kp> <ki> <kd>`
pub fn encode_pid(params: &PidParams) -> String {
    format!(
        "PID_{} {} {} {}",
        params.axis().wire_name(),
        format_gain(params.kp()),
        format_gain(params.ki()),
        format_gain(params.kd())
    )
}

pub fn encode_discrete(command: DiscreteCommand) -> &'static str {
    command.as_str()
}

/// `SET_<NAME> <value>`; the name is upper-cased and must be a single token
pub fn encode_parameter(name: &str, value: f64) -> Result<String, CommandError> {
    let name = normalize_parameter_name(name)?;
    if !value.is_finite() {
        return Err(CommandError::NonFinite { field: "value" });
    }
    Ok(WireCommand::Parameter { name, value }.encode())
}

/// `TEST<n>`: spin a single motor
pub fn encode_motor_test(motor: u8) -> String {
    format!("TEST{}", motor)
}

/// `OFFSET<n> <offset>`: trim a single motor
pub fn encode_motor_offset(motor: u8, offset: i16) -> Result<String, CommandError> {
    if !MOTOR_OFFSET_RANGE.contains(&offset) {
        return Err(CommandError::OutOfRange {
            field: "offset",
            value: offset as i64,
            min: *MOTOR_OFFSET_RANGE.start() as i64,
            max: *MOTOR_OFFSET_RANGE.end() as i64,
        });
    }
    Ok(WireCommand::MotorOffset { motor, offset }.encode())
}

/// Shortest round-trip decimal, always with a fractional part (`2.0`, `0.1`)
fn format_gain(value: f64) -> String {
    let text = value.to_string();
    if !value.is_finite() || text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{}.0", text)
    }
}

fn normalize_parameter_name(name: &str) -> Result<String, CommandError> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(CommandError::InvalidParameterName(name.to_string()));
    }
    Ok(name.to_ascii_uppercase())
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

/// Interpret a status notification as UTF-8 text
///
/// Invalid UTF-8 yields an empty string; status display is best-effort.
pub fn decode_status(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(e) => {
            debug!("Dropping non-UTF-8 status payload ({} bytes): {}", raw.len(), e);
            String::new()
        }
    }
}

/// Parse wire text back into a typed command
///
/// Text that does not match a known form, or matches with out-of-range
/// values, comes back as [`WireCommand::Raw`].
pub fn parse_command(text: &str) -> WireCommand {
    let text = text.trim();
    if text == STOP {
        return WireCommand::Stop;
    }
    if let Some(command) = DiscreteCommand::from_wire(text) {
        return WireCommand::Discrete(command);
    }
    parse_movement(text)
        .map(WireCommand::Movement)
        .or_else(|| parse_pid(text).map(WireCommand::Pid))
        .or_else(|| parse_parameter(text))
        .or_else(|| parse_motor_offset(text))
        .or_else(|| {
            text.strip_prefix("TEST")
                .and_then(|n| n.parse::<u8>().ok())
                .map(WireCommand::MotorTest)
        })
        .unwrap_or_else(|| WireCommand::Raw(text.to_string()))
}

fn parse_movement(text: &str) -> Option<DroneCommand> {
    let mut fields = text.split(',');
    let mut next = |prefix: char| -> Option<i64> {
        fields.next()?.strip_prefix(prefix)?.parse::<i64>().ok()
    };
    let (throttle, pitch, roll, yaw) = (next('T')?, next('P')?, next('R')?, next('Y')?);
    if fields.next().is_some() {
        return None;
    }
    DroneCommand::from_values(throttle, pitch, roll, yaw).ok()
}

fn parse_pid(text: &str) -> Option<PidParams> {
    let mut parts = text.split_whitespace();
    let axis = parts.next()?.strip_prefix("PID_")?.parse::<PidAxis>().ok()?;
    let mut gain = || parts.next()?.parse::<f64>().ok();
    let (kp, ki, kd) = (gain()?, gain()?, gain()?);
    if parts.next().is_some() {
        return None;
    }
    PidParams::new(axis, kp, ki, kd).ok()
}

fn parse_parameter(text: &str) -> Option<WireCommand> {
    let (name, value) = text.strip_prefix("SET_")?.split_once(' ')?;
    let value = value.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    let name = normalize_parameter_name(name).ok()?;
    Some(WireCommand::Parameter { name, value })
}

fn parse_motor_offset(text: &str) -> Option<WireCommand> {
    let (motor, offset) = text.strip_prefix("OFFSET")?.split_once(' ')?;
    let motor = motor.parse::<u8>().ok()?;
    let offset = offset.trim().parse::<i16>().ok()?;
    MOTOR_OFFSET_RANGE
        .contains(&offset)
        .then_some(WireCommand::MotorOffset { motor, offset })
}
