//! Console input parsing
//!
//! Turns one line typed by the operator into a [`ConsoleInput`]. Words are
//! case-insensitive; anything that is not a console word but parses as drone
//! wire text (`T30,P0,R0,Y0`, `PID_ROLL 2.0 0.0 2.0`) is accepted as is.

use dronelink_core::codec::encode_motor_offset;
use dronelink_core::{
    parse_command, DiscreteCommand, MovementUpdate, PidAxis, PidParams, Throttle, Tilt,
    WireCommand, Yaw,
};

use crate::error::{CliError, Result};

pub const HELP: &str = "\
Commands:
  connect | disconnect | state | read
  up | down                 step throttle (UP/DOWN literals in discrete profile)
  throttle N                0..100
  pitch N | roll N          -45..45
  yaw N                     -180..180
  move T P R Y              full movement command
  stop                      STOP, resets throttle
  pid AXIS KP KI KD         e.g. pid roll 2.0 0.0 2.0
  pid-default AXIS          send firmware default gains
  set NAME VALUE            SET_<NAME> <VALUE>
  motor N                   TEST<N>, spin one motor
  offset N V                OFFSET<N> <V>, trim one motor (-200..200)
  raw TEXT                  send TEXT verbatim
  run fwd back left right paralel pid_on pid_off ...   discrete literals
  help | quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Empty,
    Help,
    Quit,
    Connect,
    Disconnect,
    State,
    Read,
    Up,
    Down,
    Stop,
    Movement(MovementUpdate),
    Pid(PidParams),
    PidDefault(PidAxis),
    Set { name: String, value: f64 },
    Discrete(DiscreteCommand),
    Wire(WireCommand),
}

fn integer(text: &str) -> Result<i64> {
    text.parse()
        .map_err(|_| CliError::Input(format!("expected an integer, got {:?}", text)))
}

fn motor(text: &str) -> Result<u8> {
    text.parse()
        .map_err(|_| CliError::Input(format!("expected a motor number, got {:?}", text)))
}

fn number(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CliError::Input(format!("expected a number, got {:?}", text)))
}

/// Parse one console line
pub fn parse_console_line(line: &str) -> Result<ConsoleInput> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(ConsoleInput::Empty);
    };
    let args: Vec<&str> = words.collect();

    let input = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("help" | "?", []) => ConsoleInput::Help,
        ("quit" | "exit", []) => ConsoleInput::Quit,
        ("connect", []) => ConsoleInput::Connect,
        ("disconnect", []) => ConsoleInput::Disconnect,
        ("state", []) => ConsoleInput::State,
        ("read", []) => ConsoleInput::Read,
        ("up", []) => ConsoleInput::Up,
        ("down", []) => ConsoleInput::Down,
        ("stop", []) => ConsoleInput::Stop,
        ("throttle", [v]) => {
            ConsoleInput::Movement(MovementUpdate::new().with_throttle(Throttle::new(integer(v)?)?))
        }
        ("pitch", [v]) => ConsoleInput::Movement(MovementUpdate::new().with_pitch(Tilt::new(integer(v)?)?)),
        ("roll", [v]) => ConsoleInput::Movement(MovementUpdate::new().with_roll(Tilt::new(integer(v)?)?)),
        ("yaw", [v]) => ConsoleInput::Movement(MovementUpdate::new().with_yaw(Yaw::new(integer(v)?)?)),
        ("move", [t, p, r, y]) => ConsoleInput::Movement(
            MovementUpdate::new()
                .with_throttle(Throttle::new(integer(t)?)?)
                .with_pitch(Tilt::new(integer(p)?)?)
                .with_roll(Tilt::new(integer(r)?)?)
                .with_yaw(Yaw::new(integer(y)?)?),
        ),
        ("pid", [axis, kp, ki, kd]) => ConsoleInput::Pid(PidParams::new(
            axis.parse()?,
            number(kp)?,
            number(ki)?,
            number(kd)?,
        )?),
        ("pid-default", [axis]) => ConsoleInput::PidDefault(axis.parse()?),
        ("set", [name, value]) => ConsoleInput::Set {
            name: name.to_string(),
            value: number(value)?,
        },
        ("motor", [n]) => ConsoleInput::Wire(WireCommand::MotorTest(motor(n)?)),
        ("offset", [n, v]) => {
            let motor = motor(n)?;
            let offset = i16::try_from(integer(v)?)
                .map_err(|_| CliError::Input(format!("offset out of range: {}", v)))?;
            encode_motor_offset(motor, offset)?;
            ConsoleInput::Wire(WireCommand::MotorOffset { motor, offset })
        }
        ("raw", rest) if !rest.is_empty() => {
            let text = line[head.len()..].trim();
            ConsoleInput::Wire(WireCommand::Raw(text.to_string()))
        }
        _ => match DiscreteCommand::from_wire(&line.to_ascii_uppercase()) {
            Some(command) => ConsoleInput::Discrete(command),
            None => match parse_command(line) {
                WireCommand::Raw(_) => return Err(CliError::Input(line.to_string())),
                wire => ConsoleInput::Wire(wire),
            },
        },
    };
    Ok(input)
}
