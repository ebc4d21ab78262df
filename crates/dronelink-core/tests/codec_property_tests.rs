//! Property-based tests for the command codec
//!
//! These tests check that typed commands survive the trip through wire text
//! and that range validation agrees with the documented bounds.

use dronelink_core::codec::{decode_status, encode_movement, encode_pid, parse_command};
use dronelink_core::{
    DroneCommand, MovementUpdate, PidAxis, PidParams, Throttle, Tilt, WireCommand, Yaw,
};
use proptest::prelude::*;

/// Generate a command with every field in range
fn arb_drone_command() -> impl Strategy<Value = DroneCommand> {
    (0i64..=100, -45i64..=45, -45i64..=45, -180i64..=180).prop_map(|(t, p, r, y)| {
        DroneCommand::from_values(t, p, r, y).expect("generated values are in range")
    })
}

fn arb_axis() -> impl Strategy<Value = PidAxis> {
    prop_oneof![Just(PidAxis::Roll), Just(PidAxis::Pitch), Just(PidAxis::Yaw)]
}

/// Generate finite PID gains
fn arb_pid_params() -> impl Strategy<Value = PidParams> {
    (arb_axis(), -100.0f64..100.0, -10.0f64..10.0, -100.0f64..100.0).prop_map(
        |(axis, kp, ki, kd)| PidParams::new(axis, kp, ki, kd).expect("gains are finite"),
    )
}

proptest! {
    /// Property: status decoding returns any UTF-8 text unchanged
    #[test]
    fn status_text_survives_decoding(text in any::<String>()) {
        prop_assert_eq!(decode_status(text.as_bytes()), text);
    }

    /// Property: an encoded movement parses back to the same command
    #[test]
    fn movement_parses_back(command in arb_drone_command()) {
        let text = encode_movement(&command);
        prop_assert_eq!(parse_command(&text), WireCommand::Movement(command));
    }

    /// Property: PID text carries the exact gains
    #[test]
    fn pid_parses_back(params in arb_pid_params()) {
        let text = encode_pid(&params);
        let prefix = format!("PID_{} ", params.axis().wire_name());
        prop_assert!(text.starts_with(&prefix));
        prop_assert_eq!(parse_command(&text), WireCommand::Pid(params));
    }

    /// Property: throttle validation matches 0..=100 exactly
    #[test]
    fn throttle_bounds(value in -1_000i64..1_000) {
        prop_assert_eq!(Throttle::new(value).is_ok(), (0..=100).contains(&value));
        let clamped = Throttle::saturating(value).value() as i64;
        prop_assert!((0..=100).contains(&clamped));
    }

    /// Property: tilt and yaw validation match their ranges
    #[test]
    fn angle_bounds(value in -1_000i64..1_000) {
        prop_assert_eq!(Tilt::new(value).is_ok(), (-45..=45).contains(&value));
        prop_assert_eq!(Yaw::new(value).is_ok(), (-180..=180).contains(&value));
    }

    /// Property: a merge keeps the remembered throttle unless one is given
    #[test]
    fn merge_fills_unspecified_fields(
        remembered in 0i64..=100,
        pitch in -45i64..=45,
        with_throttle in proptest::option::of(0i64..=100),
    ) {
        let mut update = MovementUpdate::new().with_pitch(Tilt::new(pitch).unwrap());
        if let Some(t) = with_throttle {
            update = update.with_throttle(Throttle::new(t).unwrap());
        }
        let merged = update.merge_over(Throttle::new(remembered).unwrap());

        prop_assert_eq!(merged.throttle.value() as i64, with_throttle.unwrap_or(remembered));
        prop_assert_eq!(merged.pitch.value() as i64, pitch);
        prop_assert_eq!(merged.roll, Tilt::default());
        prop_assert_eq!(merged.yaw, Yaw::default());
    }

    /// Property: parsing never loses operator text it does not understand
    #[test]
    fn unknown_text_is_kept_verbatim(text in "[a-z][a-z ]{0,20}") {
        let trimmed = text.trim().to_string();
        prop_assert_eq!(parse_command(&text), WireCommand::Raw(trimmed));
    }
}
