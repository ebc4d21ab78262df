//! Error types for the drone link
//!
//! This module contains the error taxonomy surfaced at the session boundary,
//! the errors reported by transport adapters, and the validation errors raised
//! when typed command values are built from untrusted input.

use crate::config::CommandProfile;
use crate::types::{AdapterState, ConnectionState};

// ----------------------------------------------------------------------------
// Command Validation Errors
// ----------------------------------------------------------------------------

/// Errors raised while constructing or encoding typed commands
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("Unknown PID axis: {0}")]
    UnknownAxis(String),
    #[error("Invalid parameter name: {0:?}")]
    InvalidParameterName(String),
    #[error("Command {command} is not part of the {profile} vocabulary")]
    NotInProfile {
        command: String,
        profile: CommandProfile,
    },
    #[error("Empty command")]
    Empty,
}

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Errors reported by a [`DroneTransport`](crate::transport::DroneTransport)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("BLE adapter not available: {reason}")]
    AdapterUnavailable { reason: String },
    #[error("Device not found: {name}")]
    DeviceNotFound { name: String },
    #[error("Transport timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("Scan failed: {reason}")]
    ScanFailed { reason: String },
    #[error("Connection failed to {device}: {reason}")]
    ConnectionFailed { device: String, reason: String },
    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },
    #[error("Write failed: {reason}")]
    WriteFailed { reason: String },
    #[error("Read failed: {reason}")]
    ReadFailed { reason: String },
    #[error("Failed to subscribe to notifications: {reason}")]
    SubscriptionFailed { reason: String },
    #[error("Disconnect failed: {reason}")]
    DisconnectFailed { reason: String },
    #[error("Unknown device handle: {id}")]
    UnknownDevice { id: String },
    #[error("BLE backend error: {0}")]
    Backend(String),
}

// ----------------------------------------------------------------------------
// Session Errors
// ----------------------------------------------------------------------------

/// Typed failures surfaced by [`DroneSession`](crate::session::DroneSession)
///
/// Every variant is recoverable. Only failures during the connect sequence
/// move the session into [`ConnectionState::Error`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Bluetooth adapter not ready (state: {state})")]
    AdapterNotReady { state: AdapterState },
    #[error("Device {name:?} not found within {timeout_ms}ms")]
    DeviceNotFound { name: String, timeout_ms: u64 },
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },
    #[error("Not connected (state: {state})")]
    NotConnected { state: ConnectionState },
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },
    #[error("Status read failed: {reason}")]
    ReadFailed { reason: String },
    #[error("Connection attempt already in progress (state: {state})")]
    AlreadyInProgress { state: ConnectionState },
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Scan failed: {reason}")]
    ScanFailed { reason: String },
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] CommandError),
}

/// Result type for session operations
pub type Result<T> = core::result::Result<T, SessionError>;

/// Result type for transport operations
pub type TransportResult<T> = core::result::Result<T, TransportError>;

// ----------------------------------------------------------------------------
// Disconnect Outcome
// ----------------------------------------------------------------------------

/// Outcome of a best-effort disconnect
///
/// Disconnecting never fails from the caller's point of view; a release error
/// is carried here instead of being thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The link and subscription were released cleanly
    Released,
    /// Nothing to release; the session was already disconnected
    AlreadyDisconnected,
    /// Session state was reset but the transport reported a problem
    ReleasedWithWarning(String),
}

impl DisconnectOutcome {
    /// True when no transport warning was raised
    pub fn is_clean(&self) -> bool {
        !matches!(self, DisconnectOutcome::ReleasedWithWarning(_))
    }
}
