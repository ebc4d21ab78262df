//! Core of the BLE drone remote-control link
//!
//! This crate holds everything that does not touch a radio:
//!
//! - [`codec`] - Typed commands to and from the drone's text vocabulary
//! - [`session`] - The connection state machine and command sending
//! - [`transport`] - The contract a BLE backend implements
//! - [`mock`] - An in-memory backend for tests and simulation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dronelink_core::{DroneConfig, DroneSession, MockTransport, MovementUpdate, Throttle};
//!
//! # async fn example() -> dronelink_core::Result<()> {
//! let transport = MockTransport::simulated_drone("RaspberryPiDrone");
//! let session = DroneSession::new(transport, DroneConfig::default());
//!
//! session.connect().await?;
//! session
//!     .send_movement(MovementUpdate::new().with_throttle(Throttle::new(30)?))
//!     .await?;
//! session.send_stop().await?;
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod errors;
pub mod mock;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

pub use codec::{parse_command, WireCommand};
pub use config::{CommandProfile, DroneConfig};
pub use errors::{
    CommandError, DisconnectOutcome, Result, SessionError, TransportError, TransportResult,
};
pub use mock::{MockOperation, MockTransport};
pub use protocol::{
    GattTarget, COMMAND_CHARACTERISTIC_UUID, DEFAULT_DEVICE_NAME, DRONE_SERVICE_UUID,
    STATUS_CHARACTERISTIC_UUID,
};
pub use session::DroneSession;
pub use transport::{DroneTransport, NotificationStream};
pub use types::{
    AdapterState, ConnectionState, DeviceHandle, DiscreteCommand, DroneCommand, MovementUpdate,
    PidAxis, PidParams, StatusKind, StatusMessage, Throttle, Tilt, Yaw,
};
