//! Bluetooth Low Energy transport for dronelink
//!
//! This crate implements the `DroneTransport` trait from `dronelink-core`
//! on top of `btleplug`, acting as a BLE central.
//!
//! ## Architecture
//!
//! - [`config`] - Transport configuration and settings
//! - [`error`] - Error types specific to the BLE transport
//! - `protocol` - Conversions between btleplug and drone link types
//! - `device` - Registry of discovered peripherals
//! - `discovery` - Adapter setup, power-state tracking and scanning
//! - `connection` - Link setup and characteristic I/O
//! - [`transport`] - The `DroneTransport` implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dronelink_ble::{BleTransportConfig, BtleplugTransport};
//! use dronelink_core::{DroneConfig, DroneSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = BtleplugTransport::new(BleTransportConfig::default()).await?;
//! let session = DroneSession::new(transport, DroneConfig::default());
//!
//! session.connect().await?;
//! session.send_stop().await?;
//! session.teardown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! Linux (BlueZ), macOS (CoreBluetooth) and Windows (WinRT) through btleplug.
//! btleplug reports adapter power as on, off or unknown only; the finer
//! states are never produced by this transport.

pub mod config;
mod connection;
mod device;
mod discovery;
pub mod error;
mod protocol;
pub mod transport;

pub use config::BleTransportConfig;
pub use error::BleTransportError;
pub use transport::BtleplugTransport;
