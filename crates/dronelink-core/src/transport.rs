//! Transport abstraction for the drone link
//!
//! The session talks to the radio exclusively through [`DroneTransport`],
//! which keeps it independent of the BLE backend in use. Payloads crossing
//! this boundary are raw bytes; any encoding the platform stack applies
//! underneath stays inside the implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::watch;

use crate::errors::TransportResult;
use crate::protocol::GattTarget;
use crate::types::{AdapterState, DeviceHandle};

/// Stream of raw notification payloads from one characteristic
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// BLE central-role operations needed by a drone session
#[async_trait]
pub trait DroneTransport: Send + Sync + 'static {
    /// Current radio power state
    async fn adapter_state(&self) -> AdapterState;

    /// Watch radio power state changes; the receiver always holds the latest value
    fn subscribe_adapter_state(&self) -> watch::Receiver<AdapterState>;

    /// List devices advertising during `window`
    async fn scan(&self, window: Duration) -> TransportResult<Vec<DeviceHandle>>;

    /// Scan until a device advertising `name` appears or `timeout` elapses
    async fn discover_by_name(&self, name: &str, timeout: Duration)
        -> TransportResult<DeviceHandle>;

    /// Stop any scan in progress
    async fn stop_scan(&self) -> TransportResult<()>;

    /// Establish the link and discover services and characteristics
    async fn connect(&self, device: &DeviceHandle) -> TransportResult<()>;

    /// Write without response
    async fn write(
        &self,
        device: &DeviceHandle,
        target: GattTarget,
        payload: &[u8],
    ) -> TransportResult<()>;

    /// Read the current characteristic value
    async fn read(&self, device: &DeviceHandle, target: GattTarget) -> TransportResult<Vec<u8>>;

    /// Enable notifications and return the payload stream
    async fn subscribe(
        &self,
        device: &DeviceHandle,
        target: GattTarget,
    ) -> TransportResult<NotificationStream>;

    /// Disable notifications previously enabled with [`subscribe`](Self::subscribe)
    async fn unsubscribe(&self, device: &DeviceHandle, target: GattTarget) -> TransportResult<()>;

    /// Release the link
    async fn disconnect(&self, device: &DeviceHandle) -> TransportResult<()>;
}
