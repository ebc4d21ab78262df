//! In-memory transport
//!
//! [`MockTransport`] stands in for a radio: it advertises a configurable set
//! of devices, records every write, and lets tests push status notifications
//! or inject failures per operation. The CLI uses it for `--simulate`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

use crate::errors::{TransportError, TransportResult};
use crate::protocol::GattTarget;
use crate::transport::{DroneTransport, NotificationStream};
use crate::types::{AdapterState, DeviceHandle};

/// Operations a [`MockTransport`] records and can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Scan,
    Discover,
    StopScan,
    Connect,
    Write,
    Read,
    Subscribe,
    Unsubscribe,
    Disconnect,
}

struct MockState {
    devices: Vec<DeviceHandle>,
    discovery_delay: Duration,
    connect_delay: Duration,
    failures: HashSet<MockOperation>,
    calls: Vec<MockOperation>,
    writes: Vec<String>,
    connected: HashSet<String>,
    subscribers: Vec<mpsc::UnboundedSender<Vec<u8>>>,
    read_value: Vec<u8>,
    echo: bool,
}

impl MockState {
    fn require_connected(&self, device: &DeviceHandle) -> TransportResult<()> {
        if self.connected.contains(&device.id) {
            Ok(())
        } else {
            Err(TransportError::UnknownDevice {
                id: device.id.clone(),
            })
        }
    }

    fn notify(&mut self, payload: &[u8]) {
        self.subscribers.retain(|tx| tx.send(payload.to_vec()).is_ok());
    }
}

/// Scriptable transport backed by memory
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    adapter: Arc<watch::Sender<AdapterState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Powered-on adapter with nothing advertising
    pub fn new() -> Self {
        let (adapter, _) = watch::channel(AdapterState::PoweredOn);
        Self {
            state: Arc::new(Mutex::new(MockState {
                devices: Vec::new(),
                discovery_delay: Duration::ZERO,
                connect_delay: Duration::ZERO,
                failures: HashSet::new(),
                calls: Vec::new(),
                writes: Vec::new(),
                connected: HashSet::new(),
                subscribers: Vec::new(),
                read_value: b"OK:Ready".to_vec(),
                echo: false,
            })),
            adapter: Arc::new(adapter),
        }
    }

    /// A single advertising drone that acknowledges every command
    pub fn simulated_drone(name: &str) -> Self {
        Self::new()
            .with_device(DeviceHandle::new("SIM:00:11:22:33:44", name).with_rssi(-48))
            .with_discovery_delay(Duration::from_millis(300))
            .with_echo(true)
    }

    pub fn with_device(self, device: DeviceHandle) -> Self {
        self.configure(|state| state.devices.push(device))
    }

    /// Delay before an advertising device is reported by discovery
    pub fn with_discovery_delay(self, delay: Duration) -> Self {
        self.configure(|state| state.discovery_delay = delay)
    }

    /// Time the link takes to come up in `connect`
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.configure(|state| state.connect_delay = delay)
    }

    /// Answer each write with `CMD_RX:<first 15 chars>` on the status stream
    pub fn with_echo(self, echo: bool) -> Self {
        self.configure(|state| state.echo = echo)
    }

    pub fn with_adapter_state(self, adapter: AdapterState) -> Self {
        self.adapter.send_replace(adapter);
        self
    }

    fn configure(self, f: impl FnOnce(&mut MockState)) -> Self {
        if let Ok(mut state) = self.state.try_lock() {
            f(&mut state);
        }
        self
    }

    // ------------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------------

    pub fn set_adapter_state(&self, adapter: AdapterState) {
        debug!("Mock adapter -> {}", adapter);
        self.adapter.send_replace(adapter);
    }

    /// Make every later call of `operation` fail
    pub async fn fail(&self, operation: MockOperation) {
        self.state.lock().await.failures.insert(operation);
    }

    pub async fn recover(&self, operation: MockOperation) {
        self.state.lock().await.failures.remove(&operation);
    }

    /// Push a status notification to current subscribers
    pub async fn push_status(&self, text: &str) {
        self.push_raw(text.as_bytes()).await;
    }

    pub async fn push_raw(&self, payload: &[u8]) {
        self.state.lock().await.notify(payload);
    }

    /// Value returned by reads of the status characteristic
    pub async fn set_read_value(&self, text: &str) {
        self.state.lock().await.read_value = text.as_bytes().to_vec();
    }

    /// Command text written so far, oldest first
    pub async fn writes(&self) -> Vec<String> {
        self.state.lock().await.writes.clone()
    }

    pub async fn calls(&self) -> Vec<MockOperation> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, operation: MockOperation) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    pub async fn is_connected(&self, device: &DeviceHandle) -> bool {
        self.state.lock().await.connected.contains(&device.id)
    }

    pub async fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().await;
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    async fn record(&self, operation: MockOperation) -> TransportResult<()> {
        let mut state = self.state.lock().await;
        state.calls.push(operation);
        if state.failures.contains(&operation) {
            debug!("Mock failing {:?}", operation);
            return Err(injected_failure(operation));
        }
        Ok(())
    }
}

fn injected_failure(operation: MockOperation) -> TransportError {
    let reason = format!("simulated {:?} failure", operation).to_lowercase();
    match operation {
        MockOperation::Scan | MockOperation::StopScan => TransportError::ScanFailed { reason },
        MockOperation::Discover => TransportError::Backend(reason),
        MockOperation::Connect => TransportError::ConnectionFailed {
            device: "mock".to_string(),
            reason,
        },
        MockOperation::Write => TransportError::WriteFailed { reason },
        MockOperation::Read => TransportError::ReadFailed { reason },
        MockOperation::Subscribe | MockOperation::Unsubscribe => {
            TransportError::SubscriptionFailed { reason }
        }
        MockOperation::Disconnect => TransportError::DisconnectFailed { reason },
    }
}

#[async_trait]
impl DroneTransport for MockTransport {
    async fn adapter_state(&self) -> AdapterState {
        *self.adapter.borrow()
    }

    fn subscribe_adapter_state(&self) -> watch::Receiver<AdapterState> {
        self.adapter.subscribe()
    }

    async fn scan(&self, window: Duration) -> TransportResult<Vec<DeviceHandle>> {
        self.record(MockOperation::Scan).await?;
        tokio::time::sleep(window).await;
        Ok(self.state.lock().await.devices.clone())
    }

    async fn discover_by_name(
        &self,
        name: &str,
        timeout: Duration,
    ) -> TransportResult<DeviceHandle> {
        self.record(MockOperation::Discover).await?;
        let (device, delay) = {
            let state = self.state.lock().await;
            let device = state.devices.iter().find(|d| d.name == name).cloned();
            (device, state.discovery_delay)
        };
        match device {
            Some(device) => {
                tokio::time::sleep(delay).await;
                Ok(device)
            }
            None => {
                tokio::time::sleep(timeout).await;
                Err(TransportError::Timeout {
                    duration_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        self.record(MockOperation::StopScan).await
    }

    async fn connect(&self, device: &DeviceHandle) -> TransportResult<()> {
        self.record(MockOperation::Connect).await?;
        let delay = self.state.lock().await.connect_delay;
        tokio::time::sleep(delay).await;
        let mut state = self.state.lock().await;
        if !state.devices.iter().any(|d| d.id == device.id) {
            return Err(TransportError::UnknownDevice {
                id: device.id.clone(),
            });
        }
        state.connected.insert(device.id.clone());
        Ok(())
    }

    async fn write(
        &self,
        device: &DeviceHandle,
        _target: GattTarget,
        payload: &[u8],
    ) -> TransportResult<()> {
        self.record(MockOperation::Write).await?;
        let mut state = self.state.lock().await;
        state.require_connected(device)?;
        let text = String::from_utf8_lossy(payload).into_owned();
        if state.echo {
            let ack: String = text.chars().take(15).collect();
            state.notify(format!("CMD_RX:{}", ack).as_bytes());
        }
        state.writes.push(text);
        Ok(())
    }

    async fn read(&self, device: &DeviceHandle, _target: GattTarget) -> TransportResult<Vec<u8>> {
        self.record(MockOperation::Read).await?;
        let state = self.state.lock().await;
        state.require_connected(device)?;
        Ok(state.read_value.clone())
    }

    async fn subscribe(
        &self,
        device: &DeviceHandle,
        _target: GattTarget,
    ) -> TransportResult<NotificationStream> {
        self.record(MockOperation::Subscribe).await?;
        let mut state = self.state.lock().await;
        state.require_connected(device)?;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);
        let notifications = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|payload| (payload, rx))
        });
        Ok(notifications.boxed())
    }

    async fn unsubscribe(&self, _device: &DeviceHandle, _target: GattTarget) -> TransportResult<()> {
        self.record(MockOperation::Unsubscribe).await?;
        self.state.lock().await.subscribers.clear();
        Ok(())
    }

    async fn disconnect(&self, device: &DeviceHandle) -> TransportResult<()> {
        self.record(MockOperation::Disconnect).await?;
        let mut state = self.state.lock().await;
        state.connected.remove(&device.id);
        state.subscribers.clear();
        Ok(())
    }
}
