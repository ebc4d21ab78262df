//! Drone session
//!
//! [`DroneSession`] is the single owner of the link to one drone: it holds the
//! connection state, the active device handle, the remembered throttle and
//! the latest status text, and it is the only place those change.
//!
//! ```text
//! Disconnected/Error --connect()--> Scanning --found--> Connecting --link ok--> Connected
//!         ^                            |                    |                      |
//!         |                            +------failure-------+----> Error           |
//!         +------------------------------disconnect()------------------------------+
//! ```
//!
//! There is no automatic reconnect; callers re-invoke [`DroneSession::connect`].

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::codec::{self, WireCommand};
use crate::config::DroneConfig;
use crate::errors::{CommandError, DisconnectOutcome, Result, SessionError, TransportError};
use crate::transport::{DroneTransport, NotificationStream};
use crate::types::{
    AdapterState, ConnectionState, DeviceHandle, DiscreteCommand, DroneCommand, MovementUpdate,
    PidParams, StatusMessage, Throttle,
};

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

struct SessionInner {
    state: ConnectionState,
    device: Option<DeviceHandle>,
    throttle: Throttle,
    /// Bumped on every connect attempt and every disconnect
    generation: u64,
    listener: Option<JoinHandle<()>>,
}

impl SessionInner {
    /// Start a new attempt generation, superseding any in flight
    fn next_generation(&mut self, generation_tx: &watch::Sender<u64>) -> u64 {
        self.generation += 1;
        generation_tx.send_replace(self.generation);
        self.generation
    }

    fn transition(&mut self, next: ConnectionState, state_tx: &watch::Sender<ConnectionState>) {
        if self.state != next {
            debug!("Session state {} -> {}", self.state, next);
        }
        self.state = next;
        state_tx.send_replace(next);
    }
}

/// Snapshot of a connected link taken for one send
struct ActiveLink {
    device: DeviceHandle,
    generation: u64,
    throttle: Throttle,
}

fn cancelled() -> SessionError {
    SessionError::ConnectionFailed {
        reason: "connection attempt cancelled by disconnect".to_string(),
    }
}

// ----------------------------------------------------------------------------
// Drone Session
// ----------------------------------------------------------------------------

/// Connection and command session for a single drone
pub struct DroneSession<T: DroneTransport> {
    transport: T,
    config: DroneConfig,
    inner: Arc<RwLock<SessionInner>>,
    state_tx: watch::Sender<ConnectionState>,
    generation_tx: watch::Sender<u64>,
    status_tx: Arc<watch::Sender<Option<StatusMessage>>>,
}

impl<T: DroneTransport> DroneSession<T> {
    /// Create a disconnected session over `transport`
    pub fn new(transport: T, config: DroneConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (status_tx, _) = watch::channel(None);
        let (generation_tx, _) = watch::channel(0);
        Self {
            transport,
            config,
            inner: Arc::new(RwLock::new(SessionInner {
                state: ConnectionState::Disconnected,
                device: None,
                throttle: Throttle::ZERO,
                generation: 0,
                listener: None,
            })),
            state_tx,
            generation_tx,
            status_tx: Arc::new(status_tx),
        }
    }

    /// End the session, releasing any link
    pub async fn teardown(self) -> DisconnectOutcome {
        let outcome = self.disconnect().await;
        info!("Drone session torn down");
        outcome
    }

    pub fn config(&self) -> &DroneConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Current radio power state
    pub async fn adapter_state(&self) -> AdapterState {
        self.transport.adapter_state().await
    }

    /// Stream of radio power states, starting with the current one
    ///
    /// Each call returns an independent stream, so observers can re-subscribe.
    pub fn observe_adapter_state(&self) -> BoxStream<'static, AdapterState> {
        let rx = self.transport.subscribe_adapter_state();
        stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let state = *rx.borrow_and_update();
            Some((state, (rx, false)))
        })
        .boxed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Most recent status text, if any arrived on this connection
    pub fn current_status(&self) -> Option<StatusMessage> {
        self.status_tx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<Option<StatusMessage>> {
        self.status_tx.subscribe()
    }

    /// Throttle merged into movement commands that leave it unspecified
    pub async fn throttle(&self) -> Throttle {
        self.inner.read().await.throttle
    }

    pub async fn device(&self) -> Option<DeviceHandle> {
        self.inner.read().await.device.clone()
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    /// List devices advertising during the configured scan window
    pub async fn scan(&self) -> Result<Vec<DeviceHandle>> {
        let adapter = *self.transport.subscribe_adapter_state().borrow();
        if !adapter.is_ready() {
            return Err(SessionError::AdapterNotReady { state: adapter });
        }
        {
            let inner = self.inner.read().await;
            if inner.state == ConnectionState::Scanning {
                return Err(SessionError::AlreadyInProgress { state: inner.state });
            }
        }

        info!("Scanning for devices ({}ms)", self.config.scan_window.as_millis());
        let devices = self
            .transport
            .scan(self.config.scan_window)
            .await
            .map_err(|e| SessionError::ScanFailed {
                reason: e.to_string(),
            })?;
        debug!("Scan found {} device(s)", devices.len());
        Ok(devices)
    }

    // ------------------------------------------------------------------------
    // Connection Lifecycle
    // ------------------------------------------------------------------------

    /// Discover the configured device, connect and start status notifications
    pub async fn connect(&self) -> Result<DeviceHandle> {
        let adapter = *self.transport.subscribe_adapter_state().borrow();
        let generation = {
            let mut inner = self.inner.write().await;
            match inner.state {
                state if state.is_busy() => {
                    return Err(SessionError::AlreadyInProgress { state });
                }
                ConnectionState::Connected => return Err(SessionError::AlreadyConnected),
                _ => {}
            }
            if !adapter.is_ready() {
                warn!("Refusing to connect: adapter is {}", adapter);
                return Err(SessionError::AdapterNotReady { state: adapter });
            }
            let generation = inner.next_generation(&self.generation_tx);
            inner.transition(ConnectionState::Scanning, &self.state_tx);
            generation
        };

        let name = &self.config.device_name;
        let scan_timeout = self.config.scan_timeout;
        info!("Scanning for {:?} (timeout {}ms)", name, scan_timeout.as_millis());

        let discovery = timeout(scan_timeout, self.transport.discover_by_name(name, scan_timeout));
        let discovered = tokio::select! {
            result = discovery => result,
            // disconnect() already stopped the scan
            _ = superseded(self.generation_tx.subscribe(), generation) => {
                debug!("Connection attempt {} cancelled while scanning", generation);
                return Err(cancelled());
            }
        };

        let device = match discovered {
            Ok(Ok(device)) => device,
            Ok(Err(TransportError::DeviceNotFound { .. } | TransportError::Timeout { .. }))
            | Err(_) => {
                self.stop_scan_if_current(generation).await;
                let err = SessionError::DeviceNotFound {
                    name: name.clone(),
                    timeout_ms: scan_timeout.as_millis() as u64,
                };
                return Err(self.fail_attempt(generation, err).await);
            }
            Ok(Err(e)) => {
                self.stop_scan_if_current(generation).await;
                let err = SessionError::ConnectionFailed {
                    reason: e.to_string(),
                };
                return Err(self.fail_attempt(generation, err).await);
            }
        };

        {
            let mut inner = self.inner.write().await;
            if inner.generation != generation {
                return Err(cancelled());
            }
            inner.device = Some(device.clone());
            inner.transition(ConnectionState::Connecting, &self.state_tx);
        }
        info!("Found {}, connecting", device);

        if let Err(e) = self.transport.connect(&device).await {
            return Err(self.abort_attempt(generation, &device, e).await);
        }
        let notifications = match self
            .transport
            .subscribe(&device, self.config.status_target())
            .await
        {
            Ok(notifications) => notifications,
            Err(e) => return Err(self.abort_attempt(generation, &device, e).await),
        };

        {
            let mut inner = self.inner.write().await;
            if inner.generation == generation {
                let listener = self.spawn_status_listener(generation, device.id.clone(), notifications);
                inner.listener = Some(listener);
                inner.transition(ConnectionState::Connected, &self.state_tx);
                info!("Connected to {}", device);
                return Ok(device);
            }
        }

        // Disconnected while the link was coming up
        self.release_quietly(&device, true).await;
        Err(cancelled())
    }

    /// Release the link; never fails
    ///
    /// State is reset to `Disconnected` before the transport is asked to
    /// release, so the session never looks connected while teardown runs.
    pub async fn disconnect(&self) -> DisconnectOutcome {
        let (device, subscribed, was_scanning) = {
            let mut inner = self.inner.write().await;
            if inner.state == ConnectionState::Disconnected {
                debug!("Disconnect requested while already disconnected");
                return DisconnectOutcome::AlreadyDisconnected;
            }
            let was_scanning = inner.state == ConnectionState::Scanning;
            inner.next_generation(&self.generation_tx);
            let listener = inner.listener.take();
            if let Some(listener) = &listener {
                listener.abort();
            }
            let device = inner.device.take();
            inner.throttle = Throttle::ZERO;
            self.status_tx.send_replace(None);
            inner.transition(ConnectionState::Disconnected, &self.state_tx);
            (device, listener.is_some(), was_scanning)
        };

        let mut warnings = Vec::new();
        if was_scanning {
            if let Err(e) = self.transport.stop_scan().await {
                warn!("Failed to stop scan during disconnect: {}", e);
                warnings.push(e.to_string());
            }
        }
        if let Some(device) = device {
            if subscribed {
                if let Err(e) = self
                    .transport
                    .unsubscribe(&device, self.config.status_target())
                    .await
                {
                    warn!("Failed to unsubscribe from status on {}: {}", device, e);
                    warnings.push(e.to_string());
                }
            }
            if let Err(e) = self.transport.disconnect(&device).await {
                warn!("Failed to release link to {}: {}", device, e);
                warnings.push(e.to_string());
            }
            info!("Disconnected from {}", device);
        }

        if warnings.is_empty() {
            DisconnectOutcome::Released
        } else {
            DisconnectOutcome::ReleasedWithWarning(warnings.join("; "))
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Merge `update` over the remembered throttle and send it
    pub async fn send_movement(&self, update: MovementUpdate) -> Result<DroneCommand> {
        let link = self.active_link().await?;
        if !self.config.profile.allows_axis() {
            return Err(self.not_in_profile("movement"));
        }
        let command = update.merge_over(link.throttle);
        self.write_text(&link, &codec::encode_movement(&command)).await?;
        if let Some(throttle) = update.throttle {
            self.remember_throttle(&link, throttle).await;
        }
        Ok(command)
    }

    /// Send `STOP` and forget the remembered throttle
    pub async fn send_stop(&self) -> Result<()> {
        let link = self.active_link().await?;
        self.write_text(&link, codec::encode_stop()).await?;
        self.remember_throttle(&link, Throttle::ZERO).await;
        info!("Stop sent");
        Ok(())
    }

    pub async fn send_pid(&self, params: PidParams) -> Result<()> {
        let link = self.active_link().await?;
        self.write_text(&link, &codec::encode_pid(&params)).await
    }

    /// Send a literal from the discrete vocabulary
    pub async fn send_discrete(&self, command: DiscreteCommand) -> Result<()> {
        if command == DiscreteCommand::Stop {
            return self.send_stop().await;
        }
        let link = self.active_link().await?;
        if !self.config.profile.allows_discrete() {
            return Err(self.not_in_profile(command.as_str()));
        }
        self.write_text(&link, codec::encode_discrete(command)).await
    }

    /// Send a firmware tuning parameter as `SET_<NAME> <value>`
    pub async fn send_parameter(&self, name: &str, value: f64) -> Result<()> {
        let link = self.active_link().await?;
        let text = codec::encode_parameter(name, value)?;
        self.write_text(&link, &text).await
    }

    /// Send any typed command, returning the wire text written
    pub async fn send_command(&self, command: WireCommand) -> Result<String> {
        match command {
            WireCommand::Movement(c) => {
                let update = MovementUpdate::new()
                    .with_throttle(c.throttle)
                    .with_pitch(c.pitch)
                    .with_roll(c.roll)
                    .with_yaw(c.yaw);
                let sent = self.send_movement(update).await?;
                Ok(codec::encode_movement(&sent))
            }
            WireCommand::Stop => {
                self.send_stop().await?;
                Ok(codec::encode_stop().to_string())
            }
            WireCommand::Pid(params) => {
                self.send_pid(params).await?;
                Ok(codec::encode_pid(&params))
            }
            WireCommand::Discrete(command) => {
                self.send_discrete(command).await?;
                Ok(command.as_str().to_string())
            }
            WireCommand::Parameter { name, value } => {
                let text = codec::encode_parameter(&name, value)?;
                self.send_parameter(&name, value).await?;
                Ok(text)
            }
            WireCommand::MotorOffset { motor, offset } => {
                let text = codec::encode_motor_offset(motor, offset)?;
                let link = self.active_link().await?;
                self.write_text(&link, &text).await?;
                Ok(text)
            }
            command @ (WireCommand::MotorTest(_) | WireCommand::Raw(_)) => {
                let text = command.encode();
                if text.trim().is_empty() {
                    return Err(CommandError::Empty.into());
                }
                let link = self.active_link().await?;
                self.write_text(&link, &text).await?;
                Ok(text)
            }
        }
    }

    /// Parse operator text and send it
    pub async fn send_raw(&self, text: &str) -> Result<String> {
        self.send_command(codec::parse_command(text)).await
    }

    /// Read the status characteristic directly
    pub async fn read_status(&self) -> Result<StatusMessage> {
        let link = self.active_link().await?;
        let raw = self
            .transport
            .read(&link.device, self.config.status_target())
            .await
            .map_err(|e| SessionError::ReadFailed {
                reason: e.to_string(),
            })?;
        let message = StatusMessage::new(codec::decode_status(&raw));

        if self.inner.read().await.generation == link.generation {
            self.status_tx.send_replace(Some(message.clone()));
        }
        Ok(message)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Connected link with a powered radio, or the reason there is none
    async fn active_link(&self) -> Result<ActiveLink> {
        let link = {
            let inner = self.inner.read().await;
            match (&inner.device, inner.state) {
                (Some(device), ConnectionState::Connected) => ActiveLink {
                    device: device.clone(),
                    generation: inner.generation,
                    throttle: inner.throttle,
                },
                _ => return Err(SessionError::NotConnected { state: inner.state }),
            }
        };
        let adapter = *self.transport.subscribe_adapter_state().borrow();
        if !adapter.is_ready() {
            warn!("Refusing to send: adapter is {}", adapter);
            return Err(SessionError::AdapterNotReady { state: adapter });
        }
        Ok(link)
    }

    async fn write_text(&self, link: &ActiveLink, text: &str) -> Result<()> {
        self.transport
            .write(&link.device, self.config.command_target(), text.as_bytes())
            .await
            .map_err(|e| {
                warn!("Failed to send {:?}: {}", text, e);
                SessionError::SendFailed {
                    reason: e.to_string(),
                }
            })?;
        debug!("Sent {:?} to {}", text, link.device.name);
        Ok(())
    }

    async fn remember_throttle(&self, link: &ActiveLink, throttle: Throttle) {
        let mut inner = self.inner.write().await;
        if inner.generation == link.generation {
            inner.throttle = throttle;
        }
    }

    fn not_in_profile(&self, command: &str) -> SessionError {
        CommandError::NotInProfile {
            command: command.to_string(),
            profile: self.config.profile,
        }
        .into()
    }

    async fn fail_attempt(&self, generation: u64, err: SessionError) -> SessionError {
        let mut inner = self.inner.write().await;
        if inner.generation == generation {
            inner.device = None;
            inner.transition(ConnectionState::Error, &self.state_tx);
            error!("Connection attempt failed: {}", err);
        } else {
            debug!("Superseded connection attempt failed: {}", err);
        }
        err
    }

    async fn abort_attempt(
        &self,
        generation: u64,
        device: &DeviceHandle,
        cause: TransportError,
    ) -> SessionError {
        self.release_quietly(device, false).await;
        let err = SessionError::ConnectionFailed {
            reason: cause.to_string(),
        };
        self.fail_attempt(generation, err).await
    }

    async fn release_quietly(&self, device: &DeviceHandle, subscribed: bool) {
        if subscribed {
            if let Err(e) = self
                .transport
                .unsubscribe(device, self.config.status_target())
                .await
            {
                debug!("Ignoring unsubscribe failure on {}: {}", device, e);
            }
        }
        if let Err(e) = self.transport.disconnect(device).await {
            debug!("Ignoring release failure on {}: {}", device, e);
        }
    }

    /// Stop scanning unless a newer attempt or a disconnect owns the scan
    async fn stop_scan_if_current(&self, generation: u64) {
        if self.inner.read().await.generation != generation {
            return;
        }
        if let Err(e) = self.transport.stop_scan().await {
            debug!("Ignoring stop-scan failure: {}", e);
        }
    }

    fn spawn_status_listener(
        &self,
        generation: u64,
        device_id: String,
        mut notifications: NotificationStream,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let status_tx = Arc::clone(&self.status_tx);
        tokio::spawn(async move {
            while let Some(raw) = notifications.next().await {
                let text = codec::decode_status(&raw);
                let guard = inner.read().await;
                let active = guard.generation == generation
                    && guard.device.as_ref().is_some_and(|d| d.id == device_id);
                if !active {
                    debug!("Dropping status for inactive link {}", device_id);
                    break;
                }
                let message = StatusMessage::new(text);
                debug!("Status from {}: {}", device_id, message);
                status_tx.send_replace(Some(message));
            }
            debug!("Status listener for {} ended", device_id);
        })
    }
}

impl<T: DroneTransport> Drop for DroneSession<T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_write() {
            if let Some(listener) = inner.listener.take() {
                listener.abort();
            }
        }
    }
}

/// Resolves once `generation` is no longer the active attempt
async fn superseded(mut rx: watch::Receiver<u64>, generation: u64) {
    loop {
        if *rx.borrow_and_update() != generation {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
