//! Session behaviour against the in-memory transport

use std::sync::Arc;
use std::time::Duration;

use dronelink_core::{
    AdapterState, CommandError, CommandProfile, ConnectionState, DeviceHandle, DisconnectOutcome,
    DiscreteCommand, DroneCommand, DroneConfig, DroneSession, MockOperation, MockTransport,
    MovementUpdate, PidAxis, PidParams, SessionError, Throttle, Tilt,
};
use futures::StreamExt;

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn drone() -> DeviceHandle {
    DeviceHandle::new("AA:BB:CC:DD:EE:FF", "RaspberryPiDrone").with_rssi(-60)
}

fn new_session(mock: &MockTransport) -> DroneSession<MockTransport> {
    DroneSession::new(mock.clone(), DroneConfig::default())
}

async fn connected_session() -> (MockTransport, DroneSession<MockTransport>) {
    let mock = MockTransport::new().with_device(drone());
    let session = new_session(&mock);
    session.connect().await.unwrap();
    (mock, session)
}

fn throttle(value: i64) -> Throttle {
    Throttle::new(value).unwrap()
}

async fn wait_for_state(session: &DroneSession<MockTransport>, state: ConnectionState) {
    let mut rx = session.watch_connection_state();
    rx.wait_for(|s| *s == state).await.unwrap();
}

async fn assert_sends_refused(session: &DroneSession<MockTransport>, state: ConnectionState) {
    let expected = SessionError::NotConnected { state };
    let update = MovementUpdate::new().with_throttle(throttle(40));
    assert_eq!(session.send_movement(update).await, Err(expected.clone()));
    assert_eq!(session.send_stop().await, Err(expected.clone()));
    let pid = PidParams::default_for(PidAxis::Roll);
    assert_eq!(session.send_pid(pid).await, Err(expected));
    assert_eq!(session.connection_state(), state);
}

// ----------------------------------------------------------------------------
// Connection Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_reaches_connected() {
    let mock = MockTransport::new().with_device(drone());
    let session = new_session(&mock);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    let device = session.connect().await.unwrap();

    assert_eq!(device, drone());
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(session.device().await, Some(drone()));
    assert!(mock.is_connected(&device).await);
    assert_eq!(mock.subscriber_count().await, 1);
    assert_eq!(
        mock.calls().await,
        vec![
            MockOperation::Discover,
            MockOperation::Connect,
            MockOperation::Subscribe
        ]
    );
}

#[tokio::test]
async fn test_connect_refused_when_adapter_powered_off() {
    let mock = MockTransport::new()
        .with_device(drone())
        .with_adapter_state(AdapterState::PoweredOff);
    let session = new_session(&mock);

    let result = session.connect().await;

    assert_eq!(
        result,
        Err(SessionError::AdapterNotReady {
            state: AdapterState::PoweredOff
        })
    );
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(mock.call_count(MockOperation::Discover).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_times_out_without_matching_device() {
    let mock = MockTransport::new().with_device(DeviceHandle::new("11:22", "SomeoneElse"));
    let session = new_session(&mock);

    let result = session.connect().await;

    assert_eq!(
        result,
        Err(SessionError::DeviceNotFound {
            name: "RaspberryPiDrone".to_string(),
            timeout_ms: 10_000
        })
    );
    assert_eq!(session.connection_state(), ConnectionState::Error);
    assert_eq!(session.device().await, None);
    assert_eq!(mock.call_count(MockOperation::StopScan).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_discovery_is_bounded_by_scan_timeout() {
    let mock = MockTransport::new()
        .with_device(drone())
        .with_discovery_delay(Duration::from_secs(30));
    let config = DroneConfig::default().with_scan_timeout(Duration::from_secs(2));
    let session = DroneSession::new(mock.clone(), config);

    let started = tokio::time::Instant::now();
    let result = session.connect().await;

    assert!(matches!(
        result,
        Err(SessionError::DeviceNotFound { timeout_ms: 2000, .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(session.connection_state(), ConnectionState::Error);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_scanning_is_rejected() {
    let mock = MockTransport::new()
        .with_device(drone())
        .with_discovery_delay(Duration::from_secs(5));
    let session = Arc::new(new_session(&mock));

    let attempt = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.connect().await }
    });
    wait_for_state(&session, ConnectionState::Scanning).await;

    let second = session.connect().await;
    assert_eq!(
        second,
        Err(SessionError::AlreadyInProgress {
            state: ConnectionState::Scanning
        })
    );
    assert_eq!(session.connection_state(), ConnectionState::Scanning);

    // The first attempt is unaffected
    assert_eq!(attempt.await.unwrap(), Ok(drone()));
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(mock.call_count(MockOperation::Discover).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_connecting_is_rejected() {
    let mock = MockTransport::new()
        .with_device(drone())
        .with_connect_delay(Duration::from_secs(2));
    let session = Arc::new(new_session(&mock));

    let attempt = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.connect().await }
    });
    wait_for_state(&session, ConnectionState::Connecting).await;

    assert_eq!(
        session.connect().await,
        Err(SessionError::AlreadyInProgress {
            state: ConnectionState::Connecting
        })
    );
    assert_eq!(session.connection_state(), ConnectionState::Connecting);

    assert_eq!(attempt.await.unwrap(), Ok(drone()));
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(mock.call_count(MockOperation::Discover).await, 1);
    assert_eq!(mock.call_count(MockOperation::Connect).await, 1);
}

#[tokio::test]
async fn test_connect_while_connected_is_rejected() {
    let (mock, session) = connected_session().await;

    assert_eq!(session.connect().await, Err(SessionError::AlreadyConnected));
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(mock.call_count(MockOperation::Connect).await, 1);
}

#[tokio::test]
async fn test_subscribe_failure_releases_link_and_allows_retry() {
    let mock = MockTransport::new().with_device(drone());
    let session = new_session(&mock);
    mock.fail(MockOperation::Subscribe).await;

    let result = session.connect().await;

    assert!(matches!(result, Err(SessionError::ConnectionFailed { .. })));
    assert_eq!(session.connection_state(), ConnectionState::Error);
    assert_eq!(session.device().await, None);
    assert!(!mock.is_connected(&drone()).await);

    mock.recover(MockOperation::Subscribe).await;
    assert!(session.connect().await.is_ok());
    assert_eq!(session.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_link_failure_moves_to_error() {
    let mock = MockTransport::new().with_device(drone());
    let session = new_session(&mock);
    mock.fail(MockOperation::Connect).await;

    let result = session.connect().await;

    assert!(matches!(result, Err(SessionError::ConnectionFailed { .. })));
    assert_eq!(session.connection_state(), ConnectionState::Error);
    assert_eq!(mock.call_count(MockOperation::Subscribe).await, 0);
}

#[tokio::test]
async fn test_disconnect_twice_is_a_no_op() {
    let (mock, session) = connected_session().await;
    session.send_movement(MovementUpdate::new().with_throttle(throttle(60))).await.unwrap();

    assert_eq!(session.disconnect().await, DisconnectOutcome::Released);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(session.device().await, None);
    assert_eq!(session.throttle().await, Throttle::ZERO);
    assert!(!mock.is_connected(&drone()).await);

    assert_eq!(session.disconnect().await, DisconnectOutcome::AlreadyDisconnected);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(mock.call_count(MockOperation::Disconnect).await, 1);
}

#[tokio::test]
async fn test_disconnect_reports_release_warning() {
    let (mock, session) = connected_session().await;
    mock.fail(MockOperation::Disconnect).await;

    let outcome = session.disconnect().await;

    assert!(matches!(outcome, DisconnectOutcome::ReleasedWithWarning(ref reason)
        if reason.contains("disconnect")));
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(session.device().await, None);
}

#[tokio::test]
async fn test_disconnect_from_error_state() {
    let mock = MockTransport::new().with_device(drone());
    let session = new_session(&mock);
    mock.fail(MockOperation::Connect).await;
    let _ = session.connect().await;
    assert_eq!(session.connection_state(), ConnectionState::Error);

    assert_eq!(session.disconnect().await, DisconnectOutcome::Released);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_scan_cancels_attempt() {
    let mock = MockTransport::new()
        .with_device(drone())
        .with_discovery_delay(Duration::from_secs(5));
    let session = Arc::new(new_session(&mock));

    let attempt = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.connect().await }
    });
    wait_for_state(&session, ConnectionState::Scanning).await;

    assert_eq!(session.disconnect().await, DisconnectOutcome::Released);

    let result = attempt.await.unwrap();
    assert!(matches!(result, Err(SessionError::ConnectionFailed { .. })));
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(session.device().await, None);
    assert_eq!(mock.call_count(MockOperation::Connect).await, 0);
    assert_eq!(mock.call_count(MockOperation::StopScan).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting_releases_late_link() {
    let mock = MockTransport::new()
        .with_device(drone())
        .with_connect_delay(Duration::from_secs(2));
    let session = Arc::new(new_session(&mock));

    let attempt = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.connect().await }
    });
    wait_for_state(&session, ConnectionState::Connecting).await;

    assert_eq!(session.disconnect().await, DisconnectOutcome::Released);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    // The link comes up after the disconnect and is released again
    let result = attempt.await.unwrap();
    assert!(matches!(result, Err(SessionError::ConnectionFailed { .. })));
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(session.device().await, None);
    assert!(!mock.is_connected(&drone()).await);
    assert_eq!(mock.subscriber_count().await, 0);
    assert_eq!(mock.call_count(MockOperation::Subscribe).await, 1);
    assert_eq!(mock.call_count(MockOperation::Unsubscribe).await, 1);
    assert_eq!(mock.call_count(MockOperation::Disconnect).await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_disconnect_cancels_stale_scan() {
    let mock = MockTransport::new();
    let session = Arc::new(new_session(&mock));
    let started = tokio::time::Instant::now();

    let first = tokio::spawn({
        let session = Arc::clone(&session);
        async move {
            let result = session.connect().await;
            (result, started.elapsed())
        }
    });
    wait_for_state(&session, ConnectionState::Scanning).await;

    // The second attempt is already scanning when the first is next polled
    let (first, second) = tokio::join!(first, async {
        assert_eq!(session.disconnect().await, DisconnectOutcome::Released);
        session.connect().await
    });

    let (first, first_elapsed) = first.unwrap();
    assert!(matches!(first, Err(SessionError::ConnectionFailed { .. })));
    assert!(first_elapsed < Duration::from_secs(1));
    assert!(matches!(second, Err(SessionError::DeviceNotFound { .. })));
    assert_eq!(session.connection_state(), ConnectionState::Error);
    assert_eq!(mock.call_count(MockOperation::Discover).await, 2);
    // One from the disconnect, one from the second attempt's timeout
    assert_eq!(mock.call_count(MockOperation::StopScan).await, 2);
}

#[tokio::test]
async fn test_teardown_releases_link() {
    let (mock, session) = connected_session().await;

    assert_eq!(session.teardown().await, DisconnectOutcome::Released);
    assert!(!mock.is_connected(&drone()).await);
    assert_eq!(mock.subscriber_count().await, 0);
}

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_sends_refused_when_disconnected() {
    let mock = MockTransport::new().with_device(drone());
    let session = new_session(&mock);

    assert_sends_refused(&session, ConnectionState::Disconnected).await;
    assert!(mock.writes().await.is_empty());
}

#[tokio::test]
async fn test_sends_refused_in_error_state() {
    let mock = MockTransport::new().with_device(drone());
    let session = new_session(&mock);
    mock.fail(MockOperation::Connect).await;
    let _ = session.connect().await;

    assert_sends_refused(&session, ConnectionState::Error).await;
    assert!(mock.writes().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sends_refused_while_scanning() {
    let mock = MockTransport::new()
        .with_device(drone())
        .with_discovery_delay(Duration::from_secs(5));
    let session = Arc::new(new_session(&mock));

    let attempt = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.connect().await }
    });
    wait_for_state(&session, ConnectionState::Scanning).await;

    assert_sends_refused(&session, ConnectionState::Scanning).await;
    assert!(attempt.await.unwrap().is_ok());
    assert!(mock.writes().await.is_empty());
}

#[tokio::test]
async fn test_sends_refused_when_adapter_powered_off() {
    let (mock, session) = connected_session().await;
    mock.set_adapter_state(AdapterState::PoweredOff);

    let expected = SessionError::AdapterNotReady {
        state: AdapterState::PoweredOff,
    };
    assert_eq!(session.send_stop().await, Err(expected.clone()));
    let update = MovementUpdate::new().with_throttle(throttle(30));
    assert_eq!(session.send_movement(update).await, Err(expected.clone()));
    let pid = PidParams::default_for(PidAxis::Pitch);
    assert_eq!(session.send_pid(pid).await, Err(expected.clone()));
    assert_eq!(session.send_raw("RUN").await, Err(expected));
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert!(mock.writes().await.is_empty());

    mock.set_adapter_state(AdapterState::PoweredOn);
    session.send_stop().await.unwrap();
    assert_eq!(mock.writes().await, vec!["STOP"]);
}

#[tokio::test]
async fn test_movement_merges_remembered_throttle() {
    let (mock, session) = connected_session().await;

    session
        .send_movement(MovementUpdate::new().with_throttle(throttle(30)))
        .await
        .unwrap();
    let sent = session
        .send_movement(MovementUpdate::new().with_pitch(Tilt::new(10).unwrap()))
        .await
        .unwrap();

    assert_eq!(sent, DroneCommand::from_values(30, 10, 0, 0).unwrap());
    assert_eq!(session.throttle().await, throttle(30));
    assert_eq!(mock.writes().await, vec!["T30,P0,R0,Y0", "T30,P10,R0,Y0"]);
}

#[tokio::test]
async fn test_stop_resets_throttle() {
    let (mock, session) = connected_session().await;
    session
        .send_movement(MovementUpdate::new().with_throttle(throttle(80)))
        .await
        .unwrap();

    session.send_stop().await.unwrap();
    assert_eq!(session.throttle().await, Throttle::ZERO);

    session
        .send_movement(MovementUpdate::new().with_roll(Tilt::new(-5).unwrap()))
        .await
        .unwrap();
    assert_eq!(mock.writes().await, vec!["T80,P0,R0,Y0", "STOP", "T0,P0,R-5,Y0"]);
}

#[tokio::test]
async fn test_failed_write_keeps_state_and_throttle() {
    let (mock, session) = connected_session().await;
    mock.fail(MockOperation::Write).await;

    let result = session
        .send_movement(MovementUpdate::new().with_throttle(throttle(50)))
        .await;

    assert!(matches!(result, Err(SessionError::SendFailed { .. })));
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(session.throttle().await, Throttle::ZERO);

    mock.recover(MockOperation::Write).await;
    session
        .send_movement(MovementUpdate::new().with_throttle(throttle(20)))
        .await
        .unwrap();
    session.send_movement(MovementUpdate::new()).await.unwrap();
    assert_eq!(mock.writes().await, vec!["T20,P0,R0,Y0", "T20,P0,R0,Y0"]);
}

#[tokio::test]
async fn test_pid_wire_text() {
    let (mock, session) = connected_session().await;

    session
        .send_pid(PidParams::new(PidAxis::Roll, 2.0, 0.0, 2.0).unwrap())
        .await
        .unwrap();
    session.send_pid(PidParams::default_for(PidAxis::Yaw)).await.unwrap();

    assert_eq!(
        mock.writes().await,
        vec!["PID_ROLL 2.0 0.0 2.0", "PID_YAW 3.0 0.1 0.8"]
    );
}

#[tokio::test]
async fn test_profiles_gate_vocabularies() {
    let mock = MockTransport::new().with_device(drone());
    let config = DroneConfig::default().with_profile(CommandProfile::Axis);
    let session = DroneSession::new(mock.clone(), config);
    session.connect().await.unwrap();

    let result = session.send_discrete(DiscreteCommand::Forward).await;
    assert!(matches!(
        result,
        Err(SessionError::InvalidCommand(CommandError::NotInProfile { .. }))
    ));
    // STOP and PID tuning stay available
    session.send_discrete(DiscreteCommand::Stop).await.unwrap();
    session.send_pid(PidParams::default_for(PidAxis::Pitch)).await.unwrap();
    session.disconnect().await;

    let config = DroneConfig::default().with_profile(CommandProfile::Discrete);
    let session = DroneSession::new(mock.clone(), config);
    session.connect().await.unwrap();
    let result = session.send_movement(MovementUpdate::new()).await;
    assert!(matches!(
        result,
        Err(SessionError::InvalidCommand(CommandError::NotInProfile { .. }))
    ));
    session.send_discrete(DiscreteCommand::Level).await.unwrap();

    assert_eq!(
        mock.writes().await,
        vec!["STOP", "PID_PITCH 2.0 0.0 2.0", "PARALEL"]
    );
}

#[tokio::test]
async fn test_send_raw_parses_operator_input() {
    let (mock, session) = connected_session().await;

    assert_eq!(session.send_raw("T45,P0,R0,Y90").await.unwrap(), "T45,P0,R0,Y90");
    assert_eq!(session.throttle().await, throttle(45));
    assert_eq!(session.send_raw(" SET_deadband 0.5").await.unwrap(), "SET_DEADBAND 0.5");
    assert_eq!(session.send_raw("TEST2").await.unwrap(), "TEST2");
    assert_eq!(session.send_raw("FWD").await.unwrap(), "FWD");
    assert_eq!(session.send_raw("STOP").await.unwrap(), "STOP");
    assert_eq!(session.throttle().await, Throttle::ZERO);
    assert_eq!(
        session.send_raw("   ").await,
        Err(SessionError::InvalidCommand(CommandError::Empty))
    );

    assert_eq!(mock.writes().await.len(), 5);
}

#[tokio::test]
async fn test_send_parameter_validates_name() {
    let (mock, session) = connected_session().await;

    session.send_parameter("base_thr", 1500.0).await.unwrap();
    let result = session.send_parameter("bad name", 1.0).await;

    assert!(matches!(
        result,
        Err(SessionError::InvalidCommand(CommandError::InvalidParameterName(_)))
    ));
    assert_eq!(mock.writes().await, vec!["SET_BASE_THR 1500"]);
}

// ----------------------------------------------------------------------------
// Status and Adapter Observation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_status_notifications_update_current_status() {
    let (mock, session) = connected_session().await;
    let mut status = session.watch_status();

    mock.push_status("OK:Ready").await;
    status.changed().await.unwrap();

    let current = session.current_status().unwrap();
    assert_eq!(current.text(), "OK:Ready");
    assert_eq!(status.borrow().as_ref().map(|s| s.text().to_string()), Some("OK:Ready".into()));
}

#[tokio::test]
async fn test_invalid_utf8_status_becomes_empty_text() {
    let (mock, session) = connected_session().await;
    let mut status = session.watch_status();

    mock.push_raw(&[0xc3, 0x28]).await;
    status.changed().await.unwrap();

    assert_eq!(session.current_status().unwrap().text(), "");
}

#[tokio::test]
async fn test_echoed_commands_arrive_as_status() {
    let mock = MockTransport::new().with_device(drone()).with_echo(true);
    let session = new_session(&mock);
    session.connect().await.unwrap();
    let mut status = session.watch_status();

    session.send_pid(PidParams::default_for(PidAxis::Pitch)).await.unwrap();
    status.changed().await.unwrap();

    assert_eq!(session.current_status().unwrap().text(), "CMD_RX:PID_PITCH 2.0 0");
}

#[tokio::test]
async fn test_disconnect_clears_status_and_subscription() {
    let (mock, session) = connected_session().await;
    let mut status = session.watch_status();
    mock.push_status("OK:Armed").await;
    status.changed().await.unwrap();

    session.disconnect().await;

    assert_eq!(session.current_status(), None);
    assert_eq!(mock.subscriber_count().await, 0);
}

#[tokio::test]
async fn test_read_status() {
    let (mock, session) = connected_session().await;
    mock.set_read_value("I2C_DATA:Arduino_Loop:7").await;

    let message = session.read_status().await.unwrap();

    assert_eq!(message.text(), "I2C_DATA:Arduino_Loop:7");
    assert_eq!(session.current_status(), Some(message));
}

#[tokio::test]
async fn test_observe_adapter_state() {
    let mock = MockTransport::new();
    let session = new_session(&mock);
    let mut states = session.observe_adapter_state();

    assert_eq!(states.next().await, Some(AdapterState::PoweredOn));
    mock.set_adapter_state(AdapterState::PoweredOff);
    assert_eq!(states.next().await, Some(AdapterState::PoweredOff));
    assert_eq!(session.adapter_state().await, AdapterState::PoweredOff);

    // A new observer starts from the latest value
    let mut again = session.observe_adapter_state();
    assert_eq!(again.next().await, Some(AdapterState::PoweredOff));
}

#[tokio::test(start_paused = true)]
async fn test_scan_lists_advertising_devices() {
    let other = DeviceHandle::new("11:22:33:44:55:66", "Quad");
    let mock = MockTransport::new().with_device(drone()).with_device(other.clone());
    let session = new_session(&mock);

    let devices = session.scan().await.unwrap();

    assert_eq!(devices, vec![drone(), other]);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_scan_requires_ready_adapter() {
    let mock = MockTransport::new().with_adapter_state(AdapterState::Unauthorized);
    let session = new_session(&mock);

    assert_eq!(
        session.scan().await,
        Err(SessionError::AdapterNotReady {
            state: AdapterState::Unauthorized
        })
    );
}
