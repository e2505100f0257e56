use std::time::Duration;

use agilent_vacuum_dispatch::{DispatchConfig, DispatchError, ErrorKind};
use agilent_vacuum_frame::{encode_frame, encode_result, Access, ResultCode};
use agilent_vacuum_pumps::{
    DriverConfig, DriverError, DriverState, IonErrors, IpcMiniDriver, PressureUnit, PumpStatus,
    TwisTorr74Driver,
};
use agilent_vacuum_transport::{MockConnector, MockReply, MockTransport, Transport};
use bytes::BytesMut;
use pretty_assertions::assert_eq;

fn config() -> DriverConfig {
    DriverConfig {
        dispatch: DispatchConfig {
            response_timeout: Duration::from_millis(100),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            ..DispatchConfig::default()
        },
        pressure_unit: None,
    }
}

fn frame(window: u16, access: Access, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(0, window, access, payload, &mut buf).unwrap();
    buf.to_vec()
}

fn read(window: u16) -> Vec<u8> {
    frame(window, Access::Read, b"")
}

fn write(window: u16, payload: &[u8]) -> Vec<u8> {
    frame(window, Access::Write, payload)
}

fn reply(window: u16, payload: &[u8]) -> MockReply {
    MockReply::bytes(frame(window, Access::Read, payload))
}

fn numeric(window: u16, value: u32) -> MockReply {
    reply(window, format!("{value:06}").as_bytes())
}

fn result(code: ResultCode) -> MockReply {
    let mut buf = BytesMut::new();
    encode_result(0, code, &mut buf).unwrap();
    MockReply::bytes(buf)
}

fn ack() -> MockReply {
    result(ResultCode::Ack)
}

fn turbo() -> (TwisTorr74Driver, MockConnector) {
    let connector = MockConnector::new(MockTransport::named("turbo"));
    (TwisTorr74Driver::new(connector.clone(), config()), connector)
}

fn push_turbo_handshake(mock: &MockTransport) {
    mock.push_reply(numeric(205, 0));
    mock.push_reply(numeric(206, 0));
    mock.push_reply(numeric(163, 0));
}

async fn connected_turbo() -> (TwisTorr74Driver, MockConnector) {
    let (pump, connector) = turbo();
    push_turbo_handshake(connector.transport());
    pump.connect().await.unwrap();
    assert_eq!(pump.state(), DriverState::Idle);
    (pump, connector)
}

#[tokio::test(start_paused = true)]
async fn connect_start_status_stop_pressure() {
    let (pump, connector) = connected_turbo().await;
    let mock = connector.transport();
    assert_eq!(pump.pressure_unit(), PressureUnit::MBar);

    mock.push_reply(ack());
    pump.start().await.unwrap();
    assert_eq!(pump.state(), DriverState::Running);

    mock.push_reply(numeric(205, 5));
    assert_eq!(pump.get_status().await.unwrap(), PumpStatus::Normal);

    mock.push_reply(ack());
    pump.stop().await.unwrap();
    assert_eq!(pump.state(), DriverState::Idle);

    mock.push_reply(result(ResultCode::WindowDisabled));
    let err = pump.read_pressure().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WindowDisabled);
    assert_eq!(pump.state(), DriverState::Idle);

    assert_eq!(
        mock.sent(),
        vec![
            read(205),
            read(206),
            read(163),
            write(0, b"1"),
            read(205),
            write(0, b"0"),
            read(224),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn start_while_running_sends_nothing() {
    let (pump, connector) = connected_turbo().await;
    connector.transport().push_reply(ack());

    pump.start().await.unwrap();
    pump.start().await.unwrap();

    assert_eq!(pump.state(), DriverState::Running);
    assert_eq!(connector.transport().sent().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_operations_check_state() {
    let (pump, connector) = turbo();

    let err = pump.start().await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::InvalidState {
            operation: "start",
            state: DriverState::Disconnected
        }
    ));
    assert!(matches!(
        pump.get_status().await,
        Err(DriverError::InvalidState { .. })
    ));

    push_turbo_handshake(connector.transport());
    pump.connect().await.unwrap();

    assert!(matches!(
        pump.stop().await,
        Err(DriverError::InvalidState {
            operation: "stop",
            state: DriverState::Idle
        })
    ));
    assert!(matches!(
        pump.connect().await,
        Err(DriverError::InvalidState {
            operation: "connect",
            ..
        })
    ));
    assert_eq!(connector.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fault_the_driver_until_reconnect() {
    let (pump, connector) = connected_turbo().await;
    let mock = connector.transport();

    let err = pump.get_status().await.unwrap_err();
    match err.dispatch_error() {
        Some(DispatchError::Com { attempts, source }) => {
            assert_eq!(*attempts, 3);
            assert!(matches!(**source, DispatchError::Timeout(_)));
        }
        other => panic!("expected Com, got {other:?}"),
    }
    assert_eq!(pump.state(), DriverState::Faulted);
    assert!(!mock.is_open());
    assert_eq!(mock.sent().len(), 6);

    assert!(matches!(
        pump.read_pressure().await,
        Err(DriverError::InvalidState {
            state: DriverState::Faulted,
            ..
        })
    ));

    push_turbo_handshake(mock);
    pump.connect().await.unwrap();
    assert_eq!(pump.state(), DriverState::Idle);
    assert_eq!(connector.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_status_code_is_protocol_error() {
    let (pump, connector) = connected_turbo().await;
    connector.transport().push_reply(numeric(205, 9));

    let err = pump.get_status().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(connector.transport().sent().len(), 4);
    assert_eq!(pump.state(), DriverState::Idle);
}

#[tokio::test(start_paused = true)]
async fn failed_open_leaves_driver_disconnected() {
    let (pump, connector) = turbo();
    connector.fail_next_open(std::io::ErrorKind::NotFound);

    let err = pump.connect().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Com);
    assert!(matches!(
        err.dispatch_error().map(DispatchError::root_cause),
        Some(DispatchError::Transport(_))
    ));
    assert_eq!(pump.state(), DriverState::Disconnected);
    assert_eq!(connector.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn eof_during_handshake_closes_session() {
    let (pump, connector) = turbo();
    connector.transport().push_reply(MockReply::eof());

    let err = pump.connect().await.unwrap_err();

    assert!(matches!(err.dispatch_error(), Some(DispatchError::Eof)));
    assert_eq!(pump.state(), DriverState::Disconnected);
    assert!(!connector.transport().is_open());
    assert_eq!(connector.transport().sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn eof_while_connected_faults_the_driver() {
    let (pump, connector) = connected_turbo().await;
    connector.transport().push_reply(MockReply::eof());

    let err = pump.read_pressure().await.unwrap_err();

    assert!(matches!(err.dispatch_error(), Some(DispatchError::Eof)));
    assert_eq!(pump.state(), DriverState::Faulted);
    assert!(!connector.transport().is_open());
    assert_eq!(connector.transport().sent().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn hangup_mid_reply_faults_the_driver() {
    let (pump, connector) = connected_turbo().await;
    let partial = frame(205, Access::Read, b"000005");
    connector
        .transport()
        .push_reply(MockReply::bytes(&partial[..6]).then_eof(Duration::from_millis(5)));

    let err = pump.get_status().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Eof);
    assert_eq!(pump.state(), DriverState::Faulted);
    assert!(!connector.transport().is_open());
}

#[tokio::test(start_paused = true)]
async fn connect_hook_runs_after_configuration() {
    let connector = MockConnector::new(MockTransport::named("turbo"));
    let pump = TwisTorr74Driver::new(connector.clone(), config())
        .with_on_connect(|d| Box::pin(async move { d.set_soft_start(true).await }));
    let mock = connector.transport();
    push_turbo_handshake(mock);
    mock.push_reply(ack());

    pump.connect().await.unwrap();

    assert_eq!(pump.state(), DriverState::Idle);
    assert_eq!(
        mock.sent(),
        vec![read(205), read(206), read(163), write(100, b"1")]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_connect_hook_abandons_the_session() {
    let connector = MockConnector::new(MockTransport::named("turbo"));
    let pump = TwisTorr74Driver::new(connector.clone(), config())
        .with_on_connect(|d| Box::pin(async move { d.set_soft_start(true).await }));
    let mock = connector.transport();
    push_turbo_handshake(mock);
    mock.push_reply(result(ResultCode::OutOfRange));

    let err = pump.connect().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(pump.state(), DriverState::Disconnected);
    assert!(!mock.is_open());
    assert_eq!(mock.sent().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_idempotent() {
    let (pump, connector) = connected_turbo().await;

    pump.disconnect().await.unwrap();
    pump.disconnect().await.unwrap();

    assert_eq!(pump.state(), DriverState::Disconnected);
    assert!(!connector.transport().is_open());
}

#[tokio::test(start_paused = true)]
async fn set_pressure_unit_writes_device_code() {
    let (pump, connector) = connected_turbo().await;
    connector.transport().push_reply(ack());

    let unit = pump.set_pressure_unit(PressureUnit::Pa).await.unwrap();

    assert_eq!(unit, PressureUnit::Pa);
    assert_eq!(pump.pressure_unit(), PressureUnit::Pa);
    assert_eq!(connector.transport().sent().last(), Some(&write(163, b"000001")));

    let err = pump.set_pressure_unit(PressureUnit::Unknown).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(connector.transport().sent().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn turbo_readings() {
    let (pump, connector) = connected_turbo().await;
    let mock = connector.transport();
    mock.push_reply(numeric(203, 1167));
    mock.push_reply(numeric(204, 35));
    mock.push_reply(reply(100, b"1"));

    assert_eq!(pump.read_turbo_speed().await.unwrap(), 1167);
    assert_eq!(pump.read_pump_temperature().await.unwrap(), 35);
    assert!(pump.soft_start().await.unwrap());
}

fn ion(pressure_unit: Option<PressureUnit>) -> (IpcMiniDriver, MockConnector) {
    let connector = MockConnector::new(MockTransport::named("ion"));
    let config = DriverConfig {
        pressure_unit,
        ..config()
    };
    (IpcMiniDriver::new(connector.clone(), config), connector)
}

#[tokio::test(start_paused = true)]
async fn ipc_mini_applies_configured_unit() {
    let (pump, connector) = ion(Some(PressureUnit::Torr));
    let mock = connector.transport();
    mock.push_reply(reply(319, b"IPCMINI"));
    mock.push_reply(numeric(206, 0));
    mock.push_reply(ack());

    pump.connect().await.unwrap();

    assert_eq!(pump.pressure_unit(), PressureUnit::Torr);
    assert_eq!(
        mock.sent(),
        vec![read(319), read(206), write(600, b"000000")]
    );

    mock.push_reply(numeric(206, 0x20));
    assert_eq!(pump.get_error().await.unwrap(), IonErrors::INTERLOCK_CABLE);

    mock.push_reply(reply(812, b"2.3E-09"));
    assert_eq!(pump.read_pressure().await.unwrap(), 2.3e-9);
}

#[tokio::test(start_paused = true)]
async fn ipc_mini_tolerates_disabled_unit_window() {
    let (pump, connector) = ion(None);
    let mock = connector.transport();
    mock.push_reply(reply(319, b"IPCMINI"));
    mock.push_reply(numeric(206, 0));
    mock.push_reply(result(ResultCode::WindowDisabled));

    pump.connect().await.unwrap();

    assert_eq!(pump.state(), DriverState::Idle);
    assert_eq!(pump.pressure_unit(), PressureUnit::Unknown);
}

#[tokio::test(start_paused = true)]
async fn ipc_mini_identity_and_label() {
    let (pump, connector) = ion(None);
    let mock = connector.transport();
    mock.push_reply(reply(319, b"IPCMINI"));
    mock.push_reply(numeric(206, 0));
    mock.push_reply(numeric(600, 1));
    pump.connect().await.unwrap();
    assert_eq!(pump.pressure_unit(), PressureUnit::MBar);

    mock.push_reply(reply(319, b"IPCMINI"));
    mock.push_reply(reply(323, b"IT1234A567"));
    mock.push_reply(ack());
    assert_eq!(pump.controller_model().await.unwrap(), "IPCMINI");
    assert_eq!(pump.serial_number().await.unwrap(), "IT1234A567");
    pump.set_label("PUMP 1").await.unwrap();
    assert_eq!(mock.sent().last(), Some(&write(890, b"PUMP 1")));

    mock.push_reply(ack());
    pump.start().await.unwrap();
    assert_eq!(mock.sent().last(), Some(&write(11, b"1")));
}
