use std::sync::Arc;
use std::time::Duration;

use agilent_vacuum_dispatch::{
    CommandDescriptor, DataType, Decoding, DispatchConfig, DispatchError, Dispatcher, ErrorKind,
    Operation, Permission, Request, Value,
};
use agilent_vacuum_frame::{encode_frame, encode_result, Access, ResultCode};
use agilent_vacuum_transport::{MockEvent, MockReply, MockTransport};
use bytes::BytesMut;
use pretty_assertions::assert_eq;
use tokio::time::Instant;

const STATUS: CommandDescriptor = CommandDescriptor {
    operation: Operation::Status,
    name: "status",
    window: 205,
    data_type: DataType::Numeric,
    permission: Permission::ReadOnly,
    decoding: Decoding::Enumerated,
    description: "Pump status",
};

const START_STOP: CommandDescriptor = CommandDescriptor {
    operation: Operation::StartStop,
    name: "start_stop",
    window: 0,
    data_type: DataType::Logic,
    permission: Permission::ReadWrite,
    decoding: Decoding::Logic,
    description: "Start/stop",
};

const PRESSURE: CommandDescriptor = CommandDescriptor {
    operation: Operation::Pressure,
    name: "pressure",
    window: 224,
    data_type: DataType::Alphanumeric,
    permission: Permission::ReadOnly,
    decoding: Decoding::Physical,
    description: "Gauge pressure",
};

fn config() -> DispatchConfig {
    DispatchConfig {
        address: 0,
        response_timeout: Duration::from_millis(100),
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        drain_quiet: Duration::from_millis(20),
    }
}

fn data(address: u8, window: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(address, window, Access::Read, payload, &mut buf).unwrap();
    buf.to_vec()
}

fn code(code: ResultCode) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_result(0, code, &mut buf).unwrap();
    buf.to_vec()
}

fn dispatcher(mock: &MockTransport) -> Dispatcher {
    Dispatcher::new(Box::new(mock.clone()), config())
}

fn write_times(mock: &MockTransport) -> Vec<Instant> {
    mock.events()
        .into_iter()
        .filter_map(|event| match event {
            MockEvent::Write { at, .. } => Some(at),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn read_returns_decoded_value() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::bytes(data(0, 205, b"000005")));

    let value = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap();

    assert_eq!(value, Value::Integer(5));
    assert_eq!(mock.sent(), vec![data(0, 205, b"")]);
}

#[tokio::test(start_paused = true)]
async fn write_is_acknowledged() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::bytes(code(ResultCode::Ack)));

    let value = dispatcher(&mock)
        .dispatch(&START_STOP, Request::Write(Value::Logic(true)))
        .await
        .unwrap();

    assert_eq!(value, Value::Ack);
    let mut expected = BytesMut::new();
    encode_frame(0, 0, Access::Write, b"1", &mut expected).unwrap();
    assert_eq!(mock.sent(), vec![expected.to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn succeeds_within_retry_budget() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::silence());
    mock.push_reply(MockReply::silence());
    mock.push_reply(MockReply::bytes(data(0, 205, b"000000")));

    let value = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap();

    assert_eq!(value, Value::Integer(0));
    let times = write_times(&mock);
    assert_eq!(times.len(), 3);
    // timeout + first backoff, then timeout + doubled backoff
    assert_eq!(times[1] - times[0], Duration::from_millis(110));
    assert_eq!(times[2] - times[1], Duration::from_millis(120));
}

#[tokio::test(start_paused = true)]
async fn exhaustion_surfaces_one_com_error_after_exact_attempts() {
    let mock = MockTransport::new();

    let err = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap_err();

    match err {
        DispatchError::Com { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, DispatchError::Timeout(_)));
        }
        other => panic!("expected Com, got {other:?}"),
    }
    assert_eq!(mock.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn unbounded_backoff_saturates() {
    let mock = MockTransport::new();
    let config = DispatchConfig {
        initial_backoff: Duration::MAX,
        max_backoff: Duration::MAX,
        ..config()
    };

    let err = Dispatcher::new(Box::new(mock.clone()), config)
        .dispatch(&STATUS, Request::Read)
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Com { attempts: 3, .. }));
    assert_eq!(mock.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn window_disabled_is_not_retried() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::bytes(code(ResultCode::WindowDisabled)));
    mock.push_reply(MockReply::bytes(data(0, 224, b"1.0E-05")));

    let err = dispatcher(&mock).dispatch(&PRESSURE, Request::Read).await.unwrap_err();

    assert!(matches!(err, DispatchError::WindowDisabled { window: 224 }));
    assert_eq!(err.kind(), ErrorKind::WindowDisabled);
    assert_eq!(mock.sent().len(), 1);
    assert_eq!(mock.remaining_replies(), 1);
}

#[tokio::test(start_paused = true)]
async fn negative_result_codes_are_not_retried() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::bytes(code(ResultCode::OutOfRange)));

    let err = dispatcher(&mock)
        .dispatch(&START_STOP, Request::Write(Value::Logic(false)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Rejected {
            window: 0,
            code: ResultCode::OutOfRange
        }
    ));
    assert_eq!(mock.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn corrupt_reply_is_retried() {
    let mut corrupt = data(0, 205, b"000005");
    corrupt[8] ^= 0x01;
    let mock = MockTransport::new();
    mock.push_reply(MockReply::bytes(corrupt));
    mock.push_reply(MockReply::bytes(data(0, 205, b"000005")));

    let value = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap();

    assert_eq!(value, Value::Integer(5));
    assert_eq!(mock.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn partial_reply_is_retried() {
    let full = data(0, 205, b"000005");
    let mock = MockTransport::new();
    mock.push_reply(MockReply::bytes(&full[..7]));
    mock.push_reply(MockReply::bytes(&full));

    let value = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap();

    assert_eq!(value, Value::Integer(5));
    assert_eq!(mock.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn address_mismatch_is_retried() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::bytes(data(1, 205, b"000005")));
    mock.push_reply(MockReply::bytes(data(0, 205, b"000006")));

    let value = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap();

    assert_eq!(value, Value::Integer(6));
    assert_eq!(mock.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn persistent_address_mismatch_exhausts_retries() {
    let mock = MockTransport::new();
    for _ in 0..3 {
        mock.push_reply(MockReply::bytes(data(2, 205, b"000005")));
    }

    let err = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap_err();

    assert!(matches!(
        err.root_cause(),
        DispatchError::AddressMismatch {
            expected: 0,
            actual: 2
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Com);
}

#[tokio::test(start_paused = true)]
async fn eof_is_surfaced_without_retry() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::eof());

    let err = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap_err();

    assert!(matches!(err, DispatchError::Eof));
    assert_eq!(mock.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn undecodable_data_is_protocol_error_without_retry() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::bytes(data(0, 205, b"0000X5")));

    let err = dispatcher(&mock).dispatch(&STATUS, Request::Read).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(mock.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn read_only_write_is_refused_before_sending() {
    let mock = MockTransport::new();

    let err = dispatcher(&mock)
        .dispatch(&STATUS, Request::Write(Value::Integer(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::ReadOnly { name: "status" }));
    assert!(mock.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_dispatches_never_overlap() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::after(
        Duration::from_millis(50),
        data(0, 205, b"000005"),
    ));
    mock.push_reply(MockReply::after(
        Duration::from_millis(10),
        data(0, 224, b"2.0E-07"),
    ));

    let dispatcher = Arc::new(dispatcher(&mock));
    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(&STATUS, Request::Read).await })
    };
    tokio::task::yield_now().await;
    let second = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(&PRESSURE, Request::Read).await })
    };

    assert_eq!(first.await.unwrap().unwrap(), Value::Integer(5));
    assert_eq!(second.await.unwrap().unwrap(), Value::Float(2.0e-7));

    let kinds: Vec<&str> = mock
        .events()
        .iter()
        .map(|event| match event {
            MockEvent::Write { .. } => "write",
            MockEvent::Read { .. } => "read",
            MockEvent::Cleared { .. } => "cleared",
            MockEvent::Closed => "closed",
        })
        .collect();
    assert_eq!(kinds, vec!["write", "read", "write", "read"]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_exchange_does_not_leak_into_next() {
    let mock = MockTransport::new();
    mock.push_reply(MockReply::after(
        Duration::from_millis(60),
        data(0, 205, b"000001"),
    ));
    mock.push_reply(MockReply::bytes(data(0, 205, b"000005")));
    let dispatcher = dispatcher(&mock);

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), dispatcher.dispatch(&STATUS, Request::Read))
            .await;
    assert!(abandoned.is_err());

    let value = dispatcher.dispatch(&STATUS, Request::Read).await.unwrap();

    assert_eq!(value, Value::Integer(5));
    assert_eq!(mock.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn closed_session_refuses_commands() {
    let mock = MockTransport::new();
    let dispatcher = dispatcher(&mock);

    dispatcher.close().await.unwrap();

    assert!(!dispatcher.is_open().await);
    let err = dispatcher.dispatch(&STATUS, Request::Read).await.unwrap_err();
    assert!(matches!(err, DispatchError::Closed));
    assert!(mock.sent().is_empty());
}
