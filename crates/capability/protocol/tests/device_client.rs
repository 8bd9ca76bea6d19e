mod support;

use relay_protocol::{ConnectionState, DeviceClient, DeviceClientConfig, ProtocolError};
use support::{frame, Reply, ScriptedConnector};
use tokio_util::sync::CancellationToken;

const SAMPLE_FRAME: &str = "1,1.5,2.5,3.5,230,231,229,345,575,805,10,20,30";

fn client(connector: &ScriptedConnector) -> DeviceClient<ScriptedConnector> {
    DeviceClient::new(
        DeviceClientConfig::new("ws://meter.local/ws", "1234"),
        connector.clone(),
    )
}

fn handshake() -> Vec<Reply> {
    vec![frame("?,6"), frame("5,1")]
}

fn handshake_then(mut replies: Vec<Reply>) -> Vec<Reply> {
    let mut script = handshake();
    script.append(&mut replies);
    script
}

#[tokio::test]
async fn connect_runs_probe_then_authentication() {
    let connector = ScriptedConnector::new().with_connection(handshake());
    let mut client = client(&connector);

    client.connect(&CancellationToken::new()).await.expect("connect");

    assert_eq!(client.state(), ConnectionState::Authenticated);
    assert!(client.is_transport_open());
    assert_eq!(connector.sent(), vec!["?,6", "5,1234"]);
}

#[tokio::test]
async fn fetch_sample_parses_device_response() {
    let connector =
        ScriptedConnector::new().with_connection(handshake_then(vec![frame(SAMPLE_FRAME)]));
    let mut client = client(&connector);
    let cancel = CancellationToken::new();
    client.connect(&cancel).await.expect("connect");

    let sample = client.fetch_sample(&cancel).await.expect("sample");

    assert_eq!(sample.currents, [1.5, 2.5, 3.5]);
    assert_eq!(sample.voltages, [230.0, 231.0, 229.0]);
    assert_eq!(sample.power, [345.0, 575.0, 805.0]);
    assert_eq!(sample.phase_angles, [10.0, 20.0, 30.0]);
    assert_eq!(connector.sent().last().map(String::as_str), Some("?,1"));
}

#[tokio::test]
async fn fetch_on_closed_transport_reconnects_exactly_once() {
    let connector =
        ScriptedConnector::new().with_connection(handshake_then(vec![frame(SAMPLE_FRAME)]));
    let mut client = client(&connector);

    client
        .fetch_sample(&CancellationToken::new())
        .await
        .expect("sample");

    assert_eq!(connector.opens(), 1);
    assert_eq!(connector.sent(), vec!["?,6", "5,1234", "?,1"]);
    assert_eq!(client.state(), ConnectionState::Authenticated);
}

#[tokio::test]
async fn hangup_is_recovered_on_next_fetch() {
    let connector = ScriptedConnector::new()
        .with_connection(handshake_then(vec![Reply::Hangup]))
        .with_connection(handshake_then(vec![frame(SAMPLE_FRAME)]));
    let mut client = client(&connector);
    let cancel = CancellationToken::new();
    client.connect(&cancel).await.expect("connect");

    let err = client.fetch_sample(&cancel).await.unwrap_err();
    assert!(matches!(err, ProtocolError::TransportFailure(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_transport_open());

    client.fetch_sample(&cancel).await.expect("sample after reconnect");
    assert_eq!(connector.opens(), 2);
}

#[tokio::test]
async fn unexpected_probe_echo_is_invalid_handshake() {
    let connector = ScriptedConnector::new().with_connection(vec![frame("?,7")]);
    let mut client = client(&connector);

    let err = client.connect(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ProtocolError::InvalidHandshake { .. }));
    assert_ne!(client.state(), ConnectionState::Authenticated);
    assert!(!client.is_transport_open());
    // 探测失败后不会继续发送认证请求
    assert_eq!(connector.sent(), vec!["?,6"]);
}

#[tokio::test]
async fn rejected_pin_leaves_client_authenticating() {
    let connector = ScriptedConnector::new().with_connection(vec![frame("?,6"), frame("5,0")]);
    let mut client = client(&connector);
    let cancel = CancellationToken::new();

    let err = client.connect(&cancel).await.unwrap_err();
    assert!(matches!(err, ProtocolError::AuthenticationFailed));
    assert_eq!(client.state(), ConnectionState::Authenticating);

    // 传输仍然打开，因此不会隐式重连
    let err = client.fetch_sample(&cancel).await.unwrap_err();
    assert!(matches!(err, ProtocolError::NotAuthenticated));
    assert_eq!(connector.opens(), 1);
}

#[tokio::test]
async fn wrong_response_opcode_invalidates_connection() {
    let connector = ScriptedConnector::new()
        .with_connection(handshake_then(vec![frame("2,0")]))
        .with_connection(handshake_then(vec![frame(SAMPLE_FRAME)]));
    let mut client = client(&connector);
    let cancel = CancellationToken::new();
    client.connect(&cancel).await.expect("connect");

    let err = client.fetch_sample(&cancel).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ProtocolViolation { expected: '1', .. }));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.fetch_sample(&cancel).await.expect("sample after reconnect");
    assert_eq!(connector.opens(), 2);
}

#[tokio::test]
async fn malformed_payload_keeps_session() {
    let connector =
        ScriptedConnector::new().with_connection(handshake_then(vec![frame("1,a,b,c")]));
    let mut client = client(&connector);
    let cancel = CancellationToken::new();
    client.connect(&cancel).await.expect("connect");

    let err = client.fetch_sample(&cancel).await.unwrap_err();
    assert!(matches!(err, ProtocolError::MalformedPayload(_)));
    assert_eq!(client.state(), ConnectionState::Authenticated);
    assert!(client.is_transport_open());
}

#[tokio::test]
async fn refused_transport_ends_disconnected() {
    let connector = ScriptedConnector::new().with_refused_connection();
    let mut client = client(&connector);

    let err = client.connect(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ProtocolError::TransportFailure(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnect_tears_down_live_transport() {
    let connector = ScriptedConnector::new()
        .with_connection(handshake())
        .with_connection(handshake());
    let mut client = client(&connector);
    let cancel = CancellationToken::new();

    client.connect(&cancel).await.expect("first connect");
    client.connect(&cancel).await.expect("second connect");

    assert_eq!(connector.opens(), 2);
    assert_eq!(client.state(), ConnectionState::Authenticated);
}

#[tokio::test]
async fn cancelled_token_stops_before_opening() {
    let connector = ScriptedConnector::new().with_connection(handshake());
    let mut client = client(&connector);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client.connect(&cancel).await.unwrap_err();

    assert!(matches!(err, ProtocolError::Cancelled));
    assert_eq!(connector.opens(), 0);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
