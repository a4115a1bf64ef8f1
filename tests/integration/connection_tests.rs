//! Integration tests for the agent connection: round-trips, FIFO
//! ordering, and failure modes, against the in-test mock agent.

use std::path::PathBuf;
use std::time::Duration;

use scout_apm::agent::{AgentConnection, SocketAddress};
use scout_apm::protocol::ApiRequest;
use scout_apm::ApmError;

use super::mock_agent::MockAgent;

const TIMEOUT: Duration = Duration::from_secs(2);

fn register() -> ApiRequest {
    ApiRequest::Register {
        app: "demo".to_owned(),
        key: "K".to_owned(),
        api_version: "1.0".to_owned(),
    }
}

fn start_request(id: &str) -> ApiRequest {
    ApiRequest::StartRequest {
        request_id: id.to_owned(),
        timestamp: "2024-05-01T12:00:00.000Z".to_owned(),
    }
}

#[tokio::test]
async fn send_round_trips_and_reports_success() {
    let mock = MockAgent::spawn().await;
    let address = SocketAddress::Unix(PathBuf::from(mock.socket_path()));
    let connection = AgentConnection::connect(&address, TIMEOUT)
        .await
        .expect("connect must succeed");

    let response = connection.send(register()).await.expect("send must succeed");
    assert!(response.is_success());
    assert_eq!(response.kind, "Register");

    let seen = mock.wait_for(1).await;
    assert!(matches!(seen[0], ApiRequest::Register { ref app, .. } if app == "demo"));
}

#[tokio::test]
async fn send_async_preserves_submission_order() {
    let mock = MockAgent::spawn().await;
    let address = SocketAddress::Unix(PathBuf::from(mock.socket_path()));
    let connection = AgentConnection::connect(&address, TIMEOUT)
        .await
        .expect("connect must succeed");

    for i in 0..10 {
        connection
            .send_async(start_request(&format!("req-{i}")))
            .expect("enqueue must succeed");
    }

    let seen = mock.wait_for(10).await;
    for (i, request) in seen.iter().enumerate() {
        let expected = format!("req-{i}");
        assert!(
            matches!(request, ApiRequest::StartRequest { request_id, .. } if *request_id == expected),
            "position {i} must hold {expected}, got: {request:?}"
        );
    }
}

#[tokio::test]
async fn connect_to_a_dead_endpoint_fails() {
    let address = SocketAddress::Unix(PathBuf::from("/tmp/definitely-not-a-real-agent.sock"));
    let err = AgentConnection::connect(&address, TIMEOUT)
        .await
        .expect_err("connect must fail");
    assert!(matches!(err, ApmError::ConnectionFailed(_)), "got: {err:?}");
}

#[tokio::test]
async fn sends_after_disconnect_observe_disconnected() {
    let mock = MockAgent::spawn().await;
    let address = SocketAddress::Unix(PathBuf::from(mock.socket_path()));
    let connection = AgentConnection::connect(&address, TIMEOUT)
        .await
        .expect("connect must succeed");

    connection.disconnect();
    // Let the worker finish its drain and drop the queue.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = connection
        .send(register())
        .await
        .expect_err("send after disconnect must fail");
    assert!(matches!(err, ApmError::Disconnected), "got: {err:?}");
    assert!(!connection.is_open());
}

#[tokio::test]
async fn disconnect_drains_already_queued_messages() {
    let mock = MockAgent::spawn().await;
    let address = SocketAddress::Unix(PathBuf::from(mock.socket_path()));
    let connection = AgentConnection::connect(&address, TIMEOUT)
        .await
        .expect("connect must succeed");

    for i in 0..5 {
        connection
            .send_async(start_request(&format!("req-{i}")))
            .expect("enqueue must succeed");
    }
    connection.disconnect();

    let seen = mock.wait_for(5).await;
    assert_eq!(seen.len(), 5, "queued messages must be flushed on disconnect");
}

#[tokio::test]
async fn probe_reports_endpoint_liveness() {
    let mock = MockAgent::spawn().await;
    let live = SocketAddress::Unix(PathBuf::from(mock.socket_path()));
    assert!(live.probe().await);

    let dead = SocketAddress::Unix(PathBuf::from("/tmp/definitely-not-a-real-agent.sock"));
    assert!(!dead.probe().await);
}
