//! Stats ticker tests: periodic samples on the wire and self-disabling
//! when the connection goes away.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scout_apm::agent::{AgentConnection, SocketAddress};
use scout_apm::protocol::ApiRequest;
use scout_apm::stats::StatsTicker;

use super::mock_agent::MockAgent;

#[tokio::test]
async fn each_tick_emits_memory_and_cpu_events() {
    let mock = MockAgent::spawn().await;
    let address = SocketAddress::Unix(PathBuf::from(mock.socket_path()));
    let connection = Arc::new(
        AgentConnection::connect(&address, Duration::from_secs(2))
            .await
            .expect("connect must succeed"),
    );

    let ticker = StatsTicker::spawn(Arc::clone(&connection), Duration::from_millis(50));

    let seen = mock.wait_for(2).await;
    ticker.stop();

    let mut event_types: Vec<String> = seen
        .iter()
        .filter_map(|m| match m {
            ApiRequest::ApplicationEvent { event_type, .. } => Some(event_type.clone()),
            _ => None,
        })
        .collect();
    event_types.sort();
    event_types.dedup();
    assert_eq!(
        event_types,
        vec!["CPUUtilizationPercent".to_owned(), "MemoryUsageMB".to_owned()],
        "each tick must sample both memory and CPU"
    );

    let memory = seen.iter().find_map(|m| match m {
        ApiRequest::ApplicationEvent {
            event_type,
            event_value,
            source,
            ..
        } if event_type == "MemoryUsageMB" => Some((event_value.clone(), source.clone())),
        _ => None,
    });
    let (value, source) = memory.expect("memory sample must be present");
    assert!(
        value.as_f64().is_some_and(|mb| mb > 0.0),
        "resident memory must be a positive number of megabytes, got: {value}"
    );
    assert!(source.starts_with("Pid: "), "got: {source}");
}

#[tokio::test]
async fn the_ticker_disables_itself_when_the_connection_closes() {
    let mock = MockAgent::spawn().await;
    let address = SocketAddress::Unix(PathBuf::from(mock.socket_path()));
    let connection = Arc::new(
        AgentConnection::connect(&address, Duration::from_secs(2))
            .await
            .expect("connect must succeed"),
    );

    let ticker = StatsTicker::spawn(Arc::clone(&connection), Duration::from_millis(50));

    connection.disconnect();

    // The next tick's send fails and the task exits on its own.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !ticker.is_finished() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "ticker must self-disable after the connection closes"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
