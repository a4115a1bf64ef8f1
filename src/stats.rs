//! Periodic process statistics reported to the agent.
//!
//! A background task samples the process's resident memory and CPU
//! utilization on a fixed interval and ships each sample as an
//! application event. The task self-disables when the connection stops
//! accepting messages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::AgentConnection;
use crate::protocol::message::{EVENT_TYPE_CPU_PERCENT, EVENT_TYPE_MEMORY_MB};
use crate::protocol::{format_timestamp, ApiRequest};

/// Default sampling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to the running sampler task.
#[derive(Debug)]
pub struct StatsTicker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl StatsTicker {
    /// Spawn the sampler.
    #[must_use]
    pub fn spawn(connection: Arc<AgentConnection>, every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(connection, every, cancel.clone()));
        Self { cancel, handle }
    }

    /// Stop the sampler. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the sampler task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Sampler loop.
///
/// CPU utilization is the percentage since the previous sample, which is
/// why one `System` persists across ticks; the first tick after spawn
/// therefore reports 0% CPU.
async fn run(connection: Arc<AgentConnection>, every: Duration, cancel: CancellationToken) {
    let mut system = System::new();
    let pid = Pid::from_u32(std::process::id());

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of a tokio interval fires immediately; the interval
    // semantics here are "first sample after one period".
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("stats ticker: cancelled");
                break;
            }

            _ = ticker.tick() => {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                let Some(process) = system.process(pid) else {
                    continue;
                };

                let memory_mb = process.memory() as f64 / (1024.0 * 1024.0);
                let cpu_percent = f64::from(process.cpu_usage());
                let timestamp = format_timestamp(Utc::now());
                let source = format!("Pid: {}", std::process::id());

                let samples = [
                    (EVENT_TYPE_MEMORY_MB, memory_mb),
                    (EVENT_TYPE_CPU_PERCENT, cpu_percent),
                ];
                for (event_type, value) in samples {
                    let event = ApiRequest::ApplicationEvent {
                        event_type: event_type.to_owned(),
                        event_value: json!(value),
                        source: source.clone(),
                        timestamp: timestamp.clone(),
                    };
                    if connection.send_async(event).is_err() {
                        info!("stats ticker: connection closed, disabling");
                        return;
                    }
                }
                debug!(memory_mb, cpu_percent, "process statistics sampled");
            }
        }
    }
}
