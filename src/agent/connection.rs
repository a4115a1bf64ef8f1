//! The agent connection: one socket, strictly serialized round-trips.
//!
//! The protocol is half-duplex request/reply: each message written to the
//! agent is answered by exactly one framed response. A single worker task
//! owns the framed socket and drains a FIFO queue of envelopes, so
//! concurrent senders are serialized and submission order is preserved for
//! fire-and-forget sends.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::address::SocketAddress;
use crate::errors::{ApmError, Result};
use crate::protocol::{AgentResponse, ApiRequest, MessageCodec};

/// Events surfaced to connection subscribers.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Socket opened.
    Connected,
    /// Socket closed (orderly disconnect or failure).
    Disconnected,
    /// The agent rejected a message, or a round-trip failed.
    ErrorReceived {
        /// Failure detail.
        message: String,
    },
}

/// Marker for the boxed socket stream — Unix and TCP are interchangeable
/// behind it.
trait RawStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> RawStream for T {}

type AgentStream = Box<dyn RawStream>;

/// One queued message, with an optional reply slot for blocking sends.
struct Envelope {
    request: ApiRequest,
    reply: Option<oneshot::Sender<Result<AgentResponse>>>,
}

/// Handle to an open agent connection.
///
/// Cheap to clone-by-`Arc`; dropping the last handle does not close the
/// socket — call [`disconnect`](Self::disconnect).
#[derive(Debug)]
pub struct AgentConnection {
    queue: mpsc::UnboundedSender<Envelope>,
    events: broadcast::Sender<ConnectionEvent>,
    cancel: CancellationToken,
}

impl AgentConnection {
    /// Open the socket and start the connection worker.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::ConnectionFailed`] when the endpoint is
    /// unreachable or does not accept within `timeout`.
    pub async fn connect(address: &SocketAddress, timeout: Duration) -> Result<Self> {
        let stream: AgentStream = match address {
            SocketAddress::Unix(path) => {
                let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
                    .await
                    .map_err(|_| {
                        ApmError::ConnectionFailed(format!("timed out connecting to {address}"))
                    })?
                    .map_err(|e| {
                        ApmError::ConnectionFailed(format!("cannot connect to {address}: {e}"))
                    })?;
                Box::new(stream)
            }
            SocketAddress::Tcp(endpoint) => {
                let stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint))
                    .await
                    .map_err(|_| {
                        ApmError::ConnectionFailed(format!("timed out connecting to {address}"))
                    })?
                    .map_err(|e| {
                        ApmError::ConnectionFailed(format!("cannot connect to {address}: {e}"))
                    })?;
                Box::new(stream)
            }
        };

        let framed = Framed::new(stream, MessageCodec::new());
        let (queue, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        let cancel = CancellationToken::new();

        tokio::spawn(run_worker(framed, rx, events.clone(), cancel.clone()));

        debug!(%address, "agent connection established");
        let _ = events.send(ConnectionEvent::Connected);

        Ok(Self {
            queue,
            events,
            cancel,
        })
    }

    /// Subscribe to connection events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Send one message and await the agent's response.
    ///
    /// Concurrent callers are serialized in FIFO order; each send occupies
    /// the connection until its response arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::Disconnected`] when the connection is closed,
    /// or the round-trip's own error.
    pub async fn send(&self, request: ApiRequest) -> Result<AgentResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queue
            .send(Envelope {
                request,
                reply: Some(reply_tx),
            })
            .map_err(|_| ApmError::Disconnected)?;
        reply_rx.await.map_err(|_| ApmError::Disconnected)?
    }

    /// Enqueue one message for fire-and-forget delivery.
    ///
    /// Delivery order is preserved; round-trip failures are logged by the
    /// worker, not surfaced here.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::Disconnected`] when the connection is closed.
    pub fn send_async(&self, request: ApiRequest) -> Result<()> {
        self.queue
            .send(Envelope {
                request,
                reply: None,
            })
            .map_err(|_| ApmError::Disconnected)
    }

    /// Drain queued messages and close the socket.
    ///
    /// Idempotent; messages enqueued after this call fail with
    /// [`ApmError::Disconnected`].
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Whether the worker still accepts messages.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.queue.is_closed()
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

/// Connection worker: drains the envelope queue one round-trip at a time.
///
/// A failed round-trip is fatal: the worker replies the error, emits
/// `ErrorReceived`, and exits, closing the queue so later sends observe
/// `Disconnected`.
async fn run_worker(
    mut framed: Framed<AgentStream, MessageCodec>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    events: broadcast::Sender<ConnectionEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                // Orderly disconnect: flush what is already queued.
                rx.close();
                while let Ok(envelope) = rx.try_recv() {
                    if round_trip(&mut framed, envelope, &events).await.is_err() {
                        break;
                    }
                }
                break;
            }

            envelope = rx.recv() => {
                match envelope {
                    None => break,
                    Some(envelope) => {
                        if round_trip(&mut framed, envelope, &events).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    let _ = SinkExt::<ApiRequest>::close(&mut framed).await;
    let _ = events.send(ConnectionEvent::Disconnected);
    debug!("agent connection worker stopped");
}

/// Write one framed request and read its framed response.
///
/// Returns `Err(())` when the socket is no longer usable.
async fn round_trip(
    framed: &mut Framed<AgentStream, MessageCodec>,
    envelope: Envelope,
    events: &broadcast::Sender<ConnectionEvent>,
) -> std::result::Result<(), ()> {
    let kind = envelope.request.kind();

    let outcome: Result<AgentResponse> = async {
        framed.send(envelope.request).await?;
        match framed.next().await {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(e),
            None => Err(ApmError::Disconnected),
        }
    }
    .await;

    match outcome {
        Ok(response) => {
            if !response.is_success() {
                warn!(kind, result = %response.result, "agent rejected message");
                let _ = events.send(ConnectionEvent::ErrorReceived {
                    message: response
                        .message
                        .clone()
                        .unwrap_or_else(|| response.result.clone()),
                });
            }
            if let Some(reply) = envelope.reply {
                let _ = reply.send(Ok(response));
            }
            Ok(())
        }
        Err(err) => {
            warn!(kind, error = %err, "agent round-trip failed");
            let _ = events.send(ConnectionEvent::ErrorReceived {
                message: err.to_string(),
            });
            if let Some(reply) = envelope.reply {
                let _ = reply.send(Err(err));
            }
            Err(())
        }
    }
}
