//! The tracing engine: public API of the instrumentation runtime.
//!
//! The engine ties the subsystems together: configuration drives agent
//! launch, the agent connection gates tracing, and tracing rides the
//! ambient context across suspension points. Requests buffer their
//! telemetry and flush it to the connection in one ordered burst when
//! they stop.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::agent::{
    AgentConnection, AgentManager, AgentState, CacheDownloader, ConnectionEvent, Downloader,
};
use crate::config::{Config, UriReportingLevel};
use crate::context::{self, ContextFrame};
use crate::errors::{ApmError, Result};
use crate::events::EngineEvent;
use crate::meta::ApplicationMetadata;
use crate::protocol::message::EVENT_TYPE_METADATA;
use crate::protocol::{format_timestamp, ApiRequest};
use crate::scrub::{self, PathFilter};
use crate::stats::{self, StatsTicker};
use crate::trace::{ParentHandle, Request, Span};

/// Default window for opening the agent socket.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-global active engine. First writer wins; cleared on shutdown.
static ACTIVE: Mutex<Option<Weak<EngineInner>>> = Mutex::new(None);

/// Construction options for [`Engine`].
///
/// Everything has a usable default; embedders typically override the
/// downloader and the application metadata.
pub struct EngineOptions {
    /// Produces the core-agent binary path in launch mode.
    pub downloader: Arc<dyn Downloader>,
    /// Pre-built metadata; captured from configuration when absent.
    pub app_meta: Option<ApplicationMetadata>,
    /// Requests slower than this are tagged `slow_request`; zero disables.
    pub slow_request_threshold: Duration,
    /// Statistics sampling interval.
    pub statistics_interval: Duration,
    /// Window for opening the agent socket.
    pub connect_timeout: Duration,
    /// Scrubber used by `filter_request_path` at the `Path` level.
    pub scrub_path: PathFilter,
    /// Scrubber used by `filter_request_path` at the `FilteredParams` level.
    pub scrub_path_params: PathFilter,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            downloader: Arc::new(CacheDownloader),
            app_meta: None,
            slow_request_threshold: Duration::ZERO,
            statistics_interval: stats::DEFAULT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            scrub_path: Arc::new(|path| scrub::scrub_path(path)),
            scrub_path_params: Arc::new(|path| scrub::scrub_path_params(path)),
        }
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("slow_request_threshold", &self.slow_request_threshold)
            .field("statistics_interval", &self.statistics_interval)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

struct EngineInner {
    config: Arc<Config>,
    options: EngineOptions,
    manager: AgentManager,
    events: broadcast::Sender<EngineEvent>,
    setup_lock: AsyncMutex<()>,
    shutdown_flag: AtomicBool,
    panic_hook_installed: AtomicBool,
    panic_hook_armed: Arc<AtomicBool>,
    sync_request: Mutex<Option<Arc<Request>>>,
    sync_span: Mutex<Option<Arc<Span>>>,
    stats: Mutex<Option<StatsTicker>>,
}

/// The instrumentation engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Build an engine from a (partial) configuration and options.
    #[must_use]
    pub fn new(config: Config, options: EngineOptions) -> Self {
        let config = Arc::new(config);
        let manager = AgentManager::new(
            Arc::clone(&config),
            Arc::clone(&options.downloader),
            options.connect_timeout,
        );
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(EngineInner {
                config,
                options,
                manager,
                events,
                setup_lock: AsyncMutex::new(()),
                shutdown_flag: AtomicBool::new(false),
                panic_hook_installed: AtomicBool::new(false),
                panic_hook_armed: Arc::new(AtomicBool::new(false)),
                sync_request: Mutex::new(None),
                sync_span: Mutex::new(None),
                stats: Mutex::new(None),
            }),
        }
    }

    /// The process-global engine, if one has completed setup.
    #[must_use]
    pub fn active() -> Option<Self> {
        ACTIVE
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade))
            .map(|inner| Self { inner })
    }

    /// The engine's configuration resolver.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Bring the engine to ready: locate/launch the agent, connect,
    /// register, and start background tasks.
    ///
    /// Idempotent: once ready, later calls return immediately; concurrent
    /// callers serialize on an internal lock, so at most one spawn and one
    /// `Register` ever happen.
    ///
    /// # Errors
    ///
    /// Setup-path failures surface here: [`ApmError::Download`],
    /// [`ApmError::Spawn`], [`ApmError::InvalidConfiguration`],
    /// [`ApmError::ConnectionFailed`], [`ApmError::Disconnected`] after
    /// shutdown.
    pub async fn setup(&self) -> Result<()> {
        let _guard = self.inner.setup_lock.lock().await;
        self.setup_locked().await
    }

    /// Like [`setup`](Self::setup), but fails fast instead of waiting for
    /// an in-progress setup.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::InstanceNotReady`] while another caller holds
    /// the setup lock, plus everything `setup` can return.
    pub async fn setup_nonblocking(&self) -> Result<()> {
        let Ok(_guard) = self.inner.setup_lock.try_lock() else {
            return Err(ApmError::InstanceNotReady);
        };
        self.setup_locked().await
    }

    async fn setup_locked(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(ApmError::Disconnected);
        }
        match self.inner.manager.state() {
            AgentState::Ready => return Ok(()),
            AgentState::Failed => {
                return Err(ApmError::ConnectionFailed(
                    "previous setup attempt failed".into(),
                ))
            }
            _ => {}
        }

        let name = self.inner.config.name();
        let key = self.inner.config.key();
        if name.is_empty() {
            warn!("application name is empty; telemetry will not be attributable");
        }
        if key.is_empty() {
            warn!("agent key is empty; the backend will reject this application");
        }

        let connection = self.inner.manager.start().await?;

        let register = ApiRequest::Register {
            app: name,
            key,
            api_version: self.inner.config.api_version(),
        };
        let response = connection.send(register).await?;
        if !response.is_success() {
            warn!(result = %response.result, "agent rejected registration");
        }

        let meta = match &self.inner.options.app_meta {
            Some(meta) => meta.clone(),
            None => ApplicationMetadata::capture(&self.inner.config),
        };
        let event = ApiRequest::ApplicationEvent {
            event_type: EVENT_TYPE_METADATA.to_owned(),
            event_value: meta.to_event_value()?,
            source: format!("Pid: {}", std::process::id()),
            timestamp: format_timestamp(Utc::now()),
        };
        if let Err(err) = connection.send_async(event) {
            warn!(%err, "failed to enqueue application metadata");
        }

        self.install_panic_hook();
        claim_active(&self.inner);

        let ticker = StatsTicker::spawn(
            Arc::clone(&connection),
            self.inner.options.statistics_interval,
        );
        if let Ok(mut slot) = self.inner.stats.lock() {
            *slot = Some(ticker);
        }

        tokio::spawn(forward_events(
            connection.subscribe(),
            self.inner.events.clone(),
        ));
        self.emit(EngineEvent::AgentConnected);

        debug!("engine setup complete");
        Ok(())
    }

    /// Tear the engine down: stop the ticker, disarm the panic hook,
    /// disconnect, optionally stop the agent process, release the global
    /// slot, and emit [`EngineEvent::Shutdown`].
    ///
    /// Idempotent: later calls observe `is_shutdown()` and return.
    pub async fn shutdown(&self) {
        if self.inner.shutdown_flag.swap(true, Ordering::SeqCst) {
            return;
        }

        let ticker = self.inner.stats.lock().ok().and_then(|mut slot| slot.take());
        if let Some(ticker) = ticker {
            ticker.stop();
        }

        self.inner.panic_hook_armed.store(false, Ordering::SeqCst);

        self.inner
            .manager
            .stop(self.inner.config.allow_shutdown())
            .await;

        release_active(&self.inner);
        self.emit(EngineEvent::Shutdown);
        debug!("engine shut down");
    }

    /// Whether setup has completed and the engine can trace.
    #[must_use]
    pub fn has_agent(&self) -> bool {
        !self.is_shutdown() && self.inner.manager.state() == AgentState::Ready
    }

    /// Whether `shutdown` has run.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown_flag.load(Ordering::SeqCst)
    }

    // ── Tracing ──────────────────────────────────────────────────────────────

    /// Trace one top-level transaction around `f`.
    ///
    /// A fresh request is started, set on a new ambient frame, and stopped
    /// (and flushed) when the returned future resolves. The name is
    /// advisory — it is logged but not attached to the request body.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::NoAgentPresent`] before setup completes or
    /// [`ApmError::Disconnected`] after shutdown. Flush failures are
    /// logged, never surfaced.
    pub async fn transaction<F, Fut, T>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(Arc<Request>) -> Fut,
        Fut: Future<Output = T>,
    {
        let connection = self.ensure_ready()?;
        let request = Request::new();
        debug!(request_id = request.id(), transaction = name, "transaction started");

        let frame = ContextFrame::inherit();
        frame.set_request(Some(Arc::clone(&request)));
        frame.set_span(None);

        let output = context::in_frame(frame.clone(), f(Arc::clone(&request))).await;

        frame.set_request(None);
        frame.set_span(None);
        self.stop_request(&connection, &request);
        Ok(output)
    }

    /// Synchronous variant of [`transaction`](Self::transaction), using
    /// the engine's fallback slots instead of an async frame.
    ///
    /// # Errors
    ///
    /// Same as `transaction`.
    pub fn transaction_sync<F, T>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Arc<Request>) -> T,
    {
        let connection = self.ensure_ready()?;
        let request = Request::new();
        debug!(request_id = request.id(), transaction = name, "sync transaction started");

        set_slot(&self.inner.sync_request, Some(Arc::clone(&request)));
        let output = f(&request);
        set_slot(&self.inner.sync_request, None);
        set_slot(&self.inner.sync_span, None);

        self.stop_request(&connection, &request);
        Ok(output)
    }

    /// Instrument one sub-operation as a span under the current parent.
    ///
    /// The parent is the ambient span when one is open, else the ambient
    /// request. With no ambient request at all, a transaction is
    /// auto-created around this span and both finish together.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::NoAgentPresent`] before setup completes or
    /// [`ApmError::Disconnected`] after shutdown.
    pub async fn instrument<F, Fut, T>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(Arc<Span>) -> Fut,
        Fut: Future<Output = T>,
    {
        let connection = self.ensure_ready()?;

        if let Some(request) = context::current_request() {
            let parent = context::current_span();
            let span = request.start_child_span_of(operation, parent.as_deref());
            debug!(span_id = span.id(), operation, "span started");

            let frame = ContextFrame::inherit();
            frame.set_span(Some(Arc::clone(&span)));

            let output = context::in_frame(frame, f(Arc::clone(&span))).await;
            span.stop_now();
            return Ok(output);
        }

        // No ambient request: wrap this span in its own transaction.
        let request = Request::new();
        let span = request.start_child_span(operation);
        debug!(
            request_id = request.id(),
            span_id = span.id(),
            operation,
            "span started with auto-created transaction"
        );

        let frame = ContextFrame::inherit();
        frame.set_request(Some(Arc::clone(&request)));
        frame.set_span(Some(Arc::clone(&span)));

        let output = context::in_frame(frame, f(Arc::clone(&span))).await;
        span.stop_now();
        self.stop_request(&connection, &request);
        Ok(output)
    }

    /// Synchronous variant of [`instrument`](Self::instrument).
    ///
    /// Parent resolution prefers `parent`, then the sync span, the sync
    /// request, the ambient span, the ambient request; with none of those
    /// a synchronous transaction is auto-created around the span.
    ///
    /// # Errors
    ///
    /// Same as `instrument`.
    pub fn instrument_sync<F, T>(
        &self,
        operation: &str,
        f: F,
        parent: Option<ParentHandle>,
    ) -> Result<T>
    where
        F: FnOnce(&Arc<Span>) -> T,
    {
        let connection = self.ensure_ready()?;

        let resolved = self.resolve_sync_parent(parent);
        let (request, parent_span, auto_created) = match resolved {
            Some((request, parent_span)) => (request, parent_span, false),
            None => (Request::new(), None, true),
        };

        if auto_created {
            debug!(
                request_id = request.id(),
                operation, "sync span with auto-created transaction"
            );
            set_slot(&self.inner.sync_request, Some(Arc::clone(&request)));
        }

        let span = request.start_child_span_of(operation, parent_span.as_deref());
        set_slot(&self.inner.sync_span, Some(Arc::clone(&span)));

        let output = f(&span);

        span.stop_now();
        set_slot(&self.inner.sync_span, None);

        if auto_created {
            set_slot(&self.inner.sync_request, None);
            self.stop_request(&connection, &request);
        }
        Ok(output)
    }

    /// Attach a tag to the current (or given) parent.
    ///
    /// Targets the ambient span when one is open, else the ambient
    /// request, else the sync fallbacks; with no active trace the tag is
    /// dropped with a debug log. Tags flush with the owning request.
    pub fn add_context(&self, tag: &str, value: Value, parent: Option<ParentHandle>) {
        match parent {
            Some(ParentHandle::Span(span)) => span.add_tag(tag, value),
            Some(ParentHandle::Request(request)) => request.add_tag(tag, value),
            None => {
                if let Some(span) = context::current_span().or_else(|| slot(&self.inner.sync_span))
                {
                    span.add_tag(tag, value);
                } else if let Some(request) =
                    context::current_request().or_else(|| slot(&self.inner.sync_request))
                {
                    request.add_tag(tag, value);
                } else {
                    debug!(tag, "add_context with no active request, dropping tag");
                }
            }
        }
    }

    /// The current request, from the ambient frame or the sync fallback.
    #[must_use]
    pub fn get_current_request(&self) -> Option<Arc<Request>> {
        context::current_request().or_else(|| slot(&self.inner.sync_request))
    }

    /// The current innermost open span, from the ambient frame or the
    /// sync fallback.
    #[must_use]
    pub fn get_current_span(&self) -> Option<Arc<Span>> {
        context::current_span().or_else(|| slot(&self.inner.sync_span))
    }

    // ── Path policy ──────────────────────────────────────────────────────────

    /// Whether any configured ignore prefix is a prefix of `path`.
    ///
    /// Emits [`EngineEvent::IgnoredPathDetected`] on a match.
    #[must_use]
    pub fn ignores_path(&self, path: &str) -> bool {
        let ignored = self
            .inner
            .config
            .ignore()
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));
        if ignored {
            self.emit(EngineEvent::IgnoredPathDetected {
                path: path.to_owned(),
            });
        }
        ignored
    }

    /// Scrub `path` per the configured URI reporting level.
    #[must_use]
    pub fn filter_request_path(&self, path: &str) -> String {
        match self.inner.config.uri_reporting() {
            UriReportingLevel::FilteredParams => (self.inner.options.scrub_path_params)(path),
            UriReportingLevel::Path => (self.inner.options.scrub_path)(path),
            UriReportingLevel::None => path.to_owned(),
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn ensure_ready(&self) -> Result<Arc<AgentConnection>> {
        if self.is_shutdown() {
            return Err(ApmError::Disconnected);
        }
        if self.inner.manager.state() != AgentState::Ready {
            return Err(ApmError::NoAgentPresent);
        }
        self.inner.manager.connection().ok_or(ApmError::NoAgentPresent)
    }

    fn resolve_sync_parent(
        &self,
        parent: Option<ParentHandle>,
    ) -> Option<(Arc<Request>, Option<Arc<Span>>)> {
        match parent {
            Some(ParentHandle::Request(request)) => Some((request, None)),
            Some(ParentHandle::Span(span)) => match self.request_for_span(&span) {
                Some(request) => Some((request, Some(span))),
                None => {
                    debug!(
                        span_id = span.id(),
                        "parent span's request is gone, falling back to ambient parent"
                    );
                    self.resolve_sync_parent(None)
                }
            },
            None => {
                if let Some(span) = slot(&self.inner.sync_span) {
                    if let Some(request) = self.request_for_span(&span) {
                        return Some((request, Some(span)));
                    }
                }
                if let Some(request) = slot(&self.inner.sync_request) {
                    return Some((request, None));
                }
                if let Some(span) = context::current_span() {
                    if let Some(request) = self.request_for_span(&span) {
                        return Some((request, Some(span)));
                    }
                }
                context::current_request().map(|request| (request, None))
            }
        }
    }

    /// The live request a span belongs to, from the sync slot or the
    /// ambient frame. Spans hold ids, not references.
    fn request_for_span(&self, span: &Span) -> Option<Arc<Request>> {
        slot(&self.inner.sync_request)
            .into_iter()
            .chain(context::current_request())
            .find(|request| request.id() == span.request_id())
    }

    /// Stop a request and flush its telemetry. Never throws into the
    /// caller.
    fn stop_request(&self, connection: &AgentConnection, request: &Arc<Request>) {
        let stopped_at = Utc::now();
        if !request.mark_stopped(stopped_at) {
            return;
        }

        // Close any spans the instrumentation left open.
        for span in request.spans() {
            span.mark_stopped(stopped_at);
        }

        let threshold = self.inner.options.slow_request_threshold;
        if !threshold.is_zero() {
            if let Some(duration_ms) = request.duration_ms() {
                if duration_ms >= 0 && duration_ms as u128 >= threshold.as_millis() {
                    request.add_tag("slow_request", Value::Bool(true));
                }
            }
        }

        self.flush_request(connection, request);
    }

    /// Ship a stopped request's telemetry in wire order: `StartRequest`,
    /// per-span `StartSpan`/`TagSpan…`/`StopSpan` in start order, then
    /// `TagRequest`s, then `FinishRequest` last.
    fn flush_request(&self, connection: &AgentConnection, request: &Request) {
        if !self.inner.config.monitor() {
            let err = ApmError::MonitoringDisabled;
            warn!(request_id = request.id(), %err, "dropping request telemetry");
            return;
        }

        if request.is_ignored() {
            debug!(request_id = request.id(), "ignored request, skipping emission");
            self.emit(EngineEvent::IgnoredRequestProcessingSkipped {
                request_id: request.id().to_owned(),
            });
            return;
        }

        let request_id = request.id().to_owned();
        let finished_at = request.end_time().unwrap_or_else(Utc::now);
        let tag_time = format_timestamp(finished_at);

        let outcome: Result<()> = (|| {
            connection.send_async(ApiRequest::StartRequest {
                request_id: request_id.clone(),
                timestamp: format_timestamp(request.start_time()),
            })?;

            for span in request.spans() {
                connection.send_async(ApiRequest::StartSpan {
                    request_id: request_id.clone(),
                    span_id: span.id().to_owned(),
                    parent_id: span.parent_id().map(str::to_owned),
                    operation: span.operation().to_owned(),
                    timestamp: format_timestamp(span.start_time()),
                })?;
                for (tag, value) in span.tags() {
                    connection.send_async(ApiRequest::TagSpan {
                        request_id: request_id.clone(),
                        span_id: span.id().to_owned(),
                        tag,
                        value,
                        timestamp: tag_time.clone(),
                    })?;
                }
                connection.send_async(ApiRequest::StopSpan {
                    request_id: request_id.clone(),
                    span_id: span.id().to_owned(),
                    timestamp: format_timestamp(span.end_time().unwrap_or(finished_at)),
                })?;
            }

            for (tag, value) in request.tags() {
                connection.send_async(ApiRequest::TagRequest {
                    request_id: request_id.clone(),
                    tag,
                    value,
                    timestamp: tag_time.clone(),
                })?;
            }

            connection.send_async(ApiRequest::FinishRequest {
                request_id: request_id.clone(),
                timestamp: format_timestamp(finished_at),
            })
        })();

        match outcome {
            Ok(()) => {
                self.emit(EngineEvent::RequestSent { request_id });
            }
            Err(err) => {
                warn!(request_id = request.id(), %err, "failed to flush request telemetry");
            }
        }
    }

    /// Install the process-wide panic hook once per engine. The hook tags
    /// the current request with `error = true`, then defers to the
    /// previously installed hook (which re-raises by aborting unwind
    /// handling as usual).
    fn install_panic_hook(&self) {
        self.inner.panic_hook_armed.store(true, Ordering::SeqCst);
        if self.inner.panic_hook_installed.swap(true, Ordering::SeqCst) {
            return;
        }

        let armed = Arc::clone(&self.inner.panic_hook_armed);
        let weak = Arc::downgrade(&self.inner);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if armed.load(Ordering::SeqCst) {
                if let Some(inner) = weak.upgrade() {
                    let request = context::current_request().or_else(|| slot(&inner.sync_request));
                    if let Some(request) = request {
                        request.add_tag("error", Value::Bool(true));
                    }
                }
            }
            previous(info);
        }));
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.inner.manager.state())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

// ── Free helpers ──────────────────────────────────────────────────────────────

fn slot<T: Clone>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().ok().and_then(|guard| guard.clone())
}

fn set_slot<T>(slot: &Mutex<Option<T>>, value: Option<T>) {
    if let Ok(mut guard) = slot.lock() {
        *guard = value;
    }
}

/// Claim the process-global slot; first writer wins.
fn claim_active(inner: &Arc<EngineInner>) {
    if let Ok(mut active) = ACTIVE.lock() {
        let occupied = active.as_ref().is_some_and(|w| w.upgrade().is_some());
        if !occupied {
            *active = Some(Arc::downgrade(inner));
        }
    }
}

/// Release the process-global slot, but only if it still points at us.
fn release_active(inner: &Arc<EngineInner>) {
    if let Ok(mut active) = ACTIVE.lock() {
        let ours = active
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|current| Arc::ptr_eq(&current, inner));
        if ours {
            *active = None;
        }
    }
}

/// Map connection events into engine events until the connection's
/// broadcast closes.
async fn forward_events(
    mut rx: broadcast::Receiver<ConnectionEvent>,
    tx: broadcast::Sender<EngineEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(ConnectionEvent::Connected) => {
                let _ = tx.send(EngineEvent::AgentConnected);
            }
            Ok(ConnectionEvent::Disconnected) => {
                let _ = tx.send(EngineEvent::AgentDisconnected);
            }
            Ok(ConnectionEvent::ErrorReceived { message }) => {
                let _ = tx.send(EngineEvent::AgentError { message });
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "engine event forwarder lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
