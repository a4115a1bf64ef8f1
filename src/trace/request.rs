//! The request record: one top-level traced transaction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::trace::span::Span;

/// Callback fired once when a request or span stops.
pub type StopCallback = Box<dyn FnOnce() + Send>;

/// One top-level traced transaction.
///
/// Telemetry (tags, spans) accumulates on the request and is flushed to
/// the agent in one ordered burst when the request stops; the stop latch
/// guarantees at-most-once flushing.
pub struct Request {
    id: String,
    start: DateTime<Utc>,
    end: Mutex<Option<DateTime<Utc>>>,
    tags: Mutex<Vec<(String, Value)>>,
    spans: Mutex<Vec<Arc<Span>>>,
    ignored: AtomicBool,
    stopped: AtomicBool,
    on_stop: Mutex<Option<StopCallback>>,
}

impl Request {
    /// Start a new request now.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: format!("req-{}", Uuid::new_v4()),
            start: Utc::now(),
            end: Mutex::new(None),
            tags: Mutex::new(Vec::new()),
            spans: Mutex::new(Vec::new()),
            ignored: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            on_stop: Mutex::new(None),
        })
    }

    /// Unique identifier, `req-<uuid>`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the request started.
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    /// When the request stopped, if it has.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end.lock().ok().and_then(|e| *e)
    }

    /// Milliseconds between start and stop, once stopped.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time()
            .map(|end| (end - self.start).num_milliseconds())
    }

    /// Attach a tag. Last write wins for a repeated tag name.
    pub fn add_tag(&self, tag: &str, value: Value) {
        if let Ok(mut tags) = self.tags.lock() {
            if let Some(existing) = tags.iter_mut().find(|(name, _)| name == tag) {
                existing.1 = value;
            } else {
                tags.push((tag.to_owned(), value));
            }
        }
    }

    /// Accumulated tags, in first-set order.
    #[must_use]
    pub fn tags(&self) -> Vec<(String, Value)> {
        self.tags.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Start a child span directly under the request.
    #[must_use]
    pub fn start_child_span(self: &Arc<Self>, operation: &str) -> Arc<Span> {
        self.start_child_span_of(operation, None)
    }

    /// Start a child span under `parent`, or under the request when absent.
    #[must_use]
    pub fn start_child_span_of(
        self: &Arc<Self>,
        operation: &str,
        parent: Option<&Span>,
    ) -> Arc<Span> {
        let span = Span::new(
            &self.id,
            operation,
            parent.map(|p| p.id().to_owned()),
            self.is_ignored(),
        );
        if let Ok(mut spans) = self.spans.lock() {
            spans.push(Arc::clone(&span));
        }
        span
    }

    /// Accumulated spans, in start order.
    #[must_use]
    pub fn spans(&self) -> Vec<Arc<Span>> {
        self.spans.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Whether this request is excluded from the wire.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored.load(Ordering::SeqCst)
    }

    /// Mark the request (and its future spans) ignored.
    pub fn set_ignored(&self, ignored: bool) {
        self.ignored.store(ignored, Ordering::SeqCst);
        if let Ok(spans) = self.spans.lock() {
            for span in spans.iter() {
                span.set_ignored(ignored);
            }
        }
    }

    /// Whether the request has stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Register a callback fired once when the request stops.
    pub fn on_stop(&self, callback: StopCallback) {
        if let Ok(mut slot) = self.on_stop.lock() {
            *slot = Some(callback);
        }
    }

    /// Latch the stop: record the end time and fire `on_stop`.
    ///
    /// Returns true on the first call only; repeated stops are no-ops, so
    /// telemetry is flushed at most once.
    pub(crate) fn mark_stopped(&self, at: DateTime<Utc>) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Ok(mut end) = self.end.lock() {
            end.get_or_insert(at);
        }
        let callback = self.on_stop.lock().ok().and_then(|mut slot| slot.take());
        if let Some(callback) = callback {
            callback();
        }
        true
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("start", &self.start)
            .field("ignored", &self.is_ignored())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}
