//! The span record: one instrumented sub-operation within a request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::trace::request::StopCallback;

/// One instrumented sub-operation.
///
/// Parenthood is recorded by id only: `request_id` names the owning
/// request, `parent_id` the enclosing span (absent when the request
/// itself is the parent).
pub struct Span {
    id: String,
    operation: String,
    request_id: String,
    parent_id: Option<String>,
    start: DateTime<Utc>,
    end: Mutex<Option<DateTime<Utc>>>,
    tags: Mutex<Vec<(String, Value)>>,
    ignored: AtomicBool,
    stopped: AtomicBool,
    on_stop: Mutex<Option<StopCallback>>,
}

impl Span {
    /// Start a new span now. The ignored flag is inherited from the
    /// request at creation.
    #[must_use]
    pub(crate) fn new(
        request_id: &str,
        operation: &str,
        parent_id: Option<String>,
        ignored: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: format!("span-{}", Uuid::new_v4()),
            operation: operation.to_owned(),
            request_id: request_id.to_owned(),
            parent_id,
            start: Utc::now(),
            end: Mutex::new(None),
            tags: Mutex::new(Vec::new()),
            ignored: AtomicBool::new(ignored),
            stopped: AtomicBool::new(false),
            on_stop: Mutex::new(None),
        })
    }

    /// Unique identifier, `span-<uuid>`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Operation name, e.g. `SQL/Query`.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Identifier of the owning request.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Identifier of the enclosing span, when there is one.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// When the span started.
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    /// When the span stopped, if it has.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end.lock().ok().and_then(|e| *e)
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

    /// Whether this span is excluded from the wire.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored.load(Ordering::SeqCst)
    }

    pub(crate) fn set_ignored(&self, ignored: bool) {
        self.ignored.store(ignored, Ordering::SeqCst);
    }

    /// Whether the span has stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Register a callback fired once when the span stops.
    pub fn on_stop(&self, callback: StopCallback) {
        if let Ok(mut slot) = self.on_stop.lock() {
            *slot = Some(callback);
        }
    }

    /// Latch the stop at `at`. Returns true on the first call only.
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

    /// Latch the stop now.
    pub(crate) fn stop_now(&self) -> bool {
        self.mark_stopped(Utc::now())
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("request_id", &self.request_id)
            .field("parent_id", &self.parent_id)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}
