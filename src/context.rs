//! Ambient asynchronous context.
//!
//! A frame — the `{request, span}` pair of the currently executing logical
//! task — rides in a tokio task-local. Work scheduled inside a frame's
//! scope (continuations, `.await`s) observes the same values; each
//! `transaction`/`instrument` pushes a fresh frame that inherits the
//! current one, so closing a scope restores the parent's view without
//! explicit bookkeeping.
//!
//! The engine keeps separate synchronous fallback slots for callers
//! instrumenting outside any async frame.

use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::trace::{Request, Span};

tokio::task_local! {
    static CONTEXT: ContextFrame;
}

#[derive(Debug, Default)]
struct Slots {
    request: Option<Arc<Request>>,
    span: Option<Arc<Span>>,
}

/// The `{request, span}` mapping attached to a logical task.
///
/// Cloning shares the same slots; [`ContextFrame::inherit`] copies the
/// current values into an independent frame.
#[derive(Debug, Clone, Default)]
pub struct ContextFrame {
    slots: Arc<Mutex<Slots>>,
}

impl ContextFrame {
    /// A fresh, empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh frame seeded with the current task's values, when a frame
    /// is active.
    #[must_use]
    pub fn inherit() -> Self {
        let frame = Self::new();
        if let Ok(current) = CONTEXT.try_with(ContextFrame::clone) {
            frame.set_request(current.request());
            frame.set_span(current.span());
        }
        frame
    }

    /// The frame's request slot.
    #[must_use]
    pub fn request(&self) -> Option<Arc<Request>> {
        self.slots.lock().ok().and_then(|s| s.request.clone())
    }

    /// The frame's span slot — the innermost open span.
    #[must_use]
    pub fn span(&self) -> Option<Arc<Span>> {
        self.slots.lock().ok().and_then(|s| s.span.clone())
    }

    /// Replace the request slot.
    pub fn set_request(&self, request: Option<Arc<Request>>) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.request = request;
        }
    }

    /// Replace the span slot.
    pub fn set_span(&self, span: Option<Arc<Span>>) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.span = span;
        }
    }
}

/// Run `fut` inside `frame`'s scope.
pub async fn in_frame<F: Future>(frame: ContextFrame, fut: F) -> F::Output {
    CONTEXT.scope(frame, fut).await
}

/// Capture the current frame now and restore it around `fut` when it
/// runs, wherever it is polled from.
pub fn bind<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    CONTEXT.scope(ContextFrame::inherit(), fut)
}

/// The current task's request, when an async frame is active.
#[must_use]
pub fn current_request() -> Option<Arc<Request>> {
    CONTEXT.try_with(ContextFrame::request).ok().flatten()
}

/// The current task's innermost open span, when an async frame is active.
#[must_use]
pub fn current_span() -> Option<Arc<Span>> {
    CONTEXT.try_with(ContextFrame::span).ok().flatten()
}
