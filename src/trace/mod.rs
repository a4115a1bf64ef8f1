//! Request and span records.
//!
//! A request owns its spans' lifetime; spans reference their request and
//! parent span by id only, so the object graph stays acyclic and stopped
//! spans are collectible once flushed.

pub mod request;
pub mod span;

use std::sync::Arc;

pub use request::Request;
pub use span::Span;

/// An explicit parent for synchronous instrumentation, overriding the
/// ambient context.
#[derive(Debug, Clone)]
pub enum ParentHandle {
    /// Parent directly under the request.
    Request(Arc<Request>),
    /// Parent under another span.
    Span(Arc<Span>),
}
