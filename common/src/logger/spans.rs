use tracing::{Span, field};

use super::TraceId;

/// Root span for a request / CLI command.
///
/// `event_id` and `holder_id` start empty and are filled in by
/// [`annotate_span`] once the caller knows them.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        event_id = field::Empty,
        holder_id = field::Empty
    )
}

/// Child span (inherits trace_id from the enclosing root span).
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!(
        "child",
        name = %name,
        event_id = field::Empty,
        holder_id = field::Empty
    )
}

/// Record the reservation coordinates on the current span.
pub fn annotate_span(event_id: i64, holder_id: Option<i64>) {
    let span = Span::current();
    span.record("event_id", field::display(event_id));
    if let Some(holder) = holder_id {
        span.record("holder_id", field::display(holder));
    }
}
