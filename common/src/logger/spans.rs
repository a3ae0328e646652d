use tracing::{Span, field};

use super::TraceId;

/// Create a root span for a quote / fee / swap request
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id.as_str(),
        chain_id = field::Empty,
        scope_id = field::Empty
    )
}

/// Create a child span (inherits trace_id from the current root)
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!(
        "child",
        name = %name,
        chain_id = field::Empty,
        scope_id = field::Empty
    )
}

/// Record the chain and the computation scope on the current span.
pub fn annotate_span(chain_id: &str, scope_id: Option<&dyn std::fmt::Display>) {
    let span = Span::current();
    span.record("chain_id", field::display(chain_id));
    if let Some(sid) = scope_id {
        span.record("scope_id", field::display(sid));
    }
}
