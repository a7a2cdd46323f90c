//! W3C Trace Context propagation.
//!
//! A caller that sends `traceparent`/`tracestate` (a CI job, the scheduler of
//! another service) sees the backup or restore it triggered as a child span.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::Context;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TraceContextExt;
use tracing_opentelemetry::OpenTelemetrySpanExt;

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// The caller's span context, if the headers carry a valid one.
fn remote_parent(headers: &HeaderMap) -> Option<Context> {
    let cx = global::get_text_map_propagator(|p| p.extract(&HeaderExtractor(headers)));
    cx.span().span_context().is_remote().then_some(cx)
}

pub async fn propagate_trace_context(request: Request, next: Next) -> Response {
    if let Some(parent) = remote_parent(request.headers()) {
        tracing::Span::current().set_parent(parent);
    }
    next.run(request).await
}
