//! # Core Error Taxonomy
//!
//! `FireflyError` is the single error type threaded through the enrichment
//! and job-lifecycle cores. Every variant maps to one of the failure kinds
//! named by the error-handling design: `Validation`, `NotFound`,
//! `RateLimited`, `BulkheadFull`, `CircuitOpen`, `Timeout`, `Transient`,
//! `ProviderError`, `Fatal`, `FallbackLoop`.

use thiserror::Error;

/// Result alias used throughout the core.
pub type FireflyResult<T> = Result<T, FireflyError>;

/// Core error taxonomy, independent of transport.
#[derive(Debug, Error)]
pub enum FireflyError {
    /// Malformed request, missing required field, or schema mismatch.
    /// Not retried; surfaces as a client-visible failure (HTTP 400 analogue).
    #[error("invalid request: {0}")]
    Validation(String),

    /// No enricher, operation, execution, or mapper found for the request.
    /// Not retried (HTTP 404 analogue).
    #[error("not found: {0}")]
    NotFound(String),

    /// Token bucket exhausted and the wait timed out.
    #[error("rate limit exceeded for {0}")]
    RateLimited(String),

    /// Bulkhead semaphore exhausted and the max wait elapsed.
    #[error("bulkhead full for {0}")]
    BulkheadFull(String),

    /// Circuit breaker is open and is short-circuiting calls.
    #[error("circuit open for {0}")]
    CircuitOpen(String),

    /// The operation's deadline elapsed.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Upstream I/O failure classified as transient by the adapter; subject
    /// to retry policy, surfaces as `ProviderError` after exhaustion.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The provider returned a non-success payload that is not retryable.
    #[error("provider {provider} error: {message}")]
    ProviderError { provider: String, message: String },

    /// Programming error or invariant violation. Not retried.
    #[error("internal error: {0}")]
    Fatal(String),

    /// A fallback chain revisited an already-visited provider.
    #[error("fallback loop detected at {0}")]
    FallbackLoop(String),

    /// JSON (de)serialization failure, usually while hashing or mapping.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FireflyError {
    /// Classify this error into the retry/backpressure taxonomy used by the
    /// resiliency decorator (§4.1/§7).
    pub fn classify(&self) -> FailureKind {
        match self {
            FireflyError::Validation(_) => FailureKind::Validation,
            FireflyError::NotFound(_) => FailureKind::Fatal,
            FireflyError::RateLimited(_) => FailureKind::RateLimited,
            FireflyError::BulkheadFull(_) => FailureKind::BulkheadFull,
            FireflyError::CircuitOpen(_) => FailureKind::CircuitOpen,
            FireflyError::Timeout(_) => FailureKind::Timeout,
            FireflyError::Transient(_) => FailureKind::Transient,
            FireflyError::ProviderError { .. } => FailureKind::Fatal,
            FireflyError::Fatal(_) => FailureKind::Fatal,
            FireflyError::FallbackLoop(_) => FailureKind::Fatal,
            FireflyError::Serialization(_) => FailureKind::Fatal,
        }
    }

    /// Whether the resiliency decorator's retry policy should consider this
    /// error for another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.classify(), FailureKind::Transient | FailureKind::Timeout)
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    pub fn provider_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Failure classification used to decide retry/backpressure behavior,
/// independent of the concrete error variant that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    CircuitOpen,
    RateLimited,
    BulkheadFull,
    Transient,
    Fatal,
    Validation,
}
