//! Port for the structured audit trail.
//!
//! Separate from `tracing` diagnostics: this records one machine-readable
//! event per request (JSONL in the file adapter) including the reasoning
//! trace, so an answer can be explained after the fact.

use serde_json::Value;

/// A structured audit event.
pub struct AuditEvent {
    /// Event type identifier (`consensus_completed`, `consensus_failed`, `cache_hit`).
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl AuditEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Sink for audit events.
///
/// `log` is synchronous and infallible so auditing never disturbs a
/// request; write failures are dropped by the implementation.
pub trait AuditLogger: Send + Sync {
    fn log(&self, event: AuditEvent);
}

/// No-op implementation for tests and when auditing is disabled.
pub struct NoAuditLogger;

impl AuditLogger for NoAuditLogger {
    fn log(&self, _event: AuditEvent) {}
}
