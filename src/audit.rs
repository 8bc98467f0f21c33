//! Audit collaborator support.
//!
//! This module provides:
//! - `Auditor`: The sink a context reports audit-worthy conditions to
//! - `AuditEvent`: Structured audit event schema
//! - `AuditTrail`: In-memory audit event recorder
//! - `TracingAuditor`: Emits audit events through `tracing`
//!
//! Batch variable lookups report unresolved and null names here instead of
//! failing, and teardown reports close callbacks that panicked.

mod event;
mod trail;
mod tracing_auditor;

pub use event::{AuditEvent, AuditEventKind};
pub use trail::AuditTrail;
pub use tracing_auditor::TracingAuditor;

/// Receives audit events raised by policy contexts.
pub trait Auditor {
    /// Records one event.
    fn record(&self, event: &AuditEvent);
}
