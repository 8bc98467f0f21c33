//! Emits audit events through the tracing infrastructure.

use super::{AuditEvent, Auditor};

/// [`Auditor`] that logs each event as a structured tracing event.
///
/// Events go to the `policy_audit` target at warn level for failures and
/// info level otherwise. This is the auditor a [`ContextFactory`](crate::ContextFactory)
/// uses unless another is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditor;

impl Auditor for TracingAuditor {
    fn record(&self, event: &AuditEvent) {
        use super::AuditEventKind::*;
        match event.kind() {
            VariableNotFound | VariableNull => tracing::info!(
                target: "policy_audit",
                request_id = %event.request_id(),
                kind = %event.kind(),
                variable = ?event.variable(),
                detail = ?event.detail(),
                "audit event"
            ),
            CloseCallbackFailed | WriteBackFailed => tracing::warn!(
                target: "policy_audit",
                request_id = %event.request_id(),
                kind = %event.kind(),
                variable = ?event.variable(),
                detail = ?event.detail(),
                "audit event"
            ),
        }
    }
}
