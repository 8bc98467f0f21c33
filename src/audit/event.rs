//! Audit event schema and types.
//!
//! Events carry names and short descriptions only, never variable values or
//! message bodies.

use std::fmt;

use crate::request::RequestId;

/// Kind of audit event being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEventKind {
    /// A batch lookup named a variable that does not exist
    VariableNotFound,
    /// A batch lookup found a variable holding no value
    VariableNull,
    /// A close callback panicked during teardown
    CloseCallbackFailed,
    /// A message body could not be written back to its variable
    WriteBackFailed,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventKind::VariableNotFound => write!(f, "variable_not_found"),
            AuditEventKind::VariableNull => write!(f, "variable_null"),
            AuditEventKind::CloseCallbackFailed => write!(f, "close_callback_failed"),
            AuditEventKind::WriteBackFailed => write!(f, "write_back_failed"),
        }
    }
}

/// A structured audit event.
///
/// # Example
///
/// ```
/// use policy_context::audit::{AuditEvent, AuditEventKind};
/// # fn demo(request_id: policy_context::RequestId) {
/// let event = AuditEvent::new(request_id, AuditEventKind::VariableNotFound)
///     .with_variable("foo.bar");
///
/// assert_eq!(event.variable(), Some("foo.bar"));
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    request_id: RequestId,
    kind: AuditEventKind,
    /// Variable the event concerns, in the casing the caller used
    variable: Option<String>,
    /// Short description, never a variable value
    detail: Option<String>,
}

impl AuditEvent {
    /// Creates an event with the required fields.
    pub fn new(request_id: RequestId, kind: AuditEventKind) -> Self {
        Self {
            request_id,
            kind,
            variable: None,
            detail: None,
        }
    }

    /// Sets the variable the event concerns.
    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variable = Some(name.into());
        self
    }

    /// Sets a short description.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns the request identifier.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the event kind.
    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    /// Returns the variable name, if set.
    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    /// Returns the detail, if set.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEvent[kind={}, request_id={}",
            self.kind, self.request_id
        )?;
        if let Some(variable) = &self.variable {
            write!(f, ", variable={}", variable)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ", detail={}", detail)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_event_kind_display() {
        assert_eq!(
            AuditEventKind::VariableNotFound.to_string(),
            "variable_not_found"
        );
        assert_eq!(
            AuditEventKind::CloseCallbackFailed.to_string(),
            "close_callback_failed"
        );
    }

    #[test]
    fn audit_event_minimal() {
        let id = RequestId::next();
        let event = AuditEvent::new(id, AuditEventKind::VariableNull);

        assert_eq!(event.request_id(), id);
        assert_eq!(event.kind(), AuditEventKind::VariableNull);
        assert!(event.variable().is_none());
        assert!(event.detail().is_none());
    }

    #[test]
    fn audit_event_display_lists_set_fields() {
        let id = RequestId::next();
        let event = AuditEvent::new(id, AuditEventKind::WriteBackFailed)
            .with_variable("foo")
            .with_detail("message body is not valid us-ascii");

        let display = event.to_string();
        assert!(display.contains("write_back_failed"));
        assert!(display.contains(&id.to_string()));
        assert!(display.contains("variable=foo"));
        assert!(display.ends_with(']'));
    }
}
