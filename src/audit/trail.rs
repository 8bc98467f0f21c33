//! In-memory audit trail recorder.

use std::cell::RefCell;

use super::{AuditEvent, AuditEventKind, Auditor};

/// In-memory recorder for audit events.
///
/// Share it with a factory through `Rc` and inspect it after the request:
///
/// ```
/// use std::rc::Rc;
/// use policy_context::audit::{AuditEventKind, AuditTrail};
/// use policy_context::{ContextFactory, Message};
///
/// let trail = Rc::new(AuditTrail::new());
/// let factory = ContextFactory::default().with_auditor(trail.clone());
/// let ctx = factory.create_root_context(Message::new(), Message::new(), true);
///
/// let found = ctx.get_variables(&["requestId", "nope"]);
/// assert_eq!(found.len(), 1);
/// assert_eq!(trail.count(AuditEventKind::VariableNotFound), 1);
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: RefCell<Vec<AuditEvent>>,
}

impl AuditTrail {
    /// Creates a new empty audit trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.borrow().clone()
    }

    /// Returns the number of recorded events of `kind`.
    pub fn count(&self, kind: AuditEventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Returns true if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl Auditor for AuditTrail {
    fn record(&self, event: &AuditEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
