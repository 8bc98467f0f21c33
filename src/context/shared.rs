use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::audit::Auditor;
use crate::auth::AuthenticationContext;
use crate::config::ContextConfig;
use crate::context::flags::RequestFlags;
use crate::context::listeners::{DeferredAssertion, HttpCookie, RoutingResultListener};
use crate::context::routing::RoutingState;
use crate::context::AssertionRef;
use crate::message::{MessageHandle, MessageId};
use crate::request::RequestId;
use crate::status::{AssertionStatus, AuditLevel, FaultLevel};
use crate::variables::BuiltinResolver;

/// State of the whole request, shared by the root context and every child
/// created beneath it. Reads and writes through any of them land here.
pub(crate) struct RequestState {
    pub(crate) request_id: RequestId,
    pub(crate) request: MessageHandle,
    pub(crate) response: MessageHandle,
    pub(crate) auth: RefCell<HashMap<MessageId, Rc<AuthenticationContext>>>,
    pub(crate) flags: Cell<RequestFlags>,
    pub(crate) audit_level: Cell<AuditLevel>,
    pub(crate) fault_level: Cell<FaultLevel>,
    pub(crate) seen_statuses: RefCell<BTreeSet<AssertionStatus>>,
    pub(crate) routing: RefCell<RoutingState>,
    pub(crate) end_time: Cell<Option<DateTime<Utc>>>,
    pub(crate) cookies: RefCell<Vec<HttpCookie>>,
    pub(crate) deferred: RefCell<Vec<(AssertionRef, Rc<dyn DeferredAssertion>)>>,
    pub(crate) routing_listeners: RefCell<Vec<Rc<dyn RoutingResultListener>>>,
    pub(crate) config: Rc<ContextConfig>,
    pub(crate) builtins: Rc<dyn BuiltinResolver>,
    pub(crate) auditor: Rc<dyn Auditor>,
}

impl RequestState {
    pub(crate) fn new(
        request: MessageHandle,
        response: MessageHandle,
        reply_expected: bool,
        config: Rc<ContextConfig>,
        builtins: Rc<dyn BuiltinResolver>,
        auditor: Rc<dyn Auditor>,
    ) -> Self {
        let flags = RequestFlags {
            reply_expected,
            audit_save_request: config.audit.save_request,
            audit_save_response: config.audit.save_response,
            ..RequestFlags::default()
        };
        Self {
            request_id: RequestId::next(),
            request,
            response,
            auth: RefCell::new(HashMap::new()),
            flags: Cell::new(flags),
            audit_level: Cell::new(config.audit.default_level),
            fault_level: Cell::new(config.faults.level),
            seen_statuses: RefCell::new(BTreeSet::new()),
            routing: RefCell::new(RoutingState::default()),
            end_time: Cell::new(None),
            cookies: RefCell::new(Vec::new()),
            deferred: RefCell::new(Vec::new()),
            routing_listeners: RefCell::new(Vec::new()),
            config,
            builtins,
            auditor,
        }
    }

    /// Ledger for `message`, created on first use.
    pub(crate) fn authentication_context(&self, message: MessageId) -> Rc<AuthenticationContext> {
        Rc::clone(
            self.auth
                .borrow_mut()
                .entry(message)
                .or_insert_with(|| Rc::new(AuthenticationContext::new())),
        )
    }

    pub(crate) fn update_flags(&self, update: impl FnOnce(&mut RequestFlags)) {
        let mut flags = self.flags.get();
        update(&mut flags);
        self.flags.set(flags);
    }
}
