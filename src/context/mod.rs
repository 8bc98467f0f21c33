//! The per-request policy enforcement context.
//!
//! A [`PolicyContext`] is created by [`ContextFactory`](crate::ContextFactory)
//! for each inbound request (the root) and again for every included policy (a
//! child). Every context of a request shares one [`RequestState`]: messages,
//! authentication ledgers, routing, audit flags, cookies and the deferred
//! assertion and routing listener registries. Each context owns its variables,
//! ordinal path, assertion history and close callbacks.
//!
//! ```text
//!            RequestState (Rc)
//!           /        |        \
//!    root ctx    child ctx    grandchild ctx
//!   (variables)  (variables)   (variables)
//!                  parent ─────> root
//! ```

mod flags;
mod lifecycle;
mod listeners;
mod ordinal;
mod routing;
pub(crate) mod shared;
mod targets;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::audit::{AuditEvent, AuditEventKind};
use crate::auth::{AuthenticationContext, AuthenticationResult};
use crate::error::{Error, Result};
use crate::logging::ContextLog;
use crate::message::MessageHandle;
use crate::request::RequestId;
use crate::status::{AssertionStatus, AuditLevel, FaultLevel, RoutingStatus};
use crate::variables::{Value, VariableStore};

use lifecycle::CloseRegistry;
use ordinal::OrdinalPath;
use shared::RequestState;

pub use listeners::{DeferredAssertion, HttpCookie, RoutingResultListener};

/// Shared handle to a context.
pub type ContextRef = Rc<PolicyContext>;

/// Whether a context serves the inbound request or an included policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Created for the inbound request
    Root,
    /// Created for an included policy
    Child,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Root => f.write_str("root"),
            ContextKind::Child => f.write_str("child"),
        }
    }
}

/// Identifies one assertion within its policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssertionRef {
    ordinal: u32,
    name: String,
}

impl AssertionRef {
    /// Creates a reference to the assertion at `ordinal` (1-based) named `name`.
    pub fn new(ordinal: u32, name: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
        }
    }

    /// Position within the enclosing policy.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Assertion name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for AssertionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.ordinal)
    }
}

/// Measurements an execution engine reports with a finished assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssertionMetrics {
    latency: Duration,
}

impl AssertionMetrics {
    /// Metrics for an assertion that ran for `latency`.
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// Time spent executing the assertion.
    pub fn latency(&self) -> Duration {
        self.latency
    }
}

struct ExposedName {
    name: String,
    prefix: bool,
}

impl ExposedName {
    fn covers(&self, lname: &str) -> bool {
        lname == self.name
            || (self.prefix
                && lname.len() > self.name.len()
                && lname.starts_with(&self.name)
                && lname.as_bytes()[self.name.len()] == b'.')
    }
}

struct ParentLink {
    context: ContextRef,
    exposed: RefCell<Vec<ExposedName>>,
}

impl ParentLink {
    fn exposes(&self, name: &str) -> bool {
        let lname = name.to_lowercase();
        self.exposed.borrow().iter().any(|e| e.covers(&lname))
    }
}

/// Execution context for one request, or for one included policy within it.
///
/// All methods take `&self`; the context is driven by a single worker and is
/// neither `Send` nor `Sync`. Closing happens once, explicitly through
/// [`close`](Self::close) or implicitly on drop.
///
/// # Examples
///
/// ```
/// use policy_context::{ContextFactory, Message, RoutingStatus, Value};
///
/// let factory = ContextFactory::default();
/// let root = factory.create_root_context(Message::new(), Message::new(), true);
/// root.set_variable("Greeting", Value::from("hello")).unwrap();
///
/// let child = factory.create_child_context(&root);
/// child.set_routing_status(RoutingStatus::Attempted);
/// assert_eq!(root.routing_status(), RoutingStatus::Attempted);
/// assert!(child.get_variable("greeting").is_err());
///
/// child.close();
/// assert!(!root.is_closed());
/// assert_eq!(root.get_variable("GREETING").unwrap(), Value::from("hello"));
/// ```
pub struct PolicyContext {
    kind: ContextKind,
    shared: Rc<RequestState>,
    parent: Option<ParentLink>,
    variables: Rc<RefCell<VariableStore>>,
    ordinals: RefCell<OrdinalPath>,
    current_assertion: RefCell<Option<AssertionRef>>,
    assertion_results: RefCell<Vec<(AssertionRef, AssertionStatus)>>,
    assertion_latency: Cell<Duration>,
    policy_result: Cell<Option<AssertionStatus>>,
    start_time: DateTime<Utc>,
    started: Instant,
    close: CloseRegistry,
}

impl PolicyContext {
    pub(crate) fn new_root(shared: RequestState) -> Self {
        Self::with_parts(ContextKind::Root, Rc::new(shared), None, OrdinalPath::default())
    }

    pub(crate) fn new_child(parent: &ContextRef) -> Self {
        let prefix = parent.assertion_number();
        let link = ParentLink {
            context: Rc::clone(parent),
            exposed: RefCell::new(Vec::new()),
        };
        Self::with_parts(
            ContextKind::Child,
            Rc::clone(&parent.shared),
            Some(link),
            OrdinalPath::with_prefix(prefix),
        )
    }

    fn with_parts(
        kind: ContextKind,
        shared: Rc<RequestState>,
        parent: Option<ParentLink>,
        ordinals: OrdinalPath,
    ) -> Self {
        let ctx = Self {
            kind,
            shared,
            parent,
            variables: Rc::new(RefCell::new(VariableStore::new())),
            ordinals: RefCell::new(ordinals),
            current_assertion: RefCell::new(None),
            assertion_results: RefCell::new(Vec::new()),
            assertion_latency: Cell::new(Duration::ZERO),
            policy_result: Cell::new(None),
            start_time: Utc::now(),
            started: Instant::now(),
            close: CloseRegistry::default(),
        };
        tracing::debug!(request_id = %ctx.shared.request_id, kind = %kind, "context created");
        ctx
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Whether this is a root or child context.
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Returns true for the context created for the inbound request.
    pub fn is_root(&self) -> bool {
        self.kind == ContextKind::Root
    }

    /// The request identifier, shared by every context of the request.
    pub fn request_id(&self) -> RequestId {
        self.shared.request_id
    }

    /// The context this child was created from.
    pub fn parent(&self) -> Option<&ContextRef> {
        self.parent.as_ref().map(|link| &link.context)
    }

    /// Request-scoped logger.
    pub fn log(&self) -> ContextLog<'_> {
        let assertion = self
            .assertion_number()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".");
        ContextLog::new(self.shared.request_id, assertion)
    }

    // ========================================================================
    // Messages and authentication
    // ========================================================================

    /// The inbound request message.
    pub fn request(&self) -> MessageHandle {
        Rc::clone(&self.shared.request)
    }

    /// The response message.
    pub fn response(&self) -> MessageHandle {
        Rc::clone(&self.shared.response)
    }

    /// Ledger for `message`, created on first use.
    pub fn authentication_context(&self, message: &MessageHandle) -> Rc<AuthenticationContext> {
        let id = message.borrow().id();
        self.shared.authentication_context(id)
    }

    /// Ledger for the request message.
    pub fn default_authentication_context(&self) -> Rc<AuthenticationContext> {
        self.authentication_context(&self.shared.request)
    }

    /// Records `result` in the request ledger under `tag`.
    pub fn add_authentication_result(&self, result: Rc<AuthenticationResult>, tag: Option<&str>) {
        self.default_authentication_context()
            .add_authentication_result(result, tag);
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Reads a variable, resolving built-ins before stored variables.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchVariable`] if `name` is neither a built-in valid for this
    /// context nor a stored variable, or the built-in has no value right now.
    pub fn get_variable(&self, name: &str) -> Result<Value> {
        if let Some(builtin) = self.shared.builtins.resolve(name, self.kind) {
            return builtin
                .get(self, name)
                .ok_or_else(|| Error::no_such_variable(name));
        }
        self.owning_store(name)
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::no_such_variable(name))
    }

    /// Writes a variable. Stored names are case-insensitive and adopt the
    /// casing of the latest write.
    ///
    /// # Errors
    ///
    /// [`Error::NotSettable`] for read-only built-ins, or whatever a settable
    /// built-in rejects the value with.
    pub fn set_variable(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(builtin) = self.shared.builtins.resolve(name, self.kind) {
            return builtin.set(self, name, value);
        }
        self.owning_store(name).borrow_mut().set(name, value);
        Ok(())
    }

    /// Removes a stored variable, returning its value.
    ///
    /// # Errors
    ///
    /// [`Error::NotSettable`] if `name` is a built-in.
    pub fn remove_variable(&self, name: &str) -> Result<Option<Value>> {
        if self.shared.builtins.resolve(name, self.kind).is_some() {
            return Err(Error::not_settable(name));
        }
        let store = self.owning_store(name);
        let removed = store.borrow_mut().remove(name);
        Ok(removed)
    }

    /// Reads several variables at once.
    ///
    /// Names that do not resolve, or resolve to [`Value::Null`], are reported
    /// to the auditor and left out. Stored variables are keyed by their stored
    /// casing, built-ins by the name as requested.
    pub fn get_variables(&self, names: &[&str]) -> HashMap<String, Value> {
        let mut found = HashMap::with_capacity(names.len());
        for &name in names {
            let resolved = if let Some(builtin) = self.shared.builtins.resolve(name, self.kind) {
                builtin.get(self, name).map(|value| (name.to_string(), value))
            } else {
                let store = self.owning_store(name);
                let store = store.borrow();
                store
                    .get_entry(name)
                    .map(|(stored, value)| (stored.to_string(), value.clone()))
            };

            match resolved {
                Some((_, Value::Null)) => self.audit(AuditEventKind::VariableNull, Some(name), None),
                Some((key, value)) => {
                    found.insert(key, value);
                }
                None => self.audit(AuditEventKind::VariableNotFound, Some(name), None),
            }
        }
        found
    }

    /// Names of variables stored in this context, excluding pass-through names.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.borrow().names().map(str::to_string).collect()
    }

    /// Makes `name` read and write through to the parent's variables.
    ///
    /// With `prefix`, every name under `name.` passes through as well. Has no
    /// effect on a root context.
    pub fn pass_variable_to_parent(&self, name: &str, prefix: bool) {
        match &self.parent {
            Some(link) => link.exposed.borrow_mut().push(ExposedName {
                name: name.to_lowercase(),
                prefix,
            }),
            None => tracing::debug!(
                request_id = %self.shared.request_id,
                variable = name,
                "root context has no parent to pass variables to"
            ),
        }
    }

    /// Store that holds `name` for this context, following pass-through links.
    fn owning_store(&self, name: &str) -> Rc<RefCell<VariableStore>> {
        match &self.parent {
            Some(link) if link.exposes(name) => link.context.owning_store(name),
            _ => Rc::clone(&self.variables),
        }
    }

    // ========================================================================
    // Routing and timing
    // ========================================================================

    /// Current routing status.
    pub fn routing_status(&self) -> RoutingStatus {
        self.shared.routing.borrow().status
    }

    /// Sets the routing status.
    pub fn set_routing_status(&self, status: RoutingStatus) {
        self.shared.routing.borrow_mut().status = status;
    }

    /// Returns true once routing has been attempted.
    pub fn is_post_routing(&self) -> bool {
        matches!(
            self.routing_status(),
            RoutingStatus::Attempted | RoutingStatus::Routed
        )
    }

    /// URL of the service the request was routed to.
    pub fn routed_service_url(&self) -> Option<String> {
        self.shared.routing.borrow().url.clone()
    }

    /// Records the URL of the service the request is routed to.
    pub fn set_routed_service_url(&self, url: impl Into<String>) {
        self.shared.routing.borrow_mut().url = Some(url.into());
    }

    /// Marks the start of a routing attempt.
    pub fn routing_started(&self) {
        self.shared
            .routing
            .borrow_mut()
            .started(Instant::now(), Utc::now());
    }

    /// Marks the end of a routing attempt, adding its duration to the total.
    pub fn routing_finished(&self) {
        let counted = self
            .shared
            .routing
            .borrow_mut()
            .finished(Instant::now(), Utc::now());
        if !counted {
            tracing::warn!(
                request_id = %self.shared.request_id,
                "routing finished without routing started"
            );
        }
    }

    /// Start of the most recent routing attempt.
    pub fn routing_start_time(&self) -> Option<DateTime<Utc>> {
        self.shared.routing.borrow().start_time()
    }

    /// End of the most recent routing attempt.
    pub fn routing_end_time(&self) -> Option<DateTime<Utc>> {
        self.shared.routing.borrow().end_time()
    }

    /// Sum of all routing attempt durations.
    pub fn routing_total_time(&self) -> Duration {
        self.shared.routing.borrow().total()
    }

    /// When this context was created.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// When processing of the request finished, once set.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.shared.end_time.get()
    }

    /// Records the end of request processing.
    ///
    /// # Panics
    ///
    /// Panics if the end time was already set by this or any related context.
    pub fn set_end_time(&self) {
        if self.shared.end_time.get().is_some() {
            panic!("end time already set for request {}", self.shared.request_id);
        }
        self.shared.end_time.set(Some(Utc::now()));
    }

    /// Time from this context's creation to the end time, or to now if unset.
    pub fn elapsed(&self) -> Duration {
        match self.end_time() {
            Some(end) => (end - self.start_time).to_std().unwrap_or_default(),
            None => self.started.elapsed(),
        }
    }

    // ========================================================================
    // Assertion bookkeeping
    // ========================================================================

    /// Called by the execution engine before `assertion` runs.
    pub fn assertion_starting(&self, assertion: &AssertionRef) {
        *self.current_assertion.borrow_mut() = Some(assertion.clone());
        self.set_policy_execution_attempted(true);
    }

    /// Called by the execution engine after `assertion` completed with `status`.
    pub fn assertion_finished(
        &self,
        assertion: &AssertionRef,
        status: AssertionStatus,
        metrics: Option<AssertionMetrics>,
    ) {
        self.add_seen_assertion_status(status);
        self.assertion_results
            .borrow_mut()
            .push((assertion.clone(), status));
        if let Some(metrics) = metrics {
            if self.shared.config.timing.record_assertion_latency {
                self.assertion_latency
                    .set(self.assertion_latency.get() + metrics.latency());
            }
        }
        *self.current_assertion.borrow_mut() = None;
    }

    /// The assertion currently executing in this context.
    pub fn current_assertion(&self) -> Option<AssertionRef> {
        self.current_assertion.borrow().clone()
    }

    /// Every assertion finished in this context with its status, in order.
    pub fn assertion_results(&self) -> Vec<(AssertionRef, AssertionStatus)> {
        self.assertion_results.borrow().clone()
    }

    /// Total latency reported for assertions finished in this context.
    pub fn assertion_latency(&self) -> Duration {
        self.assertion_latency.get()
    }

    /// Records an outcome observed during the request.
    pub fn add_seen_assertion_status(&self, status: AssertionStatus) {
        self.shared.seen_statuses.borrow_mut().insert(status);
    }

    /// Every outcome observed so far across the request.
    pub fn seen_assertion_statuses(&self) -> BTreeSet<AssertionStatus> {
        self.shared.seen_statuses.borrow().clone()
    }

    /// The highest audit level among observed outcomes.
    pub fn highest_seen_status_level(&self) -> Option<AuditLevel> {
        self.shared
            .seen_statuses
            .borrow()
            .iter()
            .map(|s| s.level())
            .max()
    }

    /// Outcome of the policy evaluated in this context, once set.
    pub fn policy_result(&self) -> Option<AssertionStatus> {
        self.policy_result.get()
    }

    /// Records the outcome of the policy evaluated in this context.
    pub fn set_policy_result(&self, status: AssertionStatus) {
        self.policy_result.set(Some(status));
    }

    // ========================================================================
    // Ordinal path
    // ========================================================================

    /// Enters an included policy at `ordinal`.
    pub fn push_assertion_ordinal(&self, ordinal: u32) {
        self.ordinals.borrow_mut().push(ordinal);
    }

    /// Leaves the innermost included policy, returning its ordinal.
    ///
    /// # Panics
    ///
    /// Panics if nothing was pushed in this context.
    pub fn pop_assertion_ordinal(&self) -> u32 {
        self.ordinals.borrow_mut().pop()
    }

    /// The ordinal path, oldest first. Starts with the parent's assertion
    /// number for a child.
    pub fn assertion_ordinal_path(&self) -> Vec<u32> {
        self.ordinals.borrow().path()
    }

    /// The parent's assertion number when this child was created; empty for a root.
    pub fn assertion_ordinal_prefix(&self) -> Vec<u32> {
        self.ordinals.borrow().prefix().to_vec()
    }

    /// Ordinal path followed by the current assertion's ordinal.
    pub fn assertion_number(&self) -> Vec<u32> {
        let mut number = self.assertion_ordinal_path();
        if let Some(current) = self.current_assertion.borrow().as_ref() {
            number.push(current.ordinal());
        }
        number
    }

    // ========================================================================
    // Audit and fault settings
    // ========================================================================

    /// Audit level of the request.
    pub fn audit_level(&self) -> AuditLevel {
        self.shared.audit_level.get()
    }

    /// Sets the audit level of the request.
    pub fn set_audit_level(&self, level: AuditLevel) {
        self.shared.audit_level.set(level);
    }

    /// Fault reporting level of the request.
    pub fn fault_level(&self) -> FaultLevel {
        self.shared.fault_level.get()
    }

    /// Sets the fault reporting level of the request.
    pub fn set_fault_level(&self, level: FaultLevel) {
        self.shared.fault_level.set(level);
    }

    // ========================================================================
    // Cookies
    // ========================================================================

    /// Adds `cookie`, replacing one with the same name, domain and path.
    pub fn add_cookie(&self, cookie: HttpCookie) {
        let mut cookies = self.shared.cookies.borrow_mut();
        match cookies.iter_mut().find(|c| c.same_slot(&cookie)) {
            Some(existing) => *existing = cookie,
            None => cookies.push(cookie),
        }
    }

    /// All cookies of the request.
    pub fn cookies(&self) -> Vec<HttpCookie> {
        self.shared.cookies.borrow().clone()
    }

    /// Removes every cookie named `name`. Returns true if any was removed.
    pub fn remove_cookie(&self, name: &str) -> bool {
        let mut cookies = self.shared.cookies.borrow_mut();
        let before = cookies.len();
        cookies.retain(|c| c.name() != name);
        cookies.len() != before
    }

    // ========================================================================
    // Deferred assertions and routing listeners
    // ========================================================================

    /// Registers a deferred check for `owner`, replacing its previous one.
    pub fn add_deferred_assertion(&self, owner: &AssertionRef, deferred: Rc<dyn DeferredAssertion>) {
        let mut registry = self.shared.deferred.borrow_mut();
        match registry.iter_mut().find(|(o, _)| o == owner) {
            Some(entry) => entry.1 = deferred,
            None => registry.push((owner.clone(), deferred)),
        }
    }

    /// Removes the deferred check registered for `owner`.
    pub fn remove_deferred_assertion(&self, owner: &AssertionRef) {
        self.shared
            .deferred
            .borrow_mut()
            .retain(|(o, _)| o != owner);
    }

    /// Registered deferred checks in registration order.
    pub fn deferred_assertions(&self) -> Vec<Rc<dyn DeferredAssertion>> {
        self.shared
            .deferred
            .borrow()
            .iter()
            .map(|(_, d)| Rc::clone(d))
            .collect()
    }

    /// Runs every deferred check in order, stopping at the first failure.
    ///
    /// Returns [`AssertionStatus::None`] if all passed.
    pub fn run_deferred_assertions(&self) -> AssertionStatus {
        for deferred in self.deferred_assertions() {
            let status = deferred.check_request(self);
            if status != AssertionStatus::None {
                return status;
            }
        }
        AssertionStatus::None
    }

    /// Registers a routing listener.
    pub fn add_routing_result_listener(&self, listener: Rc<dyn RoutingResultListener>) {
        self.shared.routing_listeners.borrow_mut().push(listener);
    }

    /// Removes `listener`, compared by identity.
    pub fn remove_routing_result_listener(&self, listener: &Rc<dyn RoutingResultListener>) {
        self.shared
            .routing_listeners
            .borrow_mut()
            .retain(|l| !Rc::ptr_eq(l, listener));
    }

    /// Registered routing listeners in registration order.
    pub fn routing_result_listeners(&self) -> Vec<Rc<dyn RoutingResultListener>> {
        self.shared.routing_listeners.borrow().clone()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Registers `callback` to run when this context closes.
    ///
    /// Callbacks run last registered first. A callback registered after close
    /// runs immediately.
    pub fn run_on_close(&self, callback: impl FnOnce() + 'static) {
        if let Some(late) = self.close.register(Box::new(callback)) {
            tracing::warn!(
                request_id = %self.shared.request_id,
                "close callback registered after close, running it now"
            );
            if let Err(message) = lifecycle::run_guarded(late) {
                self.close_callback_failed(message);
            }
        }
    }

    /// Returns true once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    /// Runs every close callback once. A root context then closes the request
    /// and response messages; a child never touches them.
    ///
    /// Closing again is a no-op.
    pub fn close(&self) {
        if !self.close.begin_close() {
            return;
        }
        let pending = self.close.len();
        for message in self.close.run_all() {
            self.close_callback_failed(message);
        }
        if self.is_root() {
            close_message(&self.shared.request);
            close_message(&self.shared.response);
        }
        tracing::debug!(
            request_id = %self.shared.request_id,
            kind = %self.kind,
            callbacks = pending,
            "context closed"
        );
    }

    fn close_callback_failed(&self, message: String) {
        tracing::warn!(
            request_id = %self.shared.request_id,
            error = %message,
            "close callback panicked"
        );
        self.audit(AuditEventKind::CloseCallbackFailed, None, Some(message));
    }

    pub(crate) fn audit(&self, kind: AuditEventKind, variable: Option<&str>, detail: Option<String>) {
        let mut event = AuditEvent::new(self.shared.request_id, kind);
        if let Some(variable) = variable {
            event = event.with_variable(variable);
        }
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        self.shared.auditor.record(&event);
    }
}

fn close_message(message: &MessageHandle) {
    match message.try_borrow_mut() {
        Ok(mut message) => message.close(),
        Err(_) => tracing::warn!("message still borrowed at context close, left open"),
    }
}

impl Drop for PolicyContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for PolicyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyContext")
            .field("kind", &self.kind)
            .field("request_id", &self.shared.request_id)
            .field("variables", &self.variables.borrow().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
