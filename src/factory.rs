//! Entry point for creating contexts.

use std::rc::Rc;

use crate::audit::{Auditor, TracingAuditor};
use crate::config::ContextConfig;
use crate::context::shared::RequestState;
use crate::context::{ContextRef, PolicyContext};
use crate::message::Message;
use crate::scope;
use crate::variables::{BuiltinRegistry, BuiltinResolver};

/// Creates root and child contexts wired to the same configuration, built-in
/// resolver and auditor.
///
/// # Examples
///
/// ```
/// use policy_context::{ContextFactory, Message};
///
/// let factory = ContextFactory::default();
/// let root = factory.create_root_context(Message::new(), Message::new(), true);
///
/// let seen = factory.with_current_context(&root, || {
///     ContextFactory::current_context().map(|ctx| ctx.request_id())
/// });
/// assert_eq!(seen, Some(root.request_id()));
/// assert!(ContextFactory::current_context().is_none());
/// ```
#[derive(Clone)]
pub struct ContextFactory {
    config: Rc<ContextConfig>,
    builtins: Rc<dyn BuiltinResolver>,
    auditor: Rc<dyn Auditor>,
}

impl ContextFactory {
    /// Factory using `config`, the standard built-ins and the tracing auditor.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config: Rc::new(config),
            builtins: Rc::new(BuiltinRegistry::standard()),
            auditor: Rc::new(TracingAuditor),
        }
    }

    /// Replaces the built-in variable resolver.
    pub fn with_builtins(mut self, builtins: Rc<dyn BuiltinResolver>) -> Self {
        self.builtins = builtins;
        self
    }

    /// Replaces the auditor receiving batch lookup and cleanup notifications.
    pub fn with_auditor(mut self, auditor: Rc<dyn Auditor>) -> Self {
        self.auditor = auditor;
        self
    }

    /// Configuration handed to every context.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Creates the context for an inbound request.
    ///
    /// The context owns both messages and closes them when it closes.
    pub fn create_root_context(
        &self,
        request: Message,
        response: Message,
        reply_expected: bool,
    ) -> ContextRef {
        let state = RequestState::new(
            request.into_handle(),
            response.into_handle(),
            reply_expected,
            Rc::clone(&self.config),
            Rc::clone(&self.builtins),
            Rc::clone(&self.auditor),
        );
        Rc::new(PolicyContext::new_root(state))
    }

    /// Creates the context for a policy included from `parent`.
    pub fn create_child_context(&self, parent: &ContextRef) -> ContextRef {
        Rc::new(PolicyContext::new_child(parent))
    }

    /// The context installed on this thread by
    /// [`with_current_context`](Self::with_current_context).
    pub fn current_context() -> Option<ContextRef> {
        scope::current()
    }

    /// Runs `f` with `ctx` as the current context, restoring the previous one
    /// afterwards, also when `f` panics.
    pub fn with_current_context<R>(&self, ctx: &ContextRef, f: impl FnOnce() -> R) -> R {
        let _guard = scope::enter(Rc::clone(ctx));
        f()
    }
}

impl Default for ContextFactory {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}
