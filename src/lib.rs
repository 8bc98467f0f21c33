//! Per-request policy enforcement context for API gateway assertion chains.
//!
//! A gateway evaluates a policy (a tree of assertions) against every inbound
//! request. This crate holds the state those assertions share while they run:
//! - **Variables**: case-insensitive, with computed built-ins resolved first
//! - **Authentication ledger**: every identity proven for a message, with tags
//! - **Routing and timing**: status, routed URL, cumulative routing time
//! - **Composition**: child contexts for included policies that share the
//!   request but keep their own variables and cleanup
//! - **Lifecycle**: close callbacks that run exactly once
//!
//! # Core Types
//!
//! - [`ContextFactory`]: Creates root and child contexts
//! - [`PolicyContext`]: The context assertions read and write
//! - [`AuthenticationContext`]: Ledger of authentication results
//! - [`Value`]: A variable value
//! - [`Message`]: A closable message body with a declared content type
//! - [`Secret<T>`]: Wrapper that redacts credential material in logs
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//! use policy_context::{AuthenticationResult, ContextFactory, Message, RoutingStatus, User};
//!
//! let factory = ContextFactory::default();
//! let root = factory.create_root_context(Message::new(), Message::new(), true);
//!
//! let alice = Rc::new(AuthenticationResult::new(User::new("u-1", "alice", "idp1")));
//! root.add_authentication_result(Rc::clone(&alice), Some("idp1"));
//!
//! let child = factory.create_child_context(&root);
//! child.set_routing_status(RoutingStatus::Attempted);
//! child.close();
//!
//! assert_eq!(root.routing_status(), RoutingStatus::Attempted);
//! let ledger = root.default_authentication_context();
//! assert!(Rc::ptr_eq(&ledger.authentication_result_for_tag("idp1").unwrap(), &alice));
//! assert!(!root.is_closed());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
mod auth;
mod config;
mod context;
mod error;
mod factory;
mod logging;
mod message;
mod request;
pub mod scope;
mod secret;
mod status;
mod variables;

pub use auth::{
    AuthenticationContext, AuthenticationResult, Certificate, CredentialFormat, LoginCredentials,
    SecurityToken, SecurityTokenKind, User,
};
pub use config::{AuditConfig, ContextConfig, FaultConfig, MessageConfig, TimingConfig};
pub use context::{
    AssertionMetrics, AssertionRef, ContextKind, ContextRef, DeferredAssertion, HttpCookie,
    PolicyContext, RoutingResultListener,
};
pub use error::{Error, Result};
pub use factory::ContextFactory;
pub use logging::ContextLog;
pub use message::{Charset, ContentType, Message, MessageHandle, MessageId, MessageTarget, VariableBacked};
pub use request::RequestId;
pub use secret::Secret;
pub use status::{AssertionStatus, AuditLevel, FaultLevel, RoutingStatus};
pub use variables::{
    Availability, BuiltinGetter, BuiltinRegistry, BuiltinResolver, BuiltinSetter, BuiltinVariable,
    Value, VariableStore,
};
