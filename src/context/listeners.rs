use std::fmt;

use crate::context::PolicyContext;
use crate::status::AssertionStatus;

/// A check registered by an assertion to run after the policy completes.
///
/// Deferred assertions run in registration order; the first result other
/// than [`AssertionStatus::None`] stops the run.
pub trait DeferredAssertion {
    /// Evaluates the deferred check against the finished request.
    fn check_request(&self, ctx: &PolicyContext) -> AssertionStatus;
}

/// Observer notified about the outcome of routing attempts.
///
/// All methods have defaults so a listener implements only what it needs.
pub trait RoutingResultListener {
    /// Asked after a response arrives; returning true requests another attempt.
    fn reroute(&self, _url: &str, _status: u16, _ctx: &PolicyContext) -> bool {
        false
    }

    /// Called once the request was routed and a response received.
    fn routed(&self, _url: &str, _status: u16, _ctx: &PolicyContext) {}

    /// Called when routing to `url` failed.
    fn failed(&self, _url: &str, _reason: &str, _ctx: &PolicyContext) {}
}

/// A cookie collected for the request or to be set on the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpCookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
}

impl HttpCookie {
    /// Creates a host-only cookie with no path.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }

    /// Sets the cookie domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the cookie path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cookie domain.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Cookie path.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns true if both cookies occupy the same name, domain and path.
    pub(crate) fn same_slot(&self, other: &HttpCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

impl fmt::Display for HttpCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={}", domain)?;
        }
        if let Some(path) = &self.path {
            write!(f, "; Path={}", path)?;
        }
        Ok(())
    }
}
