use std::fmt;

use crate::request::RequestId;

/// Request-scoped logging interface.
///
/// `ContextLog` is obtained from [`PolicyContext::log`](crate::PolicyContext::log)
/// and is lifetime-bound to the context that created it.
///
/// Every message carries the request id and the number of the assertion that
/// was executing when the logger was taken, so lines from nested included
/// policies can be correlated with the audit trail.
///
/// Credential values are redacted when logged due to the `Debug` and
/// `Display` implementations of [`Secret`](crate::Secret).
#[derive(Debug)]
pub struct ContextLog<'a> {
    // Lifetime ensures this can't outlive the context
    _ctx_lifetime: std::marker::PhantomData<&'a ()>,
    request_id: RequestId,
    assertion: String,
}

impl<'a> ContextLog<'a> {
    /// This is `pub(crate)` - only `PolicyContext` can create it.
    pub(crate) fn new(request_id: RequestId, assertion: String) -> Self {
        Self {
            _ctx_lifetime: std::marker::PhantomData,
            request_id,
            assertion,
        }
    }

    /// Returns the request id associated with this logger.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the dotted assertion number, empty outside any assertion.
    pub fn assertion(&self) -> &str {
        &self.assertion
    }

    /// Logs an info-level message.
    ///
    /// Use with `format_args!`:
    /// ```no_run
    /// # use policy_context::{ContextLog, Secret};
    /// # fn example(log: &ContextLog) {
    /// let password = Secret::new("hunter2");
    /// log.info(format_args!("checking credentials {:?}", password));
    /// # }
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, assertion = %self.assertion, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, assertion = %self.assertion, "{}", args);
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, assertion = %self.assertion, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, assertion = %self.assertion, "{}", args);
    }
}
