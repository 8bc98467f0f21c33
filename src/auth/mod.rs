//! Authentication ledger.
//!
//! One [`AuthenticationContext`] exists per target message. It records every
//! authentication result proven while processing that message, optionally
//! tagged with an identity slot, along with raw credentials collected from it.

mod credentials;
mod result;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};

pub use credentials::{CredentialFormat, LoginCredentials};
pub use result::{AuthenticationResult, Certificate, SecurityToken, SecurityTokenKind, User};

#[derive(Debug)]
struct LedgerEntry {
    result: Rc<AuthenticationResult>,
    tag: Option<String>,
}

impl LedgerEntry {
    fn is(&self, result: &Rc<AuthenticationResult>, tag: Option<&str>) -> bool {
        Rc::ptr_eq(&self.result, result) && self.tag.as_deref() == tag
    }
}

/// Ordered ledger of authentication results for one message.
///
/// Results are compared by identity: adding the same `Rc` twice under the same
/// tag stores it once. [`last_authentication_result`](Self::last_authentication_result)
/// always reflects the most recent add, duplicate or not.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use policy_context::{AuthenticationContext, AuthenticationResult, User};
///
/// let ledger = AuthenticationContext::new();
/// let alice = Rc::new(AuthenticationResult::new(User::new("1", "alice", "idp1")));
///
/// ledger.add_authentication_result(Rc::clone(&alice), Some("idp1"));
/// assert!(ledger.is_authenticated());
/// assert!(Rc::ptr_eq(&ledger.authentication_result_for_tag("idp1").unwrap(), &alice));
/// assert!(ledger.untagged_authentication_results().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct AuthenticationContext {
    entries: RefCell<Vec<LedgerEntry>>,
    last: RefCell<Option<Rc<AuthenticationResult>>>,
    credentials: RefCell<Vec<Rc<LoginCredentials>>>,
}

impl AuthenticationContext {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Results
    // ========================================================================

    /// Records `result` under `tag`, unless that exact pair is already recorded.
    pub fn add_authentication_result(&self, result: Rc<AuthenticationResult>, tag: Option<&str>) {
        {
            let mut entries = self.entries.borrow_mut();
            if !entries.iter().any(|e| e.is(&result, tag)) {
                entries.push(LedgerEntry {
                    result: Rc::clone(&result),
                    tag: tag.map(str::to_string),
                });
            }
        }
        tracing::debug!(
            user = %result.user(),
            tag = tag.unwrap_or(""),
            "authentication result added"
        );
        *self.last.borrow_mut() = Some(result);
    }

    /// Distinct results in the order they were first added.
    pub fn all_authentication_results(&self) -> Vec<Rc<AuthenticationResult>> {
        let entries = self.entries.borrow();
        let mut results: Vec<Rc<AuthenticationResult>> = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            if !results.iter().any(|r| Rc::ptr_eq(r, &entry.result)) {
                results.push(Rc::clone(&entry.result));
            }
        }
        results
    }

    /// Results recorded without a tag.
    pub fn untagged_authentication_results(&self) -> Vec<Rc<AuthenticationResult>> {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.tag.is_none())
            .map(|e| Rc::clone(&e.result))
            .collect()
    }

    /// First result recorded under `tag`.
    pub fn authentication_result_for_tag(&self, tag: &str) -> Option<Rc<AuthenticationResult>> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.tag.as_deref() == Some(tag))
            .map(|e| Rc::clone(&e.result))
    }

    /// Finds the result proven with `token`, provided it was recorded under `tag`.
    ///
    /// A token matching a single entry recorded under a different tag (absent
    /// and present tags differ) is a miss, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousToken`] if the token matches more than one
    /// ledger entry, including one result recorded under several tags. The
    /// ledger never picks one of them.
    pub fn authentication_result_for_security_token(
        &self,
        token: &SecurityToken,
        tag: Option<&str>,
    ) -> Result<Option<Rc<AuthenticationResult>>> {
        let entries = self.entries.borrow();
        let matching: Vec<&LedgerEntry> = entries
            .iter()
            .filter(|e| e.result.matches_security_token(token))
            .collect();

        match matching.as_slice() {
            [] => Ok(None),
            [entry] => Ok((entry.tag.as_deref() == tag).then(|| Rc::clone(&entry.result))),
            _ => {
                tracing::error!(
                    matches = matching.len(),
                    "security token matches more than one ledger entry"
                );
                Err(Error::AmbiguousToken {
                    matches: matching.len(),
                })
            }
        }
    }

    /// Returns true if any recorded result was proven with `token`.
    pub fn is_security_token_used(&self, token: &SecurityToken) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| e.result.matches_security_token(token))
    }

    /// The most recently added result.
    pub fn last_authentication_result(&self) -> Option<Rc<AuthenticationResult>> {
        self.last.borrow().clone()
    }

    /// Returns true once any result has been added.
    pub fn is_authenticated(&self) -> bool {
        self.last.borrow().is_some()
    }

    /// Distinct authenticated users in ledger order.
    pub fn authenticated_users(&self) -> Vec<User> {
        let mut users: Vec<User> = Vec::new();
        for entry in self.entries.borrow().iter() {
            let user = entry.result.user();
            if !users.contains(user) {
                users.push(user.clone());
            }
        }
        users
    }

    /// User of the most recently added result.
    pub fn last_authenticated_user(&self) -> Option<User> {
        self.last.borrow().as_ref().map(|r| r.user().clone())
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    /// Records credentials collected from the message.
    pub fn add_credentials(&self, credentials: LoginCredentials) {
        tracing::debug!(
            login = credentials.login(),
            source = credentials.source(),
            "credentials collected"
        );
        self.credentials.borrow_mut().push(Rc::new(credentials));
    }

    /// All collected credentials, oldest first.
    pub fn credentials(&self) -> Vec<Rc<LoginCredentials>> {
        self.credentials.borrow().clone()
    }

    /// The most recently collected credentials.
    pub fn last_credentials(&self) -> Option<Rc<LoginCredentials>> {
        self.credentials.borrow().last().cloned()
    }

    /// Returns true if any credentials were collected.
    pub fn has_credentials(&self) -> bool {
        !self.credentials.borrow().is_empty()
    }

    /// Credentials collected by the assertion named `source`.
    pub fn credentials_for_source(&self, source: &str) -> Vec<Rc<LoginCredentials>> {
        self.credentials
            .borrow()
            .iter()
            .filter(|c| c.source() == source)
            .cloned()
            .collect()
    }
}
