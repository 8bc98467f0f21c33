use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};

/// An identity proven during the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    id: String,
    login: String,
    provider: String,
}

impl User {
    /// Creates a user known to `provider` under `id`.
    pub fn new(id: impl Into<String>, login: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            login: login.into(),
            provider: provider.into(),
        }
    }

    /// Identifier within the identity provider.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Login name.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Name of the identity provider that authenticated the user.
    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.login, self.provider)
    }
}

/// Kinds of credential artifact a message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityTokenKind {
    /// WS-Security UsernameToken
    UsernameToken,
    /// X.509 binary security token
    X509,
    /// SAML assertion
    SamlAssertion,
    /// Kerberos ticket
    Kerberos,
    /// HTTP Basic credentials
    HttpBasic,
    /// OAuth bearer token
    Bearer,
}

/// A certificate that vouched for an authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    subject: String,
    der: Vec<u8>,
}

impl Certificate {
    /// Creates a certificate from its subject and DER encoding.
    pub fn new(subject: impl Into<String>, der: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            der: der.into(),
        }
    }

    /// Subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("der_len", &self.der.len())
            .finish()
    }
}

/// A credential artifact found in a message.
///
/// Deliberately has no `PartialEq`: token comparison goes through
/// [`is_same_token`](Self::is_same_token) only.
#[derive(Clone)]
pub struct SecurityToken {
    kind: SecurityTokenKind,
    element_id: Option<String>,
    content: Vec<u8>,
    certificate: Option<Certificate>,
}

impl SecurityToken {
    /// Creates a token of `kind` with its literal content.
    pub fn new(kind: SecurityTokenKind, content: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            element_id: None,
            content: content.into(),
            certificate: None,
        }
    }

    /// Sets the id of the element the token was read from.
    pub fn with_element_id(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    /// Sets the certificate the token was signed with.
    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Token kind.
    pub fn kind(&self) -> SecurityTokenKind {
        self.kind
    }

    /// Id of the element the token was read from.
    pub fn element_id(&self) -> Option<&str> {
        self.element_id.as_deref()
    }

    /// Literal token content.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Signing certificate.
    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    /// Returns true if `self` and `other` are the same token.
    ///
    /// Same instance, or same kind, element id and literal content. The
    /// certificate is not compared: two different tokens signed with one
    /// certificate are different tokens.
    pub fn is_same_token(&self, other: &SecurityToken) -> bool {
        std::ptr::eq(self, other)
            || (self.kind == other.kind
                && self.element_id == other.element_id
                && self.content == other.content)
    }
}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityToken")
            .field("kind", &self.kind)
            .field("element_id", &self.element_id)
            .field("content_len", &self.content.len())
            .field("certificate", &self.certificate)
            .finish()
    }
}

/// The outcome of one successful authentication.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use policy_context::{AuthenticationResult, SecurityToken, SecurityTokenKind, User};
///
/// let token = Rc::new(SecurityToken::new(SecurityTokenKind::Bearer, "abc"));
/// let result = AuthenticationResult::new(User::new("1", "alice", "idp1"))
///     .with_security_token(Rc::clone(&token));
///
/// assert!(result.matches_security_token(&token));
/// assert!(!result.matches_security_token(&SecurityToken::new(SecurityTokenKind::Bearer, "xyz")));
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    user: User,
    security_tokens: Vec<Rc<SecurityToken>>,
    certificate: Option<Certificate>,
    authenticated_at: DateTime<Utc>,
}

impl AuthenticationResult {
    /// Creates a result for `user`, authenticated now.
    pub fn new(user: User) -> Self {
        Self {
            user,
            security_tokens: Vec::new(),
            certificate: None,
            authenticated_at: Utc::now(),
        }
    }

    /// Adds a token the authentication was proven with.
    pub fn with_security_token(mut self, token: Rc<SecurityToken>) -> Self {
        self.security_tokens.push(token);
        self
    }

    /// Sets the certificate that authenticated the user.
    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Overrides the authentication time.
    pub fn authenticated_at(mut self, at: DateTime<Utc>) -> Self {
        self.authenticated_at = at;
        self
    }

    /// The authenticated user.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Tokens the authentication was proven with.
    pub fn security_tokens(&self) -> &[Rc<SecurityToken>] {
        &self.security_tokens
    }

    /// The authenticating certificate.
    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    /// When the user was authenticated.
    pub fn authentication_time(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    /// Returns true if `token` is one of the tokens that proved this result.
    ///
    /// Matching binds to the literal token, never to a certificate the token
    /// shares with another one.
    pub fn matches_security_token(&self, token: &SecurityToken) -> bool {
        self.security_tokens.iter().any(|t| t.is_same_token(token))
    }
}
