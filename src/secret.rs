use std::fmt;

/// Redacting wrapper for credential material gathered during a request.
///
/// Passwords, bearer tokens and similar values collected into the
/// authentication ledger are held in a `Secret` so that dumping a context or a
/// ledger with `{:?}` never writes them to the log.
///
/// Access is only possible through [`expose_secret`](Self::expose_secret).
///
/// # Examples
///
/// ```
/// use policy_context::Secret;
///
/// let password = Secret::new(b"hunter2".to_vec());
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.expose_secret().as_slice(), b"hunter2");
/// ```
// Must not derive Clone, Copy or Default, and must not implement Deref or AsRef.
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// Callers must not log or display what this returns.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
