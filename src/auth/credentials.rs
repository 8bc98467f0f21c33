use crate::secret::Secret;

/// How credential material was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialFormat {
    /// Plain-text password
    ClearText,
    /// HTTP digest response
    Digest,
    /// Client certificate
    ClientCert,
    /// SAML assertion
    Saml,
    /// Kerberos ticket
    Kerberos,
    /// Opaque token such as an OAuth bearer token
    OpaqueToken,
}

/// Credentials collected from a message, not yet (or not necessarily) authenticated.
#[derive(Debug)]
pub struct LoginCredentials {
    login: String,
    secret: Secret<Vec<u8>>,
    format: CredentialFormat,
    source: String,
}

impl LoginCredentials {
    /// Creates credentials gathered by the assertion named `source`.
    pub fn new(
        login: impl Into<String>,
        secret: impl Into<Vec<u8>>,
        format: CredentialFormat,
        source: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            secret: Secret::new(secret.into()),
            format,
            source: source.into(),
        }
    }

    /// Claimed login name.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Credential material. Never log what this wraps.
    pub fn secret(&self) -> &Secret<Vec<u8>> {
        &self.secret
    }

    /// Presentation format.
    pub fn format(&self) -> CredentialFormat {
        self.format
    }

    /// Name of the assertion that collected the credentials.
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let creds = LoginCredentials::new("alice", "hunter2", CredentialFormat::ClearText, "basic");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(creds.secret().expose_secret().as_slice(), b"hunter2");
    }
}
