//! Error types for the policy enforcement context.
//!
//! Recoverable conditions (missing variables, read-only built-ins, values that
//! cannot be used as messages) are returned as [`Error`] values so the calling
//! assertion decides how the policy fails. Caller bugs such as finishing a
//! context twice panic instead; they are not represented here.

use thiserror::Error;

/// Errors raised by context operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The name is neither a built-in valid for this context nor a stored variable.
    #[error("no such variable: {name}")]
    NoSuchVariable {
        /// The requested variable name, as supplied by the caller
        name: String,
    },

    /// The name identifies a read-only built-in variable.
    #[error("variable is not settable: {name}")]
    NotSettable {
        /// The built-in variable name
        name: String,
    },

    /// The variable exists but cannot be presented as a message.
    #[error("no such message variable '{name}': value is {found}")]
    NotAMessage {
        /// The variable name
        name: String,
        /// Description of the offending value (its type, or its shape for lists)
        found: String,
    },

    /// A settable built-in rejected the supplied value.
    #[error("invalid value for variable '{name}': {reason}")]
    InvalidValue {
        /// The built-in variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A security token matched more than one ledger entry.
    ///
    /// The ledger never resolves this by picking one of the entries.
    #[error("security token matched {matches} ledger entries")]
    AmbiguousToken {
        /// Number of ledger entries that matched
        matches: usize,
    },

    /// The message has been closed and its body is gone.
    #[error("message is closed")]
    MessageClosed,

    /// A message body could not be encoded or decoded.
    #[error("message body is not valid {charset}: {reason}")]
    Encoding {
        /// Name of the charset in use
        charset: &'static str,
        /// Decoder or encoder failure detail
        reason: String,
    },

    /// Configuration failed validation.
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// Configuration file could not be read.
    #[error("configuration file error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias using the context [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn no_such_variable(name: impl Into<String>) -> Self {
        Error::NoSuchVariable { name: name.into() }
    }

    pub(crate) fn not_settable(name: impl Into<String>) -> Self {
        Error::NotSettable { name: name.into() }
    }

    /// Returns true for errors an assertion treats as "variable missing".
    ///
    /// Coercion failures count: to the policy a variable that is not usable as
    /// a message is as absent as one that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoSuchVariable { .. } | Error::NotAMessage { .. })
    }

    /// Returns true when a write targeted a read-only built-in.
    pub fn is_not_settable(&self) -> bool {
        matches!(self, Error::NotSettable { .. })
    }
}
