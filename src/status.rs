//! Outcome and level vocabularies shared across the context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome code produced by a completed assertion or by a whole policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssertionStatus {
    /// The assertion succeeded
    None,
    /// No outcome has been determined
    Undefined,
    /// The assertion did not apply to this message
    NotApplicable,
    /// The request was malformed
    BadRequest,
    /// Credentials are required but were not supplied
    AuthRequired,
    /// Supplied credentials were rejected
    AuthFailed,
    /// The authenticated identity may not perform this operation
    Unauthorized,
    /// No service matched the request
    ServiceNotFound,
    /// Internal gateway failure
    ServerError,
    /// The protected service could not be reached
    ServiceUnavailable,
    /// Error while processing the assertion
    Failed,
    /// The assertion evaluated to false
    Falsified,
    /// The routed response was unacceptable
    BadResponse,
}

impl AssertionStatus {
    /// Numeric code reported in audit records.
    pub fn numeric(self) -> i32 {
        match self {
            AssertionStatus::None => 0,
            AssertionStatus::Undefined => -1,
            AssertionStatus::NotApplicable => 1,
            AssertionStatus::BadRequest => 400,
            AssertionStatus::AuthRequired => 401,
            AssertionStatus::AuthFailed => 402,
            AssertionStatus::Unauthorized => 403,
            AssertionStatus::ServiceNotFound => 404,
            AssertionStatus::ServerError => 500,
            AssertionStatus::ServiceUnavailable => 503,
            AssertionStatus::Failed => 600,
            AssertionStatus::Falsified => 601,
            AssertionStatus::BadResponse => 602,
        }
    }

    /// Human-readable message for the status.
    pub fn message(self) -> &'static str {
        match self {
            AssertionStatus::None => "No Error",
            AssertionStatus::Undefined => "Undefined",
            AssertionStatus::NotApplicable => "Assertion Not Applicable",
            AssertionStatus::BadRequest => "Bad Request",
            AssertionStatus::AuthRequired => "Authentication Required",
            AssertionStatus::AuthFailed => "Authentication Failed",
            AssertionStatus::Unauthorized => "Unauthorized",
            AssertionStatus::ServiceNotFound => "Service Not Found",
            AssertionStatus::ServerError => "Server Error",
            AssertionStatus::ServiceUnavailable => "Service Unavailable",
            AssertionStatus::Failed => "Error in Assertion Processing",
            AssertionStatus::Falsified => "Assertion Falsified",
            AssertionStatus::BadResponse => "Bad Response",
        }
    }

    /// Audit level this status raises a failed request to.
    pub fn level(self) -> AuditLevel {
        match self {
            AssertionStatus::None | AssertionStatus::NotApplicable | AssertionStatus::Falsified => {
                AuditLevel::Info
            }
            _ => AuditLevel::Warning,
        }
    }
}

impl fmt::Display for AssertionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.numeric())
    }
}

/// Progress of routing the request to the protected service.
///
/// ```text
/// None --routing attempted--> Attempted --response received--> Routed
/// ```
///
/// A failed routing assertion leaves the status at `Attempted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum RoutingStatus {
    /// No routing assertion has run
    #[default]
    None,
    /// Routing was attempted but has not (yet) succeeded
    Attempted,
    /// The request was routed and a response received
    Routed,
}

impl RoutingStatus {
    /// Display name used by the `routingStatus` built-in variable.
    pub fn name(self) -> &'static str {
        match self {
            RoutingStatus::None => "None",
            RoutingStatus::Attempted => "Attempted",
            RoutingStatus::Routed => "Routed",
        }
    }
}

impl fmt::Display for RoutingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Audit record severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    /// Finest tracing detail
    Finest,
    /// Finer tracing detail
    Finer,
    /// Fine tracing detail
    Fine,
    /// Configuration messages
    Config,
    /// Informational messages
    #[default]
    Info,
    /// Potential problems
    Warning,
    /// Reserved for audit system events
    Severe,
}

impl AuditLevel {
    /// Upper-case name of the level.
    pub fn name(self) -> &'static str {
        match self {
            AuditLevel::Finest => "FINEST",
            AuditLevel::Finer => "FINER",
            AuditLevel::Fine => "FINE",
            AuditLevel::Config => "CONFIG",
            AuditLevel::Info => "INFO",
            AuditLevel::Warning => "WARNING",
            AuditLevel::Severe => "SEVERE",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AuditLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FINEST" => Ok(AuditLevel::Finest),
            "FINER" => Ok(AuditLevel::Finer),
            "FINE" => Ok(AuditLevel::Fine),
            "CONFIG" => Ok(AuditLevel::Config),
            "INFO" => Ok(AuditLevel::Info),
            "WARNING" => Ok(AuditLevel::Warning),
            "SEVERE" => Ok(AuditLevel::Severe),
            other => Err(format!("unknown audit level '{}'", other)),
        }
    }
}

/// How much detail a fault returned to the client carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultLevel {
    /// Close the connection without a response
    DropConnection,
    /// A fault without detail
    #[default]
    GenericFault,
    /// A fault naming the failing assertions
    MediumDetailFault,
    /// A fault with the full assertion trace
    FullTraceFault,
    /// A fault rendered from a configured template
    TemplateFault,
}
