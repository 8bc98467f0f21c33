use std::fmt;

/// The message an assertion is configured to operate on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageTarget {
    /// The inbound request
    Request,
    /// The response being built or received from the backend
    Response,
    /// A message held in, or synthesized from, a context variable
    Variable(String),
}

impl MessageTarget {
    /// Short name used in audit and log records.
    pub fn name(&self) -> &str {
        match self {
            MessageTarget::Request => "request",
            MessageTarget::Response => "response",
            MessageTarget::Variable(name) => name,
        }
    }
}

impl fmt::Display for MessageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageTarget::Variable(name) => write!(f, "${{{}}}", name),
            other => f.write_str(other.name()),
        }
    }
}

/// Knob marking a message synthesized from a string variable.
///
/// Body commits on such a message are written back to the named variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBacked {
    variable_name: String,
}

impl VariableBacked {
    pub(crate) fn new(variable_name: impl Into<String>) -> Self {
        Self {
            variable_name: variable_name.into(),
        }
    }

    /// Name of the originating variable.
    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }
}
