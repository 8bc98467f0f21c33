use std::collections::HashMap;
use std::fmt;

use crate::context::{ContextKind, PolicyContext};
use crate::error::{Error, Result};
use crate::status::AuditLevel;
use crate::variables::Value;

/// Computes a built-in variable. Receives the name exactly as requested.
pub type BuiltinGetter = fn(&PolicyContext, &str) -> Option<Value>;

/// Applies a write to a settable built-in variable.
pub type BuiltinSetter = fn(&PolicyContext, &str, Value) -> Result<()>;

/// Which kinds of context a built-in variable is recognized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    /// Root and child contexts
    #[default]
    Everywhere,
    /// Only the context created for the inbound request
    RootOnly,
    /// Only contexts created for included policies
    ChildOnly,
}

impl Availability {
    fn admits(self, kind: ContextKind) -> bool {
        match self {
            Availability::Everywhere => true,
            Availability::RootOnly => kind == ContextKind::Root,
            Availability::ChildOnly => kind == ContextKind::Child,
        }
    }
}

/// A computed variable derived from context state.
#[derive(Clone)]
pub struct BuiltinVariable {
    name: String,
    prefixed: bool,
    availability: Availability,
    getter: BuiltinGetter,
    setter: Option<BuiltinSetter>,
}

impl BuiltinVariable {
    /// Creates a read-only built-in answering exactly `name`.
    pub fn new(name: impl Into<String>, getter: BuiltinGetter) -> Self {
        Self {
            name: name.into(),
            prefixed: false,
            availability: Availability::Everywhere,
            getter,
            setter: None,
        }
    }

    /// Makes the built-in answer every name under `name.` as well.
    pub fn prefixed(mut self) -> Self {
        self.prefixed = true;
        self
    }

    /// Restricts the context kinds the built-in is recognized in.
    pub fn available(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    /// Makes the built-in writable through `setter`.
    pub fn settable(mut self, setter: BuiltinSetter) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Registered name in its original casing.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true for prefix entries.
    pub fn is_prefixed(&self) -> bool {
        self.prefixed
    }

    /// Returns true if writes are accepted.
    pub fn is_settable(&self) -> bool {
        self.setter.is_some()
    }

    /// Returns the availability restriction.
    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// Returns true if the built-in is recognized in a context of `kind`.
    pub fn is_valid_for(&self, kind: ContextKind) -> bool {
        self.availability.admits(kind)
    }

    pub(crate) fn get(&self, ctx: &PolicyContext, name: &str) -> Option<Value> {
        (self.getter)(ctx, name)
    }

    pub(crate) fn set(&self, ctx: &PolicyContext, name: &str, value: Value) -> Result<()> {
        match self.setter {
            Some(setter) => setter(ctx, name, value),
            None => Err(Error::not_settable(name)),
        }
    }
}

impl fmt::Debug for BuiltinVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinVariable")
            .field("name", &self.name)
            .field("prefixed", &self.prefixed)
            .field("availability", &self.availability)
            .field("settable", &self.is_settable())
            .finish()
    }
}

/// Decides which names are built-in variables.
///
/// The context consults the resolver before its own variable store on every
/// read and write, so the resolver owns all built-in semantics.
pub trait BuiltinResolver {
    /// Returns the built-in answering `name` in a context of `kind`, if any.
    fn resolve(&self, name: &str, kind: ContextKind) -> Option<&BuiltinVariable>;
}

/// Table-driven [`BuiltinResolver`].
///
/// Exact names are checked first. Prefix entries are then probed with the full
/// name and with each shorter name obtained by trimming at the last `.`, so
/// `request.cookie.session` finds a `request.cookie` prefix entry. Matching
/// ignores case.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    exact: HashMap<String, BuiltinVariable>,
    prefixes: HashMap<String, BuiltinVariable>,
}

impl BuiltinRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a built-in.
    pub fn register(&mut self, variable: BuiltinVariable) -> &mut Self {
        let key = variable.name.to_lowercase();
        if variable.prefixed {
            self.prefixes.insert(key, variable);
        } else {
            self.exact.insert(key, variable);
        }
        self
    }

    /// Number of registered built-ins.
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The gateway's standard built-in variables.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register(BuiltinVariable::new("request", |ctx, _| {
                Some(Value::Message(ctx.request()))
            }))
            .register(BuiltinVariable::new("response", |ctx, _| {
                Some(Value::Message(ctx.response()))
            }))
            .register(BuiltinVariable::new("requestId", |ctx, _| {
                Some(Value::Text(ctx.request_id().to_string()))
            }))
            .register(BuiltinVariable::new("routingStatus", |ctx, _| {
                Some(Value::from(ctx.routing_status().name()))
            }))
            .register(BuiltinVariable::new("routing.url", |ctx, _| {
                ctx.routed_service_url().map(Value::Text)
            }))
            .register(BuiltinVariable::new("routing.totalTime", |ctx, _| {
                Some(millis(ctx.routing_total_time()))
            }))
            .register(BuiltinVariable::new("request.elapsedTime", |ctx, _| {
                Some(millis(ctx.elapsed()))
            }))
            .register(BuiltinVariable::new("request.authenticated", |ctx, _| {
                Some(Value::Boolean(
                    ctx.default_authentication_context().is_authenticated(),
                ))
            }))
            .register(BuiltinVariable::new("request.authenticatedUser", |ctx, _| {
                Some(
                    ctx.default_authentication_context()
                        .last_authenticated_user()
                        .map(|user| Value::Text(user.login().to_string()))
                        .unwrap_or(Value::Null),
                )
            }))
            .register(BuiltinVariable::new("request.compression.gzip.found", |ctx, _| {
                Some(Value::Boolean(ctx.is_compressed_request()))
            }))
            .register(BuiltinVariable::new("assertion.number", |ctx, _| {
                Some(ordinals(&ctx.assertion_number()))
            }))
            .register(BuiltinVariable::new("assertion.numberStr", |ctx, _| {
                Some(Value::Text(dotted(&ctx.assertion_number())))
            }))
            .register(BuiltinVariable::new("assertion.latency", |ctx, _| {
                Some(millis(ctx.assertion_latency()))
            }))
            .register(
                BuiltinVariable::new("assertion.parentNumber", |ctx, _| {
                    Some(ordinals(&ctx.assertion_ordinal_prefix()))
                })
                .available(Availability::ChildOnly),
            )
            .register(
                BuiltinVariable::new("auditLevel", |ctx, _| {
                    Some(Value::from(ctx.audit_level().name()))
                })
                .settable(set_audit_level),
            )
            .register(
                BuiltinVariable::new("request.cookie", |ctx, name| {
                    let cookie_name = name.get("request.cookie.".len()..)?;
                    ctx.cookies()
                        .into_iter()
                        .find(|c| c.name().eq_ignore_ascii_case(cookie_name))
                        .map(|c| Value::Text(c.value().to_string()))
                })
                .prefixed(),
            );
        registry
    }
}

impl BuiltinResolver for BuiltinRegistry {
    fn resolve(&self, name: &str, kind: ContextKind) -> Option<&BuiltinVariable> {
        let lname = name.to_lowercase();
        if let Some(var) = self.exact.get(&lname).filter(|v| v.is_valid_for(kind)) {
            return Some(var);
        }

        let mut probe = lname.as_str();
        loop {
            if let Some(var) = self.prefixes.get(probe).filter(|v| v.is_valid_for(kind)) {
                return Some(var);
            }
            match probe.rfind('.') {
                Some(pos) if pos > 0 => probe = &probe[..pos],
                _ => return None,
            }
        }
    }
}

fn set_audit_level(ctx: &PolicyContext, name: &str, value: Value) -> Result<()> {
    let invalid = |reason: String| Error::InvalidValue {
        name: name.to_string(),
        reason,
    };
    let text = value
        .as_text()
        .ok_or_else(|| invalid(format!("expected a level name, got {}", value.type_name())))?;
    let level: AuditLevel = text.parse().map_err(invalid)?;
    if level == AuditLevel::Severe {
        return Err(invalid("SEVERE is reserved for audit system events".into()));
    }
    ctx.set_audit_level(level);
    Ok(())
}

fn millis(duration: std::time::Duration) -> Value {
    Value::Integer(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
}

fn ordinals(path: &[u32]) -> Value {
    Value::List(path.iter().map(|&n| Value::Integer(i64::from(n))).collect())
}

fn dotted(path: &[u32]) -> String {
    path.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
