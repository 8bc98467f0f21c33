//! Context variable values and the case-insensitive variable store.
//!
//! Built-in (computed) variables are resolved through [`BuiltinResolver`]
//! before the store is consulted; see [`PolicyContext::get_variable`](crate::PolicyContext::get_variable).

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::message::MessageHandle;

pub use builtin::{
    Availability, BuiltinGetter, BuiltinRegistry, BuiltinResolver, BuiltinSetter, BuiltinVariable,
};

/// A value held in a context variable.
#[derive(Debug, Clone)]
pub enum Value {
    /// Present but empty
    Null,
    /// A string
    Text(String),
    /// A signed integer
    Integer(i64),
    /// A boolean
    Boolean(bool),
    /// A point in time
    Timestamp(DateTime<Utc>),
    /// A multi-valued variable
    List(Vec<Value>),
    /// A message object
    Message(MessageHandle),
}

impl Value {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "string",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Message(_) => "message",
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string, if this is a [`Value::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer, if this is a [`Value::Integer`].
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean, if this is a [`Value::Boolean`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements, if this is a [`Value::List`].
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the message handle, if this is a [`Value::Message`].
    pub fn as_message(&self) -> Option<&MessageHandle> {
        match self {
            Value::Message(handle) => Some(handle),
            _ => None,
        }
    }

    /// Coerces the value into the single string a synthesized message is seeded with.
    ///
    /// A string, or a list holding exactly one string, qualifies. Anything else
    /// is rejected with a description of what was found.
    pub(crate) fn single_text(&self) -> Result<&str, String> {
        match self {
            Value::Text(text) => Ok(text),
            Value::List(items) => match items.as_slice() {
                [] => Err("empty list".into()),
                [Value::Text(text)] => Ok(text),
                [other] => Err(format!("list containing {}", other.type_name())),
                many => Err(format!("list of {} values", many.len())),
            },
            other => Err(other.type_name().into()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // Messages compare by identity
            (Value::Message(a), Value::Message(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(text) => f.write_str(text),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Message(handle) => match handle.try_borrow() {
                Ok(message) => write!(f, "<message {}>", message.id()),
                Err(_) => f.write_str("<message>"),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<MessageHandle> for Value {
    fn from(value: MessageHandle) -> Self {
        Value::Message(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

/// Case-insensitive name to value table.
///
/// Keys are folded to lower case for lookup. The casing most recently used to
/// set a variable is kept as its display name and returned by batch lookups.
#[derive(Debug, Default)]
pub struct VariableStore {
    entries: HashMap<String, Entry>,
    revision: u64,
}

#[derive(Debug)]
struct Entry {
    name: String,
    value: Value,
}

impl VariableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any case-insensitively equal variable and its casing.
    ///
    /// Returns the previous value.
    pub fn set(&mut self, name: &str, value: Value) -> Option<Value> {
        self.revision += 1;
        self.entries
            .insert(
                name.to_lowercase(),
                Entry {
                    name: name.to_string(),
                    value,
                },
            )
            .map(|old| old.value)
    }

    /// Looks up `name` ignoring case.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&name.to_lowercase()).map(|e| &e.value)
    }

    /// Looks up `name` ignoring case, returning the stored casing with the value.
    pub fn get_entry(&self, name: &str) -> Option<(&str, &Value)> {
        self.entries
            .get(&name.to_lowercase())
            .map(|e| (e.name.as_str(), &e.value))
    }

    /// Removes `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let removed = self.entries.remove(&name.to_lowercase()).map(|e| e.value);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Returns true if `name` is stored.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Stored names in their current casing, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.name.as_str())
    }

    /// Number of stored variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of mutations applied so far.
    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentType, Message};

    #[test]
    fn set_is_case_insensitive_and_adopts_new_casing() {
        let mut store = VariableStore::new();
        store.set("Foo.Bar", Value::from("one"));
        assert_eq!(store.get("foo.bar"), Some(&Value::from("one")));

        let old = store.set("FOO.bar", Value::from("two"));
        assert_eq!(old, Some(Value::from("one")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_entry("foo.BAR"), Some(("FOO.bar", &Value::from("two"))));
    }

    #[test]
    fn remove_ignores_case() {
        let mut store = VariableStore::new();
        store.set("token", Value::from(5i64));
        assert_eq!(store.remove("TOKEN"), Some(Value::Integer(5)));
        assert!(store.is_empty());
        assert_eq!(store.remove("token"), None);
    }

    #[test]
    fn revision_counts_mutations() {
        let mut store = VariableStore::new();
        assert_eq!(store.revision(), 0);
        store.set("a", Value::Null);
        store.remove("b");
        store.remove("a");
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn single_text_accepts_string_and_singleton_list() {
        assert_eq!(Value::from("bar").single_text(), Ok("bar"));
        assert_eq!(Value::from(vec!["bar"]).single_text(), Ok("bar"));
    }

    #[test]
    fn single_text_describes_rejections() {
        assert_eq!(Value::Integer(3).single_text(), Err("integer".to_string()));
        assert_eq!(
            Value::List(Vec::new()).single_text(),
            Err("empty list".to_string())
        );
        assert_eq!(
            Value::from(vec!["a", "b", "c"]).single_text(),
            Err("list of 3 values".to_string())
        );
        assert_eq!(
            Value::List(vec![Value::Boolean(true)]).single_text(),
            Err("list containing boolean".to_string())
        );
    }

    #[test]
    fn messages_compare_by_identity() {
        let a = Message::with_body(ContentType::default(), "x").into_handle();
        let b = Message::with_body(ContentType::default(), "x").into_handle();
        assert_eq!(Value::Message(Rc::clone(&a)), Value::Message(Rc::clone(&a)));
        assert_ne!(Value::Message(a), Value::Message(b));
    }

    #[test]
    fn list_display_joins_elements() {
        let value = Value::List(vec![Value::Integer(1), Value::from("two")]);
        assert_eq!(value.to_string(), "1, two");
    }
}
