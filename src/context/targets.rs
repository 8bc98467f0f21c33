use std::rc::Rc;

use crate::audit::{AuditEvent, AuditEventKind};
use crate::auth::AuthenticationContext;
use crate::context::PolicyContext;
use crate::error::{Error, Result};
use crate::message::{ContentType, Message, MessageHandle, MessageTarget, VariableBacked};
use crate::variables::Value;

impl PolicyContext {
    /// Resolves `target` to a message without synthesizing one.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchVariable`] if a variable target does not exist, and
    /// [`Error::NotAMessage`] if it holds anything but a message.
    pub fn get_target_message(&self, target: &MessageTarget) -> Result<MessageHandle> {
        match target {
            MessageTarget::Request => Ok(self.request()),
            MessageTarget::Response => Ok(self.response()),
            MessageTarget::Variable(name) => self.message_variable(name, false),
        }
    }

    /// Resolves `target` to a message, creating a variable target that does
    /// not exist yet.
    ///
    /// A missing variable is set to a new empty message. With
    /// `allow_non_message_var`, a variable holding a string (or a list of
    /// exactly one string) is materialized as a new message seeded with that
    /// text. Every later body commit on the new message is written back to the
    /// variable when the decoded text differs from what the variable holds.
    /// The message is closed with this context.
    ///
    /// # Examples
    ///
    /// ```
    /// use policy_context::{ContextFactory, Message, MessageTarget, Value};
    ///
    /// let ctx = ContextFactory::default().create_root_context(Message::new(), Message::new(), true);
    /// ctx.set_variable("payload", Value::from(vec!["<a/>"])).unwrap();
    ///
    /// let target = MessageTarget::Variable("payload".into());
    /// let message = ctx.get_or_create_target_message(&target, true).unwrap();
    /// assert_eq!(message.borrow().body_text().unwrap(), "<a/>");
    ///
    /// message.borrow_mut().set_body_text("<b/>").unwrap();
    /// assert_eq!(ctx.get_variable("payload").unwrap(), Value::from("<b/>"));
    ///
    /// assert!(ctx.get_target_message(&target).unwrap_err().is_not_found());
    /// ```
    ///
    /// # Errors
    ///
    /// [`Error::NotSettable`] if a missing target names a built-in, and
    /// [`Error::NotAMessage`] if the variable holds anything but a message
    /// (or, with `allow_non_message_var`, a single string).
    pub fn get_or_create_target_message(
        &self,
        target: &MessageTarget,
        allow_non_message_var: bool,
    ) -> Result<MessageHandle> {
        match target {
            MessageTarget::Request => Ok(self.request()),
            MessageTarget::Response => Ok(self.response()),
            MessageTarget::Variable(name) => {
                match self.message_variable(name, allow_non_message_var) {
                    Err(Error::NoSuchVariable { .. }) => self.create_message_variable(name),
                    found => found,
                }
            }
        }
    }

    /// Ledger for the message `target` resolves to.
    pub fn authentication_context_for(
        &self,
        target: &MessageTarget,
    ) -> Result<Rc<AuthenticationContext>> {
        let message = self.get_target_message(target)?;
        Ok(self.authentication_context(&message))
    }

    fn message_variable(&self, name: &str, allow_non_message_var: bool) -> Result<MessageHandle> {
        let value = self.get_variable(name)?;
        let not_a_message = |found: String| Error::NotAMessage {
            name: name.to_string(),
            found,
        };
        let text = match &value {
            Value::Message(message) => return Ok(Rc::clone(message)),
            _ if !allow_non_message_var => {
                return Err(not_a_message(value.type_name().to_string()))
            }
            other => other.single_text().map_err(not_a_message)?,
        };

        let config = &self.shared.config;
        let content_type =
            ContentType::parse(&config.messages.variable_content_type).unwrap_or_default();
        let body = content_type.charset().encode(text)?;
        let mut message = Message::with_body(content_type, body);
        message.attach_knob(VariableBacked::new(name));

        if self.shared.builtins.resolve(name, self.kind).is_none() {
            self.install_write_back(&mut message, name);
        }

        let handle = message.into_handle();
        let owned = Rc::clone(&handle);
        self.run_on_close(move || owned.borrow_mut().close());
        tracing::debug!(
            request_id = %self.shared.request_id,
            variable = name,
            "materialized message from variable"
        );
        Ok(handle)
    }

    fn create_message_variable(&self, name: &str) -> Result<MessageHandle> {
        if self.shared.builtins.resolve(name, self.kind).is_some() {
            return Err(Error::not_settable(name));
        }
        let handle = Message::new().into_handle();
        self.set_variable(name, Value::Message(Rc::clone(&handle)))?;

        let owned = Rc::clone(&handle);
        self.run_on_close(move || owned.borrow_mut().close());
        tracing::debug!(
            request_id = %self.shared.request_id,
            variable = name,
            "created message variable"
        );
        Ok(handle)
    }

    fn install_write_back(&self, message: &mut Message, name: &str) {
        let store = Rc::downgrade(&self.owning_store(name));
        let charset_override = self.shared.config.write_back_charset();
        let auditor = Rc::clone(&self.shared.auditor);
        let request_id = self.shared.request_id;
        let variable = name.to_string();

        message.on_body_committed(move |bytes, declared| {
            let Some(store) = store.upgrade() else {
                return;
            };
            let charset = charset_override.unwrap_or(declared);
            match charset.decode(bytes) {
                Ok(derived) => {
                    let mut store = store.borrow_mut();
                    let key = match store.get_entry(&variable) {
                        Some((_, current)) if !needs_write_back(Some(current), &derived) => return,
                        Some((stored, _)) => stored.to_string(),
                        None => variable.clone(),
                    };
                    store.set(&key, Value::Text(derived));
                }
                Err(err) => {
                    tracing::warn!(
                        request_id = %request_id,
                        variable = %variable,
                        error = %err,
                        "message body not written back to variable"
                    );
                    auditor.record(
                        &AuditEvent::new(request_id, AuditEventKind::WriteBackFailed)
                            .with_variable(variable.as_str())
                            .with_detail(err.to_string()),
                    );
                }
            }
        });
    }
}

/// Returns true if writing `derived` back would change the variable.
///
/// A variable holding the same text, directly or as a one-element list, is left
/// untouched.
pub(crate) fn needs_write_back(current: Option<&Value>, derived: &str) -> bool {
    match current.map(Value::single_text) {
        Some(Ok(text)) => text != derived,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditTrail;
    use crate::config::ContextConfig;
    use crate::factory::ContextFactory;
    use crate::message::Charset;

    fn root() -> crate::context::ContextRef {
        ContextFactory::default().create_root_context(Message::new(), Message::new(), true)
    }

    fn var(name: &str) -> MessageTarget {
        MessageTarget::Variable(name.to_string())
    }

    #[test]
    fn write_back_only_when_text_changes() {
        assert!(!needs_write_back(Some(&Value::from("bar")), "bar"));
        assert!(!needs_write_back(Some(&Value::from(vec!["bar"])), "bar"));
        assert!(needs_write_back(Some(&Value::from("bar")), "baz"));
        assert!(needs_write_back(Some(&Value::Integer(1)), "1"));
        assert!(needs_write_back(None, "bar"));
    }

    #[test]
    fn request_and_response_targets_resolve_directly() {
        let ctx = root();
        let request = ctx.get_target_message(&MessageTarget::Request).unwrap();
        assert!(Rc::ptr_eq(&request, &ctx.request()));
        let response = ctx.get_target_message(&MessageTarget::Response).unwrap();
        assert!(Rc::ptr_eq(&response, &ctx.response()));
    }

    #[test]
    fn message_variable_is_returned_without_wrapping() {
        let ctx = root();
        let stored = Message::with_body(ContentType::default(), "x").into_handle();
        ctx.set_variable("m", Value::Message(Rc::clone(&stored))).unwrap();

        let found = ctx.get_or_create_target_message(&var("M"), true).unwrap();
        assert!(Rc::ptr_eq(&found, &stored));
        assert!(found.borrow().knob::<VariableBacked>().is_none());
    }

    #[test]
    fn singleton_list_materializes_and_tags_message() {
        let ctx = root();
        ctx.set_variable("foo", Value::from(vec!["bar"])).unwrap();

        let message = ctx.get_or_create_target_message(&var("foo"), true).unwrap();
        let message = message.borrow();
        assert_eq!(message.body_text().unwrap(), "bar");
        assert_eq!(message.content_type(), Some(&ContentType::default()));
        assert_eq!(
            message.knob::<VariableBacked>().map(VariableBacked::variable_name),
            Some("foo")
        );
    }

    #[test]
    fn coercion_failures_name_the_offending_type() {
        let ctx = root();
        ctx.set_variable("n", 5i64).unwrap();
        ctx.set_variable("empty", Value::List(Vec::new())).unwrap();
        ctx.set_variable("many", Value::from(vec!["a", "b"])).unwrap();
        ctx.set_variable("text", "plain").unwrap();

        let found = |name: &str, allow: bool| match ctx
            .get_or_create_target_message(&var(name), allow)
            .unwrap_err()
        {
            Error::NotAMessage { found, .. } => found,
            other => panic!("unexpected error: {other}"),
        };
        assert_eq!(found("n", true), "integer");
        assert_eq!(found("empty", true), "empty list");
        assert_eq!(found("many", true), "list of 2 values");
        assert_eq!(found("text", false), "string");

        let missing = ctx.get_target_message(&var("absent"));
        assert!(matches!(missing, Err(Error::NoSuchVariable { .. })));
    }

    #[test]
    fn missing_variable_target_is_created_as_message() {
        let ctx = root();
        let message = ctx
            .get_or_create_target_message(&var("testMessage"), false)
            .unwrap();

        match ctx.get_variable("TESTMESSAGE").unwrap() {
            Value::Message(stored) => assert!(Rc::ptr_eq(&stored, &message)),
            other => panic!("expected a message, got {}", other.type_name()),
        }
        assert!(message.borrow().knob::<VariableBacked>().is_none());

        let again = ctx.get_target_message(&var("testMessage")).unwrap();
        assert!(Rc::ptr_eq(&again, &message));

        ctx.close();
        assert!(message.borrow().is_closed());
    }

    #[test]
    fn missing_builtin_target_is_not_created() {
        let ctx = root();
        let err = ctx
            .get_or_create_target_message(&var("routing.url"), true)
            .unwrap_err();
        assert!(err.is_not_settable());
    }

    #[test]
    fn body_commit_writes_back_once_per_change() {
        let ctx = root();
        ctx.set_variable("Doc", "one").unwrap();
        let message = ctx.get_or_create_target_message(&var("doc"), true).unwrap();

        let before = ctx.variables.borrow().revision();
        message.borrow_mut().set_body_text("one").unwrap();
        assert_eq!(ctx.variables.borrow().revision(), before);

        message.borrow_mut().set_body_text("two").unwrap();
        assert_eq!(ctx.variables.borrow().revision(), before + 1);
        assert_eq!(ctx.get_variable("doc").unwrap(), Value::from("two"));
        assert_eq!(ctx.variable_names(), vec!["Doc".to_string()]);

        message.borrow_mut().set_body_text("two").unwrap();
        assert_eq!(ctx.variables.borrow().revision(), before + 1);
    }

    #[test]
    fn write_back_follows_pass_through_to_parent() {
        let factory = ContextFactory::default();
        let parent = factory.create_root_context(Message::new(), Message::new(), true);
        parent.set_variable("body", "a").unwrap();
        let child = factory.create_child_context(&parent);
        child.pass_variable_to_parent("body", false);

        let message = child.get_or_create_target_message(&var("body"), true).unwrap();
        message.borrow_mut().set_body_text("b").unwrap();
        assert_eq!(parent.get_variable("body").unwrap(), Value::from("b"));
    }

    #[test]
    fn builtin_text_materializes_without_write_back() {
        let ctx = root();
        let message = ctx
            .get_or_create_target_message(&var("requestId"), true)
            .unwrap();
        message.borrow_mut().set_body_text("forged").unwrap();
        assert_eq!(
            ctx.get_variable("requestId").unwrap(),
            Value::Text(ctx.request_id().to_string())
        );
    }

    #[test]
    fn undecodable_body_is_audited() {
        let trail = Rc::new(AuditTrail::new());
        let ctx = ContextFactory::default()
            .with_auditor(trail.clone())
            .create_root_context(Message::new(), Message::new(), true);
        ctx.set_variable("raw", "ok").unwrap();
        let message = ctx.get_or_create_target_message(&var("raw"), true).unwrap();

        message.borrow_mut().set_body(vec![0xff, 0xfe]).unwrap();
        assert_eq!(ctx.get_variable("raw").unwrap(), Value::from("ok"));
        assert_eq!(trail.count(AuditEventKind::WriteBackFailed), 1);
    }

    #[test]
    fn charset_override_is_used_for_write_back() {
        let mut config = ContextConfig::default();
        config.messages.write_back_charset = Some("iso-8859-1".into());
        let ctx = ContextFactory::new(config).create_root_context(
            Message::new(),
            Message::new(),
            true,
        );
        ctx.set_variable("latin", "x").unwrap();
        let message = ctx.get_or_create_target_message(&var("latin"), true).unwrap();

        message.borrow_mut().set_body(vec![0x63, 0x61, 0x66, 0xe9]).unwrap();
        assert_eq!(ctx.get_variable("latin").unwrap(), Value::from("caf\u{e9}"));
        assert_eq!(Charset::Iso8859_1.name(), "iso-8859-1");
    }

    #[test]
    fn synthesized_message_closes_with_context() {
        let ctx = root();
        ctx.set_variable("v", "text").unwrap();
        let message = ctx.get_or_create_target_message(&var("v"), true).unwrap();
        assert!(!message.borrow().is_closed());
        ctx.close();
        assert!(message.borrow().is_closed());
    }

    #[test]
    fn authentication_context_follows_target() {
        let ctx = root();
        let by_target = ctx
            .authentication_context_for(&MessageTarget::Request)
            .unwrap();
        assert!(Rc::ptr_eq(&by_target, &ctx.default_authentication_context()));

        let other = Message::with_body(ContentType::default(), "x").into_handle();
        ctx.set_variable("other", Value::Message(other)).unwrap();
        let separate = ctx.authentication_context_for(&var("other")).unwrap();
        assert!(!Rc::ptr_eq(&separate, &by_target));
        assert!(ctx.authentication_context_for(&var("missing")).is_err());
    }
}
