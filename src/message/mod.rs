//! Minimal message abstraction.
//!
//! A [`Message`] is an owned, closable byte body with a declared content type.
//! Code elsewhere in the gateway can tag a message with typed knobs and observe
//! every body commit through hooks. The context only relies on this surface;
//! parsing of structured payloads lives outside the crate.

mod charset;
mod target;

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

pub use charset::{Charset, ContentType};
pub use target::{MessageTarget, VariableBacked};

/// Shared handle to a message.
///
/// The request and response messages are reachable from the root context and
/// from every child, so they are held behind `Rc<RefCell<_>>`.
pub type MessageHandle = Rc<RefCell<Message>>;

type BodyHook = Box<dyn FnMut(&[u8], Charset)>;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    fn next() -> Self {
        Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// A request, response, or variable-backed message.
///
/// # Examples
///
/// ```
/// use policy_context::{ContentType, Message};
///
/// let mut msg = Message::new();
/// msg.initialize(ContentType::parse("text/xml; charset=utf-8").unwrap(), b"<a/>".to_vec())
///     .unwrap();
/// assert_eq!(msg.body_text().unwrap(), "<a/>");
///
/// msg.close();
/// assert!(msg.body_bytes().is_err());
/// ```
pub struct Message {
    id: MessageId,
    content_type: Option<ContentType>,
    body: Option<Vec<u8>>,
    knobs: HashMap<TypeId, Box<dyn Any>>,
    hooks: Vec<BodyHook>,
    closed: bool,
}

impl Message {
    /// Creates an uninitialized message.
    pub fn new() -> Self {
        Self {
            id: MessageId::next(),
            content_type: None,
            body: None,
            knobs: HashMap::new(),
            hooks: Vec::new(),
            closed: false,
        }
    }

    /// Creates a message already holding `body`.
    ///
    /// No hooks exist yet, so nothing observes this first commit.
    pub fn with_body(content_type: ContentType, body: impl Into<Vec<u8>>) -> Self {
        let mut message = Self::new();
        message.content_type = Some(content_type);
        message.body = Some(body.into());
        message
    }

    /// Wraps the message in a shared handle.
    pub fn into_handle(self) -> MessageHandle {
        Rc::new(RefCell::new(self))
    }

    /// Returns the message identifier.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the declared content type, if the message has been initialized.
    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    /// Returns the declared body charset, UTF-8 when none is declared.
    pub fn charset(&self) -> Charset {
        self.content_type
            .as_ref()
            .map(ContentType::charset)
            .unwrap_or_default()
    }

    /// Returns true once a body has been committed.
    pub fn is_initialized(&self) -> bool {
        self.body.is_some()
    }

    /// Returns true after [`close`](Self::close).
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the body bytes; empty for an uninitialized message.
    pub fn body_bytes(&self) -> Result<&[u8]> {
        self.ensure_open()?;
        Ok(self.body.as_deref().unwrap_or_default())
    }

    /// Decodes the body using the declared charset.
    pub fn body_text(&self) -> Result<String> {
        let bytes = self.body_bytes()?;
        self.charset().decode(bytes)
    }

    /// Sets the content type and body, then fires every body hook.
    pub fn initialize(&mut self, content_type: ContentType, body: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_open()?;
        self.content_type = Some(content_type);
        self.commit(body.into());
        Ok(())
    }

    /// Replaces the body, keeping the content type, then fires every body hook.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_open()?;
        if self.content_type.is_none() {
            self.content_type = Some(ContentType::default());
        }
        self.commit(body.into());
        Ok(())
    }

    /// Encodes `text` with the declared charset and commits it as the body.
    pub fn set_body_text(&mut self, text: &str) -> Result<()> {
        let bytes = self.charset().encode(text)?;
        self.set_body(bytes)
    }

    /// Registers a hook run after every body commit.
    ///
    /// The hook receives the committed bytes and the declared charset.
    pub fn on_body_committed(&mut self, hook: impl FnMut(&[u8], Charset) + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Attaches a typed knob, replacing any knob of the same type.
    pub fn attach_knob<K: Any>(&mut self, knob: K) {
        self.knobs.insert(TypeId::of::<K>(), Box::new(knob));
    }

    /// Returns the knob of type `K`, if attached.
    pub fn knob<K: Any>(&self) -> Option<&K> {
        self.knobs
            .get(&TypeId::of::<K>())
            .and_then(|knob| knob.downcast_ref::<K>())
    }

    /// Returns the knob of type `K` mutably, if attached.
    pub fn knob_mut<K: Any>(&mut self) -> Option<&mut K> {
        self.knobs
            .get_mut(&TypeId::of::<K>())
            .and_then(|knob| knob.downcast_mut::<K>())
    }

    /// Releases the body, knobs and hooks. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.body = None;
        self.knobs.clear();
        self.hooks.clear();
        tracing::trace!(message = %self.id, "message closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::MessageClosed)
        } else {
            Ok(())
        }
    }

    fn commit(&mut self, body: Vec<u8>) {
        let charset = self.charset();
        let body: &[u8] = self.body.insert(body);
        for hook in self.hooks.iter_mut() {
            hook(body, charset);
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("knobs", &self.knobs.len())
            .field("hooks", &self.hooks.len())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique() {
        assert_ne!(Message::new().id(), Message::new().id());
    }

    #[test]
    fn uninitialized_message_has_empty_body() {
        let msg = Message::new();
        assert!(!msg.is_initialized());
        assert_eq!(msg.body_bytes().unwrap(), b"");
        assert_eq!(msg.charset(), Charset::Utf8);
    }

    #[test]
    fn hooks_fire_on_every_commit() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut msg = Message::new();
        let sink = Rc::clone(&seen);
        msg.on_body_committed(move |bytes, charset| {
            sink.borrow_mut().push((bytes.to_vec(), charset));
        });

        msg.initialize(ContentType::parse("text/plain; charset=iso-8859-1").unwrap(), b"a".to_vec())
            .unwrap();
        msg.set_body(b"b".to_vec()).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (b"a".to_vec(), Charset::Iso8859_1));
        assert_eq!(seen[1], (b"b".to_vec(), Charset::Iso8859_1));
    }

    #[test]
    fn with_body_does_not_fire_hooks() {
        let msg = Message::with_body(ContentType::default(), "hello");
        assert!(msg.is_initialized());
        assert_eq!(msg.body_text().unwrap(), "hello");
    }

    #[test]
    fn set_body_text_uses_declared_charset() {
        let mut msg = Message::new();
        msg.initialize(ContentType::parse("text/plain; charset=iso-8859-1").unwrap(), Vec::new())
            .unwrap();
        msg.set_body_text("caf\u{e9}").unwrap();
        assert_eq!(msg.body_bytes().unwrap(), &[b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn knobs_are_typed() {
        let mut msg = Message::new();
        msg.attach_knob(VariableBacked::new("foo"));
        assert_eq!(msg.knob::<VariableBacked>().unwrap().variable_name(), "foo");
        assert!(msg.knob::<u32>().is_none());

        msg.attach_knob(7u32);
        *msg.knob_mut::<u32>().unwrap() += 1;
        assert_eq!(msg.knob::<u32>(), Some(&8));
    }

    #[test]
    fn closed_message_rejects_access() {
        let mut msg = Message::with_body(ContentType::default(), "x");
        msg.attach_knob(1u8);
        msg.close();
        msg.close();

        assert!(msg.is_closed());
        assert!(matches!(msg.body_bytes(), Err(Error::MessageClosed)));
        assert!(matches!(msg.set_body(b"y".to_vec()), Err(Error::MessageClosed)));
        assert!(msg.knob::<u8>().is_none());
    }

    #[test]
    fn debug_reports_length_not_content() {
        let msg = Message::with_body(ContentType::default(), "password=hunter2");
        let debug = format!("{:?}", msg);
        assert!(debug.contains("body_len"));
        assert!(!debug.contains("hunter2"));
    }
}
