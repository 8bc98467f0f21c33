use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};

type CloseCallback = Box<dyn FnOnce()>;

/// Callbacks run once when a context closes, last registered first.
#[derive(Default)]
pub(crate) struct CloseRegistry {
    callbacks: RefCell<Vec<CloseCallback>>,
    closed: Cell<bool>,
}

impl CloseRegistry {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Queues `callback`, or hands it back if the registry is already closed.
    pub(crate) fn register(&self, callback: CloseCallback) -> Option<CloseCallback> {
        if self.closed.get() {
            return Some(callback);
        }
        self.callbacks.borrow_mut().push(callback);
        None
    }

    /// Marks the registry closed. Returns false if it already was.
    pub(crate) fn begin_close(&self) -> bool {
        !self.closed.replace(true)
    }

    /// Runs and drops every queued callback, returning the panic messages of
    /// those that panicked.
    pub(crate) fn run_all(&self) -> Vec<String> {
        let mut failures = Vec::new();
        loop {
            let next = self.callbacks.borrow_mut().pop();
            let Some(callback) = next else {
                break;
            };
            if let Err(message) = run_guarded(callback) {
                failures.push(message);
            }
        }
        failures
    }
}

/// Runs `callback`, converting a panic into its message.
pub(crate) fn run_guarded(callback: CloseCallback) -> Result<(), String> {
    panic::catch_unwind(AssertUnwindSafe(callback)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "close callback panicked".to_string())
    })
}
