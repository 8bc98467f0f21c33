//! Thread-scoped "current context" holder.
//!
//! Some helper code runs deep below an assertion and has no context parameter.
//! It can read the context installed for the current thread with [`current`].
//! Prefer passing `&PolicyContext` explicitly in new code.
//!
//! Contexts are `!Send` (they are `Rc`/`RefCell` based), so a context never
//! leaves the thread that created it and a thread-local holder is enough.

use std::cell::RefCell;

use crate::context::ContextRef;

thread_local! {
    static CURRENT: RefCell<Option<ContextRef>> = const { RefCell::new(None) };
}

/// Guard returned by [`enter`]; restores the previously current context on drop.
///
/// Guards must be dropped in reverse order of creation, which scoping gives
/// for free.
#[must_use = "the context is only current while the guard is alive"]
pub struct CurrentContextGuard {
    previous: Option<ContextRef>,
}

impl Drop for CurrentContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The thread-local is gone only during thread teardown
        let _ = CURRENT.try_with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Installs `ctx` as the current context until the guard drops.
pub fn enter(ctx: ContextRef) -> CurrentContextGuard {
    let previous = CURRENT.with(|slot| slot.borrow_mut().replace(ctx));
    CurrentContextGuard { previous }
}

/// The context installed for this thread, if any.
pub fn current() -> Option<ContextRef> {
    CURRENT.with(|slot| slot.borrow().clone())
}
