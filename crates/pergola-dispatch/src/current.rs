//! Request-scoped current-action binding.
//!
//! Handler code occasionally needs to know which action is serving the
//! running request - for logging, for building links back to itself. The
//! binding is a thread-local stack (nested dispatches push and pop), so it
//! is scoped to the request being served on this thread, never
//! process-global.

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::resolve::Action;

/// A snapshot of the action currently being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentAction {
    pub handler: String,
    pub mount: String,
    pub method: String,
}

thread_local! {
    static STACK: RefCell<Vec<CurrentAction>> = const { RefCell::new(Vec::new()) };
}

/// The action currently being served on this thread, if any.
pub fn current() -> Option<CurrentAction> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

/// Installs `action` as current until the guard drops.
pub(crate) fn bind(action: &Action) -> BoundAction {
    STACK.with(|stack| {
        stack.borrow_mut().push(CurrentAction {
            handler: action.handler().name().to_string(),
            mount: action.mount().to_string(),
            method: action.method().to_string(),
        })
    });
    BoundAction {
        _not_send: PhantomData,
    }
}

/// RAII guard for the current-action binding. Pops on drop; deliberately
/// not `Send`, the binding belongs to the dispatching thread.
pub struct BoundAction {
    _not_send: PhantomData<*const ()>,
}

impl Drop for BoundAction {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
