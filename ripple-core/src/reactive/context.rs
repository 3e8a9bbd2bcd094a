//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when an observable is read,
//! the runtime asks the context for the current subscriber and records it.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes its subscriber ID;
//! the guard returned by [`ReactiveContext::enter`] pops it again when dropped,
//! so an inner effect finishing restores the outer one even if it panicked.
//!
//! [`ReactiveContext::untracked`] pushes an empty frame. Reads inside it see no
//! active subscriber, while the effects below it still count as running for
//! the reentrancy check.

use std::cell::RefCell;

use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone, Copy)]
struct ContextEntry {
    /// `None` for an untracked frame.
    subscriber_id: Option<SubscriberId>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { subscriber_id });
        });
        Self { subscriber_id }
    }

    /// Check if there is an active subscriber to track reads for.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Whether `subscriber_id` is anywhere on the stack.
    pub fn is_running(subscriber_id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|entry| entry.subscriber_id == Some(subscriber_id))
        })
    }

    /// Number of frames on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Ignore failures during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

/// Run `f` without tracking any reads it performs.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}
