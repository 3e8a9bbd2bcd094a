//! Effect Implementation
//!
//! An Effect is a registered procedure that re-runs whenever the observables
//! it read change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its procedure immediately to establish
//!    initial dependencies, unless it was registered as lazy.
//!
//! 2. While the procedure runs, the effect sits on the context stack, so every
//!    tracked read records it as a subscriber.
//!
//! 3. When a dependency is triggered, the effect runs again, or its scheduler
//!    override is called with the effect handle instead.
//!
//! Dependencies accumulate across runs. Use [`Effect::stop`] to drop them.
//!
//! # Reentrancy
//!
//! An effect that is already on the context stack is never started again.
//! A procedure that writes to something it also reads therefore runs once per
//! outside trigger instead of recursing without bound.
//!
//! # Ownership
//!
//! The runtime only holds weak references. Dropping the last handle to an
//! effect unregisters it and removes its dependency edges.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::{EffectOptions, SubscriberId};

pub(crate) struct EffectInner {
    pub(crate) id: SubscriberId,
    procedure: Box<dyn Fn()>,
    options: EffectOptions,
    stopped: Cell<bool>,
    run_count: Cell<usize>,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// Handle to a registered effect.
///
/// Cloning the handle shares the same subscriber.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

/// Register `procedure` as an effect with default options and run it once.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(&Target::record([("count", 0.into())]));
///
/// let printer = effect({
///     let state = state.clone();
///     move || println!("count is {:?}", state.get("count"))
/// });
///
/// state.set("count", 5)?;  // Prints: "count is 5"
/// ```
pub fn effect<F>(procedure: F) -> Effect
where
    F: Fn() + 'static,
{
    effect_with(procedure, EffectOptions::new())
}

/// Register `procedure` as an effect with explicit options.
pub fn effect_with<F>(procedure: F, options: EffectOptions) -> Effect
where
    F: Fn() + 'static,
{
    let lazy = options.lazy;
    let inner = Rc::new(EffectInner {
        id: SubscriberId::new(),
        procedure: Box::new(procedure),
        options,
        stopped: Cell::new(false),
        run_count: Cell::new(0),
    });
    Runtime::register(&inner);

    let effect = Effect { inner };
    if !lazy {
        effect.run();
    }
    effect
}

impl Effect {
    pub(crate) fn from_inner(inner: Rc<EffectInner>) -> Self {
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// The options this effect was registered with.
    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    /// Run the procedure with tracking active.
    ///
    /// Returns `false` without running when the effect is stopped or already
    /// running further up the stack.
    pub fn run(&self) -> bool {
        if self.inner.stopped.get() {
            return false;
        }

        let id = self.inner.id;
        if ReactiveContext::is_running(id) {
            debug!(subscriber = %id, label = ?self.inner.options.label, "suppressed reentrant run");
            return false;
        }

        trace!(subscriber = %id, label = ?self.inner.options.label, "run effect");
        let _ctx = ReactiveContext::enter(id);
        (self.inner.procedure)();
        self.inner.run_count.set(self.inner.run_count.get() + 1);
        true
    }

    /// React to a trigger: defer to the scheduler override, or run.
    pub(crate) fn notify(&self) {
        if self.inner.stopped.get() {
            return;
        }
        match &self.inner.options.scheduler {
            Some(scheduler) => scheduler(self),
            None => {
                self.run();
            }
        }
    }

    /// Stop the effect: remove its dependency edges and never run it again.
    pub fn stop(&self) {
        if !self.inner.stopped.replace(true) {
            Runtime::clear_dependencies(self.inner.id);
            debug!(subscriber = %self.inner.id, "stopped effect");
        }
    }

    /// Check if the effect has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }

    /// Get the number of times the procedure has run to completion.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Whether two handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("label", &self.inner.options.label)
            .field("run_count", &self.run_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::runtime::{Key, TargetId, TriggerOp};
    use std::cell::RefCell;

    #[test]
    fn effect_runs_on_creation() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let _effect = effect(move || counter.set(counter.get() + 1));

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let effect = effect_with(move || counter.set(counter.get() + 1), EffectOptions::new().lazy());

        assert_eq!(runs.get(), 0);
        assert_eq!(effect.run_count(), 0);

        assert!(effect.run());
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn trigger_reruns_effect() {
        let target = TargetId::next();
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let _effect = effect(move || {
            Runtime::track(target, &Key::Value);
            counter.set(counter.get() + 1);
        });

        Runtime::trigger(target, &Key::Value, TriggerOp::Set, None, None);
        Runtime::trigger(target, &Key::Value, TriggerOp::Set, None, None);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn scheduler_replaces_direct_run() {
        let target = TargetId::next();
        let queued: Rc<RefCell<Vec<Effect>>> = Rc::default();
        let queue = queued.clone();

        let effect = effect_with(
            move || Runtime::track(target, &Key::Value),
            EffectOptions::new().scheduler(move |effect| queue.borrow_mut().push(effect.clone())),
        );
        assert_eq!(effect.run_count(), 1);

        Runtime::trigger(target, &Key::Value, TriggerOp::Set, None, None);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(queued.borrow().len(), 1);
        assert!(queued.borrow()[0].ptr_eq(&effect));

        let pending = queued.borrow_mut().pop();
        if let Some(pending) = pending {
            pending.run();
        }
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn self_trigger_is_suppressed() {
        let target = TargetId::next();
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let _effect = effect(move || {
            Runtime::track(target, &Key::Value);
            counter.set(counter.get() + 1);
            Runtime::trigger(target, &Key::Value, TriggerOp::Set, None, None);
        });

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn nested_effects_restore_outer() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();

        let outer = effect(move || {
            let before = Runtime::current_subscriber();
            let inner_log = log.clone();
            let _inner = effect(move || {
                inner_log.borrow_mut().push(Runtime::current_subscriber());
            });
            log.borrow_mut().push(before);
            log.borrow_mut().push(Runtime::current_subscriber());
        });

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_ne!(seen[0], Some(outer.id()));
        assert_eq!(seen[1], Some(outer.id()));
        assert_eq!(seen[2], Some(outer.id()));
        assert!(Runtime::current_subscriber().is_none());
    }

    #[test]
    fn effect_does_not_run_after_stop() {
        let target = TargetId::next();
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let effect = effect(move || {
            Runtime::track(target, &Key::Value);
            counter.set(counter.get() + 1);
        });
        assert_eq!(Runtime::subscriber_count(target, &Key::Value), 1);

        effect.stop();
        assert!(effect.is_stopped());
        assert_eq!(Runtime::subscriber_count(target, &Key::Value), 0);

        Runtime::trigger(target, &Key::Value, TriggerOp::Set, None, None);
        assert!(!effect.run());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = effect(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert!(effect1.ptr_eq(&effect2));

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(effect2.is_stopped());
    }
}
