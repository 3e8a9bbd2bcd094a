//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! its dependencies changed since the last read.
//!
//! # How Computeds Work
//!
//! 1. The derivation runs inside a lazy internal effect, so nothing happens
//!    until the first read.
//!
//! 2. On read, a dirty computed runs the effect, caches the result and becomes
//!    clean. A clean computed returns the cache.
//!
//! 3. When a dependency changes, the effect's scheduler marks the computed
//!    dirty and notifies the computed's own readers. It never recomputes
//!    eagerly.
//!
//! Every read is tracked under the computed's `value` key, so effects and
//! other computeds that read it are invalidated in turn.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::effect::{effect_with, Effect};
use super::runtime::{Key, Runtime, TargetId, TriggerOp};
use super::subscriber::EffectOptions;
use crate::error::{Error, Result};

/// Dirty state for a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// The computed must re-evaluate on next read.
    Dirty,
}

struct ComputedInner<T> {
    id: TargetId,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    effect: Effect,
    setter: Option<Box<dyn Fn(T)>>,
}

impl<T> ComputedInner<T> {
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            trace!(target_id = self.id.raw(), "computed invalidated");
            Runtime::trigger(self.id, &Key::Value, TriggerOp::Set, None, None);
        }
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        Runtime::release_target(self.id);
    }
}

/// A cached derived value that recomputes lazily when dependencies change.
pub struct Computed<T>
where
    T: Clone + 'static,
{
    inner: Rc<ComputedInner<T>>,
}

/// Shorthand for [`Computed::new`].
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

impl<T> Computed<T>
where
    T: Clone + 'static,
{
    /// Create a readonly computed from a derivation.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(getter, None)
    }

    /// Create a writable computed. Writes are handed to `setter`.
    pub fn with_setter<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::build(getter, Some(Box::new(setter)))
    }

    fn build<F>(getter: F, setter: Option<Box<dyn Fn(T)>>) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let evaluate = weak.clone();
            let invalidate = weak.clone();
            let effect = effect_with(
                move || {
                    let next = getter();
                    if let Some(inner) = evaluate.upgrade() {
                        *inner.value.borrow_mut() = Some(next);
                    }
                },
                EffectOptions::new()
                    .lazy()
                    .label("computed")
                    .scheduler(move |_| {
                        if let Some(inner) = invalidate.upgrade() {
                            inner.invalidate();
                        }
                    }),
            );

            ComputedInner {
                id: TargetId::next(),
                value: RefCell::new(None),
                dirty: Cell::new(true),
                effect,
                setter,
            }
        });

        Self { inner }
    }

    /// Get the computed's identity.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the current value, re-evaluating if dirty.
    ///
    /// # Panics
    ///
    /// Panics if the computed is read from inside its own first evaluation.
    /// Use [`Computed::try_get`] to handle that case.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Get the current value, re-evaluating if dirty.
    pub fn try_get(&self) -> Result<T> {
        if self.inner.dirty.get() && self.inner.effect.run() {
            self.inner.dirty.set(false);
        }

        Runtime::track(self.inner.id, &Key::Value);

        self.inner
            .value
            .borrow()
            .clone()
            .ok_or(Error::CircularComputed)
    }

    /// Write through the setter.
    ///
    /// A computed built with [`Computed::new`] has no setter: the write is
    /// dropped and [`Error::ReadonlyComputed`] is returned.
    pub fn set(&self, value: T) -> Result<()> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => {
                warn!(target_id = self.inner.id.raw(), "write operation failed: computed value is readonly");
                Err(Error::ReadonlyComputed)
            }
        }
    }

    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        if self.inner.dirty.get() {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Get the number of subscribers reading this computed.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id, &Key::Value)
    }

    /// The internal effect that runs the derivation.
    pub fn effect(&self) -> &Effect {
        &self.inner.effect
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id.raw())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
