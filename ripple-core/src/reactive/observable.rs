//! Observable wrappers.
//!
//! An [`Observable`] pairs a [`Target`] with a [`WrapMode`]. Reads through it
//! call [`Runtime::track`], writes call [`Runtime::trigger`]. Nested aggregates
//! are wrapped on the way out, so a deep observable stays observable all the
//! way down without converting anything up front.
//!
//! Wrappers are cached per mode and target identity: asking twice for the
//! mutable wrapper of a target returns the same wrapper for as long as one is
//! alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use super::runtime::{Key, Runtime, TargetId, TriggerOp};
use super::value::{Shape, Target, Value};
use crate::error::{Error, Result};

/// How an observable intercepts reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Tracked reads, triggering writes, nested aggregates wrapped.
    Mutable,
    /// Untracked reads, writes rejected, nested aggregates wrapped readonly.
    Readonly,
    /// Tracked reads, triggering writes, nested aggregates returned raw.
    ShallowMutable,
    /// Untracked reads, writes rejected, nested aggregates returned raw.
    ShallowReadonly,
}

impl WrapMode {
    /// Whether writes are rejected.
    pub fn is_readonly(self) -> bool {
        matches!(self, WrapMode::Readonly | WrapMode::ShallowReadonly)
    }

    /// Whether nested aggregates are left unwrapped.
    pub fn is_shallow(self) -> bool {
        matches!(self, WrapMode::ShallowMutable | WrapMode::ShallowReadonly)
    }

    fn cache_slot(self) -> usize {
        match self {
            WrapMode::Mutable => 0,
            WrapMode::Readonly => 1,
            WrapMode::ShallowMutable => 2,
            WrapMode::ShallowReadonly => 3,
        }
    }
}

type WrapperCache = HashMap<TargetId, Weak<ObservableInner>>;

thread_local! {
    static WRAPPERS: RefCell<[WrapperCache; 4]> = RefCell::new(Default::default());
}

/// Forget every cached wrapper of a target that is going away.
pub(crate) fn release_wrappers(target: TargetId) {
    let _ = WRAPPERS.try_with(|caches| {
        if let Ok(mut caches) = caches.try_borrow_mut() {
            for cache in caches.iter_mut() {
                cache.remove(&target);
            }
        }
    });
}

struct ObservableInner {
    target: Target,
    mode: WrapMode,
}

/// A reactive view of a target.
#[derive(Clone)]
pub struct Observable {
    inner: Rc<ObservableInner>,
}

/// The result of reading through an observable.
#[derive(Debug, Clone)]
pub enum Slot {
    /// A primitive, or a raw aggregate read through a shallow wrapper.
    Value(Value),
    /// A nested aggregate, wrapped with the reader's mutability.
    Observable(Observable),
}

impl Slot {
    /// The plain value, if the slot holds one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Slot::Value(value) => Some(value),
            Slot::Observable(_) => None,
        }
    }

    /// The wrapped aggregate, if the slot holds one.
    pub fn observable(&self) -> Option<&Observable> {
        match self {
            Slot::Observable(observable) => Some(observable),
            Slot::Value(_) => None,
        }
    }

    /// Take the wrapped aggregate, if any.
    pub fn into_observable(self) -> Option<Observable> {
        match self {
            Slot::Observable(observable) => Some(observable),
            Slot::Value(_) => None,
        }
    }

    /// Turn the slot back into a value. Wrapped aggregates yield their target.
    pub fn into_value(self) -> Value {
        match self {
            Slot::Value(value) => value,
            Slot::Observable(observable) => Value::Object(observable.target().clone()),
        }
    }

    /// The number in the slot, if any.
    pub fn as_f64(&self) -> Option<f64> {
        self.value().and_then(Value::as_f64)
    }

    /// The string in the slot, if any.
    pub fn as_str(&self) -> Option<&str> {
        self.value().and_then(Value::as_str)
    }

    /// The boolean in the slot, if any.
    pub fn as_bool(&self) -> Option<bool> {
        self.value().and_then(Value::as_bool)
    }

    /// Whether the slot holds `Undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Slot::Value(Value::Undefined))
    }
}

impl From<Slot> for Value {
    fn from(slot: Slot) -> Self {
        slot.into_value()
    }
}

impl From<Observable> for Value {
    fn from(observable: Observable) -> Self {
        Value::Object(observable.target().clone())
    }
}

impl From<&Observable> for Value {
    fn from(observable: &Observable) -> Self {
        Value::Object(observable.target().clone())
    }
}

/// Wrap `value` in `mode`. Non-aggregates come back unchanged.
pub fn wrap(value: Value, mode: WrapMode) -> Slot {
    match value {
        Value::Object(target) => Slot::Observable(Observable::new(&target, mode)),
        other => Slot::Value(other),
    }
}

/// Deep mutable wrapper.
pub fn reactive(target: &Target) -> Observable {
    Observable::new(target, WrapMode::Mutable)
}

/// Deep readonly wrapper.
pub fn readonly(target: &Target) -> Observable {
    Observable::new(target, WrapMode::Readonly)
}

/// Shallow mutable wrapper.
pub fn shallow_reactive(target: &Target) -> Observable {
    Observable::new(target, WrapMode::ShallowMutable)
}

/// Shallow readonly wrapper.
pub fn shallow_readonly(target: &Target) -> Observable {
    Observable::new(target, WrapMode::ShallowReadonly)
}

impl Observable {
    /// Get the cached wrapper of `target` for `mode`, creating it if needed.
    pub fn new(target: &Target, mode: WrapMode) -> Self {
        WRAPPERS.with(|caches| {
            let mut caches = caches.borrow_mut();
            let cache = &mut caches[mode.cache_slot()];
            if let Some(inner) = cache.get(&target.id()).and_then(Weak::upgrade) {
                return Self { inner };
            }

            let inner = Rc::new(ObservableInner {
                target: target.clone(),
                mode,
            });
            cache.insert(target.id(), Rc::downgrade(&inner));
            Self { inner }
        })
    }

    /// The wrapped target.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    /// Identity of the wrapped target.
    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    /// The wrapping mode.
    pub fn mode(&self) -> WrapMode {
        self.inner.mode
    }

    /// Shape of the wrapped target.
    pub fn shape(&self) -> Shape {
        self.inner.target.shape()
    }

    /// Whether two handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn track(&self, key: &Key) {
        if !self.inner.mode.is_readonly() {
            Runtime::track(self.id(), key);
        }
    }

    /// Read `key`. Absent keys read as `Undefined`.
    pub fn get(&self, key: impl Into<Key>) -> Result<Slot> {
        let key = key.into();
        let value = self
            .inner
            .target
            .with(|aggregate| aggregate.get(&key))?
            .unwrap_or_default();
        self.track(&key);

        let mode = self.inner.mode;
        if mode.is_shallow() {
            return Ok(Slot::Value(value));
        }
        Ok(wrap(value, mode))
    }

    /// Whether `key` is present. Tracked like a read of `key`.
    pub fn has(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        let present = self.inner.target.with(|aggregate| aggregate.contains(&key))?;
        self.track(&key);
        Ok(present)
    }

    /// Length of a sequence. Tracked under the length key.
    pub fn len(&self) -> Result<usize> {
        let value = self.inner.target.with(|aggregate| aggregate.get(&Key::Length))?;
        self.track(&Key::Length);
        Ok(value.and_then(|len| len.as_index()).unwrap_or(0))
    }

    /// Whether a sequence is empty. Tracked under the length key.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn reject_readonly(&self, key: &Key) -> Result<()> {
        if self.inner.mode.is_readonly() {
            warn!(target_id = self.id().raw(), %key, "set on key {key} failed: target is readonly");
            return Err(Error::ReadonlyWrite {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Write `key`.
    ///
    /// A new key triggers an addition; an existing key triggers an update only
    /// when the value actually changed. Readonly wrappers refuse the write.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        self.reject_readonly(&key)?;

        let value = value.into();
        let assigned = self
            .inner
            .target
            .with_mut(|aggregate| aggregate.assign(&key, value.clone()))?;

        let id = self.id();
        if !assigned.had_key {
            Runtime::trigger(id, &key, TriggerOp::Add, Some(&value), None);
        } else if !assigned.old.same_value(&value) {
            Runtime::trigger(id, &key, TriggerOp::Set, Some(&value), Some(&assigned.old));
        }
        Ok(())
    }

    /// Remove `key`. Returns whether it was present.
    ///
    /// Removing a record field drops it; removing a sequence index leaves an
    /// `Undefined` hole and keeps the length.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        self.reject_readonly(&key)?;

        let removed = self
            .inner
            .target
            .with_mut(|aggregate| aggregate.remove(&key))?;
        match removed {
            Some(old) => {
                Runtime::trigger(self.id(), &key, TriggerOp::Delete, None, Some(&old));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Change the length of a sequence, dropping or padding trailing items.
    pub fn set_len(&self, len: usize) -> Result<()> {
        self.set(Key::Length, len)
    }

    /// Append to a sequence.
    ///
    /// The current length is read untracked, so pushing from inside an effect
    /// does not subscribe that effect to the length.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let len = self.raw_len()?;
        self.set(Key::Index(len), value)
    }

    /// Remove and return the last item of a sequence.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.reject_readonly(&Key::Length)?;
        let len = self.raw_len()?;
        if len == 0 {
            return Ok(None);
        }
        let last = self.inner.target.peek(Key::Index(len - 1))?;
        self.set_len(len - 1)?;
        Ok(Some(last))
    }

    fn raw_len(&self) -> Result<usize> {
        let value = self.inner.target.with(|aggregate| aggregate.get(&Key::Length))?;
        Ok(value.and_then(|len| len.as_index()).unwrap_or(0))
    }

    /// Snapshot the wrapped target as JSON without tracking.
    pub fn to_json(&self) -> serde_json::Value {
        self.inner.target.to_json()
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("target", &self.inner.target)
            .field("mode", &self.inner.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        (runs.clone(), runs)
    }

    #[test]
    fn huge_index_write_is_refused_without_trigger() {
        let list = reactive(&Target::sequence([1]));
        let (runs, count) = counter();

        let source = list.clone();
        let _effect = effect(move || {
            let _ = source.len();
            count.set(count.get() + 1);
        });

        assert!(matches!(list.set(usize::MAX, 2), Err(Error::SequenceTooLong { .. })));
        assert!(matches!(list.set(usize::MAX / 2, 2), Err(Error::SequenceTooLong { .. })));
        assert_eq!(list.len(), Ok(1));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn wrap_passes_primitives_through() {
        assert!(matches!(wrap(Value::from(1), WrapMode::Mutable), Slot::Value(Value::Number(_))));
        assert!(matches!(wrap(Value::Null, WrapMode::Readonly), Slot::Value(Value::Null)));
    }

    #[test]
    fn wrappers_are_cached_per_mode() {
        let target = Target::record([("a", 1)]);

        let first = reactive(&target);
        let second = reactive(&target);
        assert!(first.ptr_eq(&second));

        let ro = readonly(&target);
        assert!(!ro.ptr_eq(&first));
        assert!(ro.ptr_eq(&readonly(&target)));
        assert!(shallow_reactive(&target).ptr_eq(&shallow_reactive(&target)));
        assert!(!shallow_readonly(&target).ptr_eq(&ro));
    }

    #[test]
    fn nested_reads_are_wrapped_with_same_mutability() {
        let inner = Target::record([("b", 2)]);
        let outer = Target::record([("inner", Value::from(&inner))]);

        let deep = reactive(&outer).get("inner").unwrap();
        let deep = deep.observable().unwrap();
        assert_eq!(deep.mode(), WrapMode::Mutable);
        assert!(deep.ptr_eq(&reactive(&inner)));

        let ro = readonly(&outer).get("inner").unwrap();
        assert_eq!(ro.observable().unwrap().mode(), WrapMode::Readonly);

        let shallow = shallow_reactive(&outer).get("inner").unwrap();
        assert!(matches!(shallow, Slot::Value(Value::Object(ref t)) if t.ptr_eq(&inner)));
    }

    #[test]
    fn set_triggers_only_on_change() {
        let state = reactive(&Target::record([("count", 0)]));
        let (runs, seen) = counter();
        let reader = state.clone();
        let _effect = effect(move || {
            let _ = reader.get("count");
            runs.set(runs.get() + 1);
        });

        state.set("count", 0).unwrap();
        assert_eq!(seen.get(), 1);

        state.set("count", 1).unwrap();
        assert_eq!(seen.get(), 2);

        state.set("count", f64::NAN).unwrap();
        state.set("count", f64::NAN).unwrap();
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn adding_a_field_triggers_its_readers() {
        let state = reactive(&Target::record(Vec::<(&str, Value)>::new()));
        let (runs, seen) = counter();
        let reader = state.clone();
        let _effect = effect(move || {
            let _ = reader.has("late");
            runs.set(runs.get() + 1);
        });

        state.set("late", Value::Undefined).unwrap();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn sequence_writes_past_end_notify_length() {
        let list = reactive(&Target::sequence([1, 2]));
        let (runs, seen) = counter();
        let reader = list.clone();
        let _effect = effect(move || {
            let _ = reader.len();
            runs.set(runs.get() + 1);
        });

        list.set(0, 10).unwrap();
        assert_eq!(seen.get(), 1);

        list.set(2, 3).unwrap();
        assert_eq!(seen.get(), 2);

        list.push(4).unwrap();
        assert_eq!(seen.get(), 3);
        assert_eq!(list.len().unwrap(), 4);
    }

    #[test]
    fn shrinking_length_notifies_dropped_indices() {
        let list = reactive(&Target::sequence([1, 2, 3, 4]));
        let (runs_first, seen_first) = counter();
        let (runs_last, seen_last) = counter();

        let reader = list.clone();
        let _first = effect(move || {
            let _ = reader.get(0);
            runs_first.set(runs_first.get() + 1);
        });
        let reader = list.clone();
        let _last = effect(move || {
            let _ = reader.get(3);
            runs_last.set(runs_last.get() + 1);
        });

        list.set_len(2).unwrap();
        assert_eq!(seen_first.get(), 1);
        assert_eq!(seen_last.get(), 2);
        assert!(list.get(3).unwrap().is_undefined());

        assert_eq!(list.pop().unwrap(), Some(Value::from(2)));
        assert_eq!(list.len().unwrap(), 1);
    }

    #[test]
    fn readonly_rejects_writes() {
        let target = Target::record([("a", 1)]);
        let state = reactive(&target);
        let view = readonly(&target);
        let (runs, seen) = counter();
        let reader = state.clone();
        let _effect = effect(move || {
            let _ = reader.get("a");
            runs.set(runs.get() + 1);
        });

        let err = view.set("a", 2).unwrap_err();
        assert_eq!(err, Error::ReadonlyWrite { key: "a".into() });
        assert!(view.delete("a").is_err());
        assert_eq!(target.peek("a").unwrap(), Value::from(1));
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn readonly_reads_are_not_tracked() {
        let target = Target::record([("a", 1)]);
        let view = readonly(&target);
        let probe = view.clone();
        let _effect = effect(move || {
            let _ = probe.get("a");
        });

        assert_eq!(Runtime::subscriber_count(target.id(), &Key::field("a")), 0);
    }

    #[test]
    fn delete_field_triggers_readers() {
        let state = reactive(&Target::record([("a", 1)]));
        let (runs, seen) = counter();
        let reader = state.clone();
        let _effect = effect(move || {
            let _ = reader.get("a");
            runs.set(runs.get() + 1);
        });

        assert!(state.delete("a").unwrap());
        assert_eq!(seen.get(), 2);
        assert!(!state.delete("a").unwrap());
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn writing_an_observable_stores_its_target() {
        let child = Target::record([("x", 1)]);
        let parent = reactive(&Target::record([("child", Value::Null)]));

        parent.set("child", reactive(&child)).unwrap();
        let stored = parent.target().peek("child").unwrap();
        assert!(stored.as_target().unwrap().ptr_eq(&child));
    }

    #[test]
    fn mismatched_keys_do_not_track() {
        let state = reactive(&Target::record([("a", 1)]));
        let probe = state.clone();
        let _effect = effect(move || {
            assert!(probe.get(0).is_err());
        });
        assert!(!Runtime::has_target(state.id()));
        assert!(state.len().is_err());
    }
}
