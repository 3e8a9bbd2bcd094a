//! Ref Cells
//!
//! A [`Ref`] is the single-value counterpart of an observable aggregate. It
//! owns one value and exposes it under the implicit key `value`: reading
//! inside an effect subscribes to it, writing a different value notifies.
//!
//! [`ObjectRef`] is a ref-shaped view of one field of an observable. It holds
//! no value of its own; reads and writes go through the observable, so they
//! share the dependency entries of that field.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use indexmap::IndexMap;

use super::observable::{Observable, Slot};
use super::runtime::{Key, Runtime, TargetId, TriggerOp};
use super::value::{Aggregate, Value};
use crate::error::Result;

struct RefInner<T> {
    id: TargetId,
    value: RefCell<T>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        Runtime::release_target(self.id);
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Change detection uses `PartialEq`. For [`Value`] that is the NaN-aware,
/// identity-based comparison.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0);
///
/// // Read the value (tracked inside effects)
/// let value = count.get();
///
/// // Update the value (notifies subscribers if it changed)
/// count.set(5);
/// ```
pub struct Ref<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<RefInner<T>>,
}

impl<T> Ref<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefInner {
                id: TargetId::next(),
                value: RefCell::new(value),
            }),
        }
    }

    /// Get the cell's identity.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        Runtime::track(self.inner.id, &Key::Value);
        self.get_untracked()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Set a new value. Subscribers run only if it differs from the old one.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        Runtime::trigger(self.inner.id, &Key::Value, TriggerOp::Set, None, None);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id, &Key::Value)
    }
}

impl<T> Clone for Ref<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Ref<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.id.raw())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A ref-like view of one key of an observable.
#[derive(Clone, Debug)]
pub struct ObjectRef {
    source: Observable,
    key: Key,
}

impl ObjectRef {
    /// The key this view reads and writes.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The observable this view reads and writes through.
    pub fn source(&self) -> &Observable {
        &self.source
    }

    /// Read the key through the observable.
    pub fn get(&self) -> Result<Slot> {
        self.source.get(self.key.clone())
    }

    /// Write the key through the observable.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        self.source.set(self.key.clone(), value)
    }
}

/// View a single key of `source` as a ref.
pub fn to_ref(source: &Observable, key: impl Into<Key>) -> ObjectRef {
    ObjectRef {
        source: source.clone(),
        key: key.into(),
    }
}

/// View every current field (or index) of `source` as a ref.
///
/// The key listing itself is not tracked.
pub fn to_refs(source: &Observable) -> IndexMap<Key, ObjectRef> {
    let keys: Vec<Key> = source.target().with(|aggregate| match aggregate {
        Aggregate::Record(fields) => fields.keys().map(|name| Key::Field(name.clone())).collect(),
        Aggregate::Sequence(items) => (0..items.len()).map(Key::Index).collect(),
    });

    keys.into_iter()
        .map(|key| (key.clone(), to_ref(source, key)))
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use crate::reactive::observable::reactive;
    use crate::reactive::value::Target;
    use std::cell::Cell;

    #[test]
    fn ref_get_and_set() {
        let cell = Ref::new(0);
        assert_eq!(cell.get(), 0);

        cell.set(42);
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn ref_update() {
        let cell = Ref::new(10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get(), 15);
    }

    #[test]
    fn ref_notifies_only_on_change() {
        let cell = Ref::new(0);
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let reader = cell.clone();

        let _effect = effect(move || {
            reader.get();
            counter.set(counter.get() + 1);
        });
        assert_eq!(cell.subscriber_count(), 1);

        cell.set(1);
        assert_eq!(runs.get(), 2);

        cell.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn ref_of_value_is_nan_aware() {
        let cell = Ref::new(Value::from(f64::NAN));
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let reader = cell.clone();

        let _effect = effect(move || {
            reader.get();
            counter.set(counter.get() + 1);
        });

        cell.set(Value::from(f64::NAN));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn ref_clone_shares_state() {
        let cell1 = Ref::new(0);
        let cell2 = cell1.clone();

        cell1.set(42);
        assert_eq!(cell2.get(), 42);
        assert_eq!(cell1.id(), cell2.id());
    }

    #[test]
    fn ref_ids_are_unique() {
        let r1 = Ref::new(0);
        let r2 = Ref::new(0);
        assert_ne!(r1.id(), r2.id());
    }

    #[test]
    fn object_ref_reads_and_writes_through_source() {
        let target = Target::record([("name", "a")]);
        let state = reactive(&target);
        let name = to_ref(&state, "name");

        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let reader = state.clone();
        let _effect = effect(move || {
            let _ = reader.get("name");
            counter.set(counter.get() + 1);
        });

        name.set("b").unwrap();
        assert_eq!(seen.get(), 2);
        assert_eq!(name.get().unwrap().as_str(), Some("b"));
        assert_eq!(target.peek("name").unwrap(), Value::from("b"));
    }

    #[test]
    fn to_refs_covers_every_key() {
        let state = reactive(&Target::record([("a", 1), ("b", 2)]));
        let refs = to_refs(&state);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[&Key::field("b")].get().unwrap().as_f64(), Some(2.0));

        let list = reactive(&Target::sequence(["x", "y", "z"]));
        let refs = to_refs(&list);
        assert_eq!(refs.keys().cloned().collect::<Vec<_>>(), vec![Key::Index(0), Key::Index(1), Key::Index(2)]);
    }
}
