//! Dynamic values and observable targets.
//!
//! [`Value`] is the data model the observable layer works on. Primitive
//! variants are plain data; [`Value::Object`] holds a [`Target`], a shared
//! aggregate with a stable identity. Aggregates are either records (ordered
//! field maps) or sequences.
//!
//! Equality on `Value` is the change-detection comparison used by writes:
//! aggregates compare by identity, `NaN` equals `NaN`, and `+0` differs from
//! `-0`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::observable::release_wrappers;
use super::runtime::{Key, Runtime, TargetId};
use crate::error::{Error, Result};

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value; what a read of a missing key yields.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(Rc<str>),
    /// A record or sequence, shared by reference.
    Object(Target),
}

impl Value {
    /// Change-detection equality.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Interpret the value as a sequence index or length.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= usize::MAX as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// The number, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The aggregate, if this is one.
    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    /// Whether the value is `Undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether the value is `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Convert to JSON. `Undefined`, `NaN` and infinities become `null`.
    ///
    /// Aggregates are converted recursively; a target that contains itself
    /// recurses without bound.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Object(target) => target.to_json(),
        }
    }
}

fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Object(target) => write!(f, "{}", target.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(target) => target.with(|aggregate| aggregate.serialize(serializer)),
        }
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

value_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Value::Object(target.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::Object(Target::sequence(items)),
            serde_json::Value::Object(fields) => Value::Object(Target::record(fields)),
        }
    }
}

/// Shape of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Named fields.
    Record,
    /// Indexed items with a length.
    Sequence,
}

impl Shape {
    /// Lowercase name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Shape::Record => "record",
            Shape::Sequence => "sequence",
        }
    }
}

/// The contents of a target.
#[derive(Debug, Clone)]
pub enum Aggregate {
    /// Named fields in insertion order.
    Record(IndexMap<Rc<str>, Value>),
    /// Indexed items.
    Sequence(Vec<Value>),
}

/// Result of writing a key on an aggregate.
#[derive(Debug)]
pub(crate) struct Assigned {
    /// Whether the key existed before the write.
    pub had_key: bool,
    /// The previous value (`Undefined` if the key is new).
    pub old: Value,
}

impl Aggregate {
    /// Shape of this aggregate.
    pub fn shape(&self) -> Shape {
        match self {
            Aggregate::Record(_) => Shape::Record,
            Aggregate::Sequence(_) => Shape::Sequence,
        }
    }

    fn mismatch(&self, key: &Key) -> Error {
        Error::KeyMismatch {
            key: key.to_string(),
            shape: self.shape().name(),
        }
    }

    /// Read a key. `Ok(None)` means the key is well-formed but absent.
    pub fn get(&self, key: &Key) -> Result<Option<Value>> {
        match (self, key) {
            (Aggregate::Record(fields), Key::Field(name)) => Ok(fields.get(name).cloned()),
            (Aggregate::Sequence(items), Key::Index(index)) => Ok(items.get(*index).cloned()),
            (Aggregate::Sequence(items), Key::Length) => Ok(Some(Value::from(items.len()))),
            _ => Err(self.mismatch(key)),
        }
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &Key) -> Result<bool> {
        match (self, key) {
            (Aggregate::Record(fields), Key::Field(name)) => Ok(fields.contains_key(name)),
            (Aggregate::Sequence(items), Key::Index(index)) => Ok(*index < items.len()),
            (Aggregate::Sequence(_), Key::Length) => Ok(true),
            _ => Err(self.mismatch(key)),
        }
    }

    /// Number of fields or items.
    pub fn len(&self) -> usize {
        match self {
            Aggregate::Record(fields) => fields.len(),
            Aggregate::Sequence(items) => items.len(),
        }
    }

    /// Whether the aggregate has no fields or items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a key. Writing past the end of a sequence fills the gap with
    /// `Undefined`; writing `length` truncates or extends.
    pub(crate) fn assign(&mut self, key: &Key, value: Value) -> Result<Assigned> {
        match (&mut *self, key) {
            (Aggregate::Record(fields), Key::Field(name)) => {
                let old = fields.insert(name.clone(), value);
                Ok(Assigned {
                    had_key: old.is_some(),
                    old: old.unwrap_or_default(),
                })
            }
            (Aggregate::Sequence(items), Key::Index(index)) => {
                let index = *index;
                if index < items.len() {
                    let old = std::mem::replace(&mut items[index], value);
                    Ok(Assigned { had_key: true, old })
                } else {
                    grow_to(items, index.saturating_add(1))?;
                    items[index] = value;
                    Ok(Assigned {
                        had_key: false,
                        old: Value::Undefined,
                    })
                }
            }
            (Aggregate::Sequence(items), Key::Length) => {
                let new_len = value.as_index().ok_or_else(|| Error::InvalidLength {
                    value: value.to_string(),
                })?;
                let old = Value::from(items.len());
                grow_to(items, new_len)?;
                Ok(Assigned { had_key: true, old })
            }
            _ => Err(self.mismatch(key)),
        }
    }

    /// Remove a key. Deleting a sequence index leaves an `Undefined` hole.
    pub(crate) fn remove(&mut self, key: &Key) -> Result<Option<Value>> {
        match (&mut *self, key) {
            (Aggregate::Record(fields), Key::Field(name)) => Ok(fields.shift_remove(name)),
            (Aggregate::Sequence(items), Key::Index(index)) => Ok(items
                .get_mut(*index)
                .map(std::mem::take)),
            _ => Err(self.mismatch(key)),
        }
    }
}

/// Largest length a sequence may reach.
pub const MAX_SEQUENCE_LEN: usize = u32::MAX as usize;

/// Resize `items` to `len`, padding with `Undefined`.
///
/// Leaves `items` untouched when the length is over the cap or the gap cannot
/// be allocated.
fn grow_to(items: &mut Vec<Value>, len: usize) -> Result<()> {
    if len > MAX_SEQUENCE_LEN {
        return Err(Error::SequenceTooLong { len });
    }
    items
        .try_reserve(len.saturating_sub(items.len()))
        .map_err(|_| Error::SequenceTooLong { len })?;
    items.resize(len, Value::Undefined);
    Ok(())
}

impl Serialize for Aggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Aggregate::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(&**name, value)?;
                }
                map.end()
            }
            Aggregate::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

struct TargetInner {
    id: TargetId,
    data: RefCell<Aggregate>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::release_target(self.id);
        release_wrappers(self.id);
    }
}

/// A shared aggregate with a stable identity.
///
/// Cloning a `Target` clones the handle, not the data. Reads and writes made
/// directly on a `Target` are untracked; wrap it in an
/// [`Observable`](super::Observable) to make them reactive.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    /// Wrap an aggregate in a new target.
    pub fn new(aggregate: Aggregate) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: TargetId::next(),
                data: RefCell::new(aggregate),
            }),
        }
    }

    /// Build a record target from `(name, value)` pairs.
    pub fn record<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Self::new(Aggregate::Record(
            fields
                .into_iter()
                .map(|(name, value)| (Rc::from(name.as_ref()), value.into()))
                .collect(),
        ))
    }

    /// Build a sequence target.
    pub fn sequence<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(Aggregate::Sequence(items.into_iter().map(Into::into).collect()))
    }

    /// Identity of this target.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Shape of the contents.
    pub fn shape(&self) -> Shape {
        self.inner.data.borrow().shape()
    }

    /// Whether two handles refer to the same target.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a key without tracking. Absent keys read as `Undefined`.
    pub fn peek(&self, key: impl Into<Key>) -> Result<Value> {
        Ok(self.with(|aggregate| aggregate.get(&key.into()))?.unwrap_or_default())
    }

    /// Number of fields or items, untracked.
    pub fn len(&self) -> usize {
        self.with(Aggregate::len)
    }

    /// Whether the target is empty, untracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the contents as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        self.with(|aggregate| match aggregate {
            Aggregate::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_json()))
                    .collect(),
            ),
            Aggregate::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        })
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&Aggregate) -> R) -> R {
        f(&self.inner.data.borrow())
    }

    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut Aggregate) -> R) -> R {
        f(&mut self.inner.data.borrow_mut())
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (shape, len) = match self.inner.data.try_borrow() {
            Ok(data) => (Some(data.shape()), Some(data.len())),
            Err(_) => (None, None),
        };
        f.debug_struct("Target")
            .field("id", &self.inner.id.raw())
            .field("shape", &shape)
            .field("len", &len)
            .finish()
    }
}
