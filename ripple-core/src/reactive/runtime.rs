//! Reactive Runtime
//!
//! The runtime owns the dependency map that connects observable targets to
//! the subscribers that read them.
//!
//! # How It Works
//!
//! 1. When an observable is read inside a running effect, [`Runtime::track`]
//!    records `target → key → subscriber`.
//!
//! 2. When an observable is written, [`Runtime::trigger`] collects every
//!    subscriber of the written key (plus the sequence special cases below),
//!    deduplicates them in first-tracked order and runs them, or hands them to
//!    their scheduler override.
//!
//! 3. When a target is dropped its entry is removed; when a subscriber is
//!    dropped or stopped it is removed from every key it was tracked under.
//!
//! # Sequences
//!
//! Writing `length` to a smaller value also notifies the readers of every
//! index at or past the new length. Adding or deleting an index notifies the
//! readers of `length`.
//!
//! # Threading
//!
//! All state is thread-local. Handles are `Rc`-based, so a reactive graph never
//! leaves the thread it was built on and no locking is needed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::{Effect, EffectInner};
use super::subscriber::SubscriberId;
use super::value::Value;

/// Identity of an observable target (aggregate, ref or computed cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh target identity.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A dependency key on a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named field of a record.
    Field(Rc<str>),
    /// An index of a sequence.
    Index(usize),
    /// The length of a sequence.
    Length,
    /// The single value of a ref or computed cell.
    Value,
}

impl Key {
    /// Build a field key.
    pub fn field(name: &str) -> Self {
        Key::Field(Rc::from(name))
    }

    /// Whether this key is a sequence index.
    pub fn is_index(&self) -> bool {
        matches!(self, Key::Index(_))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "[{index}]"),
            Key::Length => f.write_str("length"),
            Key::Value => f.write_str("value"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::field(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(Rc::from(name))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Kind of change reported to [`Runtime::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing key received a new value.
    Set,
    /// A key that did not exist was created.
    Add,
    /// A key was removed.
    Delete,
}

type KeyDeps = IndexMap<Key, IndexSet<SubscriberId>>;

#[derive(Default)]
struct RuntimeState {
    targets: HashMap<TargetId, KeyDeps>,
    subscribers: HashMap<SubscriberId, Weak<EffectInner>>,
    // Reverse index of `targets`: the edges each subscriber owns.
    edges: HashMap<SubscriberId, Vec<(TargetId, Key)>>,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a subscriber so triggers can find it by ID.
    pub(crate) fn register(effect: &Rc<EffectInner>) {
        RUNTIME.with(|rt| {
            rt.borrow_mut()
                .subscribers
                .insert(effect.id, Rc::downgrade(effect));
        });
    }

    /// Forget a subscriber and every dependency edge pointing at it.
    pub(crate) fn unregister(subscriber_id: SubscriberId) {
        let _ = RUNTIME.try_with(|rt| {
            if let Ok(mut rt) = rt.try_borrow_mut() {
                rt.subscribers.remove(&subscriber_id);
                Self::remove_edges(&mut rt, subscriber_id);
            }
        });
    }

    /// Remove every dependency edge of a subscriber, keeping it registered.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        RUNTIME.with(|rt| Self::remove_edges(&mut rt.borrow_mut(), subscriber_id));
    }

    fn remove_edges(rt: &mut RuntimeState, subscriber_id: SubscriberId) {
        let Some(edges) = rt.edges.remove(&subscriber_id) else {
            return;
        };
        for (target, key) in edges {
            let subscribers = rt
                .targets
                .get_mut(&target)
                .and_then(|deps| deps.get_mut(&key));
            if let Some(subscribers) = subscribers {
                subscribers.shift_remove(&subscriber_id);
            }
        }
    }

    /// Drop the dependency entry of a target that is going away.
    pub(crate) fn release_target(target: TargetId) {
        let _ = RUNTIME.try_with(|rt| {
            if let Ok(mut rt) = rt.try_borrow_mut() {
                let Some(deps) = rt.targets.remove(&target) else {
                    return;
                };
                for subscriber_id in deps.values().flatten() {
                    if let Some(edges) = rt.edges.get_mut(subscriber_id) {
                        edges.retain(|(owner, _)| *owner != target);
                    }
                }
                trace!(target_id = target.raw(), "released dependency entry");
            }
        });
    }

    /// Record that the active subscriber read `key` on `target`.
    ///
    /// No-op when nothing is running. Repeated reads are absorbed by the set.
    pub fn track(target: TargetId, key: &Key) {
        let Some(subscriber_id) = ReactiveContext::current_subscriber() else {
            return;
        };

        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            let inserted = rt
                .targets
                .entry(target)
                .or_default()
                .entry(key.clone())
                .or_default()
                .insert(subscriber_id);
            if inserted {
                rt.edges
                    .entry(subscriber_id)
                    .or_default()
                    .push((target, key.clone()));
                trace!(target_id = target.raw(), %key, subscriber = %subscriber_id, "track");
            }
        });
    }

    /// Notify the subscribers of `key` on `target` that it changed.
    ///
    /// `new_value` is consulted for `Key::Length`, where it carries the new
    /// length. `old_value` is only used for logging.
    pub fn trigger(
        target: TargetId,
        key: &Key,
        op: TriggerOp,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
    ) {
        let effects: SmallVec<[Effect; 8]> = RUNTIME.with(|rt| {
            let rt = rt.borrow();
            let Some(deps) = rt.targets.get(&target) else {
                return SmallVec::new();
            };

            let mut collected: IndexSet<SubscriberId> = IndexSet::new();
            match key {
                Key::Length => {
                    let new_len = new_value.and_then(Value::as_index).unwrap_or(0);
                    for (dep_key, subscribers) in deps {
                        let affected = match dep_key {
                            Key::Length => true,
                            Key::Index(index) => *index >= new_len,
                            _ => false,
                        };
                        if affected {
                            collected.extend(subscribers.iter().copied());
                        }
                    }
                }
                _ => {
                    if let Some(subscribers) = deps.get(key) {
                        collected.extend(subscribers.iter().copied());
                    }
                    if matches!(op, TriggerOp::Add | TriggerOp::Delete) && key.is_index() {
                        if let Some(subscribers) = deps.get(&Key::Length) {
                            collected.extend(subscribers.iter().copied());
                        }
                    }
                }
            }

            collected
                .into_iter()
                .filter_map(|id| rt.subscribers.get(&id).and_then(Weak::upgrade))
                .map(Effect::from_inner)
                .collect()
        });

        trace!(
            target_id = target.raw(),
            %key,
            ?op,
            new = ?new_value,
            old = ?old_value,
            subscribers = effects.len(),
            "trigger"
        );

        for effect in effects {
            effect.notify();
        }
    }

    /// Number of subscribers currently tracked under `target`/`key`.
    pub fn subscriber_count(target: TargetId, key: &Key) -> usize {
        RUNTIME.with(|rt| {
            rt.borrow()
                .targets
                .get(&target)
                .and_then(|deps| deps.get(key))
                .map_or(0, IndexSet::len)
        })
    }

    /// Number of dependency edges owned by a subscriber.
    pub fn dependency_count(subscriber_id: SubscriberId) -> usize {
        RUNTIME.with(|rt| rt.borrow().edges.get(&subscriber_id).map_or(0, Vec::len))
    }

    /// Whether a dependency entry exists for `target`.
    pub fn has_target(target: TargetId) -> bool {
        RUNTIME.with(|rt| rt.borrow().targets.contains_key(&target))
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
