//! Reactive Primitives
//!
//! This module implements the dependency engine: effects, observable wrappers,
//! refs and computed cells. These primitives decide which computations re-run
//! when data changes.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a registered procedure. Every observable read performed while
//! it runs is recorded as a dependency, and a later write to any of those reads
//! runs the procedure again (or hands it to a scheduler override).
//!
//! ## Observables
//!
//! An Observable wraps a plain aggregate (a record or a sequence) so that reads
//! call `track` and writes call `trigger`. Four modes exist: mutable and
//! readonly, each either deep or shallow. Wrapping the same target in the same
//! mode twice returns the same wrapper.
//!
//! ## Refs and Computeds
//!
//! A Ref is a single observable value. A Computed is a cached derivation that
//! becomes dirty when one of its inputs changes and re-evaluates on the next
//! read.
//!
//! # Implementation Notes
//!
//! Dependencies live in a thread-local side table keyed by target identity
//! and property key. The active subscriber is found through a thread-local
//! stack guarded by [`ReactiveContext`]. No locks are involved: the whole graph
//! is single-threaded.

mod context;
mod subscriber;
mod runtime;
mod effect;
mod value;
mod observable;
mod cell;
mod computed;

pub use context::{untracked, ReactiveContext};
pub use subscriber::{EffectOptions, Scheduler, SubscriberId};
pub use runtime::{Key, Runtime, TargetId, TriggerOp};
pub use effect::{effect, effect_with, Effect};
pub use value::{Aggregate, Shape, Target, Value, MAX_SEQUENCE_LEN};
pub use observable::{
    reactive, readonly, shallow_reactive, shallow_readonly, wrap, Observable, Slot, WrapMode,
};
pub use cell::{to_ref, to_refs, ObjectRef, Ref};
pub use computed::{computed, Computed, ComputedState};

pub use crate::error::Error as ReactiveError;
