//! Subscriber identity and registration options.
//!
//! A subscriber is any computation that depends on reactive values: plain
//! effects, the internal effect of a computed cell, or an app's render pass.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::effect::Effect;

/// Unique identifier for a subscriber.
///
/// Dependency sets store these IDs rather than the subscribers themselves, so
/// a subscriber appears at most once per key regardless of how often it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduler override invoked instead of running the effect on trigger.
pub type Scheduler = Rc<dyn Fn(&Effect)>;

/// Options accepted by [`effect_with`](super::effect_with).
///
/// ```rust,ignore
/// let options = EffectOptions::new()
///     .lazy()
///     .label("render")
///     .scheduler(|effect| queue.borrow_mut().push(effect.clone()));
/// ```
#[derive(Clone, Default)]
pub struct EffectOptions {
    pub(crate) lazy: bool,
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) label: Option<Rc<str>>,
}

impl EffectOptions {
    /// Default options: run immediately, re-run synchronously on trigger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not run the procedure on registration.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Route every trigger through `scheduler` instead of re-running directly.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&Effect) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Attach a name that shows up in log output.
    pub fn label(mut self, label: impl Into<Rc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether the effect skips its initial run.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// The scheduler override, if any.
    pub fn scheduler_fn(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    /// The debug label, if any.
    pub fn label_str(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("label", &self.label)
            .finish()
    }
}
