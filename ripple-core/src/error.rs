//! Error types.
//!
//! Nothing in the core is fatal. Every variant here describes a request that
//! was refused and left the world untouched, so callers are free to ignore the
//! error after the diagnostic has been logged.

use thiserror::Error;

/// Errors reported by the reactive layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A write was attempted through a readonly wrapper.
    #[error("set on key {key} failed: target is readonly")]
    ReadonlyWrite {
        /// The key that was written.
        key: String,
    },

    /// A write was attempted on a computed value that has no setter.
    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    /// The key does not address anything on a target of this shape.
    #[error("key {key} cannot address a {shape} target")]
    KeyMismatch {
        /// The offending key.
        key: String,
        /// Shape of the target (`record` or `sequence`).
        shape: &'static str,
    },

    /// A sequence length was set to something that is not a valid length.
    #[error("invalid sequence length {value}")]
    InvalidLength {
        /// The rejected value, rendered as text.
        value: String,
    },

    /// A sequence would have grown past the supported maximum length, or the
    /// allocation for the gap failed.
    #[error("sequence length {len} exceeds the supported maximum")]
    SequenceTooLong {
        /// The length the write asked for.
        len: usize,
    },

    /// A computed value was read from inside its own first evaluation.
    #[error("computed value read itself before producing a value")]
    CircularComputed,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
