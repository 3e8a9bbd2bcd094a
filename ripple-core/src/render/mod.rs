//! Rendering Pipeline
//!
//! This module turns node trees into host mutations.
//!
//! # Overview
//!
//! - [`VNode`] trees are built per render pass with [`h`], [`text`] and
//!   [`component`]. They are cheap and discarded after being diffed against
//!   the next pass.
//! - [`Renderer`] diffs the previous tree against the new one and calls the
//!   [`HostAdapter`] for every structural change. Keyed child sequences use a
//!   longest-increasing-subsequence pass so the number of moves is minimal.
//! - [`MemoryHost`] is a headless host that records what happened.
//! - [`App`] wraps a root render function in a render effect so writes to
//!   observable state re-render automatically.

mod app;
mod host;
mod lis;
mod memory;
mod renderer;
mod vnode;

pub use app::{create_app, App};
pub use host::HostAdapter;
pub use lis::longest_increasing_subsequence;
pub use memory::{HostOp, MemoryHost, MemoryNode, OpCounts};
pub use renderer::Renderer;
pub use vnode::{
    component, h, same_vnode, text, Children, ComponentDef, ElementBuilder, NodeKey, NodeType,
    Props, VNode, VNodeKind,
};
