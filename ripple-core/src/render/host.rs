//! Host adapter.
//!
//! The reconciler never touches a real node tree. Every structural change goes
//! through a [`HostAdapter`], which owns the concrete nodes (DOM elements,
//! terminal cells, an in-memory arena) and hands out cheap handles to them.

use std::fmt::Debug;

use crate::reactive::Value;

/// Node primitives the reconciler needs from a host.
pub trait HostAdapter {
    /// Handle to a host node. Cloning must not copy the node itself.
    type Node: Clone + Debug + PartialEq;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> Self::Node;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Insert `node` into `parent` before `anchor`, or at the end when
    /// `anchor` is `None`. Inserting an attached node moves it.
    fn insert(&mut self, node: &Self::Node, parent: &Self::Node, anchor: Option<&Self::Node>);

    /// Detach `node` from its parent.
    fn remove(&mut self, node: &Self::Node);

    /// Replace the whole content of an element with plain text.
    fn set_element_text(&mut self, node: &Self::Node, text: &str);

    /// Change the content of a text node.
    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// The node following `node` under the same parent.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Apply an attribute change. `next == None` removes the attribute.
    fn patch_attribute(
        &mut self,
        node: &Self::Node,
        key: &str,
        prev: Option<&Value>,
        next: Option<&Value>,
    );
}
