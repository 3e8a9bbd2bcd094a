//! Virtual nodes.
//!
//! A [`VNode`] describes one node of a render pass: an element, a text node or
//! a component. Its type, attributes, children and key are fixed when it is
//! built. The only mutable parts are the back-references the reconciler fills
//! in: the realized host node and, for components, the rendered subtree.
//!
//! Trees are built with [`h`], [`text`] and [`component`]:
//!
//! ```rust,ignore
//! let list = h("ul").children(items.iter().map(|item| {
//!     h("li").key(item.id).attr("class", "item").text(item.label.clone())
//! }));
//! ```

use std::cell::{Ref, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::reactive::Value;

/// Attribute map of an element, also used as component props.
pub type Props = IndexMap<String, Value>;

/// Identity token that lets the reconciler match siblings across passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum NodeKey {
    /// Numeric key.
    Int(i64),
    /// String key.
    Str(Rc<str>),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Int(n) => write!(f, "{n}"),
            NodeKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for NodeKey {
    fn from(n: i64) -> Self {
        NodeKey::Int(n)
    }
}

impl From<i32> for NodeKey {
    fn from(n: i32) -> Self {
        NodeKey::Int(i64::from(n))
    }
}

impl From<u32> for NodeKey {
    fn from(n: u32) -> Self {
        NodeKey::Int(i64::from(n))
    }
}

impl From<usize> for NodeKey {
    fn from(n: usize) -> Self {
        match i64::try_from(n) {
            Ok(n) => NodeKey::Int(n),
            Err(_) => NodeKey::Str(Rc::from(n.to_string())),
        }
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        NodeKey::Str(Rc::from(s))
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        NodeKey::Str(Rc::from(s))
    }
}

/// A reusable component: a named render function from props to a subtree.
pub struct ComponentDef<N> {
    name: Rc<str>,
    render: Box<dyn Fn(&Props) -> VNode<N>>,
}

impl<N> ComponentDef<N> {
    /// Define a component.
    pub fn new<F>(name: &str, render: F) -> Self
    where
        F: Fn(&Props) -> VNode<N> + 'static,
    {
        Self {
            name: Rc::from(name),
            render: Box::new(render),
        }
    }

    /// The component's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce the subtree for `props`.
    pub fn render(&self, props: &Props) -> VNode<N> {
        (self.render)(props)
    }
}

impl<N> fmt::Debug for ComponentDef<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef").field("name", &self.name).finish()
    }
}

/// What a node is.
pub enum NodeType<N> {
    /// A host element with a tag.
    Element(Rc<str>),
    /// A component; two nodes have the same type only if they share the
    /// definition.
    Component(Rc<ComponentDef<N>>),
    /// A text node.
    Text,
}

impl<N> NodeType<N> {
    /// The coarse classification of this type.
    pub fn kind(&self) -> VNodeKind {
        match self {
            NodeType::Element(_) => VNodeKind::Element,
            NodeType::Component(_) => VNodeKind::Component,
            NodeType::Text => VNodeKind::Text,
        }
    }
}

impl<N> PartialEq for NodeType<N> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeType::Element(a), NodeType::Element(b)) => a == b,
            (NodeType::Component(a), NodeType::Component(b)) => Rc::ptr_eq(a, b),
            (NodeType::Text, NodeType::Text) => true,
            _ => false,
        }
    }
}

impl<N> fmt::Debug for NodeType<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Element(tag) => f.debug_tuple("Element").field(tag).finish(),
            NodeType::Component(def) => f.debug_tuple("Component").field(&def.name).finish(),
            NodeType::Text => f.write_str("Text"),
        }
    }
}

/// Coarse node classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VNodeKind {
    /// Host element.
    Element,
    /// Stateful component.
    Component,
    /// Text node.
    Text,
}

/// Children of a node.
#[derive(Debug)]
pub enum Children<N> {
    /// No children.
    None,
    /// A single run of text. For a text node this is its content.
    Text(String),
    /// An ordered sequence of child nodes.
    Nodes(Vec<VNode<N>>),
}

impl<N> Children<N> {
    /// The child nodes, if the children are a sequence.
    pub fn nodes(&self) -> Option<&[VNode<N>]> {
        match self {
            Children::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// The text, if the children are text.
    pub fn text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// One node of a render pass.
#[derive(Debug)]
pub struct VNode<N> {
    ty: NodeType<N>,
    attrs: Props,
    children: Children<N>,
    key: Option<NodeKey>,
    el: RefCell<Option<N>>,
    subtree: RefCell<Option<Box<VNode<N>>>>,
}

impl<N> VNode<N> {
    fn new(ty: NodeType<N>, attrs: Props, children: Children<N>, key: Option<NodeKey>) -> Self {
        Self {
            ty,
            attrs,
            children,
            key,
            el: RefCell::new(None),
            subtree: RefCell::new(None),
        }
    }

    /// Attach a key. Meant for text and component nodes, whose builders take
    /// no key.
    pub fn with_key(mut self, key: impl Into<NodeKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The node's type.
    pub fn ty(&self) -> &NodeType<N> {
        &self.ty
    }

    /// The coarse classification.
    pub fn kind(&self) -> VNodeKind {
        self.ty.kind()
    }

    /// Element tag, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.ty {
            NodeType::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Attributes of an element, props of a component.
    pub fn attrs(&self) -> &Props {
        &self.attrs
    }

    /// The children.
    pub fn children(&self) -> &Children<N> {
        &self.children
    }

    /// The key, if any.
    pub fn key(&self) -> Option<&NodeKey> {
        self.key.as_ref()
    }

    /// The rendered subtree of a mounted component.
    pub fn subtree(&self) -> Option<Ref<'_, VNode<N>>> {
        Ref::filter_map(self.subtree.borrow(), |subtree| subtree.as_deref()).ok()
    }

    pub(crate) fn set_subtree(&self, subtree: VNode<N>) {
        *self.subtree.borrow_mut() = Some(Box::new(subtree));
    }

    pub(crate) fn take_subtree(&self) -> Option<VNode<N>> {
        self.subtree.borrow_mut().take().map(|subtree| *subtree)
    }
}

impl<N: Clone> VNode<N> {
    /// The realized host node, once mounted. For a component this is the
    /// root node of its subtree.
    pub fn el(&self) -> Option<N> {
        self.el.borrow().clone()
    }

    pub(crate) fn set_el(&self, el: Option<N>) {
        *self.el.borrow_mut() = el;
    }
}

/// Whether two nodes are the same logical node: same type and same key.
/// A missing key only matches a missing key.
pub fn same_vnode<N>(a: &VNode<N>, b: &VNode<N>) -> bool {
    a.ty == b.ty && a.key == b.key
}

/// Start an element.
pub fn h<N>(tag: &str) -> ElementBuilder<N> {
    ElementBuilder {
        tag: Rc::from(tag),
        attrs: Props::new(),
        key: None,
        _node: PhantomData,
    }
}

/// A text node.
pub fn text<N>(content: impl Into<String>) -> VNode<N> {
    VNode::new(NodeType::Text, Props::new(), Children::Text(content.into()), None)
}

/// A component node with `props`.
pub fn component<N>(def: &Rc<ComponentDef<N>>, props: Props) -> VNode<N> {
    VNode::new(NodeType::Component(Rc::clone(def)), props, Children::None, None)
}

/// Builder returned by [`h`].
pub struct ElementBuilder<N> {
    tag: Rc<str>,
    attrs: Props,
    key: Option<NodeKey>,
    _node: PhantomData<N>,
}

impl<N> ElementBuilder<N> {
    /// Set the key.
    pub fn key(mut self, key: impl Into<NodeKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set one attribute.
    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    /// Set several attributes.
    pub fn attrs<I, K, V>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.attrs
            .extend(attrs.into_iter().map(|(name, value)| (name.into(), value.into())));
        self
    }

    /// Finish with text content.
    pub fn text(self, content: impl Into<String>) -> VNode<N> {
        self.finish(Children::Text(content.into()))
    }

    /// Finish with child nodes.
    pub fn children<I>(self, children: I) -> VNode<N>
    where
        I: IntoIterator<Item = VNode<N>>,
    {
        self.finish(Children::Nodes(children.into_iter().collect()))
    }

    /// Finish without children.
    pub fn build(self) -> VNode<N> {
        self.finish(Children::None)
    }

    fn finish(self, children: Children<N>) -> VNode<N> {
        VNode::new(NodeType::Element(self.tag), self.attrs, children, self.key)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    type Node = VNode<u32>;

    #[test]
    fn builder_fixes_shape() {
        let node: Node = h("div").key(1).attr("id", "main").text("hello");

        assert_eq!(node.kind(), VNodeKind::Element);
        assert_eq!(node.tag(), Some("div"));
        assert_eq!(node.key(), Some(&NodeKey::Int(1)));
        assert_eq!(node.attrs().get("id"), Some(&Value::from("main")));
        assert_eq!(node.children().text(), Some("hello"));
        assert!(node.el().is_none());
    }

    #[test]
    fn children_keep_order() {
        let node: Node = h("ul").children((0..3).map(|i| h("li").key(i).build()));
        let keys: Vec<_> = node
            .children()
            .nodes()
            .map(|nodes| nodes.iter().filter_map(VNode::key).cloned().collect())
            .unwrap_or_default();

        assert_eq!(keys, vec![NodeKey::Int(0), NodeKey::Int(1), NodeKey::Int(2)]);
    }

    #[test]
    fn same_vnode_needs_type_and_key() {
        let a: Node = h("li").key("a").build();
        let b: Node = h("li").key("a").text("different content");
        let c: Node = h("li").key("c").build();
        let d: Node = h("p").key("a").build();
        let unkeyed: Node = h("li").build();

        assert!(same_vnode(&a, &b));
        assert!(!same_vnode(&a, &c));
        assert!(!same_vnode(&a, &d));
        assert!(!same_vnode(&a, &unkeyed));
        assert!(same_vnode(&unkeyed, &h("li").build()));
    }

    #[test]
    fn components_compare_by_definition() {
        let first: Rc<ComponentDef<u32>> = Rc::new(ComponentDef::new("Item", |_| text("x")));
        let twin: Rc<ComponentDef<u32>> = Rc::new(ComponentDef::new("Item", |_| text("x")));

        assert!(same_vnode(&component(&first, Props::new()), &component(&first, Props::new())));
        assert!(!same_vnode(&component(&first, Props::new()), &component(&twin, Props::new())));
        assert_eq!(first.name(), "Item");
    }

    #[test]
    fn text_nodes_can_be_keyed() {
        let node: Node = text("label").with_key("k");
        assert_eq!(node.kind(), VNodeKind::Text);
        assert_eq!(node.key(), Some(&NodeKey::from("k")));
    }

    #[test]
    fn node_keys_serialize_untagged() {
        let keys = vec![NodeKey::from(7), NodeKey::from("seven")];
        assert_eq!(serde_json::to_string(&keys).unwrap(), r#"[7,"seven"]"#);
    }
}
