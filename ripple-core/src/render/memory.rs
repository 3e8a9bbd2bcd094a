//! In-memory host.
//!
//! [`MemoryHost`] is a complete [`HostAdapter`] that keeps nodes in an arena
//! and records every mutating call in an operation log. It serves headless
//! rendering, tests and benchmarks: the tree can be serialized to HTML-like
//! text with [`MemoryHost::inner_html`], and the log can be inspected as
//! [`HostOp`] values or exported as JSON.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use super::host::HostAdapter;
use crate::reactive::Value;

/// Handle to a node in a [`MemoryHost`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MemoryNode(usize);

impl MemoryNode {
    /// Arena index of the node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One mutating host call, as recorded in the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateElement {
        node: MemoryNode,
        tag: String,
    },
    CreateText {
        node: MemoryNode,
        text: String,
    },
    /// `moved` is set when the node was attached somewhere before the call.
    Insert {
        node: MemoryNode,
        parent: MemoryNode,
        anchor: Option<MemoryNode>,
        moved: bool,
    },
    Remove {
        node: MemoryNode,
    },
    SetElementText {
        node: MemoryNode,
        text: String,
    },
    SetText {
        node: MemoryNode,
        text: String,
    },
    PatchAttribute {
        node: MemoryNode,
        key: String,
        prev: Option<Value>,
        next: Option<Value>,
    },
}

/// Tally of the operation log by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub created: usize,
    pub inserted: usize,
    pub moved: usize,
    pub removed: usize,
    pub text_updates: usize,
    pub attribute_patches: usize,
}

impl OpCounts {
    /// Total number of recorded calls.
    pub fn total(&self) -> usize {
        self.created
            + self.inserted
            + self.moved
            + self.removed
            + self.text_updates
            + self.attribute_patches
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: IndexMap<String, Value>,
        text: String,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Entry {
    data: NodeData,
    parent: Option<MemoryNode>,
    children: Vec<MemoryNode>,
}

/// Arena-backed host with an operation log.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<Entry>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container element to render into. Not recorded in the log.
    pub fn create_root(&mut self, tag: &str) -> MemoryNode {
        self.alloc(NodeData::Element {
            tag: tag.to_string(),
            attrs: IndexMap::new(),
            text: String::new(),
        })
    }

    fn alloc(&mut self, data: NodeData) -> MemoryNode {
        let node = MemoryNode(self.nodes.len());
        self.nodes.push(Entry {
            data,
            parent: None,
            children: Vec::new(),
        });
        node
    }

    fn record(&mut self, op: HostOp) {
        trace!(?op, "host op");
        self.ops.push(op);
    }

    fn detach(&mut self, node: MemoryNode) -> bool {
        let Some(parent) = self.nodes[node.0].parent.take() else {
            return false;
        };
        self.nodes[parent.0].children.retain(|&child| child != node);
        true
    }

    /// The recorded operations, oldest first.
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Drain the operation log.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Forget the recorded operations.
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// The operation log as a JSON array.
    pub fn ops_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.ops)
    }

    /// Tally the operation log.
    pub fn op_counts(&self) -> OpCounts {
        let mut counts = OpCounts::default();
        for op in &self.ops {
            match op {
                HostOp::CreateElement { .. } | HostOp::CreateText { .. } => counts.created += 1,
                HostOp::Insert { moved: true, .. } => counts.moved += 1,
                HostOp::Insert { .. } => counts.inserted += 1,
                HostOp::Remove { .. } => counts.removed += 1,
                HostOp::SetElementText { .. } | HostOp::SetText { .. } => counts.text_updates += 1,
                HostOp::PatchAttribute { .. } => counts.attribute_patches += 1,
            }
        }
        counts
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children of `node`, in order.
    pub fn children(&self, node: MemoryNode) -> &[MemoryNode] {
        &self.nodes[node.0].children
    }

    /// Parent of `node`, if attached.
    pub fn parent(&self, node: MemoryNode) -> Option<MemoryNode> {
        self.nodes[node.0].parent
    }

    /// Tag of an element node.
    pub fn tag(&self, node: MemoryNode) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    /// An attribute of an element node.
    pub fn attribute(&self, node: MemoryNode, key: &str) -> Option<&Value> {
        match &self.nodes[node.0].data {
            NodeData::Element { attrs, .. } => attrs.get(key),
            NodeData::Text(_) => None,
        }
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: MemoryNode) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: MemoryNode, out: &mut String) {
        let entry = &self.nodes[node.0];
        match &entry.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { text, .. } => {
                out.push_str(text);
                for &child in &entry.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Serialize `node` and its subtree.
    pub fn to_html(&self, node: MemoryNode) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize the subtree of `node` without the node itself.
    pub fn inner_html(&self, node: MemoryNode) -> String {
        let mut out = String::new();
        self.write_content(node, &mut out);
        out
    }

    fn write_node(&self, node: MemoryNode, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { tag, attrs, .. } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attrs {
                    let _ = write!(out, " {key}=\"{value}\"");
                }
                out.push('>');
                self.write_content(node, out);
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn write_content(&self, node: MemoryNode, out: &mut String) {
        let entry = &self.nodes[node.0];
        if let NodeData::Element { text, .. } = &entry.data {
            out.push_str(text);
        }
        for &child in &entry.children {
            self.write_node(child, out);
        }
    }
}

impl HostAdapter for MemoryHost {
    type Node = MemoryNode;

    fn create_element(&mut self, tag: &str) -> MemoryNode {
        let node = self.alloc(NodeData::Element {
            tag: tag.to_string(),
            attrs: IndexMap::new(),
            text: String::new(),
        });
        self.record(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> MemoryNode {
        let node = self.alloc(NodeData::Text(text.to_string()));
        self.record(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn insert(&mut self, node: &MemoryNode, parent: &MemoryNode, anchor: Option<&MemoryNode>) {
        let (node, parent) = (*node, *parent);
        let moved = self.detach(node);

        let children = &mut self.nodes[parent.0].children;
        let position = anchor
            .and_then(|anchor| children.iter().position(|child| child == anchor))
            .unwrap_or(children.len());
        children.insert(position, node);
        self.nodes[node.0].parent = Some(parent);

        self.record(HostOp::Insert {
            node,
            parent,
            anchor: anchor.copied(),
            moved,
        });
    }

    fn remove(&mut self, node: &MemoryNode) {
        self.detach(*node);
        self.record(HostOp::Remove { node: *node });
    }

    fn set_element_text(&mut self, node: &MemoryNode, text: &str) {
        let node = *node;
        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
        if let NodeData::Element { text: content, .. } = &mut self.nodes[node.0].data {
            *content = text.to_string();
        }
        self.record(HostOp::SetElementText {
            node,
            text: text.to_string(),
        });
    }

    fn set_text(&mut self, node: &MemoryNode, text: &str) {
        if let NodeData::Text(content) = &mut self.nodes[node.0].data {
            *content = text.to_string();
        }
        self.record(HostOp::SetText {
            node: *node,
            text: text.to_string(),
        });
    }

    fn next_sibling(&self, node: &MemoryNode) -> Option<MemoryNode> {
        let parent = self.nodes[node.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let position = siblings.iter().position(|child| child == node)?;
        siblings.get(position + 1).copied()
    }

    fn patch_attribute(
        &mut self,
        node: &MemoryNode,
        key: &str,
        prev: Option<&Value>,
        next: Option<&Value>,
    ) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[node.0].data {
            match next {
                Some(value) => {
                    attrs.insert(key.to_string(), value.clone());
                }
                None => {
                    attrs.shift_remove(key);
                }
            }
        }
        self.record(HostOp::PatchAttribute {
            node: *node,
            key: key.to_string(),
            prev: prev.cloned(),
            next: next.cloned(),
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_appends_or_goes_before_anchor() {
        let mut host = MemoryHost::new();
        let root = host.create_root("root");
        let a = host.create_text("a");
        let b = host.create_text("b");
        let c = host.create_text("c");

        host.insert(&a, &root, None);
        host.insert(&c, &root, None);
        host.insert(&b, &root, Some(&c));

        assert_eq!(host.children(root), &[a, b, c]);
        assert_eq!(host.inner_html(root), "abc");
        assert_eq!(host.next_sibling(&a), Some(b));
        assert_eq!(host.next_sibling(&c), None);
    }

    #[test]
    fn reinserting_is_a_move() {
        let mut host = MemoryHost::new();
        let root = host.create_root("root");
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert(&a, &root, None);
        host.insert(&b, &root, None);
        host.clear_ops();

        host.insert(&b, &root, Some(&a));

        assert_eq!(host.inner_html(root), "ba");
        assert_eq!(host.op_counts().moved, 1);
        assert_eq!(host.op_counts().inserted, 0);
    }

    #[test]
    fn html_includes_attributes_and_text() {
        let mut host = MemoryHost::new();
        let root = host.create_root("root");
        let div = host.create_element("div");
        host.patch_attribute(&div, "id", None, Some(&Value::from("main")));
        host.patch_attribute(&div, "tabindex", None, Some(&Value::from(3)));
        host.set_element_text(&div, "hi");
        host.insert(&div, &root, None);

        assert_eq!(host.to_html(div), r#"<div id="main" tabindex="3">hi</div>"#);
        assert_eq!(host.text_content(root), "hi");

        host.patch_attribute(&div, "id", Some(&Value::from("main")), None);
        assert_eq!(host.attribute(div, "id"), None);
        assert_eq!(host.tag(div), Some("div"));
    }

    #[test]
    fn set_element_text_detaches_children() {
        let mut host = MemoryHost::new();
        let root = host.create_root("root");
        let child = host.create_text("x");
        host.insert(&child, &root, None);

        host.set_element_text(&root, "plain");

        assert!(host.children(root).is_empty());
        assert_eq!(host.parent(child), None);
        assert_eq!(host.inner_html(root), "plain");
    }

    #[test]
    fn ops_export_as_tagged_json() {
        let mut host = MemoryHost::new();
        let root = host.create_root("root");
        let node = host.create_element("p");
        host.insert(&node, &root, None);

        let json = host.ops_json().unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "op": "create_element", "node": 1, "tag": "p" },
                { "op": "insert", "node": 1, "parent": 0, "anchor": null, "moved": false },
            ])
        );
    }
}
