//! Tree Reconciler
//!
//! The renderer diffs two versions of a node tree and issues the host calls
//! that turn the first into the second.
//!
//! # How Patching Works
//!
//! 1. No old node: mount the new one (create, apply attributes, mount
//!    children, insert at the anchor).
//!
//! 2. Old and new are the same logical node (same type, same key): reuse the
//!    host node, apply the attribute diff, reconcile the children.
//!
//! 3. Anything else: unmount the old node and mount the new one where the old
//!    one was.
//!
//! # Keyed Children
//!
//! Child sequences are reconciled in five steps: sync the common prefix, sync
//! the common suffix, mount what is left of the new sequence, unmount what is
//! left of the old one, and finally resolve the unordered middle. In the
//! middle every new child is looked up by key; matched pairs are patched in
//! place and the longest increasing subsequence of their old positions stays
//! where it is. Everything else is moved or mounted, walking backwards so each
//! node can be anchored before its already placed successor.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::host::HostAdapter;
use super::lis::longest_increasing_subsequence;
use super::vnode::{same_vnode, Children, NodeKey, NodeType, Props, VNode};

/// Drives a [`HostAdapter`] from successive node trees.
pub struct Renderer<H: HostAdapter> {
    host: H,
    roots: Vec<(H::Node, VNode<H::Node>)>,
}

impl<H: HostAdapter> Renderer<H> {
    /// Create a renderer over `host`.
    pub fn new(host: H) -> Self {
        Self {
            host,
            roots: Vec::new(),
        }
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Give the host back.
    pub fn into_host(self) -> H {
        self.host
    }

    /// The tree last rendered into `container`.
    pub fn root(&self, container: &H::Node) -> Option<&VNode<H::Node>> {
        self.roots
            .iter()
            .find(|(root, _)| root == container)
            .map(|(_, tree)| tree)
    }

    /// Render `tree` into `container`, diffing against whatever was rendered
    /// there before. `None` unmounts the previous tree.
    pub fn render(&mut self, tree: Option<VNode<H::Node>>, container: &H::Node) {
        let previous = self
            .roots
            .iter()
            .position(|(root, _)| root == container)
            .map(|index| self.roots.swap_remove(index).1);

        match (previous, tree) {
            (Some(old), Some(new)) => {
                debug!(?container, "patch root");
                self.patch(Some(&old), &new, container, None);
                self.roots.push((container.clone(), new));
            }
            (None, Some(new)) => {
                debug!(?container, "mount root");
                self.patch(None, &new, container, None);
                self.roots.push((container.clone(), new));
            }
            (Some(old), None) => {
                debug!(?container, "unmount root");
                self.unmount(&old);
            }
            (None, None) => {}
        }
    }

    /// Reconcile `old` into `new` under `container`. New nodes are inserted
    /// before `anchor`.
    pub fn patch(
        &mut self,
        old: Option<&VNode<H::Node>>,
        new: &VNode<H::Node>,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        let Some(old) = old else {
            self.mount(new, container, anchor);
            return;
        };

        if std::ptr::eq(old, new) {
            return;
        }

        if !same_vnode(old, new) {
            let next = match old.el() {
                Some(el) => self.host.next_sibling(&el),
                None => anchor.cloned(),
            };
            trace!(old = ?old.ty(), new = ?new.ty(), "replace node");
            self.unmount(old);
            self.mount(new, container, next.as_ref());
            return;
        }

        match new.ty() {
            NodeType::Text => {
                let el = old.el();
                if let (Some(el), Some(prev), Some(next)) =
                    (&el, old.children().text(), new.children().text())
                {
                    if prev != next {
                        self.host.set_text(el, next);
                    }
                }
                new.set_el(el);
            }
            NodeType::Element(_) => {
                let el = old.el();
                if let Some(el) = &el {
                    self.patch_props(el, old.attrs(), new.attrs());
                    self.patch_children(old, new, el);
                }
                new.set_el(el);
            }
            NodeType::Component(def) => {
                let next = def.render(new.attrs());
                let prev = old.take_subtree();
                self.patch(prev.as_ref(), &next, container, anchor);
                new.set_el(next.el());
                new.set_subtree(next);
            }
        }
    }

    /// Create the host nodes for `vnode` and insert them before `anchor`.
    pub fn mount(&mut self, vnode: &VNode<H::Node>, container: &H::Node, anchor: Option<&H::Node>) {
        match vnode.ty() {
            NodeType::Text => {
                let el = self
                    .host
                    .create_text(vnode.children().text().unwrap_or_default());
                self.host.insert(&el, container, anchor);
                vnode.set_el(Some(el));
            }
            NodeType::Element(tag) => {
                let el = self.host.create_element(tag);
                match vnode.children() {
                    Children::Text(text) => self.host.set_element_text(&el, text),
                    Children::Nodes(children) => self.mount_children(children, &el, None),
                    Children::None => {}
                }
                for (key, value) in vnode.attrs() {
                    self.host.patch_attribute(&el, key, None, Some(value));
                }
                self.host.insert(&el, container, anchor);
                vnode.set_el(Some(el));
            }
            NodeType::Component(def) => {
                trace!(component = def.name(), "mount component");
                let subtree = def.render(vnode.attrs());
                self.mount(&subtree, container, anchor);
                vnode.set_el(subtree.el());
                vnode.set_subtree(subtree);
            }
        }
    }

    fn mount_children(
        &mut self,
        children: &[VNode<H::Node>],
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) {
        for child in children {
            self.mount(child, container, anchor);
        }
    }

    /// Remove the host nodes of `vnode`.
    pub fn unmount(&mut self, vnode: &VNode<H::Node>) {
        match vnode.ty() {
            NodeType::Component(_) => {
                if let Some(subtree) = vnode.take_subtree() {
                    self.unmount(&subtree);
                }
            }
            _ => {
                if let Some(el) = vnode.el() {
                    self.host.remove(&el);
                }
            }
        }
    }

    fn unmount_children(&mut self, children: &[VNode<H::Node>]) {
        for child in children {
            self.unmount(child);
        }
    }

    fn move_node(&mut self, vnode: &VNode<H::Node>, container: &H::Node, anchor: Option<&H::Node>) {
        if let Some(el) = vnode.el() {
            self.host.insert(&el, container, anchor);
        }
    }

    fn patch_props(&mut self, el: &H::Node, old: &Props, new: &Props) {
        for (key, next) in new {
            let prev = old.get(key);
            if prev != Some(next) {
                self.host.patch_attribute(el, key, prev, Some(next));
            }
        }
        for (key, prev) in old {
            if !new.contains_key(key) {
                self.host.patch_attribute(el, key, Some(prev), None);
            }
        }
    }

    fn patch_children(&mut self, old: &VNode<H::Node>, new: &VNode<H::Node>, el: &H::Node) {
        match (old.children(), new.children()) {
            (Children::Text(prev), Children::Text(next)) => {
                if prev != next {
                    self.host.set_element_text(el, next);
                }
            }
            (Children::Nodes(prev), Children::Text(next)) => {
                self.unmount_children(prev);
                self.host.set_element_text(el, next);
            }
            (Children::None, Children::Text(next)) => {
                self.host.set_element_text(el, next);
            }
            (Children::Nodes(prev), Children::Nodes(next)) => {
                self.patch_keyed_children(prev, next, el, None);
            }
            (Children::Text(_), Children::Nodes(next)) => {
                self.host.set_element_text(el, "");
                self.mount_children(next, el, None);
            }
            (Children::None, Children::Nodes(next)) => {
                self.mount_children(next, el, None);
            }
            (Children::Nodes(prev), Children::None) => {
                self.unmount_children(prev);
            }
            (Children::Text(_), Children::None) => {
                self.host.set_element_text(el, "");
            }
            (Children::None, Children::None) => {}
        }
    }

    /// Reconcile two keyed child sequences of `container`.
    pub fn patch_keyed_children(
        &mut self,
        c1: &[VNode<H::Node>],
        c2: &[VNode<H::Node>],
        container: &H::Node,
        parent_anchor: Option<&H::Node>,
    ) {
        let mut i = 0;
        let mut e1 = c1.len();
        let mut e2 = c2.len();

        // 1. common prefix
        while i < e1 && i < e2 && same_vnode(&c1[i], &c2[i]) {
            self.patch(Some(&c1[i]), &c2[i], container, None);
            i += 1;
        }

        // 2. common suffix
        while i < e1 && i < e2 && same_vnode(&c1[e1 - 1], &c2[e2 - 1]) {
            self.patch(Some(&c1[e1 - 1]), &c2[e2 - 1], container, None);
            e1 -= 1;
            e2 -= 1;
        }

        // 3. old exhausted: mount the rest of the new sequence
        if i >= e1 {
            if i < e2 {
                let anchor = self.anchor_after(c2, e2, parent_anchor);
                for child in &c2[i..e2] {
                    self.mount(child, container, anchor.as_ref());
                }
            }
            return;
        }

        // 4. new exhausted: unmount the rest of the old sequence
        if i >= e2 {
            self.unmount_children(&c1[i..e1]);
            return;
        }

        // 5. unordered middle
        let (s1, s2) = (i, i);
        let key_to_new: HashMap<&NodeKey, usize> = (s2..e2)
            .filter_map(|j| c2[j].key().map(|key| (key, j)))
            .collect();

        let to_be_patched = e2 - s2;
        let mut patched = 0;
        let mut new_to_old = vec![0usize; to_be_patched];
        let mut moved = false;
        let mut max_new_index = 0;

        for (j, prev) in c1.iter().enumerate().take(e1).skip(s1) {
            if patched >= to_be_patched {
                self.unmount(prev);
                continue;
            }

            let Some(new_index) = prev.key().and_then(|key| key_to_new.get(key).copied()) else {
                self.unmount(prev);
                continue;
            };

            new_to_old[new_index - s2] = j + 1;
            if new_index >= max_new_index {
                max_new_index = new_index;
            } else {
                moved = true;
            }
            self.patch(Some(prev), &c2[new_index], container, None);
            patched += 1;
        }

        let stable = if moved {
            longest_increasing_subsequence(&new_to_old)
        } else {
            Vec::new()
        };
        debug!(
            matched = patched,
            middle = to_be_patched,
            stable = stable.len(),
            moved,
            "keyed middle"
        );

        let mut stable = stable.iter().rev().peekable();
        for offset in (0..to_be_patched).rev() {
            let index = s2 + offset;
            let anchor = self.anchor_after(c2, index + 1, parent_anchor);

            if new_to_old[offset] == 0 {
                self.mount(&c2[index], container, anchor.as_ref());
            } else if moved {
                if stable.peek() == Some(&&offset) {
                    stable.next();
                } else {
                    self.move_node(&c2[index], container, anchor.as_ref());
                }
            }
        }
    }

    /// Host node of `children[index]`, or the parent anchor past the end.
    fn anchor_after(
        &self,
        children: &[VNode<H::Node>],
        index: usize,
        parent_anchor: Option<&H::Node>,
    ) -> Option<H::Node> {
        match children.get(index) {
            Some(child) => child.el(),
            None => parent_anchor.cloned(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
