//! Application root.
//!
//! An [`App`] ties the two halves of the crate together: a root render
//! function that reads observable state, and a [`Renderer`] that patches the
//! host. Mounting registers one render effect. Every tracked read made while
//! building the tree (including reads inside component render functions) makes
//! that effect a subscriber, so a later write re-renders and re-diffs.
//!
//! ```rust,ignore
//! let state = reactive(&Target::record([("count", 0.into())]));
//! let app = create_app(MemoryHost::new(), {
//!     let state = state.clone();
//!     move || h("p").text(format!("{}", state.get("count").unwrap().into_value()))
//! });
//! let root = app.with_host_mut(|host| host.create_root("root"));
//! app.mount(root);
//!
//! state.set("count", 1)?; // <p>1</p>
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::host::HostAdapter;
use super::renderer::Renderer;
use super::vnode::VNode;
use crate::reactive::{effect_with, Effect, EffectOptions};

type RootRender<N> = Rc<dyn Fn() -> VNode<N>>;

/// A mounted (or mountable) application.
pub struct App<H: HostAdapter + 'static> {
    renderer: Rc<RefCell<Renderer<H>>>,
    render: RootRender<H::Node>,
    container: RefCell<Option<H::Node>>,
    effect: RefCell<Option<Effect>>,
}

/// Create an app that renders `render` through `host`.
pub fn create_app<H, F>(host: H, render: F) -> App<H>
where
    H: HostAdapter + 'static,
    F: Fn() -> VNode<H::Node> + 'static,
{
    App {
        renderer: Rc::new(RefCell::new(Renderer::new(host))),
        render: Rc::new(render),
        container: RefCell::new(None),
        effect: RefCell::new(None),
    }
}

impl<H: HostAdapter + 'static> App<H> {
    /// Render into `container` and keep it up to date.
    ///
    /// Mounting an app that is already mounted unmounts it first.
    pub fn mount(&self, container: H::Node) {
        self.unmount();
        debug!(?container, "mount app");

        let renderer = Rc::clone(&self.renderer);
        let render = Rc::clone(&self.render);
        let target = container.clone();
        let effect = effect_with(
            move || {
                let tree = render();
                renderer.borrow_mut().render(Some(tree), &target);
            },
            EffectOptions::new().label("render"),
        );

        *self.container.borrow_mut() = Some(container);
        *self.effect.borrow_mut() = Some(effect);
    }

    /// Stop reacting and remove the rendered tree.
    pub fn unmount(&self) {
        if let Some(effect) = self.effect.borrow_mut().take() {
            effect.stop();
        }
        if let Some(container) = self.container.borrow_mut().take() {
            debug!(?container, "unmount app");
            self.renderer.borrow_mut().render(None, &container);
        }
    }

    /// Whether the app is currently mounted.
    pub fn is_mounted(&self) -> bool {
        self.effect.borrow().is_some()
    }

    /// The container the app is mounted into.
    pub fn container(&self) -> Option<H::Node> {
        self.container.borrow().clone()
    }

    /// The render effect, while mounted.
    pub fn effect(&self) -> Option<Effect> {
        self.effect.borrow().clone()
    }

    /// Inspect the host.
    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(self.renderer.borrow().host())
    }

    /// Mutate the host, e.g. to create a container or clear its log.
    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(self.renderer.borrow_mut().host_mut())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{computed, reactive, Ref, Target, Value};
    use crate::render::memory::MemoryHost;
    use crate::render::vnode::{component, h, ComponentDef, Props};

    #[test]
    fn mount_renders_once() {
        let count = Ref::new(0);
        let reader = count.clone();
        let app = create_app(MemoryHost::new(), move || h("p").text(reader.get().to_string()));
        let root = app.with_host_mut(|host| host.create_root("root"));

        app.mount(root);

        assert!(app.is_mounted());
        assert_eq!(app.with_host(|host| host.inner_html(root)), "<p>0</p>");
        assert_eq!(app.effect().map(|effect| effect.run_count()), Some(1));
    }

    #[test]
    fn write_rerenders_and_patches() {
        let count = Ref::new(0);
        let reader = count.clone();
        let app = create_app(MemoryHost::new(), move || h("p").text(reader.get().to_string()));
        let root = app.with_host_mut(|host| host.create_root("root"));
        app.mount(root);
        app.with_host_mut(MemoryHost::clear_ops);

        count.set(5);

        assert_eq!(app.with_host(|host| host.inner_html(root)), "<p>5</p>");
        assert_eq!(app.with_host(|host| host.ops().len()), 1);
    }

    #[test]
    fn keyed_list_follows_sequence_writes() {
        let items = reactive(&Target::sequence([1, 2, 3]));
        let source = items.clone();
        let app = create_app(MemoryHost::new(), move || {
            let len = source.len().unwrap_or(0);
            h("ul").children((0..len).map(|i| {
                let value = source.get(i).map(|slot| slot.into_value()).unwrap_or_default();
                let key = value.as_f64().map_or(0, |n| n as i64);
                h("li").key(key).text(value.to_string())
            }))
        });
        let root = app.with_host_mut(|host| host.create_root("root"));
        app.mount(root);

        items.push(4).unwrap();
        assert_eq!(
            app.with_host(|host| host.inner_html(root)),
            "<ul><li>1</li><li>2</li><li>3</li><li>4</li></ul>"
        );

        app.with_host_mut(MemoryHost::clear_ops);
        items.set(0, 9).unwrap();
        assert_eq!(
            app.with_host(|host| host.inner_html(root)),
            "<ul><li>9</li><li>2</li><li>3</li><li>4</li></ul>"
        );
        let counts = app.with_host(MemoryHost::op_counts);
        assert_eq!(counts.removed, 1);
        assert_eq!(counts.inserted, 1);
        assert_eq!(counts.moved, 0);
    }

    #[test]
    fn component_reads_are_tracked_by_the_root() {
        let label = Ref::new(Value::from("draft"));
        let reader = label.clone();
        let status: Rc<ComponentDef<_>> = Rc::new(ComponentDef::new("Status", move |_: &Props| {
            h("span").text(reader.get().to_string())
        }));
        let def = status.clone();
        let app = create_app(MemoryHost::new(), move || {
            h("div").children([component(&def, Props::new())])
        });
        let root = app.with_host_mut(|host| host.create_root("root"));
        app.mount(root);

        label.set(Value::from("published"));
        assert_eq!(
            app.with_host(|host| host.inner_html(root)),
            "<div><span>published</span></div>"
        );
    }

    #[test]
    fn computed_feeds_the_tree() {
        let first = Ref::new(String::from("Ada"));
        let last = Ref::new(String::from("Lovelace"));
        let (f, l) = (first.clone(), last.clone());
        let full = computed(move || format!("{} {}", f.get(), l.get()));
        let name = full.clone();
        let app = create_app(MemoryHost::new(), move || h("h1").text(name.get()));
        let root = app.with_host_mut(|host| host.create_root("root"));
        app.mount(root);

        last.set(String::from("King"));
        assert_eq!(app.with_host(|host| host.inner_html(root)), "<h1>Ada King</h1>");
    }

    #[test]
    fn unmount_stops_reacting() {
        let count = Ref::new(0);
        let reader = count.clone();
        let app = create_app(MemoryHost::new(), move || h("p").text(reader.get().to_string()));
        let root = app.with_host_mut(|host| host.create_root("root"));
        app.mount(root);

        app.unmount();
        assert!(!app.is_mounted());
        assert_eq!(app.with_host(|host| host.inner_html(root)), "");

        app.with_host_mut(MemoryHost::clear_ops);
        count.set(1);
        assert!(app.with_host(|host| host.ops().is_empty()));
        assert_eq!(count.subscriber_count(), 0);
    }
}
