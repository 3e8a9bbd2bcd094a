//! Ripple Core
//!
//! This crate provides the core runtime of the Ripple UI engine.
//! It implements:
//!
//! - Fine-grained reactivity (effects, observable wrappers, refs, computeds)
//! - A keyed tree reconciler with minimal moves
//! - A host adapter seam plus an in-memory host for headless rendering
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: dependency tracking, effects and observable values
//! - `render`: virtual nodes, reconciliation and the application root
//! - `error`: the error type shared by both
//!
//! Everything is single-threaded. Handles are `Rc`-based and all bookkeeping
//! lives in thread-local tables.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::reactive::{reactive, Target};
//! use ripple_core::render::{create_app, h, MemoryHost};
//!
//! // Create observable state
//! let todo = reactive(&Target::record([("title", "write docs".into())]));
//!
//! // Describe the UI as a function of that state
//! let app = create_app(MemoryHost::new(), {
//!     let todo = todo.clone();
//!     move || h("li").text(todo.get("title").unwrap().into_value().to_string())
//! });
//! let root = app.with_host_mut(|host| host.create_root("ul"));
//! app.mount(root);
//!
//! // Update the state
//! todo.set("title", "ship it")?;
//! // The render effect runs again and patches the text: <li>ship it</li>
//! ```

pub mod error;
pub mod reactive;
pub mod render;

pub use error::{Error, Result};
