#![doc(html_root_url = "https://docs.rs/sapling-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A keyed VDOM reconciler.
//!
//! [`Renderer`] diffs [`Child`] descriptions against the tree it rendered last into a container,
//! mutating a live [`Target`] tree in place. Components are stateful, updates are batched in a
//! depth-ordered [`Scheduler`] queue, and failures propagate to the nearest error boundary.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod arena;
mod catch_error;
mod children;
mod diff;
mod instance;
mod logging;

pub mod component;
pub mod context;
pub mod dom;
pub mod error;
pub mod hooks;
pub mod load;
pub mod memory;
pub mod node;
pub mod rc_hash_map;
pub mod render;
pub mod scheduler;
pub mod suspense;
pub mod target;

pub use arena::{NodeFlags, VNodeId};
pub use component::{forward_ref, fragment, fragment_type, memo, pure, Capabilities, Component, ComponentType, Update};
pub use context::Context;
pub use error::RenderError;
pub use hooks::{HookNode, Hooks};
pub use instance::{ComponentHandle, RenderContext};
pub use node::{clone_element, to_child_array, Child, Element, ElementBuilder, Handler, Key, Node, NodeType, Props, Ref, RefValue, State, Value};
pub use render::{Renderer, RendererOptions};
pub use scheduler::{Debounce, Scheduler};
pub use suspense::{lazy, suspense, LazyResolver, PendingValue, Resolver};
pub use target::Target;
