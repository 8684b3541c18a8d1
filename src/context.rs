//! Values passed down the tree without threading them through props.
//!
//! ```
//! use sapling_dom::{memory::MemoryTarget, ComponentType, Context, Renderer, Value};
//!
//! let theme = Context::new("light");
//! let label = ComponentType::function("Label", {
//! 	let theme = theme.clone();
//! 	move |cx| Ok(cx.context(&theme).as_str().unwrap_or_default().to_owned().into())
//! });
//!
//! let mut renderer = Renderer::new(MemoryTarget::new());
//! let root = renderer.target_mut().create_root();
//! renderer.render_tree(theme.provide("dark", vec![label.element().build()]), &root).unwrap();
//! assert_eq!(renderer.target().to_html(&root), "dark");
//! ```

use crate::{
	component::{Capabilities, ComponentType},
	node::{Child, Element, Value},
};
use core::fmt::{self, Debug, Formatter};
use std::cell::Cell;

thread_local! {
	static NEXT_ID: Cell<u64> = Cell::new(0);
}

/// A context with its provider component type.
///
/// The provider renders its children and makes its `value` prop visible to [`RenderContext::context`](`crate::RenderContext::context`)
/// calls below it. When `value` changes, every reader re-renders even if something in between skips its update.
#[derive(Clone)]
pub struct Context {
	id: u64,
	default: Value,
	provider: ComponentType,
}
impl Context {
	pub fn new(default: impl Into<Value>) -> Self {
		let id = NEXT_ID.with(|next| {
			let id = next.get();
			next.set(id + 1);
			id
		});
		Self {
			id,
			default: default.into(),
			provider: ComponentType::function_with_capabilities(
				"Context.Provider",
				|cx| Ok(Child::List(cx.children().to_vec())),
				Capabilities {
					provides_context: Some(id),
					..Capabilities::default()
				},
			),
		}
	}

	#[must_use]
	pub fn provider(&self) -> &ComponentType {
		&self.provider
	}

	/// A provider element.
	pub fn provide(&self, value: impl Into<Value>, children: impl IntoIterator<Item = Child>) -> Child {
		Element::component(&self.provider).prop("value", value).children(children).build()
	}

	/// The value seen outside of any provider.
	#[must_use]
	pub fn default_value(&self) -> &Value {
		&self.default
	}

	pub(crate) fn id(&self) -> u64 {
		self.id
	}
}
impl Debug for Context {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context").field("id", &self.id).field("default", &self.default).finish()
	}
}
