//! The mutable tree a [`Renderer`](`crate::Renderer`) reconciles into.

use crate::node::{Props, Value};
use core::fmt::Debug;

/// A minimal ordered-tree mutation API plus property application.
///
/// Implementations should be forgiving: removing a detached node or inserting a node that is already in place
/// must not fail. Problems are logged rather than reported.
pub trait Target {
	/// A cheap, shared reference to one node of the tree.
	type Handle: Clone + PartialEq + Debug + 'static;

	fn create_element(&mut self, tag: &str) -> Self::Handle;
	fn create_text(&mut self, text: &str) -> Self::Handle;
	fn set_text(&mut self, node: &Self::Handle, text: &str);

	/// The data of a text node, [`None`] for elements.
	fn text(&self, node: &Self::Handle) -> Option<String>;
	/// The tag of an element node, [`None`] for text.
	fn tag_name(&self, node: &Self::Handle) -> Option<String>;

	/// Moves `child` into `parent`, before `before` or at the end.
	fn insert_before(&mut self, parent: &Self::Handle, child: &Self::Handle, before: Option<&Self::Handle>);
	/// Detaches `node` from its parent, if any.
	fn remove(&mut self, node: &Self::Handle);

	fn parent(&self, node: &Self::Handle) -> Option<Self::Handle>;
	fn next_sibling(&self, node: &Self::Handle) -> Option<Self::Handle>;
	fn first_child(&self, node: &Self::Handle) -> Option<Self::Handle>;

	fn child_nodes(&self, node: &Self::Handle) -> Vec<Self::Handle> {
		let mut children = Vec::new();
		let mut next = self.first_child(node);
		while let Some(child) = next {
			next = self.next_sibling(&child);
			children.push(child);
		}
		children
	}

	/// Sets, replaces or (with `value` [`None`]) removes a single property, attribute or listener.
	///
	/// Called once per changed name. `old` is the value last applied under `name`.
	fn apply_property(&mut self, node: &Self::Handle, name: &str, value: Option<&Value>, old: Option<&Value>);

	/// Called when the element `node` is unmounted, with the properties last applied to it.
	///
	/// The node itself may stay in the tree if an ancestor is removed instead.
	fn release(&mut self, _node: &Self::Handle, _props: &Props) {}

	/// Called once after each committed render pass.
	fn flushed(&mut self) {}
}
