//! An in-memory [`Target`] that records what was done to it.
//!
//! ```
//! use sapling_dom::{memory::MemoryTarget, Element, Renderer};
//!
//! let mut renderer = Renderer::new(MemoryTarget::new());
//! let root = renderer.target_mut().create_root();
//! renderer.render_tree(Element::tag("p").child("Hello!").build(), &root).unwrap();
//! assert_eq!(renderer.target().to_html(&root), "<p>Hello!</p>");
//! ```

use crate::{logging::content, node::Value, target::Target};
use core::fmt::Write as _;
use hashbrown::HashMap;
use std::any::Any;
use tracing::{error, trace_span};

/// Handle of a [`MemoryTarget`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryHandle(usize);

/// Counts of target-tree operations since the last [`MemoryTarget::reset_mutations`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mutations {
	pub created: usize,
	pub inserted: usize,
	pub removed: usize,
	pub text_updates: usize,
	pub properties: usize,
}
impl Mutations {
	#[must_use]
	pub fn total(&self) -> usize {
		self.created + self.inserted + self.removed + self.text_updates + self.properties
	}
}

enum Kind {
	Element { tag: String, attributes: HashMap<String, Value> },
	Text(String),
}

struct MemoryNode {
	kind: Kind,
	parent: Option<usize>,
	children: Vec<usize>,
}

#[derive(Default)]
pub struct MemoryTarget {
	nodes: Vec<MemoryNode>,
	mutations: Mutations,
}
impl MemoryTarget {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// A detached container element. Not counted as a mutation.
	pub fn create_root(&mut self) -> MemoryHandle {
		self.push(Kind::Element {
			tag: "root".to_owned(),
			attributes: HashMap::new(),
		})
	}

	#[must_use]
	pub fn mutations(&self) -> Mutations {
		self.mutations
	}

	pub fn reset_mutations(&mut self) {
		self.mutations = Mutations::default();
	}

	/// The current value of a property, attribute or listener.
	#[must_use]
	pub fn property(&self, node: &MemoryHandle, name: &str) -> Option<&Value> {
		match &self.nodes.get(node.0)?.kind {
			Kind::Element { attributes, .. } => attributes.get(name),
			Kind::Text(_) => None,
		}
	}

	/// Calls the `on{event}` handler of `node`, if any. Returns whether there was one.
	pub fn dispatch(&self, node: &MemoryHandle, event: &str, payload: &dyn Any) -> bool {
		let handler = self
			.property(node, &format!("on{}", event))
			.and_then(Value::as_handler)
			.cloned();
		match handler {
			Some(handler) => {
				handler(payload);
				true
			}
			None => false,
		}
	}

	/// Serializes the children of `container`, with attributes sorted by name. Listeners are omitted.
	#[must_use]
	pub fn to_html(&self, container: &MemoryHandle) -> String {
		let mut html = String::new();
		if let Some(node) = self.nodes.get(container.0) {
			for &child in &node.children {
				self.write_html(child, &mut html);
			}
		}
		html
	}

	fn write_html(&self, index: usize, html: &mut String) {
		let node = &self.nodes[index];
		match &node.kind {
			Kind::Text(text) => html.push_str(&escape(text)),
			Kind::Element { tag, attributes } => {
				let mut attributes: Vec<_> = attributes
					.iter()
					.filter_map(|(name, value)| value.to_attribute(name).map(|value| (name, value)))
					.collect();
				attributes.sort();
				html.push('<');
				html.push_str(tag);
				for (name, value) in attributes {
					let _ = write!(html, " {}=\"{}\"", name, escape(&value));
				}
				html.push('>');
				for &child in &node.children {
					self.write_html(child, html);
				}
				let _ = write!(html, "</{}>", tag);
			}
		}
	}

	fn push(&mut self, kind: Kind) -> MemoryHandle {
		self.nodes.push(MemoryNode {
			kind,
			parent: None,
			children: Vec::new(),
		});
		MemoryHandle(self.nodes.len() - 1)
	}

	fn detach(&mut self, index: usize) -> bool {
		if let Some(parent) = self.nodes[index].parent.take() {
			self.nodes[parent].children.retain(|&child| child != index);
			true
		} else {
			false
		}
	}
}

fn escape(text: &str) -> String {
	text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

impl Target for MemoryTarget {
	type Handle = MemoryHandle;

	fn create_element(&mut self, tag: &str) -> Self::Handle {
		self.mutations.created += 1;
		self.push(Kind::Element {
			tag: tag.to_owned(),
			attributes: HashMap::new(),
		})
	}

	fn create_text(&mut self, text: &str) -> Self::Handle {
		self.mutations.created += 1;
		self.push(Kind::Text(text.to_owned()))
	}

	fn set_text(&mut self, node: &Self::Handle, text: &str) {
		match self.nodes.get_mut(node.0).map(|node| &mut node.kind) {
			Some(Kind::Text(data)) => {
				self.mutations.text_updates += 1;
				*data = text.to_owned();
			}
			_ => error!(?node, text = content(text), "Tried to set text of a non-text node."),
		}
	}

	fn text(&self, node: &Self::Handle) -> Option<String> {
		match &self.nodes.get(node.0)?.kind {
			Kind::Text(text) => Some(text.clone()),
			Kind::Element { .. } => None,
		}
	}

	fn tag_name(&self, node: &Self::Handle) -> Option<String> {
		match &self.nodes.get(node.0)?.kind {
			Kind::Element { tag, .. } => Some(tag.clone()),
			Kind::Text(_) => None,
		}
	}

	fn insert_before(&mut self, parent: &Self::Handle, child: &Self::Handle, before: Option<&Self::Handle>) {
		let _span = trace_span!("Inserting node", ?parent, ?child, ?before).entered();
		if child == parent || before == Some(child) {
			error!("Tried to insert a node relative to itself.");
			return;
		}
		self.mutations.inserted += 1;
		self.detach(child.0);
		let siblings = &self.nodes[parent.0].children;
		let position = match before {
			Some(before) => siblings.iter().position(|&sibling| sibling == before.0).unwrap_or_else(|| {
				error!("Reference node is not a child of the parent. Appending instead.");
				siblings.len()
			}),
			None => siblings.len(),
		};
		self.nodes[parent.0].children.insert(position, child.0);
		self.nodes[child.0].parent = Some(parent.0);
	}

	fn remove(&mut self, node: &Self::Handle) {
		if self.detach(node.0) {
			self.mutations.removed += 1;
		}
	}

	fn parent(&self, node: &Self::Handle) -> Option<Self::Handle> {
		self.nodes.get(node.0)?.parent.map(MemoryHandle)
	}

	fn next_sibling(&self, node: &Self::Handle) -> Option<Self::Handle> {
		let parent = self.nodes.get(node.0)?.parent?;
		let siblings = &self.nodes[parent].children;
		let position = siblings.iter().position(|&sibling| sibling == node.0)?;
		siblings.get(position + 1).copied().map(MemoryHandle)
	}

	fn first_child(&self, node: &Self::Handle) -> Option<Self::Handle> {
		self.nodes.get(node.0)?.children.first().copied().map(MemoryHandle)
	}

	fn child_nodes(&self, node: &Self::Handle) -> Vec<Self::Handle> {
		self.nodes
			.get(node.0)
			.map(|node| node.children.iter().copied().map(MemoryHandle).collect())
			.unwrap_or_default()
	}

	fn apply_property(&mut self, node: &Self::Handle, name: &str, value: Option<&Value>, _old: Option<&Value>) {
		if let Some(Kind::Element { attributes, .. }) = self.nodes.get_mut(node.0).map(|node| &mut node.kind) {
			self.mutations.properties += 1;
			match value {
				None | Some(Value::Null) => {
					attributes.remove(name);
				}
				Some(value) => {
					attributes.insert(name.to_owned(), value.clone());
				}
			}
		} else {
			error!(?node, name, "Tried to apply a property to a non-element node.");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn insertion_moves_and_serializes() {
		let mut target = MemoryTarget::new();
		let root = target.create_root();
		let a = target.create_element("a");
		let b = target.create_text("b & c");
		target.insert_before(&root, &a, None);
		target.insert_before(&root, &b, Some(&a));
		target.apply_property(&a, "href", Some(&Value::from("x")), None);
		assert_eq!(target.to_html(&root), "b &amp; c<a href=\"x\"></a>");
		assert_eq!(target.next_sibling(&b), Some(a));

		target.insert_before(&root, &b, None);
		assert_eq!(target.child_nodes(&root), vec![a, b]);
		target.remove(&a);
		target.remove(&a);
		assert_eq!(
			target.mutations(),
			Mutations {
				created: 2,
				inserted: 3,
				removed: 1,
				text_updates: 0,
				properties: 1,
			}
		);
	}
}
