//! Reads existing DOM content back into descriptions, for example to compare server markup with what would be rendered.
//!
//! Attributes load as [`Value::Str`](`crate::Value::Str`) props. Listeners can't be read back.

use crate::node::{Child, Element as vElement, Props};
use tracing::warn;
use wasm_bindgen::JsCast;
use web_sys::{Attr, Element, NamedNodeMap, Node, NodeList, Text};

#[must_use]
pub fn load_child_nodes(child_nodes: &NodeList) -> Vec<Child> {
	(0..child_nodes.length())
		.filter_map(|i| child_nodes.item(i))
		.filter_map(|child| load_node(&child))
		.collect()
}

/// [`None`] for comments and other nodes without a description.
#[must_use]
pub fn load_node(node: &Node) -> Option<Child> {
	if let Some(element) = node.dyn_ref::<Element>() {
		Some(load_element(element))
	} else if let Some(text) = node.dyn_ref::<Text>() {
		Some(text.data().into())
	} else {
		warn!(node_type = node.node_type(), "Skipping unrecognised child node.");
		None
	}
}

#[must_use]
pub fn load_element(element: &Element) -> Child {
	let node: &Node = element.as_ref();
	vElement::tag(element.tag_name().to_ascii_lowercase())
		.props(load_attributes(&element.attributes()))
		.children(load_child_nodes(&node.child_nodes()))
		.build()
}

#[must_use]
pub fn load_attributes(attributes: &NamedNodeMap) -> Props {
	(0..attributes.length())
		.filter_map(|i| attributes.item(i))
		.fold(Props::new(), |props, attribute| {
			let (name, value) = load_attribute(&attribute);
			props.with(name, value)
		})
}

#[must_use]
pub fn load_attribute(attribute: &Attr) -> (String, String) {
	(attribute.local_name(), attribute.value())
}
