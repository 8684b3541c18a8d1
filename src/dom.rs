//! [`Target`] implementation for the browser DOM.
//!
//! # Properties
//!
//! Names starting with `on` bind [`Handler`] values as event listeners. The rest of the name is lowercased to get
//! the event type, so `onClick` listens for `click`. A `Capture` suffix binds for the capture phase instead.
//!
//! Other names are assigned as JavaScript properties if the element has a property of that name,
//! except for a few that only work as attributes (`width`, `href`, `role`…). Everything else becomes an attribute,
//! serialized through [`Value::to_attribute`].
//!
//! # Listeners
//!
//! Each [`Handler`] is wrapped into a single JavaScript function that is shared by all elements it is bound to.
//! Functions are reference-counted and freed once no element uses them anymore.

use crate::{
	logging::content,
	node::{Handler, Props, Value},
	rc_hash_map::RcHashMap,
	render::Renderer,
	scheduler::Debounce,
	target::Target,
};
use js_sys::{Function, Promise, Reflect};
use std::{
	cell::RefCell,
	rc::{Rc, Weak},
};
use tracing::{debug, error, instrument, trace, trace_span, warn};
use wasm_bindgen::{closure::Closure, throw_val, JsCast, JsValue};
use web_sys::{AddEventListenerOptions, CharacterData, Document, Element, Event, Node, Text};

/// These are properties on most elements, but only behave correctly as attributes.
const ATTRIBUTE_ONLY: &[&str] = &["width", "height", "href", "list", "form", "tabIndex", "download", "rowSpan", "colSpan", "role"];

#[derive(Debug)]
pub struct DomTarget {
	document: Document,
	listeners: RcHashMap<usize, u16, Closure<dyn Fn(Event)>>,
	listener_options_cache: [Option<AddEventListenerOptions>; 2],
}
impl DomTarget {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self {
			document,
			listeners: RcHashMap::new(),
			listener_options_cache: [None, None],
		}
	}

	/// A target for the current window's document, if there is one.
	#[must_use]
	pub fn from_window() -> Option<Self> {
		Some(Self::new(web_sys::window()?.document()?))
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	/// How many distinct handlers are currently bound, including ones waiting to be freed.
	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.listeners.len()
	}

	fn listener_options(&mut self, capture: bool) -> &AddEventListenerOptions {
		self.listener_options_cache[usize::from(capture)].get_or_insert_with(|| {
			let mut options = AddEventListenerOptions::new();
			options.capture(capture);
			options
		})
	}

	#[instrument(skip(self, handler))]
	fn add_listener(&mut self, element: &Element, event: &str, capture: bool, handler: &Handler) {
		let listener = self.listeners.increment_or_insert_with(handler_key(handler), |_| {
			let handler = handler.clone();
			Closure::wrap(Box::new(move |event: Event| {
				let span = trace_span!("Dispatching event", event = %event.type_());
				let _enter = span.enter();
				handler(&event);
			}) as Box<dyn Fn(Event)>)
		});
		let function: Function = match listener {
			Ok(listener) => listener.as_ref().unchecked_ref::<Function>().clone(),
			Err(error) => return error!("Failed to share event listener: {}", error),
		};
		if let Err(error) = element.add_event_listener_with_callback_and_add_event_listener_options(event, &function, self.listener_options(capture)) {
			error!("Failed to add event listener {:?}: {:?}", event, error);
		}
	}

	#[instrument(skip(self, handler))]
	fn remove_listener(&mut self, element: &Element, event: &str, capture: bool, handler: &Handler) {
		let listener = match self.listeners.weak_decrement(&handler_key(handler)) {
			Ok(Some(listener)) => listener,
			Ok(None) => return warn!("Tried to remove unknown event listener {:?}.", event),
			Err(error) => return error!("Failed to release event listener {:?}: {}", event, error),
		};
		if let Err(error) = element.remove_event_listener_with_callback_and_bool(event, listener.as_ref().unchecked_ref(), capture) {
			error!("Failed to remove event listener {:?}: {:?}", event, error);
		}
	}

	/// Returns whether `name` was handled as a JavaScript property.
	fn set_property(element: &Element, name: &str, value: Option<&Value>) -> bool {
		if ATTRIBUTE_ONLY.contains(&name) || !Reflect::has(element, &JsValue::from_str(name)).unwrap_or(false) {
			return false;
		}
		#[allow(clippy::cast_precision_loss)]
		let js_value = match value {
			None | Some(Value::Null) => JsValue::from_str(""),
			Some(Value::Bool(b)) => JsValue::from_bool(*b),
			Some(Value::Int(i)) => JsValue::from_f64(*i as f64),
			Some(Value::Float(f)) => JsValue::from_f64(*f),
			Some(Value::Str(s)) => JsValue::from_str(s),
			Some(Value::Handler(_) | Value::Child(_)) => return false,
		};
		match Reflect::set(element, &JsValue::from_str(name), &js_value) {
			Ok(set) => set,
			Err(error) => {
				trace!("Property assignment of {:?} failed, falling back to attribute: {:?}", name, error);
				false
			}
		}
	}
}

/// Splits `onClickCapture` into `("click", true)`.
fn event_binding(name: &str) -> Option<(String, bool)> {
	let event = name.strip_prefix("on")?;
	let (event, capture) = match event.strip_suffix("Capture") {
		Some(event) => (event, true),
		None => (event, false),
	};
	(!event.is_empty()).then(|| (event.to_ascii_lowercase(), capture))
}

fn handler_key(handler: &Handler) -> usize {
	Rc::as_ptr(handler).cast::<()>() as usize
}

impl Target for DomTarget {
	type Handle = Node;

	fn create_element(&mut self, tag: &str) -> Node {
		match self.document.create_element(tag) {
			Ok(element) => element.into(),
			Err(error) => {
				error!("Failed to create element {:?}: {:?}", tag, error);
				throw_val(error)
			}
		}
	}

	fn create_text(&mut self, text: &str) -> Node {
		self.document.create_text_node(text).into()
	}

	fn set_text(&mut self, node: &Node, text: &str) {
		match node.dyn_ref::<CharacterData>() {
			Some(data) => data.set_data(text),
			None => error!("Tried to set text {:?} on non-text node {:?}.", content(text), node),
		}
	}

	fn text(&self, node: &Node) -> Option<String> {
		node.dyn_ref::<Text>().map(|text| text.data())
	}

	fn tag_name(&self, node: &Node) -> Option<String> {
		node.dyn_ref::<Element>().map(Element::tag_name)
	}

	fn insert_before(&mut self, parent: &Node, child: &Node, before: Option<&Node>) {
		if let Err(error) = parent.insert_before(child, before) {
			error!("Failed to insert node: {:?}", error);
		}
	}

	fn remove(&mut self, node: &Node) {
		match node.parent_node() {
			Some(parent) => {
				if let Err(error) = parent.remove_child(node) {
					error!("Failed to remove the node: {:?}", error);
				}
			}
			None => trace!("Node to remove is detached already."),
		}
	}

	fn parent(&self, node: &Node) -> Option<Node> {
		node.parent_node()
	}

	fn next_sibling(&self, node: &Node) -> Option<Node> {
		node.next_sibling()
	}

	fn first_child(&self, node: &Node) -> Option<Node> {
		node.first_child()
	}

	fn child_nodes(&self, node: &Node) -> Vec<Node> {
		let child_nodes = node.child_nodes();
		(0..child_nodes.length()).filter_map(|i| child_nodes.item(i)).collect()
	}

	fn apply_property(&mut self, node: &Node, name: &str, value: Option<&Value>, old: Option<&Value>) {
		let span = trace_span!("Applying property", name, value = ?value);
		let _enter = span.enter();

		let element = match node.dyn_ref::<Element>() {
			Some(element) => element,
			None => return error!("Tried to set property {:?} on non-element node {:?}.", name, node),
		};

		if let Some((event, capture)) = event_binding(name) {
			if let Some(old) = old.and_then(Value::as_handler) {
				self.remove_listener(element, &event, capture, old);
			}
			match value {
				Some(Value::Handler(handler)) => self.add_listener(element, &event, capture, handler),
				None | Some(Value::Null) => (),
				Some(other) => warn!("Expected a handler for {:?}, found {:?}.", name, other),
			}
			return;
		}

		if Self::set_property(element, name, value) {
			return;
		}
		let result = match value.and_then(|value| value.to_attribute(name)) {
			Some(attribute) => element.set_attribute(name, &attribute),
			None => element.remove_attribute(name),
		};
		if let Err(error) = result {
			error!("Failed to update attribute {:?}: {:?}", name, error);
		}
	}

	fn release(&mut self, node: &Node, props: &Props) {
		let element = match node.dyn_ref::<Element>() {
			Some(element) => element,
			None => return,
		};
		for (name, value) in props.iter() {
			if let (Some((event, capture)), Some(handler)) = (event_binding(name), value.as_handler()) {
				self.remove_listener(element, &event, capture, handler);
			}
		}
	}

	fn flushed(&mut self) {
		let freed = self.listeners.drain_weak().count();
		trace!("Freed {} event listener(s).", freed);
		debug!("Event listener count/cached capacity: {}/{}", self.listeners.len(), self.listeners.capacity());
	}
}

/// A [`Debounce`] that flushes `renderer` in a microtask.
///
/// If the renderer is borrowed when the microtask runs, the flush is postponed to another microtask.
/// Once the renderer is dropped, requests are ignored.
#[must_use]
pub fn microtask_debounce(renderer: Weak<RefCell<Renderer<DomTarget>>>) -> Debounce {
	Rc::new(move || schedule_flush(renderer.clone()))
}

fn schedule_flush(renderer: Weak<RefCell<Renderer<DomTarget>>>) {
	let callback = Closure::once(move |_: JsValue| {
		let renderer = match renderer.upgrade() {
			Some(renderer) => renderer,
			None => return trace!("Renderer dropped before flush."),
		};
		let flushed = match renderer.try_borrow_mut() {
			Ok(mut renderer) => renderer.flush(),
			Err(_) => {
				debug!("Renderer busy. Postponing flush.");
				return schedule_flush(Rc::downgrade(&renderer));
			}
		};
		if let Err(error) = flushed {
			error!("Unhandled render failure during scheduled flush: {}", error);
		}
	});
	let _ = Promise::resolve(&JsValue::UNDEFINED).then(&callback);
	callback.forget();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn event_names() {
		assert_eq!(event_binding("onClick"), Some(("click".to_owned(), false)));
		assert_eq!(event_binding("onPointerDownCapture"), Some(("pointerdown".to_owned(), true)));
		assert_eq!(event_binding("on"), None);
		assert_eq!(event_binding("id"), None);
	}
}
