//! Descriptions of the desired tree.
//!
//! An [`Element`] is immutable once built and shared via [`Rc`], so the same description can be
//! rendered any number of times. Mounted bookkeeping (parent links, matched target nodes, depth)
//! lives in the renderer's arena, never in the description itself.

use crate::{component::ComponentType, instance::ComponentHandle};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::{any::Any, borrow::Cow, cell::RefCell, rc::Rc};

/// Identity of an element among its siblings, compared together with its [`NodeType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	Int(i64),
	Str(Rc<str>),
}
impl From<i64> for Key {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}
impl From<i32> for Key {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}
impl From<&str> for Key {
	fn from(value: &str) -> Self {
		Self::Str(value.into())
	}
}
impl From<String> for Key {
	fn from(value: String) -> Self {
		Self::Str(value.into())
	}
}

/// An event handler. The payload is whatever the [`Target`](`crate::Target`) dispatches,
/// e.g. a [`web_sys::Event`] for [`DomTarget`](`crate::dom::DomTarget`).
pub type Handler = Rc<dyn Fn(&dyn Any)>;

/// A property, attribute, listener or state value.
#[derive(Clone)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	Handler(Handler),
	Child(Child),
}
impl Value {
	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_int(&self) -> Option<i64> {
		match *self {
			Value::Int(i) => Some(i),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Value::Bool(b) => Some(b),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_handler(&self) -> Option<&Handler> {
		match self {
			Value::Handler(handler) => Some(handler),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_child(&self) -> Option<&Child> {
		match self {
			Value::Child(child) => Some(child),
			_ => None,
		}
	}

	/// The serialized attribute form, or [`None`] if the attribute should be absent.
	///
	/// Handlers and children are never serialized. `false` removes the attribute unless the name contains a dash
	/// at index 4 (`aria-*`, `data-*`), which have no boolean representation.
	#[must_use]
	pub fn to_attribute(&self, name: &str) -> Option<String> {
		match self {
			Value::Null | Value::Handler(_) | Value::Child(_) => None,
			Value::Bool(false) if name.as_bytes().get(4) != Some(&b'-') => None,
			Value::Bool(b) => Some(b.to_string()),
			Value::Int(i) => Some(i.to_string()),
			Value::Float(f) => Some(f.to_string()),
			Value::Str(s) => Some(s.to_string()),
		}
	}
}
impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			#[allow(clippy::float_cmp)]
			(Value::Float(a), Value::Float(b)) => a == b,
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::Handler(a), Value::Handler(b)) => Rc::ptr_eq(a, b),
			(Value::Child(a), Value::Child(b)) => a.same(b),
			_ => false,
		}
	}
}
impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Bool(b) => write!(f, "Bool({})", b),
			Value::Int(i) => write!(f, "Int({})", i),
			Value::Float(x) => write!(f, "Float({})", x),
			Value::Str(s) => write!(f, "Str({:?})", crate::logging::content(s)),
			Value::Handler(handler) => write!(f, "Handler({:p})", Rc::as_ptr(handler)),
			Value::Child(child) => write!(f, "Child({:?})", child),
		}
	}
}
impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}
impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}
impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}
impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}
impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Str(value.into())
	}
}
impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Str(value.into())
	}
}
impl From<Handler> for Value {
	fn from(value: Handler) -> Self {
		Self::Handler(value)
	}
}
impl From<Child> for Value {
	fn from(value: Child) -> Self {
		Self::Child(value)
	}
}
impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Null, Into::into)
	}
}

/// An unordered name → [`Value`] mapping.
#[derive(Clone, Default, PartialEq)]
pub struct Props(HashMap<Cow<'static, str>, Value>);

/// Component state uses the same shallow-mergeable shape as [`Props`].
pub type State = Props;

impl Props {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
		self.set(name, value);
		self
	}

	pub fn set(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Option<Value> {
		self.0.insert(name.into(), value.into())
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	pub fn remove(&mut self, name: &str) -> Option<Value> {
		self.0.remove(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.0.iter().map(|(name, value)| (&**name, value))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Shallowly merges `other` into `self`, overwriting existing entries.
	pub fn merge(&mut self, other: Props) {
		self.0.extend(other.0);
	}

	/// Whether any entry was added, removed or changed (by [`Value`] equality, which compares handlers by identity).
	#[must_use]
	pub fn shallow_differs(&self, other: &Props) -> bool {
		self.0.len() != other.0.len() || self.0.iter().any(|(name, value)| other.0.get(name) != Some(value))
	}
}
impl Debug for Props {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.0.iter()).finish()
	}
}

/// What a [`Ref`] points at once attached.
#[derive(Clone)]
pub enum RefValue {
	/// The target node, boxed as `Rc<Target::Handle>`.
	Target(Rc<dyn Any>),
	Component(ComponentHandle),
}
impl RefValue {
	/// Downcasts [`RefValue::Target`] to the target's handle type.
	#[must_use]
	pub fn target<H: Clone + 'static>(&self) -> Option<H> {
		match self {
			RefValue::Target(handle) => handle.downcast_ref::<H>().cloned(),
			RefValue::Component(_) => None,
		}
	}

	#[must_use]
	pub fn component(&self) -> Option<&ComponentHandle> {
		match self {
			RefValue::Target(_) => None,
			RefValue::Component(handle) => Some(handle),
		}
	}

	fn same(&self, other: &RefValue) -> bool {
		match (self, other) {
			(RefValue::Target(a), RefValue::Target(b)) => Rc::ptr_eq(a, b),
			(RefValue::Component(a), RefValue::Component(b)) => a == b,
			_ => false,
		}
	}
}
impl Debug for RefValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			RefValue::Target(handle) => write!(f, "Target({:p})", Rc::as_ptr(handle)),
			RefValue::Component(handle) => write!(f, "Component({:?})", handle),
		}
	}
}

/// A back-reference slot that receives the mounted target node or component.
#[derive(Clone)]
pub enum Ref {
	Object(Rc<RefCell<Option<RefValue>>>),
	Callback(Rc<dyn Fn(Option<RefValue>)>),
}
impl Ref {
	#[must_use]
	pub fn object() -> Self {
		Self::Object(Rc::default())
	}

	pub fn callback(callback: impl Fn(Option<RefValue>) + 'static) -> Self {
		Self::Callback(Rc::new(callback))
	}

	/// The current value of an object ref. Always [`None`] for callback refs.
	#[must_use]
	pub fn current(&self) -> Option<RefValue> {
		match self {
			Ref::Object(cell) => cell.borrow().clone(),
			Ref::Callback(_) => None,
		}
	}

	#[must_use]
	pub fn same(&self, other: &Ref) -> bool {
		match (self, other) {
			(Ref::Object(a), Ref::Object(b)) => Rc::ptr_eq(a, b),
			(Ref::Callback(a), Ref::Callback(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	pub(crate) fn apply(&self, value: Option<RefValue>) {
		match self {
			Ref::Object(cell) => *cell.borrow_mut() = value,
			Ref::Callback(callback) => callback(value),
		}
	}

	/// Detaches the ref on unmount, unless it has since been pointed elsewhere.
	pub(crate) fn detach(&self, value: &RefValue) {
		match self {
			Ref::Object(cell) => {
				let mut cell = cell.borrow_mut();
				if cell.as_ref().map_or(true, |current| current.same(value)) {
					*cell = None;
				}
			}
			Ref::Callback(callback) => callback(None),
		}
	}
}
impl Debug for Ref {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Ref::Object(cell) => write!(f, "Ref::Object({:p})", Rc::as_ptr(cell)),
			Ref::Callback(callback) => write!(f, "Ref::Callback({:p})", Rc::as_ptr(callback)),
		}
	}
}

#[derive(Clone)]
pub(crate) enum ElementType {
	Tag(Cow<'static, str>),
	Component(ComponentType),
}

/// A tag or component description with its properties and children.
#[derive(Clone)]
pub struct Element {
	pub(crate) ty: ElementType,
	pub(crate) key: Option<Key>,
	pub(crate) node_ref: Option<Ref>,
	pub(crate) props: Props,
	pub(crate) children: Vec<Child>,
}
impl Element {
	pub fn tag(name: impl Into<Cow<'static, str>>) -> ElementBuilder {
		ElementBuilder(Element {
			ty: ElementType::Tag(name.into()),
			key: None,
			node_ref: None,
			props: Props::new(),
			children: Vec::new(),
		})
	}

	#[must_use]
	pub fn component(ty: &ComponentType) -> ElementBuilder {
		ElementBuilder(Element {
			ty: ElementType::Component(ty.clone()),
			key: None,
			node_ref: None,
			props: Props::new(),
			children: Vec::new(),
		})
	}

	#[must_use]
	pub fn node_type(&self) -> NodeType<'_> {
		match &self.ty {
			ElementType::Tag(name) => NodeType::Tag(name),
			ElementType::Component(ty) => NodeType::Component(ty),
		}
	}

	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		self.key.as_ref()
	}

	#[must_use]
	pub fn node_ref(&self) -> Option<&Ref> {
		self.node_ref.as_ref()
	}

	#[must_use]
	pub fn props(&self) -> &Props {
		&self.props
	}

	#[must_use]
	pub fn children(&self) -> &[Child] {
		&self.children
	}
}
impl Debug for Element {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Element")
			.field("type", &self.node_type())
			.field("key", &self.key)
			.field("props", &self.props)
			.field("children", &self.children)
			.finish()
	}
}

/// Builds an [`Element`]. Converts into a [`Child`].
#[must_use]
pub struct ElementBuilder(Element);
impl ElementBuilder {
	pub fn key(mut self, key: impl Into<Key>) -> Self {
		self.0.key = Some(key.into());
		self
	}

	pub fn node_ref(mut self, node_ref: Ref) -> Self {
		self.0.node_ref = Some(node_ref);
		self
	}

	pub fn prop(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
		self.0.props.set(name, value);
		self
	}

	pub fn props(mut self, props: Props) -> Self {
		self.0.props.merge(props);
		self
	}

	pub fn child(mut self, child: impl Into<Child>) -> Self {
		self.0.children.push(child.into());
		self
	}

	pub fn children(mut self, children: impl IntoIterator<Item = Child>) -> Self {
		self.0.children.extend(children);
		self
	}

	pub fn build(self) -> Child {
		Child::Element(self.finish())
	}

	pub(crate) fn finish(self) -> Rc<Element> {
		Rc::new(self.0)
	}
}
impl From<ElementBuilder> for Child {
	fn from(builder: ElementBuilder) -> Self {
		builder.build()
	}
}

/// A renderable value before normalization.
#[derive(Clone)]
pub enum Child {
	/// `null`/boolean: an absent slot that keeps its position.
	Empty,
	Text(Rc<str>),
	Element(Rc<Element>),
	List(Vec<Child>),
}
impl Child {
	/// Identity comparison: elements by pointer, text by content.
	#[must_use]
	pub fn same(&self, other: &Child) -> bool {
		match (self, other) {
			(Child::Empty, Child::Empty) => true,
			(Child::Text(a), Child::Text(b)) => a == b,
			(Child::Element(a), Child::Element(b)) => Rc::ptr_eq(a, b),
			(Child::List(a), Child::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.same(b)),
			_ => false,
		}
	}
}
impl Default for Child {
	fn default() -> Self {
		Self::Empty
	}
}
impl Debug for Child {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Child::Empty => f.write_str("Empty"),
			Child::Text(text) => write!(f, "Text({:?})", crate::logging::content(text)),
			Child::Element(element) => element.fmt(f),
			Child::List(list) => f.debug_list().entries(list).finish(),
		}
	}
}
impl From<&str> for Child {
	fn from(text: &str) -> Self {
		Self::Text(text.into())
	}
}
impl From<String> for Child {
	fn from(text: String) -> Self {
		Self::Text(text.into())
	}
}
impl From<Rc<str>> for Child {
	fn from(text: Rc<str>) -> Self {
		Self::Text(text)
	}
}
impl From<i64> for Child {
	fn from(number: i64) -> Self {
		Self::Text(number.to_string().into())
	}
}
impl From<i32> for Child {
	fn from(number: i32) -> Self {
		Self::Text(number.to_string().into())
	}
}
impl From<f64> for Child {
	fn from(number: f64) -> Self {
		Self::Text(number.to_string().into())
	}
}
impl From<bool> for Child {
	fn from(_: bool) -> Self {
		Self::Empty
	}
}
impl From<Rc<Element>> for Child {
	fn from(element: Rc<Element>) -> Self {
		Self::Element(element)
	}
}
impl From<Vec<Child>> for Child {
	fn from(list: Vec<Child>) -> Self {
		Self::List(list)
	}
}
impl<T: Into<Child>> From<Option<T>> for Child {
	fn from(child: Option<T>) -> Self {
		child.map_or(Child::Empty, Into::into)
	}
}

/// The type of a normalized node. Text and numbers are both [`NodeType::Text`] and match each other.
#[derive(Clone, Copy)]
pub enum NodeType<'a> {
	Text,
	Tag(&'a str),
	Component(&'a ComponentType),
}
impl PartialEq for NodeType<'_> {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(NodeType::Text, NodeType::Text) => true,
			(NodeType::Tag(a), NodeType::Tag(b)) => a == b,
			(NodeType::Component(a), NodeType::Component(b)) => a == b,
			_ => false,
		}
	}
}
impl Debug for NodeType<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			NodeType::Text => f.write_str("#text"),
			NodeType::Tag(name) => write!(f, "<{}>", name),
			NodeType::Component(ty) => write!(f, "{}", ty.name()),
		}
	}
}

/// A normalized child: the tagged union over text, tags and components is decided here, once.
#[derive(Clone)]
pub enum Node {
	Text(Rc<str>),
	Element(Rc<Element>),
}
impl Node {
	#[must_use]
	pub fn node_type(&self) -> NodeType<'_> {
		match self {
			Node::Text(_) => NodeType::Text,
			Node::Element(element) => element.node_type(),
		}
	}

	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		match self {
			Node::Text(_) => None,
			Node::Element(element) => element.key(),
		}
	}

	#[must_use]
	pub fn element(&self) -> Option<&Rc<Element>> {
		match self {
			Node::Text(_) => None,
			Node::Element(element) => Some(element),
		}
	}

	/// Whether both describe the same logical element: equal keys (including both absent) and equal types.
	#[must_use]
	pub fn matches(&self, other: &Node) -> bool {
		self.key() == other.key() && self.node_type() == other.node_type()
	}

	/// A short label for logs and hooks.
	#[must_use]
	pub fn name(&self) -> &str {
		match self.node_type() {
			NodeType::Text => "#text",
			NodeType::Tag(name) => name,
			NodeType::Component(ty) => ty.name(),
		}
	}
}
impl Debug for Node {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Node::Text(text) => write!(f, "Text({:?})", crate::logging::content(text)),
			Node::Element(element) => element.fmt(f),
		}
	}
}

/// Normalizes children into positional slots.
///
/// [`Child::Empty`] becomes a [`None`] placeholder so keyed matching keeps its alignment,
/// nested lists are flattened recursively, and sibling texts stay separate slots.
#[must_use]
pub fn normalize_children(children: &[Child]) -> Vec<Option<Node>> {
	fn push(out: &mut Vec<Option<Node>>, child: &Child) {
		match child {
			Child::Empty => out.push(None),
			Child::Text(text) => out.push(Some(Node::Text(text.clone()))),
			Child::Element(element) => out.push(Some(Node::Element(element.clone()))),
			Child::List(list) => list.iter().for_each(|child| push(out, child)),
		}
	}

	let mut out = Vec::with_capacity(children.len());
	children.iter().for_each(|child| push(&mut out, child));
	out
}

/// Flattens a renderable into its nodes, dropping empty slots.
#[must_use]
pub fn to_child_array(child: &Child) -> Vec<Node> {
	normalize_children(core::slice::from_ref(child)).into_iter().flatten().collect()
}

/// Copies `element`, shallowly overriding its props and optionally replacing key, ref and children.
#[must_use]
pub fn clone_element(element: &Element, props: Props, key: Option<Key>, node_ref: Option<Ref>, children: Option<Vec<Child>>) -> Child {
	let mut clone = element.clone();
	clone.props.merge(props);
	if key.is_some() {
		clone.key = key;
	}
	if node_ref.is_some() {
		clone.node_ref = node_ref;
	}
	if let Some(children) = children {
		clone.children = children;
	}
	Child::Element(Rc::new(clone))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalization_keeps_placeholders_and_separate_texts() {
		let children = vec![
			Child::from("foo"),
			Child::from(1),
			Child::Empty,
			Child::List(vec![Child::from("a"), Child::List(vec![Child::from(false), Element::tag("b").build()])]),
		];
		let nodes = normalize_children(&children);
		assert_eq!(nodes.len(), 6);
		assert!(matches!(&nodes[0], Some(Node::Text(text)) if &**text == "foo"));
		assert!(matches!(&nodes[1], Some(Node::Text(text)) if &**text == "1"));
		assert!(nodes[2].is_none());
		assert!(matches!(&nodes[3], Some(Node::Text(text)) if &**text == "a"));
		assert!(nodes[4].is_none());
		assert!(matches!(nodes[5].as_ref().map(Node::node_type), Some(NodeType::Tag("b"))));
	}

	#[test]
	fn text_and_numbers_are_the_same_type() {
		let text = Node::Text("1".into());
		let number = to_child_array(&Child::from(2)).remove(0);
		assert!(text.matches(&number));
	}

	#[test]
	fn keys_are_compared_with_types() {
		let a = to_child_array(&Element::tag("li").key(1).build()).remove(0);
		let b = to_child_array(&Element::tag("li").key(1).build()).remove(0);
		let c = to_child_array(&Element::tag("p").key(1).build()).remove(0);
		let d = to_child_array(&Element::tag("li").build()).remove(0);
		assert!(a.matches(&b));
		assert!(!a.matches(&c));
		assert!(!a.matches(&d));
	}

	#[test]
	fn shallow_differs() {
		let handler: Handler = Rc::new(|_: &dyn Any| ());
		let a = Props::new().with("id", "x").with("onclick", Value::Handler(handler.clone()));
		let b = Props::new().with("id", "x").with("onclick", Value::Handler(handler));
		assert!(!a.shallow_differs(&b));
		assert!(a.shallow_differs(&Props::new().with("id", "x")));
		assert!(a.shallow_differs(&b.clone().with("id", "y")));
	}

	#[test]
	fn attribute_serialization() {
		assert_eq!(Value::Bool(false).to_attribute("hidden"), None);
		assert_eq!(Value::Bool(false).to_attribute("aria-hidden").as_deref(), Some("false"));
		assert_eq!(Value::Int(3).to_attribute("tabindex").as_deref(), Some("3"));
		assert_eq!(Value::Null.to_attribute("id"), None);
	}
}
