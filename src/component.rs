//! Component capabilities.
//!
//! Variants like memoized, pure, forwarding or suspense-boundary components aren't separate
//! types: they're ordinary [`ComponentType`]s whose [`Capabilities`] the differ dispatches on.

use crate::{
	error::RenderError,
	instance::{ComponentHandle, RenderContext},
	node::{Child, Element, Props, State},
};
use core::fmt::{self, Debug, Formatter};
use std::{borrow::Cow, rc::Rc};

/// Current and upcoming props and state, as seen by update-skip checks.
pub struct Update<'a> {
	pub props: &'a Props,
	pub state: &'a State,
	pub next_props: &'a Props,
	pub next_state: &'a State,
}

/// Render logic and lifecycle of a component.
///
/// All methods but [`render`](`Component::render`) have no-op defaults.
/// Failures returned from `render` or the lifecycle methods propagate to the nearest error boundary.
pub trait Component {
	fn render(&mut self, cx: &RenderContext<'_>) -> Result<Child, RenderError>;

	/// The state before the first render.
	fn initial_state(&self, _props: &Props) -> State {
		State::new()
	}

	/// Returning `false` skips this update, unless it was forced.
	fn should_update(&self, _update: &Update<'_>) -> bool {
		true
	}

	/// Error-boundary capability: state that makes the next render show recovery content.
	fn derive_state_from_error(&self, _error: &RenderError) -> Option<State> {
		None
	}

	/// Error-boundary capability. Only counts as handling the error if it dirties this component.
	fn did_catch(&mut self, _error: &RenderError, _handle: &ComponentHandle) -> Result<(), RenderError> {
		Ok(())
	}

	fn did_mount(&mut self, _handle: &ComponentHandle) -> Result<(), RenderError> {
		Ok(())
	}

	fn did_update(&mut self, _prev_props: &Props, _prev_state: &State, _handle: &ComponentHandle) -> Result<(), RenderError> {
		Ok(())
	}

	fn will_unmount(&mut self) {}
}

pub type SkipUpdate = Rc<dyn Fn(&Update<'_>) -> bool>;

/// The optional capability set of a [`ComponentType`].
#[derive(Clone, Default)]
pub struct Capabilities {
	/// Replaces [`Component::should_update`]. Returning `true` skips the update.
	pub should_skip_update: Option<SkipUpdate>,
	/// Catches pending-value failures of descendants and shows fallback content meanwhile.
	pub child_suspend_handler: bool,
	/// Passes the element's [`Ref`](`crate::Ref`) to [`RenderContext::forwarded_ref`] instead of binding it to the instance.
	pub forwards_ref: bool,
	pub(crate) provides_context: Option<u64>,
}
impl Debug for Capabilities {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Capabilities")
			.field("should_skip_update", &self.should_skip_update.is_some())
			.field("child_suspend_handler", &self.child_suspend_handler)
			.field("forwards_ref", &self.forwards_ref)
			.field("provides_context", &self.provides_context)
			.finish()
	}
}

type Factory = Box<dyn Fn(&Props) -> Box<dyn Component>>;

struct TypeInner {
	name: Cow<'static, str>,
	factory: Factory,
	capabilities: Capabilities,
}

/// A component's identity. Two [`ComponentType`]s are equal only if they are clones of each other.
#[derive(Clone)]
pub struct ComponentType(Rc<TypeInner>);
impl ComponentType {
	/// A stateful component, instantiated once per mount via `factory`.
	pub fn new<C: Component + 'static>(name: impl Into<Cow<'static, str>>, factory: impl Fn(&Props) -> C + 'static) -> Self {
		Self::with_capabilities(name, factory, Capabilities::default())
	}

	pub fn with_capabilities<C: Component + 'static>(name: impl Into<Cow<'static, str>>, factory: impl Fn(&Props) -> C + 'static, capabilities: Capabilities) -> Self {
		let factory: Factory = Box::new(move |props: &Props| -> Box<dyn Component> { Box::new(factory(props)) });
		Self(Rc::new(TypeInner {
			name: name.into(),
			factory,
			capabilities,
		}))
	}

	/// A stateless component.
	pub fn function(name: impl Into<Cow<'static, str>>, render: impl Fn(&RenderContext<'_>) -> Result<Child, RenderError> + 'static) -> Self {
		Self::function_with_capabilities(name, render, Capabilities::default())
	}

	pub fn function_with_capabilities(
		name: impl Into<Cow<'static, str>>,
		render: impl Fn(&RenderContext<'_>) -> Result<Child, RenderError> + 'static,
		capabilities: Capabilities,
	) -> Self {
		let render: Rc<dyn Fn(&RenderContext<'_>) -> Result<Child, RenderError>> = Rc::new(render);
		Self::with_capabilities(name, move |_| FunctionComponent(render.clone()), capabilities)
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.0.name
	}

	#[must_use]
	pub fn capabilities(&self) -> &Capabilities {
		&self.0.capabilities
	}

	pub(crate) fn instantiate(&self, props: &Props) -> Box<dyn Component> {
		(self.0.factory)(props)
	}

	/// An element of this type.
	#[must_use]
	pub fn element(&self) -> crate::ElementBuilder {
		Element::component(self)
	}
}
impl PartialEq for ComponentType {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Eq for ComponentType {}
impl Debug for ComponentType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentType").field("name", &self.name()).field("capabilities", self.capabilities()).finish()
	}
}

struct FunctionComponent(Rc<dyn Fn(&RenderContext<'_>) -> Result<Child, RenderError>>);
impl Component for FunctionComponent {
	fn render(&mut self, cx: &RenderContext<'_>) -> Result<Child, RenderError> {
		(self.0)(cx)
	}
}

thread_local! {
	static FRAGMENT: ComponentType = ComponentType::function("Fragment", |cx| Ok(Child::List(cx.children().to_vec())));
}

/// The pseudo-group component type, which renders its children as siblings.
#[must_use]
pub fn fragment_type() -> ComponentType {
	FRAGMENT.with(Clone::clone)
}

pub fn fragment(children: impl IntoIterator<Item = Child>) -> Child {
	Element::component(&fragment_type()).children(children).build()
}

/// Wraps `inner` so that it only re-renders if its props changed.
///
/// `are_equal` replaces the default shallow comparison.
pub fn memo(inner: &ComponentType, are_equal: Option<Rc<dyn Fn(&Props, &Props) -> bool>>) -> ComponentType {
	let name = format!("Memo({})", inner.name());
	let inner = inner.clone();
	ComponentType::function_with_capabilities(
		name,
		move |cx| Ok(Element::component(&inner).props(cx.props().clone()).children(cx.children().iter().cloned()).build()),
		Capabilities {
			should_skip_update: Some(Rc::new(move |update: &Update<'_>| match &are_equal {
				Some(are_equal) => are_equal(update.props, update.next_props),
				None => !update.props.shallow_differs(update.next_props),
			})),
			..Capabilities::default()
		},
	)
}

/// A stateful component that skips updates when neither props nor state changed shallowly.
pub fn pure<C: Component + 'static>(name: impl Into<Cow<'static, str>>, factory: impl Fn(&Props) -> C + 'static) -> ComponentType {
	ComponentType::with_capabilities(
		name,
		factory,
		Capabilities {
			should_skip_update: Some(Rc::new(|update: &Update<'_>| !update.props.shallow_differs(update.next_props) && !update.state.shallow_differs(update.next_state))),
			..Capabilities::default()
		},
	)
}

/// A function component that receives the element's ref through [`RenderContext::forwarded_ref`].
pub fn forward_ref(name: impl Into<Cow<'static, str>>, render: impl Fn(&RenderContext<'_>) -> Result<Child, RenderError> + 'static) -> ComponentType {
	ComponentType::function_with_capabilities(
		name,
		render,
		Capabilities {
			forwards_ref: true,
			..Capabilities::default()
		},
	)
}
