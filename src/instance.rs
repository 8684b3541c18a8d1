//! Component instances and the handles components use to update themselves.

use crate::{
	arena::VNodeId,
	component::{Component, ComponentType},
	context::Context,
	node::{Child, Element, Props, Ref, State, Value},
	scheduler::Scheduler,
	suspense::{Suspension, SuspenseState},
};
use bitflags::bitflags;
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::{
	cell::{Cell, Ref as CellRef, RefCell},
	rc::{Rc, Weak},
};

bitflags! {
	pub(crate) struct InstanceFlags: u8 {
		/// Queued for a render. Cleared when that render starts.
		const DIRTY = 0b00_0001;
		/// The next render ignores update-skip checks.
		const FORCE = 0b00_0010;
		/// This instance handled a descendant's failure and re-renders to recover.
		const PENDING_ERROR = 0b00_0100;
		/// Set while rendering after a handled failure. Such instances aren't asked to handle another one.
		const PROCESSING_EXCEPTION = 0b00_1000;
		const UNMOUNTED = 0b01_0000;
		/// `did_mount` ran.
		const MOUNTED = 0b10_0000;
	}
}

pub(crate) type Callback = Box<dyn FnOnce()>;

/// Providers visible from a position in the tree, by context id.
pub(crate) type ContextMap = Rc<HashMap<u64, Weak<Instance>>>;

pub(crate) struct Instance {
	pub ty: ComponentType,
	pub behavior: RefCell<Box<dyn Component>>,
	pub element: RefCell<Rc<Element>>,
	pub state: RefCell<State>,
	pub next_state: RefCell<Option<State>>,
	pub flags: Cell<InstanceFlags>,
	pub vnode: Cell<Option<VNodeId>>,
	pub depth: Cell<usize>,
	/// Counts scheduled updates, to tell whether error handling changed anything.
	pub updates: Cell<u64>,
	/// Run after the next commit that includes this instance.
	pub render_callbacks: RefCell<Vec<Callback>>,
	pub state_callbacks: RefCell<Vec<Callback>>,
	pub scheduler: Rc<Scheduler>,
	/// Present if this is a suspense boundary.
	pub boundary: RefCell<Option<SuspenseState>>,
	/// Unsettled suspensions this instance caused.
	pub suspensions: RefCell<Vec<Suspension>>,
	pub contexts: RefCell<ContextMap>,
	/// Providers only: instances that read this provider's value.
	pub subscribers: RefCell<Vec<Weak<Instance>>>,
	/// Providers this instance reads from.
	pub providers: RefCell<Vec<Weak<Instance>>>,
	this: Weak<Instance>,
}
impl Instance {
	pub fn new(element: Rc<Element>, ty: ComponentType, scheduler: Rc<Scheduler>) -> Rc<Self> {
		let behavior = ty.instantiate(&element.props);
		let state = behavior.initial_state(&element.props);
		let boundary = ty.capabilities().child_suspend_handler.then(SuspenseState::default);
		Rc::new_cyclic(|this| Self {
			ty,
			behavior: RefCell::new(behavior),
			element: RefCell::new(element),
			state: RefCell::new(state),
			next_state: RefCell::new(None),
			flags: Cell::new(InstanceFlags::empty()),
			vnode: Cell::new(None),
			depth: Cell::new(0),
			updates: Cell::new(0),
			render_callbacks: RefCell::default(),
			state_callbacks: RefCell::default(),
			scheduler,
			boundary: RefCell::new(boundary),
			suspensions: RefCell::default(),
			contexts: RefCell::default(),
			subscribers: RefCell::default(),
			providers: RefCell::default(),
			this: this.clone(),
		})
	}

	pub fn handle(&self) -> ComponentHandle {
		ComponentHandle(self.this.clone())
	}

	pub fn has(&self, flags: InstanceFlags) -> bool {
		self.flags.get().intersects(flags)
	}

	pub fn insert_flags(&self, flags: InstanceFlags) {
		self.flags.set(self.flags.get() | flags);
	}

	pub fn remove_flags(&self, flags: InstanceFlags) {
		self.flags.set(self.flags.get() - flags);
	}

	pub fn is_mounted(&self) -> bool {
		self.vnode.get().is_some() && !self.has(InstanceFlags::UNMOUNTED)
	}

	/// Stages a shallow state merge and schedules a render.
	///
	/// Before the first mount, the update is only staged. An updater returning [`None`] cancels this call.
	pub fn update_state(self: &Rc<Self>, updater: impl FnOnce(&State, &Props) -> Option<State>, callback: Option<Callback>) {
		let staged = self
			.next_state
			.borrow_mut()
			.get_or_insert_with(|| self.state.borrow().clone())
			.clone();
		let element = self.element.borrow().clone();
		let update = match updater(&staged, &element.props) {
			Some(update) => update,
			None => return,
		};
		self.next_state
			.borrow_mut()
			.get_or_insert_with(|| self.state.borrow().clone())
			.merge(update);

		if self.is_mounted() {
			if let Some(callback) = callback {
				self.state_callbacks.borrow_mut().push(callback);
			}
			self.updates.set(self.updates.get() + 1);
			self.scheduler.enqueue(self);
		}
	}

	pub fn force_update(self: &Rc<Self>, callback: Option<Callback>) {
		if self.is_mounted() {
			self.insert_flags(InstanceFlags::FORCE);
			if let Some(callback) = callback {
				self.render_callbacks.borrow_mut().push(callback);
			}
			self.updates.set(self.updates.get() + 1);
			self.scheduler.enqueue(self);
		}
	}

	/// Providers only: forces a re-render of every live subscriber.
	pub fn notify_subscribers(&self) {
		let subscribers: Vec<_> = {
			let mut subscribers = self.subscribers.borrow_mut();
			subscribers.retain(|subscriber| subscriber.strong_count() > 0);
			subscribers.iter().filter_map(Weak::upgrade).collect()
		};
		for subscriber in subscribers {
			subscriber.force_update(None);
		}
	}

	fn subscribe(&self, consumer: &Instance) {
		let mut subscribers = self.subscribers.borrow_mut();
		if !subscribers.iter().any(|subscriber| subscriber.ptr_eq(&consumer.this)) {
			subscribers.push(consumer.this.clone());
			consumer.providers.borrow_mut().push(self.this.clone());
		}
	}

	/// Removes this instance from the subscriber lists of all providers it reads from.
	pub fn unsubscribe_all(&self) {
		for provider in self.providers.take().iter().filter_map(Weak::upgrade) {
			provider.subscribers.borrow_mut().retain(|subscriber| !subscriber.ptr_eq(&self.this));
		}
	}
}
impl Debug for Instance {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance")
			.field("type", &self.ty.name())
			.field("flags", &self.flags.get())
			.field("vnode", &self.vnode.get())
			.field("depth", &self.depth.get())
			.finish()
	}
}

/// A weak handle to a component instance, used to update its state from event handlers and callbacks.
///
/// All methods are no-ops once the instance is gone.
#[derive(Clone)]
pub struct ComponentHandle(Weak<Instance>);
impl ComponentHandle {
	pub(crate) fn instance(&self) -> Option<Rc<Instance>> {
		self.0.upgrade()
	}

	/// Shallowly merges `update` into the state and schedules a render.
	pub fn set_state(&self, update: State) {
		self.update_state(move |_, _| Some(update));
	}

	/// Like [`set_state`](`ComponentHandle::set_state`), calling `callback` after the render was committed.
	pub fn set_state_then(&self, update: State, callback: impl FnOnce() + 'static) {
		self.update_state_then(move |_, _| Some(update), callback);
	}

	/// Computes a state update from the staged state and current props. [`None`] cancels the update.
	pub fn update_state(&self, updater: impl FnOnce(&State, &Props) -> Option<State>) {
		if let Some(instance) = self.0.upgrade() {
			instance.update_state(updater, None);
		}
	}

	pub fn update_state_then(&self, updater: impl FnOnce(&State, &Props) -> Option<State>, callback: impl FnOnce() + 'static) {
		if let Some(instance) = self.0.upgrade() {
			instance.update_state(updater, Some(Box::new(callback)));
		}
	}

	/// Schedules a render that skips update checks.
	pub fn force_update(&self) {
		if let Some(instance) = self.0.upgrade() {
			instance.force_update(None);
		}
	}

	pub fn force_update_then(&self, callback: impl FnOnce() + 'static) {
		if let Some(instance) = self.0.upgrade() {
			instance.force_update(Some(Box::new(callback)));
		}
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.0.upgrade().map_or(false, |instance| instance.is_mounted())
	}

	/// A snapshot of the current (committed) state.
	#[must_use]
	pub fn state(&self) -> Option<State> {
		self.0.upgrade().map(|instance| instance.state.borrow().clone())
	}
}
impl PartialEq for ComponentHandle {
	fn eq(&self, other: &Self) -> bool {
		self.0.ptr_eq(&other.0)
	}
}
impl Debug for ComponentHandle {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.0.upgrade() {
			Some(instance) => write!(f, "ComponentHandle({})", instance.ty.name()),
			None => f.write_str("ComponentHandle(<dropped>)"),
		}
	}
}

/// What a component sees while rendering.
pub struct RenderContext<'a> {
	instance: &'a Instance,
	element: Rc<Element>,
	state: CellRef<'a, State>,
}
impl<'a> RenderContext<'a> {
	pub(crate) fn new(instance: &'a Instance) -> Self {
		Self {
			instance,
			element: instance.element.borrow().clone(),
			state: instance.state.borrow(),
		}
	}

	#[must_use]
	pub fn props(&self) -> &Props {
		&self.element.props
	}

	#[must_use]
	pub fn state(&self) -> &State {
		&self.state
	}

	/// The children the component was given.
	#[must_use]
	pub fn children(&self) -> &[Child] {
		&self.element.children
	}

	#[must_use]
	pub fn handle(&self) -> ComponentHandle {
		self.instance.handle()
	}

	/// The value of the nearest provider of `context` above this component, or its default.
	///
	/// Reading subscribes this component to the provider's value changes.
	#[must_use]
	pub fn context(&self, context: &Context) -> Value {
		let provider = self.instance.contexts.borrow().get(&context.id()).and_then(Weak::upgrade);
		match provider {
			Some(provider) => {
				provider.subscribe(self.instance);
				let element = provider.element.borrow();
				element.props.get("value").cloned().unwrap_or(Value::Null)
			}
			None => context.default_value().clone(),
		}
	}

	pub(crate) fn is_suspended(&self) -> bool {
		self.instance.boundary.borrow().as_ref().map_or(false, |state| state.suspended)
	}

	/// The ref of the rendered element, for components with the `forwards_ref` capability.
	#[must_use]
	pub fn forwarded_ref(&self) -> Option<&Ref> {
		if self.instance.ty.capabilities().forwards_ref {
			self.element.node_ref.as_ref()
		} else {
			None
		}
	}
}
