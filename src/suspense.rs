//! Suspension: components that wait on a value that isn't there yet.
//!
//! A component returns [`RenderError::Pending`] from `render` to suspend. The nearest [`suspense`] boundary above it
//! moves its content's target nodes into a detached holder, shows its `fallback` prop instead and moves them back
//! once every [`PendingValue`] it waits on has settled.
//!
//! Resolution is only recorded by the [`Scheduler`]. The boundary resumes during the next [`Renderer::flush`](`crate::Renderer::flush`).

use crate::{
	arena::{NodeFlags, Parked, VNodeId},
	component::{fragment, Capabilities, ComponentType},
	diff::Differ,
	error::RenderError,
	instance::{Instance, InstanceFlags},
	node::{Child, Element, Value},
	scheduler::Scheduler,
	target::Target,
};
use core::fmt::{self, Debug, Formatter};
use std::{
	cell::{Cell, RefCell},
	rc::{Rc, Weak},
};
use tracing::{debug, trace_span};

type Subscriber = Box<dyn FnOnce()>;

struct PendingInner {
	value: RefCell<Option<Value>>,
	subscribers: RefCell<Vec<(u64, Subscriber)>>,
	next_id: Cell<u64>,
}

/// A value that settles at most once, via its [`Resolver`].
#[derive(Clone)]
pub struct PendingValue(Rc<PendingInner>);
impl PendingValue {
	#[allow(clippy::new_ret_no_self)]
	#[must_use]
	pub fn new() -> (PendingValue, Resolver) {
		let pending = Self(Rc::new(PendingInner {
			value: RefCell::new(None),
			subscribers: RefCell::default(),
			next_id: Cell::new(0),
		}));
		(pending.clone(), Resolver(pending))
	}

	#[must_use]
	pub fn is_settled(&self) -> bool {
		self.0.value.borrow().is_some()
	}

	#[must_use]
	pub fn value(&self) -> Option<Value> {
		self.0.value.borrow().clone()
	}

	/// Calls `subscriber` once this value settles, or right away if it has.
	///
	/// Returns an id for [`unsubscribe`](`PendingValue::unsubscribe`) unless `subscriber` was called already.
	pub fn subscribe(&self, subscriber: impl FnOnce() + 'static) -> Option<u64> {
		if self.is_settled() {
			subscriber();
			return None;
		}
		let id = self.0.next_id.get();
		self.0.next_id.set(id + 1);
		self.0.subscribers.borrow_mut().push((id, Box::new(subscriber)));
		Some(id)
	}

	/// Returns whether a subscription was removed.
	pub fn unsubscribe(&self, id: u64) -> bool {
		let mut subscribers = self.0.subscribers.borrow_mut();
		let len = subscribers.len();
		subscribers.retain(|(subscription, _)| *subscription != id);
		subscribers.len() != len
	}
}
impl PartialEq for PendingValue {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Debug for PendingValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("PendingValue")
			.field("settled", &self.is_settled())
			.field("subscribers", &self.0.subscribers.borrow().len())
			.finish()
	}
}

/// Settles a [`PendingValue`].
#[derive(Debug)]
pub struct Resolver(PendingValue);
impl Resolver {
	/// Settles the value and notifies subscribers, in subscription order.
	pub fn resolve(self, value: impl Into<Value>) {
		*(self.0).0.value.borrow_mut() = Some(value.into());
		let subscribers = (self.0).0.subscribers.take();
		for (_, subscriber) in subscribers {
			subscriber();
		}
	}
}

/// Bookkeeping of a suspense boundary instance.
#[derive(Default)]
pub(crate) struct SuspenseState {
	/// Unsettled suspensions below this boundary.
	pub pending: usize,
	pub suspenders: Vec<Weak<Instance>>,
	/// Showing the fallback.
	pub suspended: bool,
	/// The next render parks the content.
	pub detach_on_next_render: bool,
}

/// A subscription of a suspended instance to the value it waits on.
pub(crate) struct Suspension {
	pending: PendingValue,
	subscription: Option<u64>,
	boundary: Weak<Instance>,
	settled: Rc<Cell<bool>>,
}
impl Suspension {
	/// Releases the subscription. The boundary still counts this suspension as settled.
	pub fn cancel(self, scheduler: &Scheduler) {
		if let Some(subscription) = self.subscription {
			self.pending.unsubscribe(subscription);
		}
		if !self.settled.replace(true) {
			scheduler.settle(self.boundary);
		}
	}
}

thread_local! {
	static SUSPENSE: ComponentType = ComponentType::function_with_capabilities(
		"Suspense",
		|cx| {
			let suspended = cx.is_suspended();
			let fallback = cx.props().get("fallback").and_then(Value::as_child).cloned().unwrap_or_default();
			Ok(Child::List(vec![
				if suspended { fragment(Vec::new()) } else { fragment(cx.children().iter().cloned()) },
				if suspended { fragment(vec![fallback]) } else { Child::Empty },
			]))
		},
		Capabilities {
			child_suspend_handler: true,
			..Capabilities::default()
		},
	);
}

/// A suspense boundary showing `fallback` while anything in `children` is suspended.
pub fn suspense(fallback: impl Into<Child>, children: impl IntoIterator<Item = Child>) -> Child {
	Element::component(&SUSPENSE.with(Clone::clone))
		.prop("fallback", Value::Child(fallback.into()))
		.children(children)
		.build()
}

/// Provides the component type of a [`lazy`] component.
pub struct LazyResolver {
	slot: Rc<RefCell<Option<ComponentType>>>,
	resolver: Resolver,
}
impl LazyResolver {
	pub fn resolve(self, ty: ComponentType) {
		*self.slot.borrow_mut() = Some(ty);
		self.resolver.resolve(Value::Null);
	}
}

/// A component that suspends until its [`LazyResolver`] provides the component type to render with the same props and children.
pub fn lazy(name: &str) -> (ComponentType, LazyResolver) {
	let (pending, resolver) = PendingValue::new();
	let slot: Rc<RefCell<Option<ComponentType>>> = Rc::default();
	let ty = ComponentType::function(format!("Lazy({})", name), {
		let slot = slot.clone();
		move |cx| match &*slot.borrow() {
			Some(ty) => Ok(Element::component(ty).props(cx.props().clone()).children(cx.children().iter().cloned()).build()),
			None => Err(RenderError::Pending(pending.clone())),
		}
	});
	(ty, LazyResolver { slot, resolver })
}

/// Registers `suspender` as waiting on `pending` below `boundary`.
///
/// The first suspension switches the boundary to its fallback, unless the suspender is hydrating.
/// Then the existing markup stays in place until the value settles.
pub(crate) fn child_did_suspend(boundary: &Rc<Instance>, pending: &PendingValue, suspender: Option<&Rc<Instance>>, hydrating: bool) {
	let first = {
		let mut state = boundary.boundary.borrow_mut();
		let state = match state.as_mut() {
			Some(state) => state,
			None => return,
		};
		if let Some(suspender) = suspender {
			state.suspenders.push(Rc::downgrade(suspender));
		}
		state.pending += 1;
		let first = state.pending == 1 && !hydrating;
		if first {
			state.suspended = true;
			state.detach_on_next_render = true;
		}
		first
	};
	debug!(boundary = boundary.ty.name(), first, hydrating, "Child suspended.");

	let settled = Rc::new(Cell::new(false));
	let subscription = pending.subscribe({
		let scheduler = boundary.scheduler.clone();
		let boundary = Rc::downgrade(boundary);
		let suspender = suspender.map(Rc::downgrade);
		let settled = settled.clone();
		move || {
			if !settled.replace(true) {
				if let Some(suspender) = suspender.as_ref().and_then(Weak::upgrade) {
					suspender.suspensions.borrow_mut().retain(|suspension| !Rc::ptr_eq(&suspension.settled, &settled));
				}
				scheduler.settle(boundary);
			}
		}
	});
	if let (Some(suspender), false) = (suspender, settled.get()) {
		suspender.suspensions.borrow_mut().push(Suspension {
			pending: pending.clone(),
			subscription,
			boundary: Rc::downgrade(boundary),
			settled,
		});
	}

	if first {
		boundary.force_update(None);
	}
}

impl<T: Target> Differ<'_, T> {
	/// Parks a boundary's content if it suspended since its last render.
	pub(crate) fn prepare_boundary(&mut self, id: VNodeId, boundary: &Instance) {
		let park = boundary
			.boundary
			.borrow_mut()
			.as_mut()
			.map_or(false, |state| core::mem::take(&mut state.detach_on_next_render));
		if park {
			self.park(id);
		}
	}

	/// Moves the target nodes of a boundary's content into a detached holder.
	fn park(&mut self, id: VNodeId) {
		let (child, original_parent) = match (self.arena[id].children.first().copied().flatten(), self.arena[id].parent_target.clone()) {
			(Some(child), Some(parent)) => (child, parent),
			_ => return,
		};
		let span = trace_span!("Parking suspended content", ?id, ?child);
		let _enter = span.enter();

		let holder = self.target.create_element("div");
		for dom in self.top_level_doms(child) {
			self.target.insert_before(&holder, &dom, None);
		}
		self.repoint(child, &original_parent, &holder, false);
		self.arena[id].children[0] = None;
		self.arena[id].parked = Some(Parked {
			child,
			holder,
			original_parent,
		});
	}

	/// Moves parked content back in front of the fallback, for the boundary's next render to pick up.
	fn restore(&mut self, id: VNodeId) {
		let parked = match self.arena[id].parked.take() {
			Some(parked) => parked,
			None => return,
		};
		let span = trace_span!("Restoring suspended content", ?id, child = ?parked.child);
		let _enter = span.enter();

		if let Some(placeholder) = self.arena[id].children.first().copied().flatten() {
			self.unmount(placeholder, false);
		}
		let anchor = self.dom_sibling_from(id, 1);
		for dom in self.top_level_doms(parked.child) {
			self.target.insert_before(&parked.original_parent, &dom, anchor.as_ref());
		}
		self.repoint(parked.child, &parked.holder, &parked.original_parent, true);

		let vnode = &mut self.arena[id];
		match vnode.children.first_mut() {
			Some(slot) => *slot = Some(parked.child),
			None => vnode.children.push(Some(parked.child)),
		}
		let child = &mut self.arena[parked.child];
		child.parent = Some(id);
		child.index = 0;
		self.update_dom_pointer(id);
	}

	/// Counts down the boundary and resumes it once nothing below it is pending anymore.
	pub(crate) fn settle_suspension(&mut self, boundary: &Rc<Instance>) {
		if boundary.has(InstanceFlags::UNMOUNTED) {
			return;
		}
		let (suspended, suspenders) = {
			let mut state = boundary.boundary.borrow_mut();
			let state = match state.as_mut() {
				Some(state) => state,
				None => return,
			};
			state.pending = state.pending.saturating_sub(1);
			if state.pending > 0 {
				return;
			}
			state.detach_on_next_render = false;
			(core::mem::replace(&mut state.suspended, false), core::mem::take(&mut state.suspenders))
		};
		debug!(boundary = boundary.ty.name(), suspended, "Suspension complete.");

		if let (true, Some(id)) = (suspended, boundary.vnode.get()) {
			self.restore(id);
		}
		boundary.force_update(None);
		for suspender in suspenders.iter().filter_map(Weak::upgrade) {
			suspender.force_update(None);
		}
	}

	/// The target nodes directly under the target parent of `id`.
	pub(crate) fn top_level_doms(&self, id: VNodeId) -> Vec<T::Handle> {
		let mut doms = Vec::new();
		self.collect_top_level_doms(id, &mut doms);
		doms
	}

	fn collect_top_level_doms(&self, id: VNodeId, doms: &mut Vec<T::Handle>) {
		let vnode = match self.arena.get(id) {
			Some(vnode) => vnode,
			None => return,
		};
		if vnode.is_component() {
			for &child in vnode.children.iter().flatten() {
				self.collect_top_level_doms(child, doms);
			}
		} else if let Some(dom) = &vnode.dom {
			doms.push(dom.clone());
		}
	}

	/// Changes the recorded target parent of the components in a subtree from `from` to `to`.
	fn repoint(&mut self, id: VNodeId, from: &T::Handle, to: &T::Handle, force: bool) {
		let vnode = match self.arena.get_mut(id) {
			Some(vnode) => vnode,
			None => return,
		};
		if let Some(instance) = &vnode.component {
			if force {
				instance.insert_flags(InstanceFlags::FORCE);
			}
			if vnode.parent_target.as_ref() == Some(from) {
				vnode.parent_target = Some(to.clone());
			}
			for child in vnode.children.clone().into_iter().flatten() {
				self.repoint(child, from, to, force);
			}
		}
	}

	pub(crate) fn is_hydrating(&self, id: VNodeId) -> bool {
		self.arena.get(id).map_or(false, |vnode| vnode.flags.contains(NodeFlags::HYDRATE))
	}
}
