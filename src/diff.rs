//! Single-node diffing, unmounting and the commit phase.
//!
//! Mounted nodes are updated in place: a new description that matched an old node takes over its [`VNodeId`],
//! target node and component instance. Target mutations happen inline. Refs and lifecycle callbacks are queued
//! and only run by [`Differ::commit_root`] once the whole pass succeeded.

use crate::{
	arena::{Arena, NodeFlags, VNode, VNodeId},
	component::{fragment_type, ComponentType, Update},
	error::RenderError,
	hooks::{HookNode, Hooks},
	instance::{Callback, ContextMap, Instance, InstanceFlags, RenderContext},
	logging::content,
	node::{normalize_children, Child, Element, ElementType, Node, Props, Ref, RefValue, State},
	scheduler::Scheduler,
	target::Target,
};
use std::rc::Rc;
use tracing::{trace, trace_span};

/// Existing target nodes that may be claimed instead of creating new ones. Claimed entries become [`None`].
pub(crate) type Excess<H> = Option<Vec<Option<H>>>;

/// Where a diff happens.
pub(crate) struct Scope<'s, H> {
	pub parent_dom: &'s H,
	pub contexts: &'s ContextMap,
	pub hydrating: bool,
}
impl<H> Clone for Scope<'_, H> {
	fn clone(&self) -> Self {
		Self { ..*self }
	}
}
impl<H> Copy for Scope<'_, H> {}

/// How a diffed node affects the insertion anchor of its following sibling.
pub(crate) enum Placement<H> {
	/// A target node was diffed. The anchor continues after it.
	Element,
	/// A component was rendered. The anchor continues where its output ended.
	Component(Option<H>),
	/// Nothing was rendered. The anchor has to be advanced over the node's existing target nodes.
	Skipped,
}

pub(crate) enum Lifecycle {
	Mounted,
	Updated { prev_element: Rc<Element>, prev_state: State },
}

pub(crate) struct Commit {
	pub instance: Rc<Instance>,
	pub lifecycle: Option<Lifecycle>,
	pub callbacks: Vec<Callback>,
}

pub(crate) struct QueuedRef {
	pub node_ref: Ref,
	pub value: RefValue,
	pub id: VNodeId,
}

/// One render pass over (part of) a mounted tree.
pub(crate) struct Differ<'a, T: Target> {
	pub target: &'a mut T,
	pub arena: &'a mut Arena<T::Handle>,
	pub scheduler: &'a Rc<Scheduler>,
	pub hooks: &'a Hooks,
	pub max_depth: usize,
	pub commits: Vec<Commit>,
	pub refs: Vec<QueuedRef>,
}
impl<'a, T: Target> Differ<'a, T> {
	pub fn new(target: &'a mut T, arena: &'a mut Arena<T::Handle>, scheduler: &'a Rc<Scheduler>, hooks: &'a Hooks, max_depth: usize) -> Self {
		Self {
			target,
			arena,
			scheduler,
			hooks,
			max_depth,
			commits: Vec::new(),
			refs: Vec::new(),
		}
	}

	pub fn hook_node(&self, id: VNodeId) -> Option<HookNode> {
		self.arena.get(id).map(|vnode| HookNode {
			id,
			depth: vnode.depth,
			key: vnode.node.key().cloned(),
			name: vnode.node.name().to_owned(),
		})
	}

	/// Diffs the mounted node `id` towards `node`, which must have the same type and key.
	///
	/// Fresh mounts are nodes without target node or instance.
	/// `rerender` marks a render requested by the node's own component rather than by its parent.
	pub fn diff(
		&mut self,
		id: VNodeId,
		node: Node,
		scope: Scope<'_, T::Handle>,
		anchor: Option<T::Handle>,
		excess: &mut Excess<T::Handle>,
		rerender: bool,
	) -> Result<Placement<T::Handle>, RenderError> {
		if let Some(hook) = &self.hooks.diff {
			let vnode = &self.arena[id];
			hook(&HookNode {
				id,
				depth: vnode.depth,
				key: node.key().cloned(),
				name: node.name().to_owned(),
			});
		}

		let placement = match &node {
			Node::Text(text) => {
				self.diff_text(id, text, scope, excess);
				Placement::Element
			}
			Node::Element(element) => match &element.ty {
				ElementType::Tag(tag) => self.diff_element(id, element, tag, scope, excess)?,
				ElementType::Component(ty) if self.arena[id].flags.contains(NodeFlags::HYDRATE) => {
					// Suspended while hydrating. Resume hydration into the markup that was kept for it.
					let kept = self.arena[id].dom.clone();
					self.arena[id].flags.remove(NodeFlags::HYDRATE);
					let mut kept_excess = Some(vec![kept.clone()]);
					let placement = self.diff_component(id, element, ty, Scope { hydrating: true, ..scope }, kept.or(anchor), &mut kept_excess, rerender)?;
					for leftover in kept_excess.into_iter().flatten().flatten() {
						trace!(?leftover, "Removing unclaimed server markup.");
						self.target.remove(&leftover);
					}
					placement
				}
				ElementType::Component(ty) => self.diff_component(id, element, ty, scope, anchor, excess, rerender)?,
			},
		};

		if let Some(hook) = &self.hooks.diffed {
			if let Some(node) = self.hook_node(id) {
				hook(&node);
			}
		}
		Ok(placement)
	}

	fn diff_text(&mut self, id: VNodeId, text: &Rc<str>, scope: Scope<'_, T::Handle>, excess: &mut Excess<T::Handle>) {
		let span = trace_span!("Diffing text node", text = content(text));
		let _enter = span.enter();

		let existing = {
			let vnode = &self.arena[id];
			match (&vnode.dom, &vnode.node) {
				(Some(dom), Node::Text(old)) => Some((dom.clone(), old.clone())),
				_ => None,
			}
		};
		let dom = match existing {
			Some((dom, old)) => {
				if old != *text {
					self.target.set_text(&dom, text);
				}
				dom
			}
			None => match self.claim(excess, |target, candidate| target.text(candidate).is_some()) {
				Some(dom) => {
					if self.target.text(&dom).as_deref() != Some(&**text) {
						trace!("Patching claimed text node.");
						self.target.set_text(&dom, text);
					}
					if scope.hydrating {
						self.arena[id].flags.insert(NodeFlags::HYDRATE);
					}
					dom
				}
				None => self.target.create_text(text),
			},
		};

		let vnode = &mut self.arena[id];
		vnode.node = Node::Text(text.clone());
		vnode.dom = Some(dom);
	}

	fn diff_element(
		&mut self,
		id: VNodeId,
		element: &Rc<Element>,
		tag: &str,
		scope: Scope<'_, T::Handle>,
		excess: &mut Excess<T::Handle>,
	) -> Result<Placement<T::Handle>, RenderError> {
		let span = trace_span!("Diffing element", tag);
		let _enter = span.enter();

		let (old_element, old_dom) = {
			let vnode = &self.arena[id];
			(vnode.node.element().cloned(), vnode.dom.clone())
		};

		let (dom, old_props, claimed) = match old_dom {
			Some(dom) => {
				if excess.is_none() && old_element.as_ref().map_or(false, |old| Rc::ptr_eq(old, element)) {
					trace!("Unchanged description.");
					return Ok(Placement::Skipped);
				}
				(dom, old_element.map(|old| old.props.clone()), false)
			}
			None => match self.claim(excess, |target, candidate| {
				target.tag_name(candidate).map_or(false, |name| name.eq_ignore_ascii_case(tag))
			}) {
				Some(dom) => (dom, None, true),
				None => (self.target.create_element(tag), None, false),
			},
		};

		self.diff_props(&dom, old_props.as_ref(), &element.props);

		{
			let vnode = &mut self.arena[id];
			vnode.node = Node::Element(element.clone());
			vnode.dom = Some(dom.clone());
			if claimed && scope.hydrating {
				vnode.flags.insert(NodeFlags::HYDRATE);
			}
		}

		let mut child_excess: Excess<T::Handle> = if claimed {
			Some(self.target.child_nodes(&dom).into_iter().map(Some).collect())
		} else {
			None
		};
		let anchor = match &child_excess {
			Some(child_excess) => child_excess.first().cloned().flatten(),
			None => self.dom_sibling_from(id, 0),
		};
		self.diff_children(
			id,
			normalize_children(&element.children),
			Scope { parent_dom: &dom, ..scope },
			anchor,
			&mut child_excess,
		)?;

		for leftover in child_excess.into_iter().flatten().flatten() {
			trace!(?leftover, "Removing unclaimed target node.");
			self.target.remove(&leftover);
		}
		Ok(Placement::Element)
	}

	fn claim(&self, excess: &mut Excess<T::Handle>, accept: impl Fn(&T, &T::Handle) -> bool) -> Option<T::Handle> {
		let target: &T = self.target;
		excess
			.as_mut()?
			.iter_mut()
			.find(|candidate| candidate.as_ref().map_or(false, |candidate| accept(target, candidate)))
			.and_then(Option::take)
	}

	fn diff_props(&mut self, dom: &T::Handle, old: Option<&Props>, new: &Props) {
		if let Some(old) = old {
			for (name, value) in old.iter() {
				if new.get(name).is_none() {
					self.target.apply_property(dom, name, None, Some(value));
				}
			}
		}
		for (name, value) in new.iter() {
			let previous = old.and_then(|old| old.get(name));
			if previous != Some(value) {
				self.target.apply_property(dom, name, Some(value), previous);
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn diff_component(
		&mut self,
		id: VNodeId,
		element: &Rc<Element>,
		ty: &ComponentType,
		scope: Scope<'_, T::Handle>,
		anchor: Option<T::Handle>,
		excess: &mut Excess<T::Handle>,
		rerender: bool,
	) -> Result<Placement<T::Handle>, RenderError> {
		let span = trace_span!("Diffing component", name = ty.name(), rerender);
		let _enter = span.enter();

		let (depth, existing) = {
			let vnode = &self.arena[id];
			(vnode.depth, vnode.component.clone())
		};
		let (instance, is_new) = match existing {
			Some(instance) => (instance, false),
			None => (Instance::new(element.clone(), ty.clone(), self.scheduler.clone()), true),
		};
		instance.vnode.set(Some(id));
		instance.depth.set(depth);
		{
			let vnode = &mut self.arena[id];
			vnode.component = Some(instance.clone());
			vnode.parent_target = Some(scope.parent_dom.clone());
		}
		*instance.contexts.borrow_mut() = scope.contexts.clone();

		let recovering = instance.has(InstanceFlags::PENDING_ERROR);
		if recovering {
			instance.insert_flags(InstanceFlags::PROCESSING_EXCEPTION);
		}

		let old_element = instance.element.borrow().clone();
		let next_state = instance.next_state.borrow_mut().take().unwrap_or_else(|| instance.state.borrow().clone());

		if !is_new {
			if ty.capabilities().provides_context.is_some() && old_element.props.get("value") != element.props.get("value") {
				instance.notify_subscribers();
			}

			// A parent passing the very same description again. Self-requested renders always take the new state.
			let same = !rerender && Rc::ptr_eq(&old_element, element);
			let skip = !instance.has(InstanceFlags::FORCE) && (same || self.should_skip(&instance, &old_element, element, &next_state));
			if skip {
				trace!("Skipping update.");
				if same {
					*instance.next_state.borrow_mut() = Some(next_state);
				} else {
					*instance.element.borrow_mut() = element.clone();
					*instance.state.borrow_mut() = next_state;
					instance.remove_flags(InstanceFlags::DIRTY);
				}
				self.arena[id].node = Node::Element(element.clone());
				let callbacks = take_callbacks(&instance);
				if !callbacks.is_empty() {
					self.commits.push(Commit {
						instance,
						lifecycle: None,
						callbacks,
					});
				}
				return Ok(Placement::Skipped);
			}
		}

		if instance.boundary.borrow().is_some() {
			self.prepare_boundary(id, &instance);
		}

		let lifecycle = if !instance.has(InstanceFlags::MOUNTED) {
			Lifecycle::Mounted
		} else {
			Lifecycle::Updated {
				prev_element: old_element,
				prev_state: instance.state.borrow().clone(),
			}
		};
		*instance.element.borrow_mut() = element.clone();
		*instance.state.borrow_mut() = next_state;
		self.arena[id].node = Node::Element(element.clone());
		instance.remove_flags(InstanceFlags::FORCE | InstanceFlags::DIRTY);

		if let Some(hook) = &self.hooks.render {
			if let Some(node) = self.hook_node(id) {
				hook(&node);
			}
		}
		let rendered = instance.behavior.borrow_mut().render(&RenderContext::new(&instance));
		let rendered = match rendered {
			Ok(rendered) => rendered,
			Err(error) => {
				if scope.hydrating && error.pending_value().is_some() {
					self.keep_server_markup(id, anchor.as_ref(), excess);
				}
				self.catch_error(error, id)?;
				return Ok(Placement::Skipped);
			}
		};

		let children = match rendered {
			Child::Element(root) if root.key.is_none() && matches!(&root.ty, ElementType::Component(ty) if *ty == fragment_type()) => root.children.clone(),
			rendered => vec![rendered],
		};
		let contexts = match ty.capabilities().provides_context {
			Some(context) => {
				let mut contexts = (**scope.contexts).clone();
				contexts.insert(context, Rc::downgrade(&instance));
				Rc::new(contexts)
			}
			None => scope.contexts.clone(),
		};
		let anchor = self.diff_children(
			id,
			normalize_children(&children),
			Scope {
				contexts: &contexts,
				..scope
			},
			anchor,
			excess,
		)?;

		let callbacks = take_callbacks(&instance);
		self.commits.push(Commit {
			instance: instance.clone(),
			lifecycle: Some(lifecycle),
			callbacks,
		});
		if recovering {
			instance.remove_flags(InstanceFlags::PENDING_ERROR | InstanceFlags::PROCESSING_EXCEPTION);
		}
		Ok(Placement::Component(anchor))
	}

	fn should_skip(&self, instance: &Instance, old: &Element, new: &Element, next_state: &State) -> bool {
		let state = instance.state.borrow();
		let update = Update {
			props: &old.props,
			state: &state,
			next_props: &new.props,
			next_state,
		};
		match &instance.ty.capabilities().should_skip_update {
			Some(should_skip_update) => should_skip_update(&update),
			None => !instance.behavior.borrow().should_update(&update),
		}
	}

	/// Keeps the markup a component hydrating into would have claimed, until it stops suspending.
	fn keep_server_markup(&mut self, id: VNodeId, anchor: Option<&T::Handle>, excess: &mut Excess<T::Handle>) {
		if let (Some(anchor), Some(excess)) = (anchor, excess.as_mut()) {
			if let Some(entry) = excess.iter_mut().find(|entry| entry.as_ref() == Some(anchor)) {
				*entry = None;
				let vnode = &mut self.arena[id];
				vnode.dom = Some(anchor.clone());
				vnode.flags.insert(NodeFlags::HYDRATE);
			}
		}
	}

	/// Unmounts a subtree. Only the topmost target nodes are removed, unless `skip_remove` is set.
	pub fn unmount(&mut self, id: VNodeId, skip_remove: bool) {
		if !self.arena.contains(id) {
			return;
		}
		if let Some(hook) = &self.hooks.unmount {
			if let Some(node) = self.hook_node(id) {
				hook(&node);
			}
		}

		let vnode = &mut self.arena[id];
		let span = trace_span!("Unmounting", name = vnode.node.name(), ?id);
		let _enter = span.enter();

		if let (Some(node_ref), Some(value)) = (vnode.node.element().and_then(|element| element.node_ref.clone()), vnode.ref_value.take()) {
			node_ref.detach(&value);
		}
		let component = vnode.component.clone();
		let parked = vnode.parked.take();
		let children = core::mem::take(&mut vnode.children);
		let dom = vnode.dom.clone();

		if let Some(instance) = &component {
			instance.insert_flags(InstanceFlags::UNMOUNTED);
			instance.remove_flags(InstanceFlags::DIRTY);
			instance.behavior.borrow_mut().will_unmount();
			for suspension in instance.suspensions.take() {
				suspension.cancel(self.scheduler);
			}
			instance.unsubscribe_all();
			if let Some(state) = instance.boundary.borrow_mut().as_mut() {
				state.suspenders.clear();
			}
			if let Some(parked) = parked {
				self.unmount(parked.child, true);
			}
			instance.vnode.set(None);
		}

		for child in children.into_iter().flatten() {
			self.unmount(child, skip_remove || component.is_none());
		}
		if component.is_none() {
			if let (Some(dom), Some(element)) = (&dom, self.arena[id].node.element().cloned()) {
				self.target.release(dom, &element.props);
			}
		}
		if component.is_none() && !skip_remove {
			if let Some(dom) = dom {
				self.target.remove(&dom);
			}
		}
		self.arena.remove(id);
	}

	/// The first target node after `id`'s own, in tree order within the same target parent.
	pub fn dom_sibling(&self, id: VNodeId) -> Option<T::Handle> {
		let vnode = self.arena.get(id)?;
		self.dom_sibling_from(vnode.parent?, vnode.index + 1)
	}

	/// The first target node among the children of `id` from index `from` on, continuing past `id` if it's a component.
	pub fn dom_sibling_from(&self, id: VNodeId, from: usize) -> Option<T::Handle> {
		let vnode = self.arena.get(id)?;
		let found = vnode
			.children
			.iter()
			.skip(from)
			.flatten()
			.find_map(|&child| self.arena.get(child).and_then(|child| child.dom.clone()));
		match found {
			Some(dom) => Some(dom),
			None if vnode.is_component() => self.dom_sibling(id),
			None => None,
		}
	}

	/// Recomputes the first-target-node pointer of `id`, which must be a component.
	pub fn update_dom_pointer(&mut self, id: VNodeId) {
		let first = {
			let vnode = &self.arena[id];
			vnode
				.children
				.iter()
				.flatten()
				.find_map(|&child| self.arena.get(child).and_then(|child| child.dom.clone()))
		};
		self.arena[id].dom = first;
	}

	/// Propagates a changed first target node of `id` up through its component ancestors.
	pub fn update_parent_dom_pointers(&mut self, id: VNodeId) {
		let mut cursor = self.arena.get(id).and_then(|vnode| vnode.parent);
		while let Some(parent) = cursor {
			if !self.arena[parent].is_component() {
				break;
			}
			self.update_dom_pointer(parent);
			cursor = self.arena[parent].parent;
		}
	}

	/// Runs the queued refs and lifecycle callbacks of this pass, then notifies the target.
	pub fn commit_root(&mut self, root: VNodeId) -> Result<(), RenderError> {
		for QueuedRef { node_ref, value, id } in core::mem::take(&mut self.refs) {
			node_ref.apply(Some(value.clone()));
			if let Some(vnode) = self.arena.get_mut(id) {
				vnode.ref_value = Some(value);
			}
		}

		if let Some(hook) = &self.hooks.commit {
			if let Some(node) = self.hook_node(root) {
				hook(&node);
			}
		}

		for Commit { instance, lifecycle, callbacks } in core::mem::take(&mut self.commits) {
			let handle = instance.handle();
			let result = match &lifecycle {
				Some(Lifecycle::Mounted) => {
					instance.insert_flags(InstanceFlags::MOUNTED);
					instance.behavior.borrow_mut().did_mount(&handle)
				}
				Some(Lifecycle::Updated { prev_element, prev_state }) => instance.behavior.borrow_mut().did_update(&prev_element.props, prev_state, &handle),
				None => Ok(()),
			};
			match result {
				Ok(()) => callbacks.into_iter().for_each(|callback| callback()),
				Err(error) => match instance.vnode.get() {
					Some(id) => self.catch_error(error, id)?,
					None => return Err(error),
				},
			}
		}

		self.target.flushed();
		Ok(())
	}
}

fn take_callbacks(instance: &Instance) -> Vec<Callback> {
	let mut callbacks = instance.render_callbacks.take();
	callbacks.append(&mut instance.state_callbacks.borrow_mut());
	callbacks
}

/// Mounts a fresh node for `node` below `parent`.
pub(crate) fn mount<H>(arena: &mut Arena<H>, node: Node, parent: Option<VNodeId>) -> VNodeId {
	let depth = parent.and_then(|parent| arena.get(parent)).map_or(0, |parent| parent.depth + 1);
	arena.insert(VNode::new(node, parent, depth))
}
