//! The entry points: rendering into containers and flushing scheduled updates.

use crate::{
	arena::{Arena, VNodeId},
	component::fragment_type,
	diff::{mount, Differ, Excess, Scope},
	error::RenderError,
	hooks::Hooks,
	instance::{ComponentHandle, ContextMap, Instance, InstanceFlags},
	node::{Child, Element, Node},
	scheduler::{Debounce, Scheduler},
	target::Target,
};
use core::fmt::{self, Debug, Formatter};
use std::rc::{Rc, Weak};
use tracing::{debug, error, instrument, trace, warn};

/// How a [`Renderer`] schedules and observes its work.
#[derive(Clone)]
pub struct RendererOptions {
	/// Called once per batch when the render queue needs a [`Renderer::flush`].
	///
	/// There is no ambient microtask queue outside a JS host, so the default does nothing and the host has to flush.
	/// Renderers over [`DomTarget`](`crate::dom::DomTarget`) can defer the flush to a microtask with
	/// [`microtask_debounce`](`crate::dom::microtask_debounce`).
	pub debounce: Debounce,
	pub hooks: Hooks,
	/// Nesting below this depth is not rendered.
	pub max_depth: usize,
}
impl Default for RendererOptions {
	fn default() -> Self {
		Self {
			debounce: Rc::new(|| ()),
			hooks: Hooks::default(),
			max_depth: 256,
		}
	}
}

/// Reconciles [`Child`] descriptions into containers of a [`Target`] tree.
///
/// Each container remembers the tree last rendered into it, so that the next [`render_tree`](`Renderer::render_tree`)
/// call only applies the differences.
pub struct Renderer<T: Target> {
	target: T,
	arena: Arena<T::Handle>,
	roots: Vec<(T::Handle, VNodeId)>,
	scheduler: Rc<Scheduler>,
	hooks: Hooks,
	max_depth: usize,
}
impl<T: Target> Renderer<T> {
	pub fn new(target: T) -> Self {
		Self::with_options(target, RendererOptions::default())
	}

	pub fn with_options(target: T, options: RendererOptions) -> Self {
		let RendererOptions { debounce, hooks, max_depth } = options;
		Self {
			target,
			arena: Arena::default(),
			roots: Vec::new(),
			scheduler: Scheduler::new(debounce),
			hooks,
			max_depth,
		}
	}

	#[must_use]
	pub fn target(&self) -> &T {
		&self.target
	}

	pub fn target_mut(&mut self) -> &mut T {
		&mut self.target
	}

	#[must_use]
	pub fn scheduler(&self) -> &Rc<Scheduler> {
		&self.scheduler
	}

	pub fn hooks_mut(&mut self) -> &mut Hooks {
		&mut self.hooks
	}

	/// How many nodes are currently mounted across all containers.
	#[must_use]
	pub fn mounted_nodes(&self) -> usize {
		self.arena.len()
	}

	/// Renders `child` into `container`, updating whatever was rendered there before.
	///
	/// Target nodes already in a container without a previous render are reused where their tag or text kind fits.
	/// Scheduled updates are not flushed.
	///
	/// # Errors
	///
	/// Iff a failure reached the root without being handled by a boundary.
	/// A failed first render leaves nothing mounted. A failed update may leave the container partially updated.
	#[instrument(skip(self, child))]
	pub fn render_tree(&mut self, child: impl Into<Child>, container: &T::Handle) -> Result<(), RenderError> {
		self.render_root(child.into(), container, false)
	}

	/// Like [`render_tree`](`Renderer::render_tree`), but adopts the container's existing target nodes in order,
	/// assuming they were produced from the same description elsewhere.
	///
	/// Properties are applied in full. Mismatching text is patched and unclaimed nodes are removed afterwards.
	///
	/// # Errors
	///
	/// See [`render_tree`](`Renderer::render_tree`).
	#[instrument(skip(self, child))]
	pub fn hydrate_tree(&mut self, child: impl Into<Child>, container: &T::Handle) -> Result<(), RenderError> {
		if let Some(root) = self.take_root(container) {
			warn!("Hydrating a container that was rendered into before. Dropping the previous tree.");
			self.differ().unmount(root, true);
		}
		self.render_root(child.into(), container, true)
	}

	/// Unmounts everything rendered into `container`.
	#[instrument(skip(self))]
	pub fn unmount_tree(&mut self, container: &T::Handle) {
		if let Some(hook) = &self.hooks.root {
			hook(&Child::Empty);
		}
		match self.take_root(container) {
			Some(root) => {
				let mut differ = self.differ();
				differ.unmount(root, false);
				differ.target.flushed();
			}
			None => trace!("Nothing to unmount."),
		}
	}

	fn take_root(&mut self, container: &T::Handle) -> Option<VNodeId> {
		let index = self.roots.iter().position(|(root_container, _)| root_container == container)?;
		Some(self.roots.swap_remove(index).1)
	}

	fn differ(&mut self) -> Differ<'_, T> {
		Differ::new(&mut self.target, &mut self.arena, &self.scheduler, &self.hooks, self.max_depth)
	}

	fn render_root(&mut self, child: Child, container: &T::Handle, hydrating: bool) -> Result<(), RenderError> {
		if let Some(hook) = &self.hooks.root {
			hook(&child);
		}

		let root_element = Element::component(&fragment_type()).child(child).finish();
		let old_root = self.roots.iter().find(|(root_container, _)| root_container == container).map(|&(_, root)| root);

		let mut excess: Excess<T::Handle> = match old_root {
			Some(_) => None,
			None => {
				let existing = self.target.child_nodes(container);
				(!existing.is_empty()).then(|| existing.into_iter().map(Some).collect())
			}
		};
		let anchor = match (&excess, old_root) {
			(Some(excess), _) => excess.first().cloned().flatten(),
			(None, Some(root)) => self.arena.get(root).and_then(|root| root.dom.clone()),
			(None, None) => self.target.first_child(container),
		};

		let contexts = ContextMap::default();
		let mut differ = self.differ();
		let root = match old_root {
			Some(root) => root,
			None => mount(differ.arena, Node::Element(root_element.clone()), None),
		};
		let scope = Scope {
			parent_dom: container,
			contexts: &contexts,
			hydrating,
		};
		let result = differ.diff(root, Node::Element(root_element), scope, anchor, &mut excess, false).and_then(|_| {
			for leftover in excess.into_iter().flatten().flatten() {
				trace!(?leftover, "Removing unclaimed target node.");
				differ.target.remove(&leftover);
			}
			differ.commit_root(root)
		});

		if let Err(error) = &result {
			error!(%error, "Unhandled render failure.");
			if old_root.is_none() {
				differ.unmount(root, false);
				differ.target.flushed();
			}
			return result;
		}
		if old_root.is_none() {
			self.roots.push((container.clone(), root));
		}
		Ok(())
	}

	/// Renders every component with a scheduled update, shallowest first, and resumes settled suspense boundaries.
	///
	/// Components that were re-rendered by an ancestor in the meantime are skipped.
	///
	/// # Errors
	///
	/// Iff a failure reached a root without being handled. The rest of the queue stays scheduled.
	#[instrument(skip(self))]
	pub fn flush(&mut self) -> Result<(), RenderError> {
		debug!(queued = self.scheduler.len(), "Flushing render queue.");
		let mut sorted_len = 1;
		let result = loop {
			for boundary in self.scheduler.take_settled().iter().filter_map(Weak::upgrade) {
				self.differ().settle_suspension(&boundary);
			}
			match self.scheduler.pop(&mut sorted_len) {
				Some(instance) => {
					if instance.has(InstanceFlags::UNMOUNTED) || !instance.has(InstanceFlags::DIRTY) {
						trace!(component = instance.ty.name(), "Skipping stale queue entry.");
						continue;
					}
					if let Err(error) = self.rerender(&instance) {
						error!(%error, "Unhandled render failure.");
						break Err(error);
					}
				}
				None if self.scheduler.is_empty() => break Ok(()),
				None => (),
			}
		};
		self.scheduler.reset_render_count();
		result
	}

	/// Re-renders a mounted component right away, regardless of whether it was scheduled.
	///
	/// # Errors
	///
	/// Iff the render failed and no boundary handled it.
	pub fn render_component(&mut self, handle: &ComponentHandle) -> Result<(), RenderError> {
		match handle.instance() {
			Some(instance) if instance.is_mounted() => self.rerender(&instance),
			_ => Ok(()),
		}
	}

	fn rerender(&mut self, instance: &Rc<Instance>) -> Result<(), RenderError> {
		let id = match instance.vnode.get() {
			Some(id) if self.arena.contains(id) => id,
			_ => {
				instance.remove_flags(InstanceFlags::DIRTY);
				return Ok(());
			}
		};
		let (parent_dom, old_dom) = {
			let vnode = &self.arena[id];
			(vnode.parent_target.clone(), vnode.dom.clone())
		};
		let parent_dom = match parent_dom {
			Some(parent_dom) => parent_dom,
			None => {
				error!(component = instance.ty.name(), "Mounted component without target parent.");
				return Ok(());
			}
		};
		let element = instance.element.borrow().clone();
		let contexts = instance.contexts.borrow().clone();

		let mut differ = self.differ();
		let anchor = old_dom.clone().or_else(|| differ.dom_sibling(id));
		let scope = Scope {
			parent_dom: &parent_dom,
			contexts: &contexts,
			hydrating: false,
		};
		differ.diff(id, Node::Element(element), scope, anchor, &mut None, true)?;
		differ.commit_root(id)?;

		if differ.arena.get(id).map_or(false, |vnode| vnode.dom != old_dom) {
			differ.update_parent_dom_pointers(id);
		}
		Ok(())
	}
}
impl<T: Target + Debug> Debug for Renderer<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Renderer")
			.field("target", &self.target)
			.field("roots", &self.roots)
			.field("mounted_nodes", &self.arena.len())
			.field("scheduler", &self.scheduler)
			.field("max_depth", &self.max_depth)
			.finish()
	}
}
