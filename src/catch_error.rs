//! Routing render failures to suspense boundaries and error boundaries.

use crate::{
	arena::VNodeId,
	diff::Differ,
	error::RenderError,
	instance::{Instance, InstanceFlags},
	suspense::child_did_suspend,
	target::Target,
};
use std::rc::Rc;
use tracing::{debug, warn};

impl<T: Target> Differ<'_, T> {
	/// Offers `error`, raised by the node `id`, to the nearest ancestor able to handle it.
	///
	/// Pending values go to the nearest suspense boundary. Anything else goes to the nearest component that reacts
	/// to it by scheduling an update, skipping components that are currently recovering from an earlier failure.
	/// If [`did_catch`](`crate::Component::did_catch`) fails, that error continues upwards instead.
	///
	/// # Errors
	///
	/// Returns the error if no ancestor handled it.
	pub(crate) fn catch_error(&mut self, mut error: RenderError, id: VNodeId) -> Result<(), RenderError> {
		if let Some(hook) = &self.hooks.catch_error {
			if let Some(node) = self.hook_node(id) {
				hook(&error, &node);
			}
		}

		if let Some(pending) = error.pending_value().cloned() {
			if let Some(boundary) = self.ancestors(id).find(|instance| instance.ty.capabilities().child_suspend_handler) {
				let suspender = self.arena.get(id).and_then(|vnode| vnode.component.clone());
				child_did_suspend(&boundary, &pending, suspender.as_ref(), self.is_hydrating(id));
				return Ok(());
			}
			warn!("Pending value without surrounding suspense boundary.");
		}

		for instance in self.ancestors(id).collect::<Vec<_>>() {
			if instance.has(InstanceFlags::PROCESSING_EXCEPTION | InstanceFlags::UNMOUNTED) {
				continue;
			}
			let forced = instance.has(InstanceFlags::FORCE);
			instance.insert_flags(InstanceFlags::FORCE);
			let before = instance.updates.get();

			let derived = instance.behavior.borrow().derive_state_from_error(&error);
			if let Some(state) = derived {
				instance.update_state(move |_, _| Some(state), None);
			}
			let handle = instance.handle();
			let caught = instance.behavior.borrow_mut().did_catch(&error, &handle);
			match caught {
				Ok(()) if instance.updates.get() != before => {
					debug!(boundary = instance.ty.name(), "Error handled.");
					instance.insert_flags(InstanceFlags::PENDING_ERROR);
					return Ok(());
				}
				Ok(()) => (),
				Err(next) => {
					debug!(boundary = instance.ty.name(), "Error handler failed.");
					error = next;
				}
			}
			if !forced {
				instance.remove_flags(InstanceFlags::FORCE);
			}
		}

		self.scheduler.reset_render_count();
		Err(error)
	}

	/// The component instances above `id`, nearest first.
	fn ancestors(&self, id: VNodeId) -> impl Iterator<Item = Rc<Instance>> + '_ {
		let mut cursor = self.arena.get(id).and_then(|vnode| vnode.parent);
		core::iter::from_fn(move || loop {
			let vnode = self.arena.get(cursor?)?;
			cursor = vnode.parent;
			if let Some(instance) = &vnode.component {
				return Some(instance.clone());
			}
		})
	}
}
