//! The render queue.
//!
//! A [`Scheduler`] collects dirty component instances and asks its [`Debounce`] to get [`Renderer::flush`](`crate::Renderer::flush`)
//! called eventually. Each [`Renderer`](`crate::Renderer`) owns one, so independent trees never share a queue.

use crate::instance::{Instance, InstanceFlags};
use core::fmt::{self, Debug, Formatter};
use std::{
	cell::{Cell, RefCell},
	rc::{Rc, Weak},
};
use tracing::trace;

/// Requests a flush. Must not flush synchronously, since it's called mid-render.
pub type Debounce = Rc<dyn Fn()>;

pub struct Scheduler {
	queue: RefCell<Vec<Rc<Instance>>>,
	/// Non-zero while a flush is requested or running.
	render_count: Cell<usize>,
	debounce: RefCell<Debounce>,
	prev_debounce: RefCell<Option<Debounce>>,
	/// Suspense boundaries of which one pending value settled since the last flush.
	settled: RefCell<Vec<Weak<Instance>>>,
}
impl Scheduler {
	#[must_use]
	pub fn new(debounce: Debounce) -> Rc<Self> {
		Rc::new(Self {
			queue: RefCell::default(),
			render_count: Cell::new(0),
			debounce: RefCell::new(debounce),
			prev_debounce: RefCell::new(None),
			settled: RefCell::default(),
		})
	}

	/// Replaces the flush requester. The next enqueue calls the new one even if a flush is pending already.
	pub fn set_debounce(&self, debounce: Debounce) {
		*self.debounce.borrow_mut() = debounce;
	}

	/// Makes the next enqueue request a flush.
	pub fn reset_render_count(&self) {
		self.render_count.set(0);
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.queue.borrow().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.queue.borrow().is_empty() && self.settled.borrow().is_empty()
	}

	/// Queues `instance` unless it is dirty already.
	pub(crate) fn enqueue(&self, instance: &Rc<Instance>) {
		let mut request = false;
		if !instance.has(InstanceFlags::DIRTY) {
			instance.insert_flags(InstanceFlags::DIRTY);
			self.queue.borrow_mut().push(instance.clone());
			let count = self.render_count.get();
			self.render_count.set(count + 1);
			request = count == 0;
			trace!(component = instance.ty.name(), queued = self.len(), "Enqueued render.");
		}
		self.request(request);
	}

	/// Records that a pending value `boundary` waited on has settled.
	pub(crate) fn settle(&self, boundary: Weak<Instance>) {
		self.settled.borrow_mut().push(boundary);
		let count = self.render_count.get();
		self.render_count.set(count + 1);
		self.request(count == 0);
	}

	fn request(&self, mut request: bool) {
		let debounce = self.debounce.borrow().clone();
		{
			let mut prev_debounce = self.prev_debounce.borrow_mut();
			if prev_debounce.as_ref().map_or(true, |prev| !same_fn(prev, &debounce)) {
				request = true;
				*prev_debounce = Some(debounce.clone());
			}
		}
		if request {
			debounce();
		}
	}

	pub(crate) fn take_settled(&self) -> Vec<Weak<Instance>> {
		self.settled.take()
	}

	/// Pops the shallowest queued instance. `sorted_len` is the queue length after the previous pop.
	///
	/// The queue is only re-sorted if it grew since. The sort is stable, so equal depths keep their insertion order.
	pub(crate) fn pop(&self, sorted_len: &mut usize) -> Option<Rc<Instance>> {
		let mut queue = self.queue.borrow_mut();
		if queue.is_empty() {
			return None;
		}
		if queue.len() > *sorted_len {
			queue.sort_by_key(|instance| instance.depth.get());
		}
		let instance = queue.remove(0);
		*sorted_len = queue.len();
		Some(instance)
	}
}
impl Debug for Scheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Scheduler")
			.field("queue", &self.queue.borrow())
			.field("render_count", &self.render_count.get())
			.field("settled", &self.settled.borrow().len())
			.finish()
	}
}

fn same_fn(a: &Debounce, b: &Debounce) -> bool {
	Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}
