//! Replaceable extension points for devtools and other collaborators.
//!
//! Each slot holds at most one callback. `chain_*` keeps the previous callback and runs it first.

use crate::{
	arena::VNodeId,
	error::RenderError,
	node::{Child, Key},
};
use std::rc::Rc;

/// What a hook gets to see of a mounted node.
#[derive(Debug, Clone)]
pub struct HookNode {
	pub id: VNodeId,
	pub depth: usize,
	pub key: Option<Key>,
	/// The tag, component name or `#text`.
	pub name: String,
}

pub type NodeHook = Rc<dyn Fn(&HookNode)>;
pub type RootHook = Rc<dyn Fn(&Child)>;
pub type ErrorHook = Rc<dyn Fn(&RenderError, &HookNode)>;

#[derive(Clone, Default)]
pub struct Hooks {
	/// Before a root description is rendered into its container.
	pub root: Option<RootHook>,
	/// Before a node is diffed.
	pub diff: Option<NodeHook>,
	/// After a node was diffed successfully.
	pub diffed: Option<NodeHook>,
	/// Before a component renders.
	pub render: Option<NodeHook>,
	/// After a pass was committed, with the node the pass started at.
	pub commit: Option<NodeHook>,
	/// Before a node is unmounted.
	pub unmount: Option<NodeHook>,
	/// When a render failure starts propagating from a node.
	pub catch_error: Option<ErrorHook>,
}

macro_rules! chain {
	($($name:ident => $slot:ident: $hook:ty, ($($arg:ident: $arg_ty:ty),*);)*) => {
		impl Hooks {
			$(
				#[doc = concat!("Installs `hook` in the `", stringify!($slot), "` slot, after whatever was there.")]
				pub fn $name(&mut self, hook: impl Fn($($arg_ty),*) + 'static) -> &mut Self {
					let previous = self.$slot.take();
					self.$slot = Some(match previous {
						Some(previous) => Rc::new(move |$($arg: $arg_ty),*| {
							previous($($arg),*);
							hook($($arg),*);
						}) as $hook,
						None => Rc::new(hook),
					});
					self
				}
			)*
		}
	};
}

chain! {
	chain_root => root: RootHook, (child: &Child);
	chain_diff => diff: NodeHook, (node: &HookNode);
	chain_diffed => diffed: NodeHook, (node: &HookNode);
	chain_render => render: NodeHook, (node: &HookNode);
	chain_commit => commit: NodeHook, (node: &HookNode);
	chain_unmount => unmount: NodeHook, (node: &HookNode);
	chain_catch_error => catch_error: ErrorHook, (error: &RenderError, node: &HookNode);
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::RefCell;

	#[test]
	fn chained_hooks_run_in_installation_order() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let mut hooks = Hooks::default();
		hooks
			.chain_root({
				let log = log.clone();
				move |_| log.borrow_mut().push(1)
			})
			.chain_root({
				let log = log.clone();
				move |_| log.borrow_mut().push(2)
			});
		(hooks.root.as_ref().unwrap())(&Child::Empty);
		assert_eq!(*log.borrow(), vec![1, 2]);
	}
}
