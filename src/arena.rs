//! Storage for the mounted tree.
//!
//! Mounted nodes own their children by [`VNodeId`]. Parent links are plain ids, never used for ownership.
//! Ids carry a generation, so a stale id held past its node's unmount resolves to nothing.

use crate::{
	instance::Instance,
	node::{Node, RefValue},
};
use bitflags::bitflags;
use core::ops::{Index, IndexMut};
use std::rc::Rc;

/// Handle of a mounted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VNodeId {
	index: u32,
	generation: u32,
}

bitflags! {
	/// Per-node diff bookkeeping.
	pub struct NodeFlags: u8 {
		/// The node's target subtree must be (re)inserted during the current children pass.
		const INSERT = 0b001;
		/// The old node was claimed by a new sibling during the current children pass.
		const MATCHED = 0b010;
		/// The node was mounted by claiming existing target nodes.
		const HYDRATE = 0b100;
	}
}

/// A node suspended out of a boundary's output, with the detached holder of its target nodes.
pub(crate) struct Parked<H> {
	pub child: VNodeId,
	pub holder: H,
	pub original_parent: H,
}

pub(crate) struct VNode<H> {
	pub node: Node,
	pub parent: Option<VNodeId>,
	/// Positional slots, [`None`] for empty children.
	pub children: Vec<Option<VNodeId>>,
	pub index: usize,
	pub depth: usize,
	pub flags: NodeFlags,
	/// The own target node, or for components the first target node of their output.
	pub dom: Option<H>,
	/// Components only: where the output is attached.
	pub parent_target: Option<H>,
	pub component: Option<Rc<Instance>>,
	/// The value the node's ref was last attached to.
	pub ref_value: Option<RefValue>,
	pub parked: Option<Parked<H>>,
}
impl<H> VNode<H> {
	pub fn new(node: Node, parent: Option<VNodeId>, depth: usize) -> Self {
		Self {
			node,
			parent,
			children: Vec::new(),
			index: 0,
			depth,
			flags: NodeFlags::empty(),
			dom: None,
			parent_target: None,
			component: None,
			ref_value: None,
			parked: None,
		}
	}

	pub fn is_component(&self) -> bool {
		self.component.is_some()
	}
}

struct Entry<H> {
	generation: u32,
	vnode: Option<VNode<H>>,
}

pub(crate) struct Arena<H> {
	entries: Vec<Entry<H>>,
	free: Vec<u32>,
	live: usize,
}
impl<H> Default for Arena<H> {
	fn default() -> Self {
		Self {
			entries: Vec::new(),
			free: Vec::new(),
			live: 0,
		}
	}
}
impl<H> Arena<H> {
	pub fn insert(&mut self, vnode: VNode<H>) -> VNodeId {
		self.live += 1;
		if let Some(index) = self.free.pop() {
			let entry = &mut self.entries[index as usize];
			entry.generation = entry.generation.wrapping_add(1);
			entry.vnode = Some(vnode);
			VNodeId {
				index,
				generation: entry.generation,
			}
		} else {
			#[allow(clippy::cast_possible_truncation)]
			let index = self.entries.len() as u32;
			self.entries.push(Entry {
				generation: 0,
				vnode: Some(vnode),
			});
			VNodeId { index, generation: 0 }
		}
	}

	pub fn remove(&mut self, id: VNodeId) -> Option<VNode<H>> {
		let entry = self.entries.get_mut(id.index as usize)?;
		if entry.generation != id.generation {
			return None;
		}
		let vnode = entry.vnode.take()?;
		self.free.push(id.index);
		self.live -= 1;
		Some(vnode)
	}

	pub fn get(&self, id: VNodeId) -> Option<&VNode<H>> {
		self.entries
			.get(id.index as usize)
			.filter(|entry| entry.generation == id.generation)
			.and_then(|entry| entry.vnode.as_ref())
	}

	pub fn get_mut(&mut self, id: VNodeId) -> Option<&mut VNode<H>> {
		self.entries
			.get_mut(id.index as usize)
			.filter(|entry| entry.generation == id.generation)
			.and_then(|entry| entry.vnode.as_mut())
	}

	pub fn contains(&self, id: VNodeId) -> bool {
		self.get(id).is_some()
	}

	/// The number of mounted nodes.
	pub fn len(&self) -> usize {
		self.live
	}
}
impl<H> Index<VNodeId> for Arena<H> {
	type Output = VNode<H>;

	fn index(&self, id: VNodeId) -> &Self::Output {
		self.get(id).unwrap_or_else(|| panic!("stale node id {:?}", id))
	}
}
impl<H> IndexMut<VNodeId> for Arena<H> {
	fn index_mut(&mut self, id: VNodeId) -> &mut Self::Output {
		self.get_mut(id).unwrap_or_else(|| panic!("stale node id {:?}", id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stale_ids_resolve_to_nothing() {
		let mut arena = Arena::<()>::default();
		let a = arena.insert(VNode::new(Node::Text("a".into()), None, 0));
		assert!(arena.remove(a).is_some());
		let b = arena.insert(VNode::new(Node::Text("b".into()), None, 0));
		assert_ne!(a, b);
		assert!(arena.get(a).is_none());
		assert!(arena.remove(a).is_none());
		assert_eq!(arena.len(), 1);
	}
}
