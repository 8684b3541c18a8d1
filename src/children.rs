//! Keyed children reconciliation.
//!
//! Matching walks the new children with a running `skew`, so that single insertions and removals shift the
//! expected old position without moving any target nodes. Only matches found further away are moved.

use crate::{
	arena::{NodeFlags, VNodeId},
	component::ComponentType,
	diff::{mount, Differ, Excess, Placement, QueuedRef, Scope},
	error::RenderError,
	node::{Element, Node, NodeType, Ref, RefValue},
	target::Target,
};
use std::rc::Rc;
use tracing::{error, trace, trace_span};

/// An old child as seen by the matching phase.
pub(crate) struct OldChild {
	pub node: Node,
	pub matched: bool,
}

/// Finds the old child `node` should take over, preferring the one at `skewed`.
///
/// An empty old slot at `skewed` matches any unkeyed node. Otherwise, while unmatched old children `remaining`,
/// the nearest unmatched old child with equal key and type is searched, alternating left and right.
pub(crate) fn find_matching_index(node: &Node, old: &[Option<OldChild>], skewed: isize, remaining: usize) -> Option<usize> {
	#[allow(clippy::cast_possible_wrap)]
	let len = old.len() as isize;
	#[allow(clippy::cast_sign_loss)]
	let at = |index: isize| (0..len).contains(&index).then(|| &old[index as usize]);

	let candidate = at(skewed);
	let free = matches!(candidate, Some(Some(child)) if !child.matched);
	match candidate {
		Some(None) if node.key().is_none() => return Some(skewed as usize),
		Some(Some(child)) if free && child.node.matches(node) => return Some(skewed as usize),
		_ => (),
	}

	if remaining > usize::from(free) {
		let (mut left, mut right) = (skewed - 1, skewed + 1);
		while left >= 0 || right < len {
			for index in [left, right] {
				if let Some(Some(child)) = at(index) {
					if !child.matched && child.node.matches(node) {
						#[allow(clippy::cast_sign_loss)]
						return Some(index as usize);
					}
				}
			}
			left -= 1;
			right += 1;
		}
	}
	None
}

fn component_type(element: &Element) -> Option<&ComponentType> {
	match element.node_type() {
		NodeType::Component(ty) => Some(ty),
		_ => None,
	}
}

/// The outcome of matching one new child.
struct Slot {
	id: VNodeId,
	node: Node,
	is_new: bool,
}

impl<T: Target> Differ<'_, T> {
	/// Reconciles the children of `parent` with `children`, inserting target nodes into `scope.parent_dom` before `anchor`.
	///
	/// Returns the anchor for whatever follows these children.
	pub(crate) fn diff_children(
		&mut self,
		parent: VNodeId,
		children: Vec<Option<Node>>,
		scope: Scope<'_, T::Handle>,
		mut anchor: Option<T::Handle>,
		excess: &mut Excess<T::Handle>,
	) -> Result<Option<T::Handle>, RenderError> {
		let span = trace_span!("Diffing children", ?parent, new = children.len());
		let _enter = span.enter();

		if self.arena[parent].depth >= self.max_depth {
			error!("Depth limit reached");
			return Ok(anchor);
		}

		let slots = self.match_children(parent, children, &mut anchor);
		self.arena[parent].children = slots.iter().map(|slot| slot.as_ref().map(|slot| slot.id)).collect();

		let parent_is_component = self.arena[parent].is_component();
		let mut first_dom = None;
		for (index, slot) in slots.into_iter().enumerate() {
			let Slot { id, node, is_new } = match slot {
				Some(slot) => slot,
				None => continue,
			};
			self.arena[id].index = index;
			let old_ref = if is_new {
				None
			} else {
				self.arena[id].node.element().and_then(|element| element.node_ref.clone())
			};

			let placement = self.diff(id, node, scope, anchor.clone(), excess, false)?;

			self.queue_ref(id, old_ref);

			let (dom, should_place) = {
				let vnode = &self.arena[id];
				(vnode.dom.clone(), vnode.flags.contains(NodeFlags::INSERT))
			};
			if first_dom.is_none() {
				first_dom = dom.clone();
			}
			anchor = match placement {
				_ if should_place => self.insert(id, anchor, scope.parent_dom, true),
				Placement::Skipped => self.insert(id, anchor, scope.parent_dom, false),
				Placement::Component(next) => next,
				Placement::Element => match dom {
					Some(dom) => self.target.next_sibling(&dom),
					None => anchor,
				},
			};
			self.arena[id].flags.remove(NodeFlags::INSERT | NodeFlags::MATCHED);
		}

		if parent_is_component {
			self.arena[parent].dom = first_dom;
		}
		Ok(anchor)
	}

	/// Pairs new children with old ones, allocating fresh nodes for the rest, and unmounts unmatched old children.
	fn match_children(&mut self, parent: VNodeId, children: Vec<Option<Node>>, anchor: &mut Option<T::Handle>) -> Vec<Option<Slot>> {
		let old_ids = self.arena[parent].children.clone();
		let mut old: Vec<Option<OldChild>> = old_ids
			.iter()
			.map(|id| {
				id.and_then(|id| self.arena.get(id)).map(|vnode| OldChild {
					node: vnode.node.clone(),
					matched: false,
				})
			})
			.collect();

		let (old_len, new_len) = (old.len(), children.len());
		let mut remaining = old_len;
		let mut skew: isize = 0;
		let mut slots = Vec::with_capacity(new_len);

		for (index, node) in children.into_iter().enumerate() {
			let node = match node {
				Some(node) => node,
				None => {
					slots.push(None);
					continue;
				}
			};

			#[allow(clippy::cast_possible_wrap)]
			let skewed = index as isize + skew;
			let matching = find_matching_index(&node, &old, skewed, remaining);

			let mut reused = None;
			if let Some(matching) = matching {
				remaining -= 1;
				if let (Some(child), Some(id)) = (&mut old[matching], old_ids[matching]) {
					child.matched = true;
					self.arena[id].flags.insert(NodeFlags::MATCHED);
					reused = Some(id);
				}
			}

			let mut insert = false;
			match (reused, matching) {
				(None, _) => {
					if matching.is_none() {
						if new_len > old_len {
							skew -= 1;
						} else if new_len < old_len {
							skew += 1;
						}
					}
					insert = node.element().map_or(true, |element| component_type(element).is_none());
				}
				#[allow(clippy::cast_possible_wrap)]
				(Some(_), Some(matching)) if matching as isize != skewed => {
					let matching = matching as isize;
					if matching == skewed - 1 {
						skew -= 1;
					} else if matching == skewed + 1 {
						skew += 1;
					} else {
						if matching > skewed {
							skew -= 1;
						} else {
							skew += 1;
						}
						insert = true;
					}
				}
				_ => (),
			}

			let (id, is_new) = match reused {
				Some(id) => {
					let depth = self.arena[parent].depth + 1;
					let vnode = &mut self.arena[id];
					vnode.parent = Some(parent);
					vnode.depth = depth;
					(id, false)
				}
				None => (mount(self.arena, node.clone(), Some(parent)), true),
			};
			if insert {
				self.arena[id].flags.insert(NodeFlags::INSERT);
			}
			trace!(index, ?matching, skew, insert, "Matched child.");
			slots.push(Some(Slot { id, node, is_new }));
		}

		if remaining > 0 {
			for &id in old_ids.iter().flatten() {
				let unmatched = self.arena.get(id).map_or(false, |vnode| !vnode.flags.contains(NodeFlags::MATCHED));
				if unmatched {
					if self.arena[id].dom.is_some() && self.arena[id].dom == *anchor {
						*anchor = self.dom_sibling(id);
					}
					self.unmount(id, false);
				}
			}
		}
		slots
	}

	/// Detaches a replaced ref right away and queues the new one for the commit phase.
	fn queue_ref(&mut self, id: VNodeId, old_ref: Option<Ref>) {
		let vnode = &mut self.arena[id];
		let element = match vnode.node.element() {
			Some(element) => element.clone(),
			None => return,
		};
		let new_ref = match (&element.node_ref, component_type(&element)) {
			(Some(_), Some(ty)) if ty.capabilities().forwards_ref => None,
			(node_ref, _) => node_ref.clone(),
		};
		let changed = match (&old_ref, &new_ref) {
			(Some(old), Some(new)) => !old.same(new),
			(None, None) => false,
			_ => true,
		};
		if !changed {
			return;
		}

		if let Some(old_ref) = old_ref {
			match vnode.ref_value.take() {
				Some(value) => old_ref.detach(&value),
				None => old_ref.apply(None),
			}
		}
		if let Some(node_ref) = new_ref {
			let value = match (&vnode.component, &vnode.dom) {
				(Some(instance), _) => RefValue::Component(instance.handle()),
				(None, Some(dom)) => RefValue::Target(Rc::new(dom.clone())),
				(None, None) => return,
			};
			self.refs.push(QueuedRef { node_ref, value, id });
		}
	}

	/// Moves the target nodes of `id` before `anchor` if `should_place`, and returns the anchor for its next sibling.
	///
	/// Components are placed child by child.
	pub(crate) fn insert(&mut self, id: VNodeId, mut anchor: Option<T::Handle>, parent_dom: &T::Handle, should_place: bool) -> Option<T::Handle> {
		let (children, dom) = match self.arena.get(id) {
			// Components still holding on to server markup have no children yet and stand in for it.
			Some(vnode) if vnode.is_component() && !vnode.flags.contains(NodeFlags::HYDRATE) => (Some(vnode.children.clone()), None),
			Some(vnode) => (None, vnode.dom.clone()),
			None => return anchor,
		};
		if let Some(children) = children {
			for child in children.into_iter().flatten() {
				anchor = self.insert(child, anchor, parent_dom, should_place);
			}
			return anchor;
		}

		let dom = match dom {
			Some(dom) => dom,
			None => return anchor,
		};
		if anchor.as_ref() != Some(&dom) {
			if should_place {
				if let Some(current) = &anchor {
					if self.target.parent(current).as_ref() != Some(parent_dom) {
						anchor = self.dom_sibling(id);
					}
				}
				trace!(?dom, ?anchor, "Placing node.");
				self.target.insert_before(parent_dom, &dom, anchor.as_ref());
			}
			anchor = Some(dom);
		}
		anchor.and_then(|anchor| self.target.next_sibling(&anchor))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::node::to_child_array;

	fn keyed(keys: &[i64]) -> Vec<Node> {
		keys.iter().map(|&key| to_child_array(&Element::tag("li").key(key).build()).remove(0)).collect()
	}

	fn old(nodes: &[Node]) -> Vec<Option<OldChild>> {
		nodes
			.iter()
			.map(|node| {
				Some(OldChild {
					node: node.clone(),
					matched: false,
				})
			})
			.collect()
	}

	#[test]
	fn exact_position_wins() {
		let nodes = keyed(&[1, 2, 3]);
		assert_eq!(find_matching_index(&nodes[1], &old(&nodes), 1, 3), Some(1));
	}

	#[test]
	fn nearest_match_is_found_on_either_side() {
		let nodes = keyed(&[1, 2, 3, 4]);
		let old = old(&nodes);
		assert_eq!(find_matching_index(&nodes[0], &old, 2, 4), Some(0));
		assert_eq!(find_matching_index(&nodes[3], &old, 1, 4), Some(3));
		assert_eq!(find_matching_index(&nodes[3], &old, 7, 4), Some(3));
		assert_eq!(find_matching_index(&nodes[0], &old, -3, 4), Some(0));
	}

	#[test]
	fn matched_children_are_skipped() {
		let nodes = keyed(&[1, 1]);
		let mut old = old(&nodes);
		old[0].as_mut().unwrap().matched = true;
		assert_eq!(find_matching_index(&nodes[0], &old, 0, 1), Some(1));
	}

	#[test]
	fn no_search_without_remaining_children() {
		let nodes = keyed(&[1, 2]);
		let old = old(&nodes);
		assert_eq!(find_matching_index(&nodes[1], &old, 0, 1), None);
	}

	#[test]
	fn empty_slots_match_unkeyed_nodes_only() {
		let text = to_child_array(&"a".into()).remove(0);
		let keyed = keyed(&[1]).remove(0);
		let old = vec![None];
		assert_eq!(find_matching_index(&text, &old, 0, 1), Some(0));
		assert_eq!(find_matching_index(&keyed, &old, 0, 1), None);
		assert_eq!(find_matching_index(&text, &old, 1, 1), None);
	}

	#[test]
	fn keys_and_types_must_both_match() {
		let li = keyed(&[1]).remove(0);
		let p = to_child_array(&Element::tag("p").key(1).build()).remove(0);
		assert_eq!(find_matching_index(&p, &old(&[li]), 0, 1), None);
	}
}
