//! Arena-backed node tree with identity resolution.
//!
//! All nodes of one resolution live in a single [Tree]. Ownership is expressed through child id lists,
//! so a node is reachable from at most one parent, and re-parenting is a detach followed by an attach.
//!
//! Identity is resolved through three overlapping keys, strongest first:
//! - `id`: exact, for nodes that carry a stable external identifier
//! - `url`: exact, for identified nodes that also carry a link
//! - the unidentified bucket: nodes without an id, matched late by equal title or equal url
//!
//! Merging is first-writer-wins: a field that is already set is never overwritten.

use std::collections::HashMap;

use tracing::debug;

use crate::{
	Error, Link, Node, Result,
	node::sibling_cmp,
};

/// Stable handle of a node inside its [Tree].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Slot {
	/// Own fields only. `node.children` is always empty, structure lives in `children`.
	node: Node,
	children: Vec<NodeId>,
	parent: Option<NodeId>,
}

/// One root plus every node discovered while building it, and the identity indices.
#[derive(Debug)]
pub struct Tree {
	slots: Vec<Slot>,
	root: NodeId,
	by_id: HashMap<String, NodeId>,
	by_url: HashMap<String, NodeId>,
	/// Nodes without an id, kept for matching by title or url.
	unidentified: Vec<NodeId>,
}

impl Default for Tree {
	fn default() -> Self {
		Self::new()
	}
}

impl Tree {
	/// Tree with an empty proxy root.
	pub fn new() -> Self {
		Self {
			slots: vec![Slot {
				node: Node::default(),
				children: Vec::new(),
				parent: None,
			}],
			root: NodeId(0),
			by_id: HashMap::new(),
			by_url: HashMap::new(),
			unidentified: Vec::new(),
		}
	}

	pub fn root(&self) -> NodeId {
		self.root
	}

	/// Own fields of a node. The returned node has no children, see [Tree::children].
	pub fn get(&self, id: NodeId) -> &Node {
		&self.slots[id.0].node
	}

	pub fn children(&self, id: NodeId) -> &[NodeId] {
		&self.slots[id.0].children
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.slots[id.0].parent
	}

	/// Number of nodes ever created, including collapsed proxies.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.len() == 1 && self.slots[0].children.is_empty()
	}

	pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
		self.by_id.get(id).copied()
	}

	/// The node [Tree::register] would merge `candidate` into, without merging.
	pub fn find(&self, candidate: &Node) -> Option<NodeId> {
		if let Some(&id) = candidate.id.as_deref().and_then(|k| self.by_id.get(k)) {
			return Some(id);
		}
		if let Some(&id) = candidate.url().and_then(|u| self.by_url.get(u)) {
			return Some(id);
		}
		self.unidentified.iter().copied().find(|&id| weak_match(&self.slots[id.0].node, candidate))
	}

	/// Upsert: find the node the candidate describes and merge into it, or make the candidate canonical.
	///
	/// Children of the candidate are registered and attached too, unless an existing match already has children.
	pub fn register(&mut self, mut candidate: Node) -> Result<NodeId> {
		let children = std::mem::take(&mut candidate.children);
		let (id, adopt_children) = match self.find(&candidate) {
			Some(existing) => {
				debug!(node = %self.label(existing), "merging into existing node");
				let adopt = self.slots[existing.0].children.is_empty();
				self.merge(existing, &candidate);
				(existing, adopt)
			}
			None => (self.push_indexed(candidate), true),
		};
		if adopt_children {
			for child in children {
				let child = self.register(child)?;
				self.attach(id, child)?;
			}
		} else if !children.is_empty() {
			debug!(node = %self.label(id), dropped = children.len(), "existing node already has children, keeping them");
		}
		Ok(id)
	}

	/// Add a node without identity lookup or indexing. Its children are inserted the same way.
	pub fn insert(&mut self, mut node: Node) -> Result<NodeId> {
		let children = std::mem::take(&mut node.children);
		let id = self.push(node);
		for child in children {
			let child = self.insert(child)?;
			self.attach(id, child)?;
		}
		Ok(id)
	}

	/// Fill every unset field of `id` from `candidate`. Children are not touched.
	pub fn merge(&mut self, id: NodeId, candidate: &Node) {
		let node = &mut self.slots[id.0].node;
		if node.id.is_none() {
			node.id = candidate.id.clone();
		}
		if node.title.is_empty() {
			node.title = candidate.title.clone();
		}
		if node.description.is_empty() {
			node.description = candidate.description.clone();
		}
		match (&mut node.link, &candidate.link) {
			(None, Some(l)) => node.link = Some(l.clone()),
			(Some(own), Some(l)) => {
				if own.title.is_empty() {
					own.title = l.title.clone();
				}
				if own.url.is_empty() {
					own.url = l.url.clone();
				}
			}
			_ => {}
		}
		if node.links.is_empty() {
			node.links = candidate.links.clone();
		}
		if node.priority.is_none() {
			node.priority = candidate.priority;
		}
		if node.progress.is_none() {
			node.progress = candidate.progress;
		}
		if node.parent_ref.is_none() {
			node.parent_ref = candidate.parent_ref.clone();
		}
		self.reindex(id);
	}

	pub fn set_parent_ref(&mut self, id: NodeId, parent: Option<Link>) {
		self.slots[id.0].node.parent_ref = parent;
	}

	/// Replace the title of the node's link. The url, and so the identity, is unchanged.
	pub fn set_link_title(&mut self, id: NodeId, title: impl Into<String>) {
		let node = &mut self.slots[id.0].node;
		node.link.get_or_insert_with(Link::default).title = title.into();
	}

	/// Append a paragraph to the description, newline separated.
	pub fn append_description(&mut self, id: NodeId, text: &str) {
		if text.is_empty() {
			return;
		}
		let desc = &mut self.slots[id.0].node.description;
		if !desc.is_empty() {
			desc.push('\n');
		}
		desc.push_str(text);
	}

	/// Make `child` the last child of `parent`, detaching it from its previous parent.
	///
	/// Attaching a node under itself or under one of its descendants is a [Error::Cycle].
	pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
		if self.slots[child.0].parent == Some(parent) {
			return Ok(());
		}
		if self.is_ancestor(child, parent) {
			return Err(Error::Cycle {
				node: self.label(child),
				parent: self.label(parent),
			});
		}
		self.detach(child);
		self.slots[parent.0].children.push(child);
		self.slots[child.0].parent = Some(parent);
		debug_assert_eq!(self.slots[parent.0].children.iter().filter(|&&c| c == child).count(), 1);
		Ok(())
	}

	/// Remove `child` from its parent's children. The node itself stays in the tree.
	pub fn detach(&mut self, child: NodeId) {
		if let Some(parent) = self.slots[child.0].parent.take() {
			self.slots[parent.0].children.retain(|&c| c != child);
		}
	}

	/// Whether `ancestor` is `id` itself or lies on the path from `id` up to its top-most parent.
	pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
		let mut cur = Some(id);
		while let Some(n) = cur {
			if n == ancestor {
				return true;
			}
			cur = self.slots[n.0].parent;
		}
		false
	}

	/// Sort direct children by priority, then title.
	pub fn sort_children(&mut self, id: NodeId) {
		let mut children = std::mem::take(&mut self.slots[id.0].children);
		children.sort_by(|a, b| sibling_cmp(&self.slots[a.0].node, &self.slots[b.0].node));
		self.slots[id.0].children = children;
	}

	/// Replace every proxy below `id` that has exactly one child by that child, in place.
	pub fn collapse_proxies(&mut self, id: NodeId) {
		let children = self.slots[id.0].children.clone();
		for child in &children {
			self.collapse_proxies(*child);
		}
		let mut collapsed = Vec::with_capacity(children.len());
		for child in children {
			let slot = &self.slots[child.0];
			if slot.node.is_proxy() && slot.children.len() == 1 {
				let grandchild = slot.children[0];
				debug!(parent = %self.label(id), promoted = %self.label(grandchild), "collapsing proxy node");
				self.slots[child.0].children.clear();
				self.slots[child.0].parent = None;
				self.slots[grandchild.0].parent = Some(id);
				collapsed.push(grandchild);
			} else {
				collapsed.push(child);
			}
		}
		self.slots[id.0].children = collapsed;
	}

	/// Strip redundant wrappers: while the root is a proxy with a single child, that child becomes the root.
	pub fn promote_root(&mut self) {
		while self.slots[self.root.0].node.is_proxy() && self.slots[self.root.0].children.len() == 1 {
			let child = self.slots[self.root.0].children[0];
			self.detach(child);
			self.root = child;
		}
	}

	/// Owned copy of the subtree at `id`.
	pub fn snapshot(&self, id: NodeId) -> Node {
		let slot = &self.slots[id.0];
		Node {
			children: slot.children.iter().map(|&c| self.snapshot(c)).collect(),
			..slot.node.clone()
		}
	}

	/// Owned copy of the whole tree.
	pub fn to_node(&self) -> Node {
		self.snapshot(self.root)
	}

	/// Human-readable name of a node for errors and logs.
	pub fn label(&self, id: NodeId) -> String {
		let node = &self.slots[id.0].node;
		if let Some(link) = node.link.as_ref().filter(|l| !l.title.is_empty()) {
			link.title.clone()
		} else if !node.title.is_empty() {
			node.title.clone()
		} else if let Some(url) = node.url() {
			url.to_string()
		} else if let Some(id) = &node.id {
			id.clone()
		} else {
			"<proxy>".to_string()
		}
	}

	fn push(&mut self, node: Node) -> NodeId {
		let id = NodeId(self.slots.len());
		self.slots.push(Slot {
			node,
			children: Vec::new(),
			parent: None,
		});
		id
	}

	fn push_indexed(&mut self, node: Node) -> NodeId {
		let id = self.push(node);
		if self.slots[id.0].node.id.is_none() {
			self.unidentified.push(id);
		}
		self.reindex(id);
		id
	}

	/// Bring the indices in line with the node's current keys. Once identified, a node leaves the bucket for good.
	fn reindex(&mut self, id: NodeId) {
		let node = &self.slots[id.0].node;
		let Some(key) = node.id.clone() else {
			return;
		};
		let url = node.url().map(str::to_string);
		self.by_id.entry(key).or_insert(id);
		if let Some(url) = url {
			self.by_url.entry(url).or_insert(id);
		}
		self.unidentified.retain(|&n| n != id);
	}
}

/// Late match for a node in the unidentified bucket: equal non-empty title or url, unless the two carry different urls or ids.
fn weak_match(existing: &Node, candidate: &Node) -> bool {
	let same_title = !candidate.title.is_empty() && candidate.title == existing.title;
	let same_url = candidate.url().is_some() && candidate.url() == existing.url();
	let different_url = matches!((existing.url(), candidate.url()), (Some(a), Some(b)) if a != b);
	let different_id = matches!((&existing.id, &candidate.id), (Some(a), Some(b)) if a != b);
	(same_title || same_url) && !different_url && !different_id
}
