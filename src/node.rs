//! The node model: one objective/goal/task, its links and its progress.
//!
//! [Node] is the owned form handed to writers and used as the candidate for
//! [Tree::register](crate::Tree::register). Inside a [Tree](crate::Tree) nodes live in an arena and
//! are referenced by [NodeId](crate::NodeId); the owned form is produced on demand with
//! [Tree::snapshot](crate::Tree::snapshot).

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// A labeled reference to an external resource: `{title, url}`.
///
/// Used both for a node's own source (`#123` -> issue page) and for the not-yet-resolved parent pointer.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Link {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub title: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub url: String,
}

impl Link {
	pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			title: title.into(),
			url: url.into(),
		}
	}

	/// Link that only carries a url.
	pub fn url(url: impl Into<String>) -> Self {
		Self { title: String::new(), url: url.into() }
	}

	pub fn is_empty(&self) -> bool {
		self.title.is_empty() && self.url.is_empty()
	}
}

impl fmt::Display for Link {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.title.is_empty(), self.url.is_empty()) {
			(true, true) => write!(f, "<empty link>"),
			(true, false) => write!(f, "{}", self.url),
			(false, true) => write!(f, "{}", self.title),
			(false, false) if self.title == self.url => write!(f, "{}", self.title),
			(false, false) => write!(f, "{} ({})", self.title, self.url),
		}
	}
}

/// Completion as a `done` out of `total` pair.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Progress {
	#[serde(default)]
	pub done: u32,
	#[serde(default)]
	pub total: u32,
}

impl Progress {
	/// A finished leaf, what `- [x]` stands for.
	pub const DONE: Self = Self { done: 1, total: 1 };
	/// An unfinished leaf, what `- [ ]` stands for.
	pub const PENDING: Self = Self { done: 0, total: 1 };

	pub const fn new(done: u32, total: u32) -> Self {
		Self { done, total }
	}

	pub fn is_done(&self) -> bool {
		self.done == self.total
	}

	/// `0/0` carries no information and is treated as if no progress was given.
	pub fn is_empty(&self) -> bool {
		self.done == 0 && self.total == 0
	}
}

impl fmt::Display for Progress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.total == 100 {
			write!(f, "{}%", self.done)
		} else {
			write!(f, "{}/{}", self.done, self.total)
		}
	}
}

/// A single objective/goal/task.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Node {
	/// Stable external identifier (an issue's API URL). Strongest identity key.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub title: String,
	#[serde(rename = "desc", default, skip_serializing_if = "String::is_empty")]
	pub description: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub link: Option<Link>,
	/// Secondary references, when the source text names several and none is canonical.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub links: Vec<Link>,
	/// Lower sorts first.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub priority: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub progress: Option<Progress>,
	#[serde(rename = "sub", default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<Node>,
	/// Declared but not yet resolved parent.
	#[serde(skip)]
	pub parent_ref: Option<Link>,
}

impl Node {
	pub fn with_title(title: impl Into<String>) -> Self {
		Self {
			title: title.into(),
			..Default::default()
		}
	}

	/// Url of the node's own link, if it has a non-empty one.
	pub fn url(&self) -> Option<&str> {
		self.link.as_ref().map(|l| l.url.as_str()).filter(|u| !u.is_empty())
	}

	/// A placeholder created only to keep heading depths consistent.
	///
	/// Children are not considered: a proxy is defined by carrying nothing of its own.
	pub fn is_proxy(&self) -> bool {
		self.id.is_none()
			&& self.title.is_empty()
			&& self.description.is_empty()
			&& self.link.as_ref().is_none_or(Link::is_empty)
			&& self.links.is_empty()
			&& self.priority.is_none()
			&& self.progress.is_none()
			&& self.parent_ref.is_none()
	}

	/// Explicit progress if set, otherwise the count of finished direct children.
	pub fn effective_progress(&self) -> Progress {
		if let Some(p) = self.progress
			&& !p.is_empty()
		{
			return p;
		}
		let done = self.children.iter().filter(|c| c.is_done()).count();
		Progress::new(done as u32, self.children.len() as u32)
	}

	pub fn is_done(&self) -> bool {
		self.effective_progress().is_done()
	}
}

/// Sibling ordering: priority ascending with unprioritized nodes last, then title, then link url.
pub fn sibling_cmp(a: &Node, b: &Node) -> Ordering {
	let priority = match (a.priority, b.priority) {
		(Some(x), Some(y)) => x.cmp(&y),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	};
	priority.then_with(|| a.title.cmp(&b.title)).then_with(|| a.url().unwrap_or("").cmp(b.url().unwrap_or("")))
}
