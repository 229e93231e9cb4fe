//! MindMup v3 maps.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use crate::Node;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MindMup {
	#[serde(rename = "formatVersion")]
	pub format_version: u32,
	pub id: String,
	pub title: String,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub ideas: BTreeMap<usize, Idea>,
	pub attr: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Idea {
	pub id: usize,
	pub title: String,
	#[serde(skip_serializing_if = "IdeaAttr::is_empty")]
	pub attr: IdeaAttr,
	/// Keyed by 1-based position among siblings.
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub ideas: BTreeMap<usize, Idea>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IdeaAttr {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub progress: Option<&'static str>,
}

impl IdeaAttr {
	fn is_empty(&self) -> bool {
		self.url.is_none() && self.progress.is_none()
	}
}

pub fn to_mindmup(root: &Node) -> MindMup {
	let mut next = 0;
	let root_idea = idea(root, &mut next);
	MindMup {
		format_version: 3,
		id: "root".to_string(),
		title: root_idea.title,
		ideas: root_idea.ideas,
		attr: map_attr(),
	}
}

fn idea(node: &Node, next: &mut usize) -> Idea {
	*next += 1;
	let id = *next;
	let ideas = node.children.iter().enumerate().map(|(i, c)| (i + 1, idea(c, next))).collect();
	Idea {
		id,
		title: node.title.clone(),
		attr: IdeaAttr {
			url: node.url().map(str::to_string),
			progress: progress_status(node),
		},
		ideas,
	}
}

/// Only nodes that track progress get a status; a bare leaf stays undecorated.
fn progress_status(node: &Node) -> Option<&'static str> {
	let p = node.effective_progress();
	if p.is_empty() {
		return None;
	}
	Some(match p.done {
		0 => "not-started",
		_ if p.is_done() => "passing",
		_ => "in-progress",
	})
}

fn map_attr() -> Value {
	let status = |description: &str, priority: Option<u32>, icon: &str| {
		let mut s = json!({
			"description": description,
			"icon": { "height": 25, "width": 25, "position": "left", "url": format!("/assets/progress/tasks/flat/{icon}.png") },
		});
		if let Some(p) = priority {
			s["priority"] = json!(p);
		}
		s
	};
	json!({
		"theme": "topdownStandard",
		"progress-statuses": {
			"not-started": status("Not Started", Some(1), "not-started"),
			"passing": status("Done", None, "passing"),
			"in-progress": status("In Progress", Some(3), "in-progress"),
		},
		"measurements-config": ["progress"],
	})
}
