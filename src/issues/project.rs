//! Classic project boards: one node per project, cards in column order.

use tracing::{debug, warn};

use super::{KnownIssues, resolve::reference_copy};
use crate::{
	Link, Node, NodeId, Result, Tree,
	fragment::Extractor,
	github::{GitHubProject, ProjectCard, ProjectColumn, parse_issue_url, short_ref},
};

/// Add `project` under `parent`.
///
/// Note cards become nodes carrying the note as description, with its checklist lines as children.
/// Issue cards point at the issue's node; if that node already has a place in the tree, the project lists a
/// reference copy instead.
pub fn build_project(
	tree: &mut Tree,
	parent: NodeId,
	project: &GitHubProject,
	columns: &[(ProjectColumn, Vec<ProjectCard>)],
	content: &KnownIssues,
	extractor: &Extractor<'_>,
) -> Result<NodeId> {
	let root = tree.insert(Node {
		title: project.name.clone(),
		description: project.body.clone().unwrap_or_default(),
		link: (!project.html_url.is_empty()).then(|| Link::new(project.name.clone(), project.html_url.clone())),
		..Default::default()
	})?;
	tree.attach(parent, root)?;

	for (column, cards) in columns {
		debug!(project = %project.name, column = %column.name, cards = cards.len(), "project column");
		for card in cards {
			let node = match (&card.content_url, &card.note) {
				(Some(url), _) if !url.is_empty() => match issue_node(tree, url, content)? {
					Some(node) => node,
					None => {
						warn!(url = %url, "unknown card content url, skipping");
						continue;
					}
				},
				(_, Some(note)) => tree.insert(Node {
					description: note.trim().to_string(),
					children: extractor.checklist_tree(note)?,
					..Default::default()
				})?,
				_ => continue,
			};
			let placed = if tree.parent(node).is_some() {
				let copy = reference_copy(tree.get(node));
				tree.insert(copy)?
			} else {
				node
			};
			tree.attach(root, placed)?;
		}
	}
	Ok(root)
}

fn issue_node(tree: &mut Tree, url: &str, content: &KnownIssues) -> Result<Option<NodeId>> {
	if let Some(node) = tree.find_by_id(url) {
		return Ok(Some(node));
	}
	let Some(issue) = content.get(url) else {
		return Ok(None);
	};
	let title = match parse_issue_url(&issue.html_url) {
		Ok((owner, repo, number)) => short_ref(&owner, &repo, number, None),
		Err(_) => format!("#{}", issue.number),
	};
	let node = tree.register(Node {
		id: Some(issue.url.clone()),
		title: issue.title.clone(),
		link: Some(Link::new(title, issue.html_url.clone())),
		..Default::default()
	})?;
	Ok(Some(node))
}
