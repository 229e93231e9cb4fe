//! Issues and projects into the tree.
//!
//! Every issue body is parsed into a local tree first ([ParsedIssue]). The resolver then links the
//! issues of one repository through their `Parent:` fields and reconciles each local checklist tree
//! against those links. Network access stays in [load]; everything below it is synchronous.

pub mod load;
mod project;
mod resolve;

pub use project::build_project;
pub use resolve::resolve_repo;

use std::collections::HashMap;

use crate::{
	Node, Result, Tree,
	document::{Document, build_document},
	fragment::Extractor,
	github::GitHubIssue,
};

/// Every fetched issue, listed or prefetched, keyed by its API url.
pub type KnownIssues = HashMap<String, GitHubIssue>;

/// One issue with its body parsed into a local tree.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedIssue {
	/// API url
	pub id: String,
	pub number: u64,
	pub html_url: String,
	pub title: String,
	/// Root of the body's tree. Carries the body's own fields (`Parent:`, `Progress:`, description);
	/// its children are the checklist items and headings.
	pub local: Node,
}

impl ParsedIssue {
	pub fn parse(issue: &GitHubIssue, extractor: &Extractor<'_>) -> Result<Self> {
		Ok(Self {
			local: parse_issue_body(issue.body.as_deref().unwrap_or_default(), extractor)?,
			..Self::without_body(issue)
		})
	}

	/// The issue as if its body were empty.
	pub fn without_body(issue: &GitHubIssue) -> Self {
		Self {
			id: issue.url.clone(),
			number: issue.number,
			html_url: issue.html_url.clone(),
			title: issue.title.clone(),
			local: Node::default(),
		}
	}
}

/// Local tree of an issue body. The root is never promoted, so a single checklist item stays a child.
pub fn parse_issue_body(body: &str, extractor: &Extractor<'_>) -> Result<Node> {
	let mut tree = Tree::new();
	build_document(&mut tree, &Document::parse(body), extractor)?;
	Ok(tree.to_node())
}
