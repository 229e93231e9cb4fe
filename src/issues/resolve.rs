//! Linking the issues of one repository into a hierarchy.
//!
//! 1. every issue gets a canonical node, indexed by id, html url and `#N`
//! 2. declared `Parent:` links are resolved against that index and attached
//! 3. each issue's local checklist tree is walked top-down and reconciled with what step 2 built
//! 4. whatever still has no parent goes under the repository node
//!
//! Any unresolved reference or disagreement about a parent aborts the whole repository.
//!
//! Issues of other repositories that show up in a checklist are listed through a copy. Their own node belongs
//! to their repository, which resolves its parent from their body alone.

use std::{
	collections::{HashMap, HashSet},
	sync::LazyLock,
};

use regex::Regex;
use tracing::{debug, info, warn};

use super::{KnownIssues, ParsedIssue};
use crate::{
	Error, Link, Node, NodeId, Result, Tree,
	fragment::RepoScope,
	github::{api_issue_url, parse_issue_url, short_ref},
};

static SHORT_REF_TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:[\w.-]+/[\w.-]+)?#\d+$").unwrap());

/// Resolve the issues of one repository into `tree`, below `repo_root`.
///
/// `known` supplies titles for issues that are only referenced from checklists.
pub fn resolve_repo(tree: &mut Tree, repo_root: NodeId, scope: &RepoScope, issues: &[ParsedIssue], known: &KnownIssues) -> Result<()> {
	let mut issues: Vec<&ParsedIssue> = issues.iter().collect();
	issues.sort_by_key(|i| i.number);

	let mut r = Resolver {
		tree,
		scope,
		known,
		by_num: HashMap::new(),
		by_id: HashMap::new(),
		by_url: HashMap::new(),
		own: HashSet::new(),
		foreign: HashSet::new(),
		declared: HashMap::new(),
		assigned: HashMap::new(),
		path: Vec::new(),
	};

	let nodes = issues.iter().map(|issue| r.index_issue(issue)).collect::<Result<Vec<_>>>()?;

	for &node in &nodes {
		r.attach_declared_parent(node)?;
	}

	for (issue, &node) in issues.iter().zip(&nodes) {
		r.reconcile(node, &issue.local)?;
	}

	for &node in &nodes {
		if r.tree.parent(node).is_none() {
			r.tree.attach(repo_root, node)?;
		}
		r.tree.sort_children(node);
	}
	r.tree.sort_children(repo_root);
	info!(repo = %format!("{}/{}", scope.org, scope.repo), issues = nodes.len(), "resolved repository");
	Ok(())
}

struct Resolver<'t, 's> {
	tree: &'t mut Tree,
	scope: &'s RepoScope,
	known: &'s KnownIssues,
	/// `#N` / `org/repo#N` -> node
	by_num: HashMap<String, NodeId>,
	by_id: HashMap<String, NodeId>,
	by_url: HashMap<String, NodeId>,
	/// Issues of this repository.
	own: HashSet<NodeId>,
	/// Copies standing for issues of other repositories.
	foreign: HashSet<NodeId>,
	/// `Parent:` of each issue's body.
	declared: HashMap<NodeId, Link>,
	/// Parent each node was placed under during this resolution.
	assigned: HashMap<NodeId, NodeId>,
	/// Nodes on the current reconciliation path.
	path: Vec<NodeId>,
}

impl Resolver<'_, '_> {
	fn index_issue(&mut self, issue: &ParsedIssue) -> Result<NodeId> {
		let num = format!("#{}", issue.number);
		let node = self.tree.register(Node {
			id: Some(issue.id.clone()),
			title: issue.title.clone(),
			link: Some(Link::new(num.clone(), issue.html_url.clone())),
			..Default::default()
		})?;
		self.by_id.insert(issue.id.clone(), node);
		self.by_url.insert(issue.html_url.clone(), node);
		self.by_num.insert(num, node);
		self.own.insert(node);
		if let Some(parent) = &issue.local.parent_ref {
			self.tree.set_parent_ref(node, Some(parent.clone()));
			self.declared.insert(node, parent.clone());
		}
		Ok(node)
	}

	fn by_link(&self, link: &Link) -> Option<NodeId> {
		let url = (!link.url.is_empty()).then_some(link.url.as_str());
		(!link.title.is_empty())
			.then(|| self.by_num.get(&link.title))
			.flatten()
			.or_else(|| url.and_then(|u| self.by_id.get(u)))
			.or_else(|| url.and_then(|u| self.by_url.get(u)))
			.copied()
	}

	fn attach_declared_parent(&mut self, node: NodeId) -> Result<()> {
		let Some(declared) = self.declared.get(&node).cloned() else {
			return Ok(());
		};
		let parent = self.by_link(&declared).ok_or_else(|| Error::UnresolvedReference { reference: declared.to_string() })?;
		self.tree.attach(parent, node)?;
		debug!(node = %self.tree.label(node), parent = %self.tree.label(parent), "declared parent");
		self.assigned.insert(node, parent);
		Ok(())
	}

	/// Merge `local` into `root`, then place every local child under `root`.
	fn reconcile(&mut self, root: NodeId, local: &Node) -> Result<()> {
		self.tree.merge(
			root,
			&Node {
				description: local.description.clone(),
				links: local.links.clone(),
				priority: local.priority,
				progress: local.progress,
				..Default::default()
			},
		);
		self.path.push(root);
		for item in &local.children {
			let node = match item.link.as_ref().and_then(|l| self.by_link(l)) {
				Some(node) => node,
				None => self.materialize(item)?,
			};
			self.synthesize_link_title(node);
			if self.path.contains(&node) {
				return Err(Error::Cycle {
					node: self.tree.label(node),
					parent: self.tree.label(root),
				});
			}

			self.reconcile(node, item)?;
			if !self.foreign.contains(&node) {
				self.check_declared_parent(node, root)?;
			}
			self.place(node, root)?;
		}
		self.path.pop();
		self.tree.sort_children(root);
		Ok(())
	}

	/// New node for a checklist item nothing in the repository matched. Children are not copied,
	/// they are reconciled separately.
	fn materialize(&mut self, item: &Node) -> Result<NodeId> {
		let mut candidate = Node {
			children: Vec::new(),
			..item.clone()
		};
		let issue = candidate.url().and_then(|u| parse_issue_url(u).ok());
		let local = issue.as_ref().is_none_or(|(owner, repo, _)| *owner == self.scope.org && *repo == self.scope.repo);
		if let Some((owner, repo, number)) = &issue
			&& let Some(known) = self.known.get(&api_issue_url(owner, repo, *number))
		{
			if candidate.title.is_empty() {
				candidate.title = known.title.clone();
			}
			if local && candidate.id.is_none() {
				candidate.id = Some(known.url.clone());
			}
		}

		let node = match candidate.url().map(str::to_string) {
			Some(_) if !local => {
				let node = self.tree.insert(candidate)?;
				self.foreign.insert(node);
				node
			}
			Some(url) => {
				let node = self.tree.register(candidate)?;
				self.by_url.entry(url.clone()).or_insert(node);
				self.by_id.entry(url).or_insert(node);
				node
			}
			None => self.tree.insert(candidate)?,
		};
		debug!(node = %self.tree.label(node), foreign = !local, "materialized checklist item");
		Ok(node)
	}

	/// Give links to issues a `#N` / `org/repo#N` title, and index nodes by it.
	fn synthesize_link_title(&mut self, node: NodeId) {
		let Some(link) = self.tree.get(node).link.clone() else { return };
		let mut title = link.title;
		if title.is_empty() && !link.url.is_empty() {
			match parse_issue_url(&link.url) {
				Ok((owner, repo, number)) => {
					title = short_ref(&owner, &repo, number, Some(self.scope));
					self.tree.set_link_title(node, title.clone());
				}
				Err(_) if link.url.contains("github.com") => warn!(url = %link.url, "missing title for the link"),
				Err(_) => {}
			}
		}
		if SHORT_REF_TITLE.is_match(&title) {
			self.by_num.entry(title).or_insert(node);
		}
	}

	/// The node's own `Parent:` must agree with the local tree it was found in.
	fn check_declared_parent(&mut self, node: NodeId, root: NodeId) -> Result<()> {
		let claimed = self.tree.get(root).link.clone().unwrap_or_default();
		if let Some(declared) = self.tree.get(node).parent_ref.clone() {
			let reconciled = declared.title == claimed.title && SHORT_REF_TITLE.is_match(&declared.title);
			if !reconciled && declared.url != claimed.url {
				return Err(Error::ParentConflict {
					node: self.tree.get(node).link.clone().unwrap_or_default(),
					declared,
					claimed,
				});
			}
		}
		if !claimed.is_empty() {
			self.tree.set_parent_ref(node, Some(claimed));
		}
		Ok(())
	}

	/// First claim wins, an identical claim is a no-op, a different one is a conflict.
	///
	/// Nodes already owned outside this repository (another repository, a markdown document) are listed
	/// through a reference copy instead of being moved.
	fn place(&mut self, node: NodeId, root: NodeId) -> Result<()> {
		match self.assigned.get(&node).copied() {
			Some(parent) if parent == root => Ok(()),
			Some(parent) => Err(Error::ParentConflict {
				node: self.tree.get(node).link.clone().unwrap_or_default(),
				declared: self.tree.get(parent).link.clone().unwrap_or_default(),
				claimed: self.tree.get(root).link.clone().unwrap_or_default(),
			}),
			None => {
				let owned_elsewhere = self.tree.parent(node).is_some() && !self.own.contains(&node);
				let placed = if owned_elsewhere {
					debug!(node = %self.tree.label(node), "owned elsewhere, listing a reference");
					let copy = reference_copy(self.tree.get(node));
					self.tree.insert(copy)?
				} else {
					node
				};
				self.tree.attach(root, placed)?;
				self.assigned.insert(node, root);
				Ok(())
			}
		}
	}
}

/// Non-owning stand-in for a node that lives elsewhere in the tree.
pub(super) fn reference_copy(node: &Node) -> Node {
	Node {
		title: node.title.clone(),
		link: node.link.clone(),
		priority: node.priority,
		..Default::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		Progress,
		fragment::Extractor,
		github::{GitHubIssue, html_issue_url},
	};

	fn scope() -> RepoScope {
		RepoScope::new("o", "r")
	}

	fn raw(number: u64, title: &str, body: &str) -> GitHubIssue {
		GitHubIssue {
			url: crate::github::api_issue_url("o", "r", number),
			html_url: crate::github::html_issue_url("o", "r", number),
			number,
			title: title.to_string(),
			body: Some(body.to_string()),
			state: "open".to_string(),
		}
	}

	fn issue(number: u64, title: &str, body: &str) -> ParsedIssue {
		let scope = scope();
		ParsedIssue::parse(&raw(number, title, body), &Extractor::new(Some(&scope), &crate::fragment::GithubUrls)).unwrap()
	}

	fn resolve(issues: &[ParsedIssue]) -> Result<Node> {
		let mut tree = Tree::new();
		let root = tree.root();
		resolve_repo(&mut tree, root, &scope(), issues, &KnownIssues::new())?;
		Ok(tree.to_node())
	}

	fn titles(node: &Node) -> Vec<&str> {
		node.children.iter().map(|c| c.title.as_str()).collect()
	}

	#[test]
	fn declared_parent_links_issues() {
		let root = resolve(&[issue(1, "child", "**Parent:** #2\n"), issue(2, "parent", "")]).unwrap();
		assert_eq!(titles(&root), ["parent"]);
		assert_eq!(titles(&root.children[0]), ["child"]);
		assert_eq!(root.children[0].link, Some(Link::new("#2", "https://github.com/o/r/issues/2")));
	}

	#[test]
	fn mutual_parents_fail() {
		let err = resolve(&[issue(1, "a", "**Parent:** #2\n"), issue(2, "b", "**Parent:** #1\n")]).unwrap_err();
		assert!(matches!(err, Error::Cycle { .. } | Error::ParentConflict { .. }), "{err}");
	}

	#[test]
	fn unknown_parent_is_unresolved() {
		let err = resolve(&[issue(1, "a", "**Parent:** https://example.com/epic\n")]).unwrap_err();
		assert_eq!(err.to_string(), "cannot resolve reference https://example.com/epic");
	}

	#[test]
	fn checklist_claims_issues_and_materializes_the_rest() {
		let root = resolve(&[
			issue(1, "epic", "**Progress:** 30%\n\n- [x] Run the pipeline #2\n- [ ] Write the report\n  - [ ] outline\n"),
			issue(2, "pipeline", ""),
		])
		.unwrap();
		assert_eq!(titles(&root), ["epic"]);
		let epic = &root.children[0];
		assert_eq!(epic.progress, Some(Progress::new(30, 100)));
		assert_eq!(titles(epic), ["Write the report", "pipeline"]);
		// the issue keeps its api title, the checklist only contributes missing fields
		assert_eq!(epic.children[1].progress, Some(Progress::DONE));
		assert_eq!(titles(&epic.children[0]), ["outline"]);
	}

	#[test]
	fn checklist_agreeing_with_declared_parent() {
		let root = resolve(&[issue(1, "epic", "- [ ] #2\n"), issue(2, "task", "**Parent:** #1\n")]).unwrap();
		assert_eq!(titles(&root), ["epic"]);
		assert_eq!(titles(&root.children[0]), ["task"]);
	}

	#[test]
	fn checklist_disagreeing_with_declared_parent() {
		let err = resolve(&[issue(1, "a", "- [ ] #3\n"), issue(2, "b", ""), issue(3, "c", "**Parent:** #2\n")]).unwrap_err();
		assert_eq!(err.to_string(), "incorrect parent of #3: #2 (declared by the node) vs #1 (from the local subtree of #1)");
	}

	#[test]
	fn two_checklists_claiming_one_issue() {
		let err = resolve(&[issue(1, "a", "- [ ] #3\n"), issue(2, "b", "- [ ] #3\n"), issue(3, "c", "")]).unwrap_err();
		assert!(matches!(err, Error::ParentConflict { .. }), "{err}");
	}

	#[test]
	fn self_reference_in_checklist() {
		let err = resolve(&[issue(1, "a", "- [ ] #1\n")]).unwrap_err();
		assert!(matches!(err, Error::Cycle { .. }), "{err}");
	}

	#[test]
	fn link_titles_are_synthesized() {
		let root = resolve(&[issue(
			1,
			"epic",
			"- [ ] https://github.com/o/r/issues/9\n- [ ] https://github.com/o/other/pull/4\n- [ ] https://example.com/doc\n",
		)])
		.unwrap();
		let links: Vec<_> = root.children[0].children.iter().map(|c| c.link.clone().unwrap_or_default().title).collect();
		assert_eq!(links, ["", "o/other#4", "#9"]);
	}

	#[test]
	fn order_does_not_depend_on_input_order() {
		let make = || {
			vec![
				issue(3, "gamma", "**Parent:** #1\n"),
				issue(1, "alpha", "- [ ] [P1] later\n- [ ] [P0] first\n- [ ] unprioritized\n"),
				issue(2, "beta", "**Parent:** #1\n"),
				issue(4, "delta", ""),
			]
		};
		let forward = resolve(&make()).unwrap();
		let mut reversed = make();
		reversed.reverse();
		assert_eq!(forward, resolve(&reversed).unwrap());
		assert_eq!(titles(&forward), ["alpha", "delta"]);
		assert_eq!(titles(&forward.children[0]), ["first", "later", "beta", "gamma", "unprioritized"]);
	}

	#[test]
	fn referenced_issue_takes_its_known_title() {
		let closed = GitHubIssue {
			state: "closed".to_string(),
			..raw(2, "Shipped already", "")
		};
		let known = KnownIssues::from([(closed.url.clone(), closed)]);
		let mut tree = Tree::new();
		let root = tree.root();
		resolve_repo(&mut tree, root, &scope(), &[issue(1, "epic", "- [x] #2\n")], &known).unwrap();

		let epic = &tree.to_node().children[0];
		assert_eq!(titles(epic), ["Shipped already"]);
		assert_eq!(epic.children[0].id, Some(api_issue_url("o", "r", 2)));
	}

	#[test]
	fn issue_of_another_repository_is_listed_not_taken() {
		let mut tree = Tree::new();
		let root = tree.root();
		let other = tree.insert(Node::with_title("other")).unwrap();
		tree.attach(root, other).unwrap();
		let foreign = tree
			.register(Node {
				id: Some(api_issue_url("o", "other", 4)),
				link: Some(Link::new("#4", html_issue_url("o", "other", 4))),
				..Node::with_title("Elsewhere")
			})
			.unwrap();
		tree.attach(other, foreign).unwrap();

		let repo = tree.insert(Node::with_title("r")).unwrap();
		tree.attach(root, repo).unwrap();
		resolve_repo(&mut tree, repo, &scope(), &[issue(1, "epic", "- [ ] o/other#4\n")], &KnownIssues::new()).unwrap();

		assert_eq!(tree.parent(foreign), Some(other));
		assert_eq!(tree.get(foreign).parent_ref, None);
		let epic = &tree.snapshot(repo).children[0];
		assert_eq!(epic.children[0].link, Some(Link::new("o/other#4", html_issue_url("o", "other", 4))));
		assert_eq!(epic.children[0].id, None);
	}
}
