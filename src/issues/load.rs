//! Network side of the issue tree: fetch everything up front, then resolve without I/O.

use std::collections::BTreeSet;

use color_eyre::eyre::{Result, WrapErr};
use futures::future::{join_all, try_join_all};
use tracing::{info, instrument, warn};

use super::{KnownIssues, ParsedIssue, build_project, resolve_repo};
use crate::{
	Error, Link, Node, NodeId, Tree,
	config::OrgConfig,
	fragment::{Extractor, RepoScope, ShortRefTable, short_refs},
	github::{GitHubClient, GitHubIssue, GitHubProject, ProjectCard, ProjectColumn, parse_issue_url},
};

/// One project board with its columns and their cards, in board order.
#[derive(Clone, Debug)]
pub struct ProjectBoard {
	pub project: GitHubProject,
	pub columns: Vec<(ProjectColumn, Vec<ProjectCard>)>,
}

/// Everything one organization contributes, fetched.
#[derive(Clone, Debug)]
pub struct OrgData {
	pub name: String,
	pub repos: Vec<(RepoScope, Vec<GitHubIssue>)>,
	pub projects: Vec<ProjectBoard>,
}

/// Fetch, prefetch referenced issues, and resolve every configured organization into `tree`.
///
/// Each organization gets a node `{org, https://github.com/org}` under the root holding its repositories and
/// projects; an organization with a single child contributes that child directly.
pub async fn load_github(tree: &mut Tree, client: &dyn GitHubClient, orgs: &[OrgConfig]) -> Result<()> {
	let data = try_join_all(orgs.iter().map(|org| fetch_org(client, org))).await?;
	let (table, known) = prefetch(client, &data).await?;
	info!(orgs = data.len(), known_issues = known.len(), "fetched github data");

	let root = tree.root();
	for org in &data {
		let node = build_org(tree, org, &table, &known)?;
		let children = tree.children(node).to_vec();
		match children.as_slice() {
			[only] => {
				tree.detach(*only);
				tree.attach(root, *only)?;
			}
			_ => tree.attach(root, node)?,
		}
	}
	tree.sort_children(root);
	Ok(())
}

#[instrument(skip(client, org), fields(org = %org.name))]
async fn fetch_org(client: &dyn GitHubClient, org: &OrgConfig) -> Result<OrgData> {
	let repos = try_join_all(org.repos.iter().map(|repo| async move {
		let issues = client.list_issues(&org.name, &repo.name).await.wrap_err_with(|| format!("listing issues of {}/{}", org.name, repo.name))?;
		info!(repo = %repo.name, issues = issues.len(), "listed issues");
		Ok::<_, color_eyre::eyre::Report>((RepoScope::new(&org.name, &repo.name), issues))
	}))
	.await?;

	let mut projects = Vec::new();
	if !org.projects.is_empty() {
		let wanted: BTreeSet<&str> = org.projects.iter().map(|p| p.name.as_str()).collect();
		let listed = client.list_projects(&org.name).await.wrap_err_with(|| format!("listing projects of {}", org.name))?;
		for project in listed.into_iter().filter(|p| wanted.contains(p.name.as_str())) {
			projects.push(fetch_board(client, project).await?);
		}
		for missing in wanted.iter().filter(|name| !projects.iter().any(|b| b.project.name == **name)) {
			warn!(project = %missing, "configured project not found");
		}
	}

	Ok(OrgData {
		name: org.name.clone(),
		repos,
		projects,
	})
}

async fn fetch_board(client: &dyn GitHubClient, project: GitHubProject) -> Result<ProjectBoard> {
	let columns = client.list_project_columns(project.id).await?;
	let cards = try_join_all(columns.iter().map(|c| client.list_project_cards(c.id))).await?;
	Ok(ProjectBoard {
		columns: columns.into_iter().zip(cards).collect(),
		project,
	})
}

/// Short references and card contents that the listings do not cover are fetched one by one.
/// A reference that cannot be fetched is left out of the table; resolution then reports it as unresolved.
async fn prefetch(client: &dyn GitHubClient, data: &[OrgData]) -> Result<(ShortRefTable, KnownIssues)> {
	let mut table = ShortRefTable::default();
	let mut known = KnownIssues::new();
	for (scope, issues) in data.iter().flat_map(|org| &org.repos) {
		for issue in issues {
			table.insert(&scope.org, &scope.repo, issue.number, &issue.html_url);
			known.insert(issue.url.clone(), issue.clone());
		}
	}

	let mut wanted = BTreeSet::new();
	for (scope, issues) in data.iter().flat_map(|org| &org.repos) {
		for body in issues.iter().filter_map(|i| i.body.as_deref()) {
			for r in short_refs(body) {
				let (org, repo) = r.repo.unwrap_or_else(|| (scope.org.clone(), scope.repo.clone()));
				wanted.insert((org, repo, r.number));
			}
		}
	}
	for card in data.iter().flat_map(|org| &org.projects).flat_map(|b| &b.columns).flat_map(|(_, cards)| cards) {
		if let Some(note) = &card.note {
			wanted.extend(short_refs(note).into_iter().filter_map(|r| r.repo.map(|(org, repo)| (org, repo, r.number))));
		}
		if let Some(url) = card.content_url.as_deref().filter(|u| !known.contains_key(*u)) {
			match parse_issue_url(url) {
				Ok(key) => {
					wanted.insert(key);
				}
				Err(e) => warn!(url = %url, error = %e, "card content is not an issue"),
			}
		}
	}
	wanted.retain(|(org, repo, number)| !table.contains(org, repo, *number));

	let fetched = join_all(wanted.iter().map(|(org, repo, number)| client.fetch_issue(org, repo, *number))).await;
	let mut prefetched = 0;
	for ((org, repo, number), result) in wanted.iter().zip(fetched) {
		match result {
			Ok(issue) => {
				table.insert(org, repo, *number, &issue.html_url);
				known.insert(issue.url.clone(), issue);
				prefetched += 1;
			}
			Err(e) => warn!(reference = %format!("{org}/{repo}#{number}"), error = %e, "failed to prefetch referenced issue"),
		}
	}
	if prefetched > 0 {
		info!(prefetched, "prefetched referenced issues");
	}
	Ok((table, known))
}

fn build_org(tree: &mut Tree, org: &OrgData, table: &ShortRefTable, known: &KnownIssues) -> Result<NodeId> {
	let org_url = format!("https://github.com/{}", org.name);
	let org_node = tree.insert(Node {
		link: Some(Link::new(&org.name, &org_url)),
		..Node::with_title(&org.name)
	})?;

	for (scope, issues) in &org.repos {
		let repo_node = tree.insert(Node {
			link: Some(Link::new(&scope.repo, format!("{org_url}/{}", scope.repo))),
			..Node::with_title(&scope.repo)
		})?;
		tree.attach(org_node, repo_node)?;

		let extractor = Extractor::new(Some(scope), table);
		let parsed = issues
			.iter()
			.map(|issue| match ParsedIssue::parse(issue, &extractor) {
				Err(e @ Error::MalformedField { .. }) => {
					warn!(issue = %issue.html_url, error = %e, "malformed field, ignoring the issue body");
					Ok(ParsedIssue::without_body(issue))
				}
				parsed => parsed,
			})
			.collect::<crate::Result<Vec<_>>>()
			.wrap_err_with(|| format!("parsing issues of {}/{}", scope.org, scope.repo))?;
		resolve_repo(tree, repo_node, scope, &parsed, known).wrap_err_with(|| format!("resolving {}/{}", scope.org, scope.repo))?;
	}

	let extractor = Extractor::new(None, table);
	for board in &org.projects {
		build_project(tree, org_node, &board.project, &board.columns, known, &extractor).wrap_err_with(|| format!("building project {}", board.project.name))?;
	}
	tree.sort_children(org_node);
	Ok(org_node)
}

