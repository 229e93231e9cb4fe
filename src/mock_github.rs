//! Mock GitHub client for testing purposes.
//!
//! Stores issues and classic projects in memory and serves them through the [GitHubClient] trait,
//! so the loader can be exercised without hitting the real API.

use std::{
	collections::{BTreeMap, HashMap},
	sync::{
		Mutex,
		atomic::{AtomicU64, Ordering},
	},
};

use async_trait::async_trait;
use color_eyre::eyre::{Result, eyre};
use tracing::instrument;

use crate::github::{GitHubClient, GitHubIssue, GitHubProject, ProjectCard, ProjectColumn, api_issue_url, html_issue_url};

/// Key for looking up issues by owner/repo
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct RepoKey {
	owner: String,
	repo: String,
}

impl RepoKey {
	fn new(owner: &str, repo: &str) -> Self {
		Self {
			owner: owner.to_string(),
			repo: repo.to_string(),
		}
	}
}

/// Mock GitHub client that stores all state in memory.
/// Thread-safe for use in async contexts.
pub struct MockGitHubClient {
	/// Counter for project, column and card ids
	next_id: AtomicU64,

	/// All issues, keyed by (owner, repo) -> issue_number -> issue
	issues: Mutex<HashMap<RepoKey, BTreeMap<u64, GitHubIssue>>>,

	/// Projects per organization, in creation order
	projects: Mutex<HashMap<String, Vec<GitHubProject>>>,

	/// project_id -> columns
	columns: Mutex<HashMap<u64, Vec<ProjectColumn>>>,

	/// column_id -> cards
	cards: Mutex<HashMap<u64, Vec<ProjectCard>>>,

	/// Call log for debugging
	call_log: Mutex<Vec<String>>,
}

impl Default for MockGitHubClient {
	fn default() -> Self {
		Self::new()
	}
}

impl MockGitHubClient {
	pub fn new() -> Self {
		Self {
			next_id: AtomicU64::new(1000),
			issues: Mutex::new(HashMap::new()),
			projects: Mutex::new(HashMap::new()),
			columns: Mutex::new(HashMap::new()),
			cards: Mutex::new(HashMap::new()),
			call_log: Mutex::new(Vec::new()),
		}
	}

	/// Add an open issue. Returns it as the API would.
	pub fn add_issue(&self, owner: &str, repo: &str, number: u64, title: &str, body: &str) -> GitHubIssue {
		let issue = GitHubIssue {
			url: api_issue_url(owner, repo, number),
			html_url: html_issue_url(owner, repo, number),
			number,
			title: title.to_string(),
			body: if body.is_empty() { None } else { Some(body.to_string()) },
			state: "open".to_string(),
		};
		let mut issues = self.issues.lock().unwrap();
		issues.entry(RepoKey::new(owner, repo)).or_default().insert(number, issue.clone());
		issue
	}

	/// Close an issue: it stays fetchable by number but disappears from listings.
	pub fn close_issue(&self, owner: &str, repo: &str, number: u64) {
		let mut issues = self.issues.lock().unwrap();
		if let Some(issue) = issues.get_mut(&RepoKey::new(owner, repo)).and_then(|r| r.get_mut(&number)) {
			issue.state = "closed".to_string();
		}
	}

	/// Add an open project to an organization, returns its id
	pub fn add_project(&self, org: &str, name: &str) -> u64 {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let project = GitHubProject {
			id,
			name: name.to_string(),
			html_url: format!("https://github.com/orgs/{org}/projects/{id}"),
			body: None,
		};
		self.projects.lock().unwrap().entry(org.to_string()).or_default().push(project);
		id
	}

	/// Append a column to a project, returns its id
	pub fn add_column(&self, project_id: u64, name: &str) -> u64 {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		self.columns.lock().unwrap().entry(project_id).or_default().push(ProjectColumn { id, name: name.to_string() });
		id
	}

	pub fn add_note_card(&self, column_id: u64, note: &str) {
		self.push_card(column_id, Some(note.to_string()), None);
	}

	/// Card pointing at an issue through its API url
	pub fn add_issue_card(&self, column_id: u64, content_url: &str) {
		self.push_card(column_id, None, Some(content_url.to_string()));
	}

	fn push_card(&self, column_id: u64, note: Option<String>, content_url: Option<String>) {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		self.cards.lock().unwrap().entry(column_id).or_default().push(ProjectCard { id, note, content_url });
	}

	/// Get the call log for debugging
	pub fn get_call_log(&self) -> Vec<String> {
		self.call_log.lock().unwrap().clone()
	}

	fn log_call(&self, call: &str) {
		self.call_log.lock().unwrap().push(call.to_string());
	}
}

#[async_trait]
impl GitHubClient for MockGitHubClient {
	#[instrument(skip(self), name = "MockGitHubClient::list_issues")]
	async fn list_issues(&self, owner: &str, repo: &str) -> Result<Vec<GitHubIssue>> {
		tracing::info!(target: "mock_github", owner, repo, "list_issues");
		self.log_call(&format!("list_issues({owner}, {repo})"));

		let issues = self.issues.lock().unwrap();
		let repo_issues = issues.get(&RepoKey::new(owner, repo)).ok_or_else(|| eyre!("Repository not found: {owner}/{repo}"))?;
		Ok(repo_issues.values().filter(|i| i.state == "open").cloned().collect())
	}

	#[instrument(skip(self), name = "MockGitHubClient::fetch_issue")]
	async fn fetch_issue(&self, owner: &str, repo: &str, number: u64) -> Result<GitHubIssue> {
		tracing::info!(target: "mock_github", owner, repo, number, "fetch_issue");
		self.log_call(&format!("fetch_issue({owner}, {repo}, {number})"));

		let issues = self.issues.lock().unwrap();
		let repo_issues = issues.get(&RepoKey::new(owner, repo)).ok_or_else(|| eyre!("Repository not found: {owner}/{repo}"))?;
		repo_issues.get(&number).cloned().ok_or_else(|| eyre!("Issue not found: {owner}/{repo}#{number}"))
	}

	#[instrument(skip(self), name = "MockGitHubClient::list_projects")]
	async fn list_projects(&self, org: &str) -> Result<Vec<GitHubProject>> {
		tracing::info!(target: "mock_github", org, "list_projects");
		self.log_call(&format!("list_projects({org})"));

		Ok(self.projects.lock().unwrap().get(org).cloned().unwrap_or_default())
	}

	#[instrument(skip(self), name = "MockGitHubClient::list_project_columns")]
	async fn list_project_columns(&self, project_id: u64) -> Result<Vec<ProjectColumn>> {
		tracing::info!(target: "mock_github", project_id, "list_project_columns");
		self.log_call(&format!("list_project_columns({project_id})"));

		Ok(self.columns.lock().unwrap().get(&project_id).cloned().unwrap_or_default())
	}

	#[instrument(skip(self), name = "MockGitHubClient::list_project_cards")]
	async fn list_project_cards(&self, column_id: u64) -> Result<Vec<ProjectCard>> {
		tracing::info!(target: "mock_github", column_id, "list_project_cards");
		self.log_call(&format!("list_project_cards({column_id})"));

		Ok(self.cards.lock().unwrap().get(&column_id).cloned().unwrap_or_default())
	}
}
