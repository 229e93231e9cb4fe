use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};

use async_trait::async_trait;
use color_eyre::eyre::{Result, bail, eyre};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::fragment::RepoScope;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GitHubIssue {
	/// API url, the stable identifier of the issue.
	pub url: String,
	pub html_url: String,
	pub number: u64,
	pub title: String,
	#[serde(default)]
	pub body: Option<String>,
	/// "open" or "closed"
	#[serde(default)]
	pub state: String,
}

/// A classic (v1) project board.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GitHubProject {
	pub id: u64,
	pub name: String,
	#[serde(default)]
	pub html_url: String,
	#[serde(default)]
	pub body: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProjectColumn {
	pub id: u64,
	pub name: String,
}

/// Either a free-text note or a reference to an issue through its API url.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProjectCard {
	pub id: u64,
	#[serde(default)]
	pub note: Option<String>,
	#[serde(default)]
	pub content_url: Option<String>,
}

//==============================================================================
// GitHub Client Trait
//==============================================================================

/// Read-only GitHub operations the tree loader needs.
/// Implemented by the real HTTP client and by an in-memory mock for tests.
#[async_trait]
pub trait GitHubClient: Send + Sync {
	/// All open issues of a repository, every page
	async fn list_issues(&self, owner: &str, repo: &str) -> Result<Vec<GitHubIssue>>;

	/// A single issue by number, whatever its state
	async fn fetch_issue(&self, owner: &str, repo: &str, number: u64) -> Result<GitHubIssue>;

	/// Open classic projects of an organization
	async fn list_projects(&self, org: &str) -> Result<Vec<GitHubProject>>;

	async fn list_project_columns(&self, project_id: u64) -> Result<Vec<ProjectColumn>>;

	async fn list_project_cards(&self, column_id: u64) -> Result<Vec<ProjectCard>>;
}

//==============================================================================
// Real GitHub Client Implementation
//==============================================================================

const API: &str = "https://api.github.com";
const PER_PAGE: usize = 100;
/// Classic projects are only served under the inertia preview media type.
const ACCEPT_PROJECTS: &str = "application/vnd.github.inertia-preview+json";
const ACCEPT_DEFAULT: &str = "application/vnd.github+json";

/// GitHub API client over HTTP, with an optional on-disk response cache.
pub struct RealGitHubClient {
	http_client: Client,
	github_token: Option<String>,
	cache: Option<ResponseCache>,
}

impl RealGitHubClient {
	/// Without a token only public data is reachable, at a much lower rate limit.
	pub fn new(github_token: Option<String>, cache_dir: Option<PathBuf>) -> Self {
		Self {
			http_client: Client::new(),
			github_token: github_token.filter(|t| !t.is_empty()),
			cache: cache_dir.map(ResponseCache::new),
		}
	}

	fn request(&self, url: &str, accept: &str) -> RequestBuilder {
		let req = self.http_client.get(url).header("User-Agent", "Rust GitHub Client").header("Accept", accept);
		match &self.github_token {
			Some(token) => req.header("Authorization", format!("token {token}")),
			None => req,
		}
	}

	async fn get_json<T: DeserializeOwned>(&self, url: &str, accept: &str, what: &str) -> Result<T> {
		let res = self.request(url, accept).send().await?;

		if !res.status().is_success() {
			let status = res.status();
			let body = res.text().await.unwrap_or_default();
			bail!("Failed to {what}: {status} - {body}");
		}

		Ok(res.json::<T>().await?)
	}

	/// Walk `page=1,2,…` until an empty page comes back.
	async fn get_pages<T: DeserializeOwned>(&self, url: &str, accept: &str, what: &str) -> Result<Vec<T>> {
		let sep = if url.contains('?') { '&' } else { '?' };
		let mut out = Vec::new();
		for page in 1.. {
			let buf: Vec<T> = self.get_json(&format!("{url}{sep}per_page={PER_PAGE}&page={page}"), accept, what).await?;
			debug!(url, page, len = buf.len(), "fetched page");
			if buf.is_empty() {
				break;
			}
			out.extend(buf);
		}
		Ok(out)
	}

	fn from_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		self.cache.as_ref()?.get(key)
	}

	fn write_cache<T: Serialize>(&self, key: &str, data: &T) {
		if let Some(cache) = &self.cache {
			cache.put(key, data);
		}
	}
}

#[async_trait]
impl GitHubClient for RealGitHubClient {
	#[instrument(skip(self))]
	async fn list_issues(&self, owner: &str, repo: &str) -> Result<Vec<GitHubIssue>> {
		let key = format!("{owner}_{repo}_issues");
		if let Some(out) = self.from_cache(&key) {
			return Ok(out);
		}
		let out = self.get_pages(&format!("{API}/repos/{owner}/{repo}/issues"), ACCEPT_DEFAULT, "list issues").await?;
		self.write_cache(&key, &out);
		Ok(out)
	}

	#[instrument(skip(self))]
	async fn fetch_issue(&self, owner: &str, repo: &str, number: u64) -> Result<GitHubIssue> {
		let key = format!("{owner}_{repo}_issue_{number}");
		if let Some(out) = self.from_cache(&key) {
			return Ok(out);
		}
		let out: GitHubIssue = self.get_json(&api_issue_url(owner, repo, number), ACCEPT_DEFAULT, "fetch issue").await?;
		self.write_cache(&key, &out);
		Ok(out)
	}

	#[instrument(skip(self))]
	async fn list_projects(&self, org: &str) -> Result<Vec<GitHubProject>> {
		let key = format!("{org}_projects");
		if let Some(out) = self.from_cache(&key) {
			return Ok(out);
		}
		let out = self.get_pages(&format!("{API}/orgs/{org}/projects?state=open"), ACCEPT_PROJECTS, "list projects").await?;
		self.write_cache(&key, &out);
		Ok(out)
	}

	#[instrument(skip(self))]
	async fn list_project_columns(&self, project_id: u64) -> Result<Vec<ProjectColumn>> {
		let key = format!("project_{project_id}_col");
		if let Some(out) = self.from_cache(&key) {
			return Ok(out);
		}
		let out = self
			.get_pages(&format!("{API}/projects/{project_id}/columns"), ACCEPT_PROJECTS, "list project columns")
			.await?;
		self.write_cache(&key, &out);
		Ok(out)
	}

	#[instrument(skip(self))]
	async fn list_project_cards(&self, column_id: u64) -> Result<Vec<ProjectCard>> {
		let key = format!("project_cards_{column_id}");
		if let Some(out) = self.from_cache(&key) {
			return Ok(out);
		}
		let out = self
			.get_pages(&format!("{API}/projects/columns/{column_id}/cards"), ACCEPT_PROJECTS, "list project cards")
			.await?;
		self.write_cache(&key, &out);
		Ok(out)
	}
}

/// `gh_<key>.json` files in one directory. Read or write failures only cost a refetch.
struct ResponseCache {
	dir: PathBuf,
}

impl ResponseCache {
	fn new(dir: PathBuf) -> Self {
		Self { dir }
	}

	fn path(&self, key: &str) -> PathBuf {
		self.dir.join(format!("gh_{key}.json"))
	}

	fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		let path = self.path(key);
		let content = match fs::read_to_string(&path) {
			Ok(c) => c,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
			Err(e) => {
				warn!(path = %path.display(), "unreadable cache entry: {e}");
				return None;
			}
		};
		match serde_json::from_str(&content) {
			Ok(v) => {
				debug!(key, "cache hit");
				Some(v)
			}
			Err(e) => {
				warn!(path = %path.display(), "corrupt cache entry, refetching: {e}");
				None
			}
		}
	}

	fn put<T: Serialize>(&self, key: &str, data: &T) {
		if let Err(e) = write_json(&self.dir, &self.path(key), data) {
			warn!(key, "failed to write cache entry: {e}");
		}
	}
}

fn write_json<T: Serialize>(dir: &Path, path: &Path, data: &T) -> Result<()> {
	fs::create_dir_all(dir)?;
	fs::write(path, serde_json::to_vec(data)?)?;
	Ok(())
}

//==============================================================================
// Convenience type alias for boxed client
//==============================================================================

pub type BoxedGitHubClient = Arc<dyn GitHubClient>;

pub fn create_client(github_token: Option<String>, cache_dir: Option<PathBuf>) -> BoxedGitHubClient {
	Arc::new(RealGitHubClient::new(github_token, cache_dir))
}

//==============================================================================
// Utility functions (URL parsing, etc.) - These don't need the trait
//==============================================================================

pub fn api_issue_url(owner: &str, repo: &str, number: u64) -> String {
	format!("{API}/repos/{owner}/{repo}/issues/{number}")
}

pub fn html_issue_url(owner: &str, repo: &str, number: u64) -> String {
	format!("https://github.com/{owner}/{repo}/issues/{number}")
}

/// Parse a GitHub issue or pull request URL into owner, repo and number.
/// Supports formats like:
/// - https://github.com/owner/repo/issues/123
/// - https://github.com/owner/repo/pull/123
/// - https://api.github.com/repos/owner/repo/issues/123
/// - github.com/owner/repo/issues/123
pub fn parse_issue_url(raw: &str) -> Result<(String, String, u64)> {
	let raw = raw.trim();
	if raw.starts_with("git@github.com:") || raw.starts_with("ssh://") {
		bail!("SSH URL format doesn't reference issues: {raw}");
	}
	let with_scheme = if raw.contains("://") { raw.to_string() } else { format!("https://{raw}") };
	let url = url::Url::parse(&with_scheme).map_err(|e| eyre!("Invalid URL {raw}: {e}"))?;

	let segments: Vec<&str> = url.path_segments().map(|s| s.filter(|p| !p.is_empty()).collect()).unwrap_or_default();
	let path = match url.host_str() {
		Some("github.com") => &segments[..],
		Some("api.github.com") if segments.first() == Some(&"repos") => &segments[1..],
		_ => bail!("URL must be a GitHub URL: {raw}"),
	};
	let [owner, repo, kind, number] = path else {
		bail!("Invalid GitHub issue URL format. Expected: https://github.com/owner/repo/issues/123");
	};
	if *kind != "issues" && *kind != "pull" {
		bail!("Not an issue or pull request URL: {raw}");
	}
	let number: u64 = number.parse().map_err(|_| eyre!("Invalid issue number: {number}"))?;
	Ok((owner.to_string(), repo.to_string(), number))
}

/// `#N` inside `scope`, `owner/repo#N` everywhere else.
pub fn short_ref(owner: &str, repo: &str, number: u64, scope: Option<&RepoScope>) -> String {
	match scope {
		Some(s) if s.org == owner && s.repo == repo => format!("#{number}"),
		_ => format!("{owner}/{repo}#{number}"),
	}
}
