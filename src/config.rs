//! Run configuration: which documents and repositories make up the tree, and where it goes.
//!
//! ```yaml
//! markdown: [okrs.md]
//! github:
//!   token: ghp_...
//!   cache: .cache/okrs
//!   orgs:
//!     - name: acme
//!       repos: [{ name: roadmap }]
//!       projects: [{ name: Q3 }]
//! output:
//!   - { path: tree, format: json }
//!   - { path: tree.md }
//! ```
//!
//! Any field can be overridden from the environment, `OKRS_GITHUB__TOKEN=...` for `github.token`. The token
//! also falls back to `GITHUB_TOKEN`.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr, bail};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tracing::debug;

use crate::format::Format;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct AppConfig {
	pub github: Option<GithubConfig>,
	/// Markdown documents, parsed in order into the same tree.
	pub markdown: Vec<PathBuf>,
	pub output: Vec<Output>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct GithubConfig {
	pub token: Option<String>,
	/// Directory for cached API responses. No caching when unset.
	pub cache: Option<PathBuf>,
	pub orgs: Vec<OrgConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, derive_new::new)]
pub struct OrgConfig {
	#[new(into)]
	pub name: String,
	#[serde(default)]
	pub repos: Vec<RepoConfig>,
	/// Classic project boards, by name.
	#[serde(default)]
	pub projects: Vec<ProjectConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, derive_new::new)]
pub struct RepoConfig {
	#[new(into)]
	pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, derive_new::new)]
pub struct ProjectConfig {
	#[new(into)]
	pub name: String,
}

/// Where to write the tree. `-` is stdout.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Output {
	#[default = "-"]
	pub path: String,
	/// Taken from the extension of `path` when unset, JSON for stdout.
	pub format: Option<Format>,
}

impl AppConfig {
	/// Read the config file, format by extension, then apply `OKRS_*` environment overrides.
	pub fn load(path: &Path) -> Result<Self> {
		let format = match path.extension().and_then(|e| e.to_str()) {
			Some("json") => FileFormat::Json,
			Some("yml" | "yaml") => FileFormat::Yaml,
			Some("toml") => FileFormat::Toml,
			other => bail!("unknown file extension: {}", other.unwrap_or_default()),
		};
		let path_str = path.to_str().ok_or_else(|| color_eyre::eyre::eyre!("non-utf8 config path: {}", path.display()))?;

		let settings = config::Config::builder()
			.add_source(File::new(path_str, format))
			.add_source(Environment::with_prefix("OKRS").prefix_separator("_").separator("__"))
			.build()
			.wrap_err_with(|| format!("reading config {}", path.display()))?;
		let mut config: AppConfig = settings.try_deserialize().wrap_err_with(|| format!("invalid config {}", path.display()))?;

		if let Some(github) = &mut config.github
			&& github.token.is_none()
		{
			github.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
		}
		// relative paths are relative to the config file
		if let Some(dir) = path.parent() {
			for md in &mut config.markdown {
				if md.is_relative() {
					*md = dir.join(&*md);
				}
			}
		}
		debug!(markdown = config.markdown.len(), outputs = config.output.len(), github = config.github.is_some(), "loaded config");
		Ok(config)
	}
}
