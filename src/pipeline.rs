//! A whole run: documents and repositories into one tree, then out to every configured output.

use std::fs;

use color_eyre::eyre::{Result, WrapErr, bail};
use tracing::{info, instrument, warn};

use crate::{
	Error, Node, Tree,
	config::AppConfig,
	document::{Document, build_document},
	fragment::Extractor,
	github::GitHubClient,
	issues::load::load_github,
};

/// Markdown documents first, in configured order, then GitHub. A proxy root with a single child is replaced by
/// that child.
///
/// A document or issue body with a malformed field is left out with a warning; the rest of the run goes on.
#[instrument(skip_all)]
pub async fn build_tree(config: &AppConfig, client: Option<&dyn GitHubClient>) -> Result<Node> {
	let mut tree = Tree::new();
	let extractor = Extractor::plain();
	for path in &config.markdown {
		let text = fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
		let doc = Document::parse(&text);
		// nothing of a rejected document reaches the shared tree
		if let Err(e @ Error::MalformedField { .. }) = build_document(&mut Tree::new(), &doc, &extractor) {
			warn!(path = %path.display(), error = %e, "malformed field, skipping the document");
			continue;
		}
		build_document(&mut tree, &doc, &extractor).wrap_err_with(|| format!("parsing {}", path.display()))?;
		info!(path = %path.display(), nodes = tree.len(), "parsed markdown");
	}
	if let Some(github) = &config.github
		&& !github.orgs.is_empty()
	{
		let Some(client) = client else {
			bail!("github is configured but no client was provided");
		};
		load_github(&mut tree, client, &github.orgs).await?;
	}
	if tree.is_empty() {
		warn!("no documents or issues, the tree is empty");
	}
	tree.promote_root();
	Ok(tree.to_node())
}

/// [build_tree], then write every output.
pub async fn run(config: &AppConfig, client: Option<&dyn GitHubClient>) -> Result<()> {
	if config.output.is_empty() {
		bail!("no outputs specified");
	}
	let tree = build_tree(config, client).await?;
	for output in &config.output {
		output.write_tree(&tree)?;
	}
	Ok(())
}
