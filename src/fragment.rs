//! Extraction of structured fields out of free-form text.
//!
//! Shared by markdown documents and issue bodies. Recognizes:
//! - priority tags `[P1]`, stripped from titles
//! - progress `40%` or `2/5`, percentage first
//! - bare urls and markdown links `[text](url)`
//! - short references `#12` and `org/repo#12`, resolved through a [ShortRefResolver]
//! - checklist lines `- [x] text`, nested by indentation

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use tracing::debug;

use crate::{Error, Link, Node, Progress, Result};

static PRIORITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[P(\d+)\]\s*").unwrap());
static PRIORITY_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[?P(\d+)\]?$").unwrap());
static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)%").unwrap());
static PARTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)/(\d+)").unwrap());
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(?(?:\[([^\]]+)\]\()?(https?://[^)\s]+)\)?\)?").unwrap());
static SHORT_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\b([A-Za-z0-9][\w.-]*)/([\w.-]+))?#(\d+)\b").unwrap());
static CHECKLIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)[-*+] \[([ xX])\] (.*?)[ \t]*$").unwrap());

/// Turns `org/repo#number` into the url of that issue.
///
/// The only live-data call of the engine. Implementations backed by the network prefetch everything up front,
/// see [ShortRefTable].
pub trait ShortRefResolver {
	fn resolve_short_ref(&self, org: &str, repo: &str, number: u64) -> Result<String>;
}

/// Resolves to the canonical github.com issue url, without any lookup.
#[derive(Clone, Copy, Debug, Default)]
pub struct GithubUrls;

impl ShortRefResolver for GithubUrls {
	fn resolve_short_ref(&self, org: &str, repo: &str, number: u64) -> Result<String> {
		Ok(format!("https://github.com/{org}/{repo}/issues/{number}"))
	}
}

/// Prefetched `org/repo#number` -> html url table. A miss is an [Error::UnresolvedReference].
#[derive(Clone, Debug, Default)]
pub struct ShortRefTable {
	urls: HashMap<(String, String, u64), String>,
}

impl ShortRefTable {
	pub fn insert(&mut self, org: impl Into<String>, repo: impl Into<String>, number: u64, url: impl Into<String>) {
		self.urls.insert((org.into(), repo.into(), number), url.into());
	}

	pub fn contains(&self, org: &str, repo: &str, number: u64) -> bool {
		self.urls.contains_key(&(org.to_string(), repo.to_string(), number))
	}
}

impl ShortRefResolver for ShortRefTable {
	fn resolve_short_ref(&self, org: &str, repo: &str, number: u64) -> Result<String> {
		self.urls.get(&(org.to_string(), repo.to_string(), number)).cloned().ok_or_else(|| Error::UnresolvedReference {
			reference: format!("{org}/{repo}#{number}"),
		})
	}
}

/// The repository a piece of text belongs to; bare `#N` references are relative to it.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, derive_new::new)]
pub struct RepoScope {
	#[new(into)]
	pub org: String,
	#[new(into)]
	pub repo: String,
}

/// A short reference found in text, before resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShortRef {
	pub repo: Option<(String, String)>,
	pub number: u64,
}

/// One `- [ ] text` line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChecklistItem {
	/// Leading whitespace width in columns, tab = 4.
	pub indent: usize,
	pub checked: bool,
	pub text: String,
}

/// Field extraction in the context of one repository (or none, for plain documents).
#[derive(Clone, Copy)]
pub struct Extractor<'a> {
	scope: Option<&'a RepoScope>,
	resolver: &'a dyn ShortRefResolver,
}

impl std::fmt::Debug for Extractor<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Extractor").field("scope", &self.scope).finish_non_exhaustive()
	}
}

impl<'a> Extractor<'a> {
	pub fn new(scope: Option<&'a RepoScope>, resolver: &'a dyn ShortRefResolver) -> Self {
		Self { scope, resolver }
	}

	/// For documents outside any repository: bare `#N` stays literal, `org/repo#N` maps to github.com.
	pub fn plain() -> Extractor<'static> {
		Extractor { scope: None, resolver: &GithubUrls }
	}

	/// Fill title, priority and links of `node` from a title line, plus links that were already structured
	/// (markdown link inlines).
	///
	/// One link becomes the node's own link, several go to `links`.
	pub fn apply_title(&self, node: &mut Node, text: &str, extra: Vec<Link>) -> Result<()> {
		let (priority, text) = strip_priority(text)?;
		if priority.is_some() {
			node.priority = priority;
		}
		let (mut links, rest) = self.extract_links(&text)?;
		links.extend(extra);
		node.title = rest;
		match links.len() {
			0 => {}
			1 => node.link = links.pop(),
			_ => node.links = links,
		}
		Ok(())
	}

	/// Apply a `**Key:** value` field to `node`. Returns whether the key was recognized.
	pub fn apply_field(&self, node: &mut Node, key: &str, value: &str, extra: Vec<Link>) -> Result<bool> {
		let key = key.trim().trim_end_matches(':').trim();
		match key {
			"Progress" => node.progress = parse_progress(value)?,
			"Priority" => node.priority = Some(parse_priority_field(value)?),
			k if k.starts_with("Parent") => node.parent_ref = self.parent(value, extra)?,
			_ => {
				debug!(key, "ignoring unknown field");
				return Ok(false);
			}
		}
		Ok(true)
	}

	/// A parent field: no link at all is no parent, more than one is ambiguous.
	pub fn parent(&self, value: &str, extra: Vec<Link>) -> Result<Option<Link>> {
		let (mut links, _) = self.extract_links(value)?;
		links.extend(extra);
		match links.len() {
			0 => Ok(None),
			1 => Ok(links.pop()),
			_ => Err(Error::AmbiguousParent { candidates: links }),
		}
	}

	/// Every url and short reference in `text`, in order of appearance, plus the text with them cut out.
	pub fn extract_links(&self, text: &str) -> Result<(Vec<Link>, String)> {
		let mut found: Vec<(usize, usize, Link)> = Vec::new();
		for caps in URL.captures_iter(text) {
			let (Some(whole), Some(url)) = (caps.get(0), caps.get(2)) else { continue };
			let title = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
			found.push((whole.start(), whole.end(), Link::new(title, url.as_str())));
		}
		let url_spans: Vec<(usize, usize)> = found.iter().map(|(s, e, _)| (*s, *e)).collect();
		for caps in SHORT_REF.captures_iter(text) {
			let Some(whole) = caps.get(0) else { continue };
			if url_spans.iter().any(|&(s, e)| whole.start() < e && s < whole.end()) {
				continue;
			}
			let number = caps[3].parse::<u64>().map_err(|_| Error::MalformedField {
				field: "issue number",
				fragment: whole.as_str().to_string(),
			})?;
			let repo = match (caps.get(1), caps.get(2)) {
				(Some(org), Some(repo)) => Some((org.as_str().to_string(), repo.as_str().to_string())),
				_ => None,
			};
			let link = self.resolve(&ShortRef { repo, number })?;
			found.push((whole.start(), whole.end(), link));
		}
		found.sort_by_key(|(start, ..)| *start);

		let mut rest = String::with_capacity(text.len());
		let mut pos = 0;
		for (start, end, _) in &found {
			rest.push_str(&text[pos..*start]);
			rest.push(' ');
			pos = *end;
		}
		rest.push_str(&text[pos..]);
		let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ");
		Ok((found.into_iter().map(|(.., link)| link).collect(), rest))
	}

	/// Link for a short reference: titled `#N` inside its own repository, `org/repo#N` otherwise.
	pub fn resolve(&self, r: &ShortRef) -> Result<Link> {
		let n = r.number;
		match (&r.repo, self.scope) {
			(None, None) => Ok(Link::new(format!("#{n}"), format!("#{n}"))),
			(None, Some(scope)) => Ok(Link::new(format!("#{n}"), self.resolver.resolve_short_ref(&scope.org, &scope.repo, n)?)),
			(Some((org, repo)), scope) => {
				let url = self.resolver.resolve_short_ref(org, repo, n)?;
				let local = scope.is_some_and(|s| &s.org == org && &s.repo == repo);
				let title = if local { format!("#{n}") } else { format!("{org}/{repo}#{n}") };
				Ok(Link::new(title, url))
			}
		}
	}

	/// Checklist lines of `text` as nodes, nested by indentation. Unchecked items are `0/1`, checked `1/1`.
	pub fn checklist_tree(&self, text: &str) -> Result<Vec<Node>> {
		let mut roots = Vec::new();
		let mut stack: Vec<(usize, Node)> = Vec::new();
		for item in checklist(text) {
			let mut node = Node {
				progress: Some(if item.checked { Progress::DONE } else { Progress::PENDING }),
				..Default::default()
			};
			self.apply_title(&mut node, &item.text, Vec::new())?;
			while stack.last().is_some_and(|(indent, _)| *indent >= item.indent) {
				if let Some((_, done)) = stack.pop() {
					fold(&mut stack, &mut roots, done);
				}
			}
			stack.push((item.indent, node));
		}
		while let Some((_, done)) = stack.pop() {
			fold(&mut stack, &mut roots, done);
		}
		Ok(roots)
	}
}

fn fold(stack: &mut [(usize, Node)], roots: &mut Vec<Node>, node: Node) {
	match stack.last_mut() {
		Some((_, parent)) => parent.children.push(node),
		None => roots.push(node),
	}
}

/// Short references in `text`, unresolved. Used to decide what has to be prefetched.
pub fn short_refs(text: &str) -> Vec<ShortRef> {
	let url_spans: Vec<(usize, usize)> = URL.find_iter(text).map(|m| (m.start(), m.end())).collect();
	SHORT_REF
		.captures_iter(text)
		.filter(|caps| caps.get(0).is_some_and(|m| !url_spans.iter().any(|&(s, e)| m.start() < e && s < m.end())))
		.filter_map(|caps| {
			let number = caps[3].parse().ok()?;
			let repo = caps.get(1).zip(caps.get(2)).map(|(o, r)| (o.as_str().to_string(), r.as_str().to_string()));
			Some(ShortRef { repo, number })
		})
		.collect()
}

/// Cut the first `[P<n>]` tag out of `text`.
pub fn strip_priority(text: &str) -> Result<(Option<u32>, String)> {
	let Some(caps) = PRIORITY.captures(text) else {
		return Ok((None, text.to_string()));
	};
	let priority = caps[1].parse::<u32>().map_err(|_| Error::MalformedField {
		field: "priority",
		fragment: caps[0].trim().to_string(),
	})?;
	Ok((Some(priority), PRIORITY.replace(text, "").into_owned()))
}

/// `**Priority:** P2` (brackets optional).
pub fn parse_priority_field(value: &str) -> Result<u32> {
	let value = value.trim();
	let malformed = || Error::MalformedField {
		field: "priority",
		fragment: value.to_string(),
	};
	let caps = PRIORITY_FIELD.captures(value).ok_or_else(malformed)?;
	caps[1].parse().map_err(|_| malformed())
}

/// `NN%` -> `NN/100`, else `A/B`. `0%` means untracked and yields `None`.
pub fn parse_progress(value: &str) -> Result<Option<Progress>> {
	let malformed = |fragment: &str| Error::MalformedField {
		field: "progress",
		fragment: fragment.to_string(),
	};
	if let Some(caps) = PERCENT.captures(value) {
		let done: u32 = caps[1].parse().map_err(|_| malformed(&caps[0]))?;
		return Ok((done != 0).then_some(Progress::new(done, 100)));
	}
	if let Some(caps) = PARTS.captures(value) {
		let done = caps[1].parse().map_err(|_| malformed(&caps[0]))?;
		let total = caps[2].parse().map_err(|_| malformed(&caps[0]))?;
		return Ok(Some(Progress::new(done, total)));
	}
	Ok(None)
}

/// Every checklist line of `text`.
pub fn checklist(text: &str) -> Vec<ChecklistItem> {
	CHECKLIST
		.captures_iter(text)
		.map(|caps| ChecklistItem {
			indent: caps[1].chars().map(|c| if c == '\t' { 4 } else { 1 }).sum(),
			checked: &caps[2] != " ",
			text: caps[3].to_string(),
		})
		.collect()
}
