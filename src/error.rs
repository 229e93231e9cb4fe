//! Error types of the resolution engine.
//!
//! Uses miette for diagnostic codes and help texts. Every variant names the offending fragment or link,
//! so a failed run can always be traced back to the source text that caused it.

#![allow(unused_assignments)] // Fields are read by miette's derive macro via attributes

use miette::Diagnostic;

use crate::Link;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum Error {
	#[error("malformed {field}: {fragment:?}")]
	#[diagnostic(code(okrs::parse::malformed_field), help("priorities are written as `[P1]`, progress as `40%` or `2/5`"))]
	MalformedField { field: &'static str, fragment: String },

	#[error("ambiguous parent: {}", fmt_links(.candidates))]
	#[diagnostic(code(okrs::parse::ambiguous_parent), help("a `Parent:` field must reference exactly one issue or url"))]
	AmbiguousParent { candidates: Vec<Link> },

	#[error("cannot resolve reference {reference}")]
	#[diagnostic(code(okrs::resolve::unresolved))]
	UnresolvedReference { reference: String },

	#[error(
		"incorrect parent of {}: {} (declared by the node) vs {} (from the local subtree of {})",
		short(.node),
		short(.declared),
		short(.claimed),
		short(.claimed)
	)]
	#[diagnostic(code(okrs::resolve::parent_conflict), help("remove one of the two parent declarations"))]
	ParentConflict { node: Link, declared: Link, claimed: Link },

	#[error("attaching {node} under {parent} would create a cycle")]
	#[diagnostic(code(okrs::resolve::cycle), help("a node cannot be its own parent or the parent of one of its ancestors"))]
	Cycle { node: String, parent: String },
}

/// Title if there is one, the url otherwise.
fn short(link: &Link) -> &str {
	if link.title.is_empty() { &link.url } else { &link.title }
}

fn fmt_links(links: &[Link]) -> String {
	links.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
