//! Markdown rendering.
//!
//! Headings while the tree is a single chain or its subtrees carry descriptions, nested bullets once a level
//! has siblings without any description below them.

use std::fmt::Write;

use crate::{Node, Progress};

pub fn to_markdown(root: &Node) -> String {
	let mut out = String::new();
	write_node(&mut out, root, 1, None);
	out
}

/// Bullet depth: `None` while the chain has not branched, `Some(0)` once it has, `Some(n)` inside bullets.
fn write_node(out: &mut String, node: &Node, level: usize, bullet: Option<usize>) {
	if let Some(depth) = bullet.filter(|&d| d > 0) {
		let mut title = node.title.clone();
		if let Some(p) = node.priority {
			title = format!("[P{p}] {title}");
		}
		if let Some(link) = node.link.as_ref().filter(|l| !l.url.is_empty()) {
			let text = if link.title.is_empty() { "link" } else { link.title.as_str() };
			let _ = write!(title, " ([{text}]({}))", link.url);
		}
		let _ = writeln!(out, "{}* {title}", "\t".repeat(depth - 1));
		for c in &node.children {
			write_node(out, c, level + 1, Some(depth + 1));
		}
		return;
	}

	if !node.title.is_empty() {
		let _ = write!(out, "{} {}\n\n", "#".repeat(level), node.title);
	}
	if let Some(url) = node.url() {
		let _ = write!(out, "[Source page]({url})\n\n");
	}
	let progress = node.effective_progress();
	if progress != Progress::default() {
		let _ = write!(out, "**Progress:** {progress}\n\n");
	}
	let mut bullet = bullet;
	if !node.description.is_empty() {
		bullet.get_or_insert(0);
		let _ = write!(out, "{}\n\n", node.description);
	}

	if bullet == Some(0) && !node.children.iter().any(has_description) {
		for c in &node.children {
			write_node(out, c, level + 1, Some(1));
		}
		out.push('\n');
		return;
	}
	for c in &node.children {
		let b = if bullet.is_none() && node.children.len() > 1 { Some(0) } else { bullet };
		write_node(out, c, level + 1, b);
	}
}

fn has_description(node: &Node) -> bool {
	!node.description.is_empty() || node.children.iter().any(has_description)
}
