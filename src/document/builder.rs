//! Document -> [Tree] conversion.
//!
//! Heading depth and list nesting are the hierarchy signal. Skipped heading depths get proxy nodes,
//! which are collapsed once the document is done. Every sibling set the document fills is sorted at the end.

use tracing::debug;

use super::model::{Block, Document, Inline, ListItem, plain_text};
use crate::{Link, Node, NodeId, Progress, Result, Tree, fragment::Extractor};

/// Build a standalone tree out of one markdown document, with the root promoted.
pub fn parse_markdown(text: &str) -> Result<Node> {
	let mut tree = Tree::new();
	build_document(&mut tree, &Document::parse(text), &Extractor::plain())?;
	tree.promote_root();
	Ok(tree.to_node())
}

/// Add a document to a shared tree, under its current root. The root is not promoted here.
pub fn build_document(tree: &mut Tree, doc: &Document, extractor: &Extractor<'_>) -> Result<()> {
	let root = tree.root();
	let mut builder = Builder {
		tree,
		extractor,
		stack: vec![root],
		last: root,
		parents: vec![root],
	};
	for block in &doc.blocks {
		builder.block(block)?;
	}
	let Builder { tree, mut parents, .. } = builder;
	tree.collapse_proxies(root);
	parents.sort();
	parents.dedup();
	for parent in parents {
		tree.sort_children(parent);
	}
	Ok(())
}

struct Builder<'t, 'e> {
	tree: &'t mut Tree,
	extractor: &'e Extractor<'e>,
	/// `stack[d]` is the current node at heading depth `d`.
	stack: Vec<NodeId>,
	/// Most recently built node, receives the next paragraph.
	last: NodeId,
	/// Nodes that received children.
	parents: Vec<NodeId>,
}

impl Builder<'_, '_> {
	fn block(&mut self, block: &Block) -> Result<()> {
		match block {
			Block::Heading { level, inlines } => self.heading(*level as usize, inlines),
			Block::Paragraph(inlines) => {
				let mut fields = Node::default();
				let desc = self.paragraph(&mut fields, &split_lines(inlines))?;
				self.tree.merge(self.last, &fields);
				self.tree.append_description(self.last, &desc);
				Ok(())
			}
			Block::List(items) => {
				let parent = self.current();
				for item in items {
					self.item(item, parent)?;
				}
				Ok(())
			}
			Block::Other => Ok(()),
		}
	}

	fn current(&self) -> NodeId {
		self.stack.last().copied().unwrap_or_else(|| self.tree.root())
	}

	fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
		self.tree.attach(parent, child)?;
		self.parents.push(parent);
		Ok(())
	}

	/// Register a node that is about to go under `parent`. A match on `parent` itself or one of its ancestors
	/// (`# Docs` then `## Docs`) stays a node of its own.
	fn register_under(&mut self, parent: NodeId, candidate: Node) -> Result<NodeId> {
		match self.tree.find(&candidate) {
			Some(existing) if self.tree.is_ancestor(existing, parent) => {
				debug!(title = %candidate.title, "same as an enclosing node, kept apart");
				self.tree.insert(candidate)
			}
			_ => self.tree.register(candidate),
		}
	}

	fn heading(&mut self, level: usize, inlines: &[Inline]) -> Result<()> {
		let level = level.max(1);
		self.stack.truncate(level);
		while self.stack.len() < level {
			let parent = self.current();
			let proxy = self.tree.insert(Node::default())?;
			self.attach(parent, proxy)?;
			self.stack.push(proxy);
		}

		let (text, links) = flatten(inlines);
		let mut candidate = Node::default();
		self.extractor.apply_title(&mut candidate, text.trim().trim_end_matches(':').trim_end(), links)?;
		let parent = self.current();
		let id = self.register_under(parent, candidate)?;
		self.attach(parent, id)?;
		debug!(level, title = %self.tree.label(id), "heading");
		self.stack.push(id);
		self.last = id;
		Ok(())
	}

	fn item(&mut self, item: &ListItem, parent: NodeId) -> Result<()> {
		let mut candidate = Node {
			progress: item.checked.map(|done| if done { Progress::DONE } else { Progress::PENDING }),
			..Default::default()
		};
		let mut titled = false;
		let mut nested = Vec::new();
		for block in &item.blocks {
			match block {
				Block::Paragraph(inlines) => {
					let lines = split_lines(inlines);
					let rest = if titled {
						&lines[..]
					} else {
						titled = true;
						let (text, links) = lines.first().map(|l| flatten(l)).unwrap_or_default();
						self.extractor.apply_title(&mut candidate, &text, links)?;
						lines.get(1..).unwrap_or_default()
					};
					let desc = self.paragraph(&mut candidate, rest)?;
					append(&mut candidate.description, &desc);
				}
				Block::List(items) => nested.push(items),
				Block::Heading { .. } | Block::Other => {}
			}
		}

		let id = self.register_under(parent, candidate)?;
		self.attach(parent, id)?;
		self.last = id;
		for items in nested {
			for child in items {
				self.item(child, id)?;
			}
		}
		Ok(())
	}

	/// Apply `**Field:** value` lines to `node`, return the remaining lines as description.
	fn paragraph(&self, node: &mut Node, lines: &[&[Inline]]) -> Result<String> {
		let mut desc = String::new();
		for line in lines {
			let line = trim_leading_space(line);
			if let Some((Inline::Strong(key), value)) = line.split_first() {
				let (value, links) = flatten(value);
				if self.extractor.apply_field(node, &plain_text(key), value.trim(), links)? {
					continue;
				}
			}
			append(&mut desc, plain_text(line).trim());
		}
		Ok(desc)
	}
}

fn append(desc: &mut String, text: &str) {
	if text.is_empty() {
		return;
	}
	if !desc.is_empty() {
		desc.push('\n');
	}
	desc.push_str(text);
}

fn split_lines(inlines: &[Inline]) -> Vec<&[Inline]> {
	inlines
		.split(|i| matches!(i, Inline::SoftBreak | Inline::HardBreak))
		.filter(|line| !line.is_empty())
		.collect()
}

fn trim_leading_space(line: &[Inline]) -> &[Inline] {
	match line.split_first() {
		Some((Inline::Text(s), rest)) if s.trim().is_empty() => rest,
		_ => line,
	}
}

/// Text of inlines with markdown links cut out and returned as structured links.
fn flatten(inlines: &[Inline]) -> (String, Vec<Link>) {
	let mut text = String::new();
	let mut links = Vec::new();
	flatten_into(inlines, &mut text, &mut links);
	(text, links)
}

fn flatten_into(inlines: &[Inline], text: &mut String, links: &mut Vec<Link>) {
	for inline in inlines {
		match inline {
			Inline::Text(s) | Inline::Code(s) => text.push_str(s),
			Inline::Strong(c) | Inline::Emphasis(c) => flatten_into(c, text, links),
			Inline::Link { url, title, children } => {
				let title = if title.is_empty() { plain_text(children) } else { title.clone() };
				links.push(Link::new(title, url.clone()));
				text.push(' ');
			}
			Inline::SoftBreak | Inline::HardBreak => text.push(' '),
		}
	}
}
