//! Owned document tree built from pulldown_cmark events.
//!
//! Only the shapes the tree builder cares about survive: headings, paragraphs, lists with task markers,
//! and the inline text/link/strong structure inside them. Everything else collapses into [Block::Other].

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
	pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
	Heading { level: u8, inlines: Vec<Inline> },
	Paragraph(Vec<Inline>),
	List(Vec<ListItem>),
	/// Code blocks, quotes, tables, html. Ignored by the builder.
	Other,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListItem {
	/// `None` for a plain bullet, `Some(done)` for `- [ ]` / `- [x]`.
	pub checked: Option<bool>,
	pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
	Text(String),
	Code(String),
	Strong(Vec<Inline>),
	Emphasis(Vec<Inline>),
	Link { url: String, title: String, children: Vec<Inline> },
	SoftBreak,
	HardBreak,
}

impl Document {
	/// Parse markdown with task lists and strikethrough enabled. CRLF line endings are normalized first.
	pub fn parse(content: &str) -> Self {
		let content = content.replace("\r\n", "\n");
		let options = Options::ENABLE_TASKLISTS | Options::ENABLE_STRIKETHROUGH;
		let mut reader = Reader {
			events: Parser::new_ext(&content, options),
			task: None,
		};
		Self { blocks: reader.blocks() }
	}
}

/// Text of inlines with links included, breaks as spaces.
pub fn plain_text(inlines: &[Inline]) -> String {
	let mut out = String::new();
	for inline in inlines {
		match inline {
			Inline::Text(s) | Inline::Code(s) => out.push_str(s),
			Inline::Strong(c) | Inline::Emphasis(c) | Inline::Link { children: c, .. } => out.push_str(&plain_text(c)),
			Inline::SoftBreak | Inline::HardBreak => out.push(' '),
		}
	}
	out
}

struct Reader<'a> {
	events: Parser<'a>,
	/// Task marker seen inside a paragraph, waiting for its item to claim it.
	task: Option<bool>,
}

impl Reader<'_> {
	fn blocks(&mut self) -> Vec<Block> {
		let mut blocks = Vec::new();
		while let Some(event) = self.events.next() {
			match event {
				Event::Start(tag) => blocks.push(self.block(tag)),
				Event::End(_) => break,
				_ => {}
			}
		}
		blocks
	}

	fn block(&mut self, tag: Tag<'_>) -> Block {
		match tag {
			Tag::Heading { level, .. } => Block::Heading {
				level: level as u8,
				inlines: self.inlines(),
			},
			Tag::Paragraph => Block::Paragraph(self.inlines()),
			Tag::List(_) => Block::List(self.items()),
			_ => {
				self.skip();
				Block::Other
			}
		}
	}

	fn items(&mut self) -> Vec<ListItem> {
		let mut items = Vec::new();
		while let Some(event) = self.events.next() {
			match event {
				Event::Start(Tag::Item) => items.push(self.item()),
				Event::End(_) => break,
				_ => {}
			}
		}
		items
	}

	fn item(&mut self) -> ListItem {
		let mut item = ListItem::default();
		// tight items carry their text without a paragraph
		let mut loose: Vec<Inline> = Vec::new();
		let flush = |loose: &mut Vec<Inline>, blocks: &mut Vec<Block>| {
			if !loose.is_empty() {
				blocks.push(Block::Paragraph(std::mem::take(loose)));
			}
		};
		while let Some(event) = self.events.next() {
			match event {
				Event::TaskListMarker(done) => item.checked = Some(done),
				Event::End(TagEnd::Item) => break,
				Event::Start(tag @ (Tag::Paragraph | Tag::Heading { .. } | Tag::List(_) | Tag::BlockQuote(_) | Tag::CodeBlock(_) | Tag::HtmlBlock | Tag::Table(_))) => {
					flush(&mut loose, &mut item.blocks);
					let block = self.block(tag);
					if item.checked.is_none() {
						item.checked = self.task.take();
					}
					item.blocks.push(block);
				}
				event => {
					if let Some(inline) = self.inline(event) {
						push_inline(&mut loose, inline);
					}
				}
			}
		}
		flush(&mut loose, &mut item.blocks);
		item
	}

	/// Inlines up to the end of the enclosing tag.
	fn inlines(&mut self) -> Vec<Inline> {
		let mut out = Vec::new();
		while let Some(event) = self.events.next() {
			if let Event::End(_) = event {
				break;
			}
			if let Some(inline) = self.inline(event) {
				push_inline(&mut out, inline);
			}
		}
		out
	}

	fn inline(&mut self, event: Event<'_>) -> Option<Inline> {
		match event {
			Event::Text(s) => Some(Inline::Text(s.into_string())),
			Event::Code(s) => Some(Inline::Code(s.into_string())),
			Event::SoftBreak => Some(Inline::SoftBreak),
			Event::HardBreak => Some(Inline::HardBreak),
			Event::TaskListMarker(done) => {
				self.task = Some(done);
				None
			}
			Event::Start(Tag::Strong) => Some(Inline::Strong(self.inlines())),
			Event::Start(Tag::Emphasis | Tag::Strikethrough) => Some(Inline::Emphasis(self.inlines())),
			Event::Start(Tag::Link { dest_url, title, .. }) => Some(Inline::Link {
				url: dest_url.into_string(),
				title: title.into_string(),
				children: self.inlines(),
			}),
			Event::Start(_) => {
				self.skip();
				None
			}
			_ => None,
		}
	}

	/// Consume events up to the end of the tag whose start was just read.
	fn skip(&mut self) {
		let mut depth = 1usize;
		for event in self.events.by_ref() {
			match event {
				Event::Start(_) => depth += 1,
				Event::End(_) => {
					depth -= 1;
					if depth == 0 {
						return;
					}
				}
				_ => {}
			}
		}
	}
}

/// Push, merging adjacent text.
fn push_inline(out: &mut Vec<Inline>, inline: Inline) {
	if let Inline::Text(s) = &inline
		&& let Some(Inline::Text(prev)) = out.last_mut()
	{
		prev.push_str(s);
		return;
	}
	out.push(inline);
}
