//! Markdown documents: parsing into an owned block model, and conversion into the node tree.

mod builder;
mod model;

pub use builder::{build_document, parse_markdown};
pub use model::{Block, Document, Inline, ListItem, plain_text};
