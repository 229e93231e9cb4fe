//! OKR trees out of markdown documents and GitHub issues.
//!
//! Every source contributes nodes to a single [Tree]. Nodes describing the same objective are recognized by
//! id, url or title and merged; declared and implied parents are reconciled into one hierarchy.

pub mod config;
pub mod document;
mod error;
pub mod format;
pub mod fragment;
pub mod github;
pub mod issues;
pub mod mock_github;
mod node;
pub mod pipeline;
mod tree;

pub use error::{Error, Result};
pub use node::{Link, Node, Progress, sibling_cmp};
pub use tree::{NodeId, Tree};
