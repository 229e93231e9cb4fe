//! Output writers for a resolved tree.

mod markdown;
mod mindmup;

use std::{
	fs,
	io::{self, Write},
	path::Path,
};

use color_eyre::eyre::{Result, WrapErr, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use markdown::to_markdown;
pub use mindmup::to_mindmup;

use crate::{Node, config::Output};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
	#[default]
	Json,
	Yaml,
	#[serde(rename = "md")]
	#[value(name = "md")]
	Markdown,
	#[serde(rename = "mindmup")]
	#[value(name = "mindmup")]
	MindMup,
}

impl Format {
	pub const ALL: [Format; 4] = [Format::Json, Format::Yaml, Format::Markdown, Format::MindMup];

	pub fn name(&self) -> &'static str {
		match self {
			Format::Json => "json",
			Format::Yaml => "yaml",
			Format::Markdown => "md",
			Format::MindMup => "mindmup",
		}
	}

	pub fn ext(&self) -> &'static str {
		match self {
			Format::Json => "json",
			Format::Yaml => "yml",
			Format::Markdown => "md",
			Format::MindMup => "mup",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|f| f.name() == name)
	}

	/// By the extension of `path`; `.yaml` is accepted next to `.yml`.
	pub fn from_path(path: &Path) -> Option<Self> {
		match path.extension()?.to_str()? {
			"yaml" => Some(Format::Yaml),
			ext => Self::ALL.into_iter().find(|f| f.ext() == ext),
		}
	}

	pub fn write(&self, w: &mut dyn Write, node: &Node) -> Result<()> {
		match self {
			Format::Json => write_json(w, node)?,
			Format::Yaml => serde_yaml::to_writer(&mut *w, node)?,
			Format::Markdown => w.write_all(to_markdown(node).as_bytes())?,
			Format::MindMup => write_json(w, &to_mindmup(node))?,
		}
		w.flush()?;
		Ok(())
	}
}

/// Tab-indented, newline-terminated.
fn write_json<T: Serialize>(w: &mut dyn Write, value: &T) -> Result<()> {
	let mut ser = serde_json::Serializer::with_formatter(&mut *w, serde_json::ser::PrettyFormatter::with_indent(b"\t"));
	value.serialize(&mut ser)?;
	w.write_all(b"\n")?;
	Ok(())
}

impl Output {
	pub fn is_stdout(&self) -> bool {
		self.path.is_empty() || self.path == "-"
	}

	/// The format to write in: explicit, else by extension, else JSON on stdout.
	pub fn resolved_format(&self) -> Result<Format> {
		if let Some(format) = self.format {
			return Ok(format);
		}
		if self.is_stdout() {
			return Ok(Format::Json);
		}
		match Format::from_path(Path::new(&self.path)) {
			Some(format) => Ok(format),
			None => bail!("unknown format for output {:?}, set `format` to one of: json, yaml, md, mindmup", self.path),
		}
	}

	/// Write `node` to stdout or to `path`, appending the format's extension when the path lacks it.
	pub fn write_tree(&self, node: &Node) -> Result<()> {
		let format = self.resolved_format()?;
		if self.is_stdout() {
			return format.write(&mut io::stdout().lock(), node);
		}
		let mut path = self.path.clone();
		if Format::from_path(Path::new(&path)) != Some(format) {
			path = format!("{path}.{}", format.ext());
		}
		let mut file = io::BufWriter::new(fs::File::create(&path).wrap_err_with(|| format!("creating {path}"))?);
		format.write(&mut file, node)?;
		info!(path = %path, format = format.name(), "wrote tree");
		Ok(())
	}
}
