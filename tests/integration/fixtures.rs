//! Shared fixtures: a scratch directory and a way to run the `okrs` binary inside it.

use std::{
	fs,
	path::{Path, PathBuf},
	process::{Command, Output},
};

use rstest::fixture;
use tempfile::TempDir;

pub struct Ctx {
	pub dir: TempDir,
	pub trace_file: PathBuf,
}

#[fixture]
pub fn ctx() -> Ctx {
	let dir = tempfile::tempdir().unwrap();
	let trace_file = dir.path().join("trace.jsonl");
	Ctx { dir, trace_file }
}

impl Ctx {
	pub fn path(&self, name: &str) -> PathBuf {
		self.dir.path().join(name)
	}

	pub fn write(&self, name: &str, content: &str) -> PathBuf {
		let path = self.path(name);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).unwrap();
		}
		fs::write(&path, content).unwrap();
		path
	}

	pub fn read(&self, name: &str) -> String {
		fs::read_to_string(self.path(name)).unwrap_or_else(|e| panic!("reading {name}: {e}"))
	}

	/// Run the binary with the given arguments, tracing to [Ctx::trace_file].
	pub fn run(&self, args: &[&str]) -> Output {
		Command::new(env!("CARGO_BIN_EXE_okrs"))
			.args(args)
			.current_dir(self.dir.path())
			.env("OKRS_TRACE_FILE", &self.trace_file)
			.env("RUST_LOG", "debug")
			.env_remove("GITHUB_TOKEN")
			.output()
			.expect("Failed to execute okrs")
	}
}

pub fn display(path: &Path) -> String {
	path.to_string_lossy().into_owned()
}
