//! The binary end to end, on markdown inputs only.

use okrs::{Link, Node, Progress};
use rstest::rstest;

use crate::{
	assert_traced,
	fixtures::{Ctx, ctx, display},
	tracing_utils::TraceLog,
};

const DOC: &str = "# Root\n## Child\n- [x] item #1\n- [ ] item #2\n";

#[rstest]
fn md_tree_to_json_file(ctx: Ctx) {
	let input = ctx.write("okrs.md", DOC);
	let out = ctx.run(&["md", "tree", &display(&input), "--format", "json", "--output", "tree"]);
	assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

	// the extension is appended
	let tree: Node = serde_json::from_str(&ctx.read("tree.json")).unwrap();
	assert_eq!(tree.title, "Root");
	let child = &tree.children[0];
	assert_eq!(child.title, "Child");
	assert_eq!(child.effective_progress(), Progress::new(1, 2));
	assert_eq!(child.children[0].link, Some(Link::new("#1", "#1")));

	let trace = TraceLog::from_file(&ctx.trace_file);
	assert_traced!(trace, "parsed markdown");
}

#[rstest]
fn md_tree_from_stdin_to_stdout(ctx: Ctx) {
	use std::{
		io::Write,
		process::{Command, Stdio},
	};

	let mut child = Command::new(env!("CARGO_BIN_EXE_okrs"))
		.args(["md", "tree", "-f", "md"])
		.current_dir(ctx.dir.path())
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.unwrap();
	child.stdin.take().unwrap().write_all(b"# Goal\n\n**Progress:** 40%\n").unwrap();
	let out = child.wait_with_output().unwrap();
	assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
	assert_eq!(String::from_utf8(out.stdout).unwrap(), "# Goal\n\n**Progress:** 40%\n\n");
}

#[rstest]
#[case("okrs.yml", "markdown: [a.md, b.md]\noutput:\n  - { path: OUT, format: yaml }\n")]
#[case("okrs.json", r#"{"markdown": ["a.md", "b.md"], "output": [{"path": "OUT", "format": "yaml"}]}"#)]
fn run_merges_documents(ctx: Ctx, #[case] name: &str, #[case] config: &str) {
	ctx.write("a.md", "# Plan\n- [ ] Launch https://example.com/launch\n");
	ctx.write("b.md", "# Plan\n\n**Priority:** P1\n\n- [x] Prepare\n");
	let out_path = display(&ctx.path("out"));
	let config = ctx.write(name, &config.replace("OUT", &out_path));

	let out = ctx.run(&["run", &display(&config)]);
	assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

	let tree: Node = serde_yaml::from_str(&ctx.read("out.yml")).unwrap();
	assert_eq!(tree.title, "Plan");
	assert_eq!(tree.priority, Some(1));
	let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
	assert_eq!(titles, ["Launch", "Prepare"]);
	assert_eq!(tree.children[0].link, Some(Link::url("https://example.com/launch")));
}

#[rstest]
fn run_without_outputs_fails(ctx: Ctx) {
	ctx.write("a.md", "# Plan\n");
	let config = ctx.write("okrs.yml", "markdown: [a.md]\n");
	let out = ctx.run(&["run", &display(&config)]);
	assert!(!out.status.success());
	assert!(String::from_utf8_lossy(&out.stderr).contains("no outputs specified"));
}

#[rstest]
fn ambiguous_parent_is_reported(ctx: Ctx) {
	let input = ctx.write("okrs.md", "# Goal\n\n**Parent:** #1 #2\n");
	let out = ctx.run(&["md", "tree", &display(&input)]);
	assert!(!out.status.success());
	let stderr = String::from_utf8_lossy(&out.stderr);
	assert!(stderr.contains("#1") && stderr.contains("#2"), "stderr: {stderr}");
}

#[rstest]
fn github_repo_needs_an_org(ctx: Ctx) {
	let out = ctx.run(&["github", "repo", "just-a-repo"]);
	assert!(!out.status.success());
	assert!(String::from_utf8_lossy(&out.stderr).contains("organization should be specified"));
}
