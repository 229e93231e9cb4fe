//! Whole runs against the in-memory GitHub client.

use std::path::PathBuf;

use okrs::{
	Error, Link, Node, Progress,
	config::{AppConfig, GithubConfig, OrgConfig, ProjectConfig, RepoConfig},
	github::{api_issue_url, html_issue_url},
	mock_github::MockGitHubClient,
	pipeline::build_tree,
};

fn config(orgs: Vec<OrgConfig>, markdown: Vec<PathBuf>) -> AppConfig {
	AppConfig {
		github: Some(GithubConfig {
			orgs,
			..Default::default()
		}),
		markdown,
		output: Vec::new(),
	}
}

fn repo(org: &str, repo: &str) -> OrgConfig {
	OrgConfig::new(org, vec![RepoConfig::new(repo)], Vec::new())
}

fn issue_link(number: u64) -> Option<Link> {
	Some(Link::new(format!("#{number}"), html_issue_url("o", "r", number)))
}

#[tokio::test]
async fn declared_parent_nests_issues() {
	let gh = MockGitHubClient::new();
	gh.add_issue("o", "r", 1, "Child", "**Parent:** #2");
	gh.add_issue("o", "r", 2, "Parent", "");

	let tree = build_tree(&config(vec![repo("o", "r")], Vec::new()), Some(&gh)).await.unwrap();
	// single org with a single repo: the repository is the root
	assert_eq!(tree.title, "r");
	assert_eq!(tree.link, Some(Link::new("r", "https://github.com/o/r")));
	assert_eq!(
		tree.children,
		vec![Node {
			id: Some(api_issue_url("o", "r", 2)),
			link: issue_link(2),
			children: vec![Node {
				id: Some(api_issue_url("o", "r", 1)),
				link: issue_link(1),
				parent_ref: issue_link(2),
				..Node::with_title("Child")
			}],
			..Node::with_title("Parent")
		}]
	);
}

#[tokio::test]
async fn mutual_parents_fail() {
	let gh = MockGitHubClient::new();
	gh.add_issue("o", "r", 1, "One", "**Parent:** #2");
	gh.add_issue("o", "r", 2, "Two", "**Parent:** #1");

	let err = build_tree(&config(vec![repo("o", "r")], Vec::new()), Some(&gh)).await.unwrap_err();
	assert!(
		matches!(err.downcast_ref::<Error>(), Some(Error::Cycle { .. } | Error::ParentConflict { .. })),
		"{err:?}"
	);
}

#[tokio::test]
async fn checklists_and_closed_references() {
	let gh = MockGitHubClient::new();
	gh.add_issue("o", "r", 1, "Epic", "Tracking issue.\n\n- [ ] #2\n- [x] #3\n- [ ] write the announcement\n");
	gh.add_issue("o", "r", 2, "Backend", "");
	gh.add_issue("o", "r", 3, "Frontend", "");
	gh.close_issue("o", "r", 3);

	let tree = build_tree(&config(vec![repo("o", "r")], Vec::new()), Some(&gh)).await.unwrap();
	assert!(gh.get_call_log().contains(&"fetch_issue(o, r, 3)".to_string()));

	let epic = &tree.children[0];
	assert_eq!(epic.title, "Epic");
	assert_eq!(epic.description, "Tracking issue.");
	let children: Vec<(&str, Option<&str>)> = epic.children.iter().map(|c| (c.title.as_str(), c.url())).collect();
	assert_eq!(
		children,
		[
			("Backend", Some("https://github.com/o/r/issues/2")),
			// closed, titled from the prefetched issue
			("Frontend", Some("https://github.com/o/r/issues/3")),
			("write the announcement", None),
		]
	);
	assert_eq!(epic.effective_progress(), Progress::new(1, 3));
	assert_eq!(tree.children.len(), 1);
}

#[tokio::test]
async fn unknown_reference_fails() {
	let gh = MockGitHubClient::new();
	gh.add_issue("o", "r", 1, "Epic", "- [ ] #42\n");

	let err = build_tree(&config(vec![repo("o", "r")], Vec::new()), Some(&gh)).await.unwrap_err();
	match err.downcast_ref::<Error>() {
		Some(Error::UnresolvedReference { reference }) => assert_eq!(reference, "o/r#42"),
		other => panic!("unexpected error: {other:?} ({err:?})"),
	}
}

#[tokio::test]
async fn markdown_and_issues_share_nodes() {
	let dir = tempfile::tempdir().unwrap();
	let doc = dir.path().join("okrs.md");
	std::fs::write(&doc, "# Roadmap\n- [ ] Launch https://github.com/o/r/issues/1\n").unwrap();

	let gh = MockGitHubClient::new();
	gh.add_issue("o", "r", 1, "Launch the product", "**Progress:** 30%");

	let tree = build_tree(&config(vec![repo("o", "r")], vec![doc]), Some(&gh)).await.unwrap();
	let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
	assert_eq!(titles, ["Roadmap", "r"]);

	let launch = &tree.children[0].children[0];
	assert_eq!(launch.title, "Launch");
	assert_eq!(launch.id, Some(api_issue_url("o", "r", 1)));
	assert_eq!(launch.link, issue_link(1));
	// explicit progress from the document wins over the body
	assert_eq!(launch.progress, Some(Progress::PENDING));
	assert!(tree.children[1].children.is_empty());
}

#[tokio::test]
async fn projects_list_cards_in_column_order() {
	let gh = MockGitHubClient::new();
	gh.add_issue("o", "r", 1, "Task one", "");
	gh.add_issue("o", "r", 5, "Old", "");
	gh.close_issue("o", "r", 5);

	let board = gh.add_project("o", "Board");
	gh.add_project("o", "Ignored");
	let todo = gh.add_column(board, "To do");
	gh.add_note_card(todo, "Plan\n- [x] draft\n- [ ] review\n");
	gh.add_issue_card(todo, &api_issue_url("o", "r", 1));
	let done = gh.add_column(board, "Done");
	gh.add_issue_card(done, &api_issue_url("o", "r", 5));

	let org = OrgConfig::new("o", vec![RepoConfig::new("r")], vec![ProjectConfig::new("Board")]);
	let tree = build_tree(&config(vec![org], Vec::new()), Some(&gh)).await.unwrap();

	// two children, so the org node stays
	assert_eq!(tree.title, "o");
	assert_eq!(tree.link, Some(Link::new("o", "https://github.com/o")));
	let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
	assert_eq!(titles, ["Board", "r"]);

	let board = &tree.children[0];
	assert_eq!(board.children.len(), 3);
	let note = &board.children[0];
	assert_eq!(note.description, "Plan\n- [x] draft\n- [ ] review");
	assert_eq!(note.effective_progress(), Progress::new(1, 2));
	// owned by the repository, listed by reference
	assert_eq!(board.children[1].title, "Task one");
	assert_eq!(board.children[1].id, None);
	assert_eq!(tree.children[1].children[0].id, Some(api_issue_url("o", "r", 1)));
	// closed issue, fetched for the card
	assert_eq!(board.children[2].title, "Old");
	assert_eq!(board.children[2].link, Some(Link::new("o/r#5", html_issue_url("o", "r", 5))));
	// only the configured board was walked
	assert_eq!(gh.get_call_log().iter().filter(|c| c.starts_with("list_project_columns")).count(), 1);
}

#[tokio::test]
async fn several_orgs_keep_their_nodes() {
	let gh = MockGitHubClient::new();
	gh.add_issue("a", "x", 1, "From a", "");
	gh.add_issue("b", "y", 1, "From b", "");
	gh.add_issue("b", "z", 1, "Also from b", "");

	let orgs = vec![repo("a", "x"), OrgConfig::new("b", vec![RepoConfig::new("y"), RepoConfig::new("z")], Vec::new())];
	let tree = build_tree(&config(orgs, Vec::new()), Some(&gh)).await.unwrap();

	// `a` has one repository and contributes it directly, `b` keeps its org node
	let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
	assert_eq!(titles, ["b", "x"]);
	let b: Vec<&str> = tree.children[0].children.iter().map(|c| c.title.as_str()).collect();
	assert_eq!(b, ["y", "z"]);
}

#[tokio::test]
async fn checklist_item_from_another_repository_keeps_its_parent() {
	let gh = MockGitHubClient::new();
	gh.add_issue("o", "r1", 7, "Roadmap", "- [ ] o/r2#3\n");
	gh.add_issue("o", "r2", 1, "Epic", "");
	gh.add_issue("o", "r2", 3, "Task", "**Parent:** #1\n");

	let mut trees = Vec::new();
	for repos in [["r1", "r2"], ["r2", "r1"]] {
		let org = OrgConfig::new("o", repos.iter().map(|r| RepoConfig::new(*r)).collect(), Vec::new());
		trees.push(build_tree(&config(vec![org], Vec::new()), Some(&gh)).await.unwrap());
	}
	assert_eq!(trees[0], trees[1]);

	let tree = &trees[0];
	let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
	assert_eq!(titles, ["r1", "r2"]);

	// listed in the roadmap through a copy
	let roadmap = &tree.children[0].children[0];
	assert_eq!(roadmap.title, "Roadmap");
	assert_eq!(roadmap.children[0].title, "Task");
	assert_eq!(roadmap.children[0].link, Some(Link::new("o/r2#3", html_issue_url("o", "r2", 3))));
	assert_eq!(roadmap.children[0].id, None);

	// owned by its repository, under the parent its body declares
	let r2 = &tree.children[1];
	assert_eq!(r2.children.len(), 1);
	let epic = &r2.children[0];
	assert_eq!(epic.title, "Epic");
	assert_eq!(epic.children[0].id, Some(api_issue_url("o", "r2", 3)));
	assert_eq!(epic.children[0].parent_ref, Some(Link::new("#1", html_issue_url("o", "r2", 1))));
}

#[tokio::test]
async fn malformed_field_skips_only_its_source() {
	let dir = tempfile::tempdir().unwrap();
	let bad = dir.path().join("bad.md");
	std::fs::write(&bad, "# Other\n\n**Priority:** high\n").unwrap();
	let good = dir.path().join("good.md");
	std::fs::write(&good, "# Plan\n- [ ] Ship\n").unwrap();

	let gh = MockGitHubClient::new();
	gh.add_issue("o", "r", 1, "Valid", "**Priority:** P1");
	gh.add_issue("o", "r", 2, "Broken", "**Priority:** high\n\n- [ ] #1\n");

	let tree = build_tree(&config(vec![repo("o", "r")], vec![bad, good]), Some(&gh)).await.unwrap();
	let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
	assert_eq!(titles, ["Plan", "r"]);

	// the broken body is ignored, its issue stays
	let issues: Vec<(&str, Option<u32>)> = tree.children[1].children.iter().map(|c| (c.title.as_str(), c.priority)).collect();
	assert_eq!(issues, [("Valid", Some(1)), ("Broken", None)]);
	assert!(tree.children[1].children[1].children.is_empty());
}
