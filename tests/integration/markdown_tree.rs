//! Documents through the library API: several documents into one tree.

use okrs::{
	Error, Link, Node, Progress, Tree,
	document::{Document, build_document, parse_markdown},
	fragment::Extractor,
};

fn build(docs: &[&str]) -> okrs::Result<Node> {
	let mut tree = Tree::new();
	for doc in docs {
		build_document(&mut tree, &Document::parse(doc), &Extractor::plain())?;
	}
	tree.promote_root();
	Ok(tree.to_node())
}

#[test]
fn progress_fields() {
	let root = parse_markdown("# A\n\n**Progress:** 50%\n\n# B\n\n**Progress:** 2/5\n\n# C\n\n**Progress:** 50% (2/5)\n").unwrap();
	let progress: Vec<_> = root.children.iter().map(|c| c.progress).collect();
	assert_eq!(progress, [Some(Progress::new(50, 100)), Some(Progress::new(2, 5)), Some(Progress::new(50, 100))]);
}

#[test]
fn same_item_in_two_documents_is_one_node() {
	let root = build(&[
		"# Q3\n- [ ] Migrate [tracker](https://example.com/t/1)\n",
		"# Q3\n- [ ] [P2] Migrate https://example.com/t/1\n- [x] Hire\n",
	])
	.unwrap();
	assert_eq!(root.title, "Q3");
	assert_eq!(
		root.children,
		vec![
			Node {
				link: Some(Link::new("tracker", "https://example.com/t/1")),
				priority: Some(2),
				progress: Some(Progress::PENDING),
				..Node::with_title("Migrate")
			},
			Node {
				progress: Some(Progress::DONE),
				..Node::with_title("Hire")
			},
		]
	);
}

#[test]
fn equal_titles_with_different_links_stay_apart() {
	let root = parse_markdown("# Ops\n- [ ] Rotate keys https://example.com/a\n- [ ] Rotate keys https://example.com/b\n").unwrap();
	assert_eq!(root.children.len(), 2);
}

#[test]
fn skipped_heading_levels_collapse() {
	let root = parse_markdown("# Top\n#### Deep\n- [ ] leaf\n").unwrap();
	assert_eq!(root.title, "Top");
	assert_eq!(root.children.len(), 1);
	assert_eq!(root.children[0].title, "Deep");
	assert_eq!(root.children[0].children[0].title, "leaf");
}

#[test]
fn malformed_priority_field() {
	let err = parse_markdown("# Goal\n\n**Priority:** high\n").unwrap_err();
	assert!(matches!(err, Error::MalformedField { field: "priority", .. }), "{err:?}");
}
