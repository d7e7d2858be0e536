//! Mapping editor lines onto the mounted tree.
//!
//! The renderer collapses runs of blank lines, so the source line is first
//! shifted down by the number of extra blank lines above it. The mounted
//! children are then walked, summing their line spans, until the shifted
//! line is reached.

use crate::cancel::{Cancelled, Checkpoint};
use crate::markup::NodeRef;
use crate::patch::MountedTree;

/// Number of lines `i` with `2 <= i < source_line` (1-based) where both line
/// `i` and line `i - 1` are blank.
///
/// A line holding only whitespace counts as blank, since markdown treats it
/// as an empty line. Lines past the end of `lines` are not blank.
pub fn blank_run_count<S: AsRef<str>>(lines: &[S], source_line: usize) -> usize {
    let blank = |line: usize| {
        lines
            .get(line - 1)
            .is_some_and(|text| text.as_ref().trim().is_empty())
    };
    (2..source_line)
        .filter(|&line| blank(line) && blank(line - 1))
        .count()
}

/// Find the node the editor's `source_line` corresponds to.
///
/// Returns `Ok(None)` when the tree is empty or no addressable node sits at
/// or before the target.
///
/// # Errors
/// Returns [`Cancelled`] when the checkpoint reports cancellation.
pub fn locate<S: AsRef<str>>(
    mounted: &MountedTree,
    source_line: usize,
    lines: &[S],
    cx: &mut Checkpoint<'_>,
) -> Result<Option<NodeRef>, Cancelled> {
    let children = mounted.children();
    if children.is_empty() {
        return Ok(None);
    }

    let skipped = blank_run_count(lines, source_line);
    let target = source_line.saturating_sub(skipped);

    let mut covered = 0;
    let mut hit = children.len() - 1;
    for (index, child) in children.iter().enumerate() {
        cx.step()?;
        covered += child.line_span();
        if covered >= target {
            hit = index;
            break;
        }
    }

    for child in children[..=hit].iter().rev() {
        cx.step()?;
        if child.is_addressable() {
            tracing::trace!(source_line, target, id = child.id(), "located cursor");
            return Ok(Some(NodeRef::clone(child)));
        }
    }
    tracing::trace!(source_line, target, "no addressable node before cursor");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cancel::CancelToken;
    use crate::diff::Patch;
    use crate::markup::{MarkupNode, Tree};
    use crate::patch;

    fn mounted(nodes: Vec<NodeRef>) -> MountedTree {
        let mut mounted = MountedTree::new();
        patch::apply(
            &mut mounted,
            Patch::Mount(Tree::from(nodes)),
            &mut Checkpoint::detached(),
        )
        .unwrap();
        mounted
    }

    fn block(id: &str, text: &str) -> NodeRef {
        MarkupNode::with_text("p", text).with_id(id).into_ref()
    }

    fn sep() -> NodeRef {
        MarkupNode::text("\n").into_ref()
    }

    fn locate_id(mounted: &MountedTree, line: usize, lines: &[&str]) -> Option<String> {
        locate(mounted, line, lines, &mut Checkpoint::detached())
            .unwrap()
            .and_then(|node| node.id().map(ToOwned::to_owned))
    }

    #[test]
    fn test_blank_run_count_collapses_runs() {
        let lines = ["a", "", "", "b"];
        assert_eq!(blank_run_count(&lines, 4), 1);
        assert_eq!(4 - blank_run_count(&lines, 4), 3);
    }

    #[test]
    fn test_blank_run_count_ignores_single_blanks() {
        let lines = ["a", "", "b", "", "c"];
        assert_eq!(blank_run_count(&lines, 5), 0);
    }

    #[test]
    fn test_blank_run_count_only_looks_above_cursor() {
        let lines = ["a", "", "", "", "b"];
        assert_eq!(blank_run_count(&lines, 1), 0);
        assert_eq!(blank_run_count(&lines, 3), 0);
        assert_eq!(blank_run_count(&lines, 4), 1);
        assert_eq!(blank_run_count(&lines, 5), 2);
    }

    #[test]
    fn test_blank_run_count_treats_whitespace_as_blank() {
        let lines = ["a", "  ", "\t", "b"];
        assert_eq!(blank_run_count(&lines, 4), 1);
    }

    #[test]
    fn test_blank_run_count_past_end_is_bounded() {
        let lines = ["", ""];
        assert_eq!(blank_run_count(&lines, 10), 1);
    }

    #[test]
    fn test_locate_walks_line_spans() {
        let tree = mounted(vec![
            block("first", "hello"),
            sep(),
            block("second", "world"),
            sep(),
        ]);
        let lines = ["hello", "", "world"];
        assert_eq!(locate_id(&tree, 1, &lines).as_deref(), Some("first"));
        assert_eq!(locate_id(&tree, 3, &lines).as_deref(), Some("second"));
    }

    #[test]
    fn test_locate_blank_line_falls_back_to_previous_block() {
        let tree = mounted(vec![
            block("first", "hello"),
            sep(),
            block("second", "world"),
        ]);
        let lines = ["hello", "", "world"];
        assert_eq!(locate_id(&tree, 2, &lines).as_deref(), Some("first"));
    }

    #[test]
    fn test_locate_collapses_blank_runs() {
        let tree = mounted(vec![block("a", "a"), sep(), block("b", "b"), sep()]);
        let lines = ["a", "", "", "b"];
        assert_eq!(locate_id(&tree, 4, &lines).as_deref(), Some("b"));
    }

    #[test]
    fn test_locate_multiline_block_spans_its_lines() {
        let tree = mounted(vec![
            block("para", "one\ntwo\nthree"),
            sep(),
            block("next", "four"),
        ]);
        let lines = ["one", "two", "three", "", "four"];
        assert_eq!(locate_id(&tree, 2, &lines).as_deref(), Some("para"));
        assert_eq!(locate_id(&tree, 3, &lines).as_deref(), Some("para"));
        assert_eq!(locate_id(&tree, 5, &lines).as_deref(), Some("next"));
    }

    #[test]
    fn test_locate_past_end_takes_last_addressable() {
        let tree = mounted(vec![block("only", "x"), sep()]);
        assert_eq!(locate_id(&tree, 50, &["x"]).as_deref(), Some("only"));
    }

    #[test]
    fn test_locate_without_addressable_predecessor_is_none() {
        let raw = MarkupNode::with_text("div", "raw").into_ref();
        let tree = mounted(vec![raw, sep(), block("after", "after")]);
        assert_eq!(locate_id(&tree, 1, &["raw", "", "after"]), None);
    }

    #[test]
    fn test_locate_empty_tree_is_none() {
        let tree = MountedTree::new();
        assert_eq!(locate_id(&tree, 1, &["a"]), None);
    }

    #[test]
    fn test_locate_returns_mounted_identity() {
        let first = block("first", "hello");
        let tree = mounted(vec![Arc::clone(&first), sep()]);
        let found = locate(&tree, 1, &["hello"], &mut Checkpoint::detached())
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_locate_cancelled() {
        let tree = mounted(vec![block("a", "a")]);
        let token = CancelToken::new();
        token.cancel();
        let result = locate(&tree, 1, &["a"], &mut Checkpoint::new(token));
        assert!(matches!(result, Err(Cancelled)));
    }
}
