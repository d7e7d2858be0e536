use super::*;

fn lines(src: &[&str]) -> Vec<String> {
    src.iter().map(ToString::to_string).collect()
}

fn render(src: &[&str]) -> Tree {
    MarkdownRenderer::new().render(&lines(src)).unwrap()
}

fn blocks(tree: &Tree) -> Vec<&MarkupNode> {
    tree.children()
        .iter()
        .map(|node| &**node)
        .filter(|node| node.tag().is_some())
        .collect()
}

#[test]
fn test_render_empty_buffer_is_empty_tree() {
    assert!(render(&[]).is_empty());
    assert!(render(&["", "", ""]).is_empty());
}

#[test]
fn test_render_emits_block_then_separator() {
    let tree = render(&["hello", "", "world"]);
    assert_eq!(tree.len(), 4);
    let children = tree.children();
    assert_eq!(children[0].tag(), Some("p"));
    assert_eq!(children[0].text_content(), "hello");
    assert_eq!(children[1].text_content(), "\n");
    assert!(children[1].tag().is_none());
    assert_eq!(children[2].inner_html(), "world");
}

#[test]
fn test_render_assigns_ids_to_blocks_only() {
    let tree = render(&["# Title", "", "body"]);
    for node in tree.children() {
        assert_eq!(node.is_addressable(), node.tag().is_some());
    }
}

#[test]
fn test_render_ids_follow_content_not_position() {
    let before = render(&["a", "", "b"]);
    let after = render(&["inserted", "", "a", "", "b"]);
    let id_of = |tree: &Tree, text: &str| {
        blocks(tree)
            .into_iter()
            .find(|node| node.text_content() == text)
            .and_then(|node| node.id().map(ToOwned::to_owned))
    };
    assert_eq!(id_of(&before, "a"), id_of(&after, "a"));
    assert_eq!(id_of(&before, "b"), id_of(&after, "b"));
}

#[test]
fn test_render_duplicate_blocks_get_distinct_ids() {
    let tree = render(&["same", "", "same"]);
    let ids: Vec<_> = blocks(&tree).iter().filter_map(|n| n.id()).collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_render_is_pure() {
    let src = ["# Title", "", "para", "", "- a", "- b"];
    let first = render(&src);
    let second = render(&src);
    assert!(first.same_structure(&second));
    assert_eq!(first.to_html(), second.to_html());
}

#[test]
fn test_render_heading_level() {
    let tree = render(&["## Section"]);
    let heading = blocks(&tree)[0];
    assert_eq!(heading.tag(), Some("h2"));
    assert_eq!(heading.inner_html(), "Section");
}

#[test]
fn test_render_soft_break_text_spans_lines() {
    let tree = render(&["one", "two"]);
    let para = blocks(&tree)[0];
    assert_eq!(para.text_content(), "one\ntwo");
    assert_eq!(para.line_span(), 2);
}

#[test]
fn test_render_list_items_are_separated_in_text() {
    let tree = render(&["- a", "- b"]);
    let list = blocks(&tree)[0];
    assert_eq!(list.tag(), Some("ul"));
    assert_eq!(list.text_content(), "a\nb");
    assert!(list.inner_html().contains("<li>a</li>"));
}

#[test]
fn test_render_ordered_list_start_attribute() {
    let tree = render(&["3. three", "4. four"]);
    let list = blocks(&tree)[0];
    assert_eq!(list.tag(), Some("ol"));
    assert_eq!(list.attributes().get("start").map(String::as_str), Some("3"));
}

#[test]
fn test_render_highlights_known_language() {
    let tree = render(&["```rust", "fn main() {}", "```"]);
    let pre = blocks(&tree)[0];
    assert_eq!(pre.tag(), Some("pre"));
    assert!(pre.classes().contains("highlight"));
    assert!(pre.inner_html().starts_with(r#"<code class="language-rust">"#));
    assert!(pre.inner_html().contains("<span style="));
    assert_eq!(pre.text_content(), "fn main() {}\n");
}

#[test]
fn test_render_plain_code_block_is_escaped() {
    let tree = render(&["```", "a < b", "```"]);
    let pre = blocks(&tree)[0];
    assert!(!pre.classes().contains("highlight"));
    assert_eq!(pre.inner_html(), "<code>a &lt; b\n</code>");
}

#[test]
fn test_render_without_highlighting() {
    let renderer = MarkdownRenderer::new().with_highlighting(false);
    let tree = renderer
        .render(&lines(&["```rust", "fn main() {}", "```"]))
        .unwrap();
    let pre = tree.children()[0].clone();
    assert!(!pre.classes().contains("highlight"));
    assert!(pre.inner_html().starts_with(r#"<code class="language-rust">fn main"#));
}

#[test]
fn test_render_html_block_is_not_addressable() {
    let tree = render(&["<div>raw</div>", "", "after"]);
    let raw = blocks(&tree)[0];
    assert!(raw.classes().contains("raw-html"));
    assert!(!raw.is_addressable());
    assert!(blocks(&tree)[1].is_addressable());
}

#[test]
fn test_render_footnote_definition_is_balanced() {
    let tree = render(&["see[^1]", "", "[^1]: the note"]);
    let blocks = blocks(&tree);
    assert_eq!(blocks.len(), 2);
    let footnote = blocks[1];
    assert_eq!(footnote.tag(), Some("section"));
    assert!(footnote.classes().contains("footnotes"));
    assert!(!footnote.is_addressable());
    let inner = footnote.inner_html().trim();
    assert!(inner.starts_with("<ol>"));
    assert!(inner.ends_with("</ol>"));
    assert!(inner.contains("<li id=\"fn-"));
    assert!(!inner.contains("</section>"));
}

#[test]
fn test_render_thematic_break() {
    let tree = render(&["a", "", "---", "", "b"]);
    let hr = blocks(&tree)[1];
    assert_eq!(hr.tag(), Some("hr"));
    assert!(hr.outer_html().starts_with("<hr id="));
}

#[test]
fn test_unwrap_element_strips_outer_tag() {
    assert_eq!(unwrap_element("<p>x</p>\n", "p"), Some("x"));
    assert_eq!(
        unwrap_element("<ol start=\"3\">\n<li>a</li>\n</ol>\n", "ol"),
        Some("\n<li>a</li>\n")
    );
}

#[test]
fn test_unwrap_element_rejects_other_tags() {
    assert_eq!(unwrap_element("<pre><code>x</code></pre>", "p"), None);
    assert_eq!(unwrap_element("<p>x</div>", "p"), None);
}
