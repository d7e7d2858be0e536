//! Rendered markup trees.
//!
//! A [`Tree`] is the flat list of block-level nodes that make up a rendered
//! document body. Each block is a [`MarkupNode`] shared as a [`NodeRef`];
//! node identity is pointer identity of the `Arc`, which is what lets an
//! unchanged block survive an update as the very same object.
//!
//! Descendants of a block are kept in serialized form (inner markup plus
//! text content). The differ never looks inside a block, it either reuses
//! it whole or replaces it whole.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

use regex::Regex;

/// Shared handle to a node. Compare identity with [`Arc::ptr_eq`].
pub type NodeRef = Arc<MarkupNode>;

/// Elements that serialize without a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "wbr"];

/// Matches `id` attributes inside serialized markup so they can be ignored
/// when comparing blocks.
static ID_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+id\s*=\s*("[^"]*"|'[^']*')"#).expect("id attribute pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

/// A single node of a rendered tree.
#[derive(Debug, Clone)]
pub struct MarkupNode {
    kind: NodeKind,
    /// Tag name, empty for text nodes
    tag: String,
    /// Transient identifier; addressable nodes carry one
    id: Option<String>,
    attributes: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    /// Serialized subtree, raw markup
    inner_html: String,
    /// `inner_html` with nested `id` attributes removed
    inner_key: String,
    /// Text content of the subtree (or of the text node itself)
    text: String,
}

impl MarkupNode {
    /// Create an empty element.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.into(),
            id: None,
            attributes: BTreeMap::new(),
            classes: BTreeSet::new(),
            inner_html: String::new(),
            inner_key: String::new(),
            text: String::new(),
        }
    }

    /// Create a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            tag: String::new(),
            id: None,
            attributes: BTreeMap::new(),
            classes: BTreeSet::new(),
            inner_html: String::new(),
            inner_key: String::new(),
            text: text.into(),
        }
    }

    /// Element whose body is plain text, escaped into the inner markup.
    pub fn with_text(tag: impl Into<String>, text: &str) -> Self {
        Self::element(tag).with_inner(escape_text(text), text)
    }

    /// Set an attribute. `id` and `class` are routed to their dedicated slots.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match name.as_str() {
            "id" => self.id = Some(value),
            "class" => {
                self.classes
                    .extend(value.split_whitespace().map(ToOwned::to_owned));
            }
            _ => {
                self.attributes.insert(name, value);
            }
        }
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the serialized subtree and its text content.
    #[must_use]
    pub fn with_inner(mut self, inner_html: impl Into<String>, text: impl Into<String>) -> Self {
        let inner_html = inner_html.into();
        self.inner_key = ID_ATTR.replace_all(&inner_html, "").into_owned();
        self.inner_html = inner_html;
        self.text = text.into();
        self
    }

    pub fn into_ref(self) -> NodeRef {
        Arc::new(self)
    }

    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Tag name, `None` for text nodes.
    pub fn tag(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Element => Some(&self.tag),
            NodeKind::Text => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub const fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub const fn classes(&self) -> &BTreeSet<String> {
        &self.classes
    }

    pub fn inner_html(&self) -> &str {
        &self.inner_html
    }

    pub fn text_content(&self) -> &str {
        &self.text
    }

    /// Whether the presentation layer can scroll to this node directly.
    pub const fn is_addressable(&self) -> bool {
        matches!(self.kind, NodeKind::Element) && self.id.is_some()
    }

    /// Number of source lines this node stands for: one per newline in its
    /// text content, plus the element's own closing line.
    pub fn line_span(&self) -> usize {
        let newlines = self.text.bytes().filter(|b| *b == b'\n').count();
        match self.kind {
            NodeKind::Element => newlines + 1,
            NodeKind::Text => newlines,
        }
    }

    /// Structural equality, ignoring transient identifiers.
    ///
    /// Elements compare tag, attributes, classes and inner markup; text
    /// nodes compare their text.
    pub fn same_structure(&self, other: &Self) -> bool {
        match (self.kind, other.kind) {
            (NodeKind::Text, NodeKind::Text) => self.text == other.text,
            (NodeKind::Element, NodeKind::Element) => {
                self.tag == other.tag
                    && self.attributes == other.attributes
                    && self.classes == other.classes
                    && self.inner_key == other.inner_key
            }
            _ => false,
        }
    }

    /// Serialize the node, including its own tag.
    pub fn outer_html(&self) -> String {
        match self.kind {
            NodeKind::Text => escape_text(&self.text),
            NodeKind::Element => {
                let mut out = String::with_capacity(self.inner_html.len() + 32);
                out.push('<');
                out.push_str(&self.tag);
                if let Some(id) = &self.id {
                    let _ = write!(out, " id=\"{}\"", escape_attr(id));
                }
                if !self.classes.is_empty() {
                    let joined = self.classes.iter().map(String::as_str).collect::<Vec<_>>();
                    let _ = write!(out, " class=\"{}\"", escape_attr(&joined.join(" ")));
                }
                for (name, value) in &self.attributes {
                    let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
                }
                if VOID_TAGS.contains(&self.tag.as_str()) && self.inner_html.is_empty() {
                    out.push_str(" />");
                    return out;
                }
                out.push('>');
                out.push_str(&self.inner_html);
                let _ = write!(out, "</{}>", self.tag);
                out
            }
        }
    }
}

/// A rendered document body: an ordered list of top-level block nodes.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    children: Vec<NodeRef>,
}

impl Tree {
    pub const fn new() -> Self {
        Self {
            children: Vec::new(),
        }
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    pub(crate) const fn children_mut(&mut self) -> &mut Vec<NodeRef> {
        &mut self.children
    }

    pub fn into_children(self) -> Vec<NodeRef> {
        self.children
    }

    pub fn push(&mut self, node: impl Into<NodeRef>) {
        self.children.push(node.into());
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Sibling-by-sibling structural equality.
    pub fn same_structure(&self, other: &Self) -> bool {
        self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.same_structure(b))
    }

    /// Serialize the whole body.
    pub fn to_html(&self) -> String {
        self.children.iter().map(|node| node.outer_html()).collect()
    }
}

impl From<Vec<NodeRef>> for Tree {
    fn from(children: Vec<NodeRef>) -> Self {
        Self { children }
    }
}

impl FromIterator<MarkupNode> for Tree {
    fn from_iter<I: IntoIterator<Item = MarkupNode>>(iter: I) -> Self {
        Self {
            children: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Escape text for use between tags.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text for use inside a double-quoted attribute value.
pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> MarkupNode {
        MarkupNode::with_text("p", text)
    }

    #[test]
    fn test_same_structure_ignores_ids() {
        let a = p("hello").with_id("blk-1");
        let b = p("hello").with_id("blk-9");
        assert!(a.same_structure(&b));
    }

    #[test]
    fn test_same_structure_ignores_nested_ids() {
        let a = MarkupNode::element("p").with_inner(r#"see<sup id="fnref-1">1</sup>"#, "see1");
        let b = MarkupNode::element("p").with_inner(r#"see<sup id="fnref-2">1</sup>"#, "see1");
        assert!(a.same_structure(&b));
    }

    #[test]
    fn test_same_structure_detects_inner_change() {
        assert!(!p("hello").same_structure(&p("hello!")));
    }

    #[test]
    fn test_same_structure_compares_attributes_and_classes() {
        let plain = MarkupNode::element("ol");
        let started = MarkupNode::element("ol").with_attr("start", "3");
        let classed = MarkupNode::element("ol").with_class("tight");
        assert!(!plain.same_structure(&started));
        assert!(!plain.same_structure(&classed));
        assert!(started.same_structure(&MarkupNode::element("ol").with_attr("start", "3")));
    }

    #[test]
    fn test_text_and_element_never_equal() {
        let text = MarkupNode::text("hello");
        assert!(!text.same_structure(&p("hello")));
        assert!(text.same_structure(&MarkupNode::text("hello")));
    }

    #[test]
    fn test_with_attr_routes_id_and_class() {
        let node = MarkupNode::element("div")
            .with_attr("id", "x")
            .with_attr("class", "a b")
            .with_attr("lang", "rust");
        assert_eq!(node.id(), Some("x"));
        assert_eq!(node.classes().len(), 2);
        assert_eq!(node.attributes().len(), 1);
    }

    #[test]
    fn test_outer_html_orders_id_class_then_attributes() {
        let node = MarkupNode::with_text("pre", "a < b")
            .with_id("blk-1")
            .with_class("highlight")
            .with_attr("lang", "rust");
        assert_eq!(
            node.outer_html(),
            r#"<pre id="blk-1" class="highlight" lang="rust">a &lt; b</pre>"#
        );
    }

    #[test]
    fn test_outer_html_void_element() {
        assert_eq!(MarkupNode::element("hr").outer_html(), "<hr />");
    }

    #[test]
    fn test_line_span_counts_newlines() {
        assert_eq!(MarkupNode::text("\n").line_span(), 1);
        assert_eq!(p("one").line_span(), 1);
        assert_eq!(p("one\ntwo").line_span(), 2);
        assert_eq!(MarkupNode::text("").line_span(), 0);
    }

    #[test]
    fn test_addressable_requires_element_with_id() {
        assert!(p("x").with_id("a").is_addressable());
        assert!(!p("x").is_addressable());
        assert!(!MarkupNode::text("\n").is_addressable());
    }

    #[test]
    fn test_tree_same_structure_is_sibling_wise() {
        let a: Tree = vec![p("a"), p("b")].into_iter().collect();
        let b: Tree = vec![p("a"), p("b")].into_iter().collect();
        let c: Tree = vec![p("b"), p("a")].into_iter().collect();
        assert!(a.same_structure(&b));
        assert!(!a.same_structure(&c));
        assert_eq!(a.to_html(), "<p>a</p><p>b</p>");
    }
}
