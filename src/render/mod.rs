//! Markdown rendering into markup trees.
//!
//! Each top-level comrak block becomes one [`MarkupNode`], followed by a
//! `"\n"` text node separating it from the next block, mirroring comrak's
//! own HTML serialization. Blocks are serialized with comrak and then
//! unwrapped, so the inner markup is exactly what comrak would emit.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{Arena, Options, format_html, parse_document};

use crate::markup::{MarkupNode, Tree, escape_text};

/// Errors raised while rendering a buffer.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to serialize block: {0}")]
    Format(#[from] std::io::Error),

    #[error("serialized block is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Converts a buffer snapshot into a tree. Implementations must be pure.
pub trait Render {
    /// Render `lines` into a fresh tree.
    ///
    /// # Errors
    /// Returns an error when the renderer cannot produce any output.
    fn render(&self, lines: &[String]) -> Result<Tree, RenderError>;
}

impl<R: Render + ?Sized> Render for &R {
    fn render(&self, lines: &[String]) -> Result<Tree, RenderError> {
        (**self).render(lines)
    }
}

/// Renders GitHub-flavoured markdown with comrak, highlighting fenced code.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    highlight: bool,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self { highlight: true }
    }

    /// Enable or disable syntect highlighting of fenced code blocks.
    #[must_use]
    pub const fn with_highlighting(mut self, enabled: bool) -> Self {
        self.highlight = enabled;
        self
    }
}

impl Render for MarkdownRenderer {
    fn render(&self, lines: &[String]) -> Result<Tree, RenderError> {
        let _scope = crate::perf::scope("render.markdown");
        let source = lines.join("\n");
        let arena = Arena::new();
        let options = create_options();
        let root = parse_document(&arena, &source, &options);

        let mut ids = IdAllocator::default();
        let mut tree = Tree::new();
        for block in root.children() {
            let node = self.block_node(block, &options)?;
            let node = if node.addressable {
                let id = ids.allocate(&node.markup);
                node.markup.with_id(id)
            } else {
                node.markup
            };
            tree.push(node);
            tree.push(MarkupNode::text("\n"));
        }
        tracing::trace!(lines = lines.len(), nodes = tree.len(), "rendered buffer");
        Ok(tree)
    }
}

struct Block {
    markup: MarkupNode,
    addressable: bool,
}

impl MarkdownRenderer {
    fn block_node<'a>(
        &self,
        block: &'a AstNode<'a>,
        options: &Options,
    ) -> Result<Block, RenderError> {
        let text = block_text(block);
        let value = block.data.borrow().value.clone();
        let block = match value {
            NodeValue::Paragraph => wrapped(block, options, "p", text)?,
            NodeValue::Heading(heading) => {
                wrapped(block, options, &format!("h{}", heading.level), text)?
            }
            NodeValue::BlockQuote => wrapped(block, options, "blockquote", text)?,
            NodeValue::Table(_) => wrapped(block, options, "table", text)?,
            NodeValue::List(list) => match list.list_type {
                ListType::Bullet => wrapped(block, options, "ul", text)?,
                ListType::Ordered => {
                    let mut ordered = wrapped(block, options, "ol", text)?;
                    if list.start != 1 {
                        ordered.markup = ordered.markup.with_attr("start", list.start.to_string());
                    }
                    ordered
                }
            },
            NodeValue::CodeBlock(code) => {
                let language = code
                    .info
                    .split_whitespace()
                    .next()
                    .filter(|lang| !lang.is_empty());
                self.code_block(language, &code.literal)
            }
            NodeValue::ThematicBreak => Block {
                markup: MarkupNode::element("hr"),
                addressable: true,
            },
            // Raw HTML and footnote definitions are decoration, not scroll targets.
            NodeValue::HtmlBlock(html) => Block {
                markup: MarkupNode::element("div")
                    .with_class("raw-html")
                    .with_inner(html.literal, text),
                addressable: false,
            },
            NodeValue::FootnoteDefinition(_) => {
                let html = close_footnotes(serialize(block, options)?);
                let mut footnote = unwrapped(&html, "section", text);
                footnote.markup = footnote.markup.with_class("footnotes");
                footnote.addressable = false;
                footnote
            }
            _ => {
                let html = serialize(block, options)?;
                Block {
                    markup: MarkupNode::element("div").with_inner(html, text),
                    addressable: true,
                }
            }
        };
        Ok(block)
    }

    fn code_block(&self, language: Option<&str>, literal: &str) -> Block {
        let highlighted = if self.highlight {
            crate::highlight::code_html(language, literal)
        } else {
            None
        };
        let mut code = MarkupNode::element("code");
        if let Some(language) = language {
            code = code.with_class(format!("language-{language}"));
        }
        let body = highlighted.clone().unwrap_or_else(|| escape_text(literal));
        let code = code.with_inner(body, literal);

        let mut pre = MarkupNode::element("pre").with_inner(code.outer_html(), literal);
        if highlighted.is_some() {
            pre = pre.with_class("highlight");
        }
        Block {
            markup: pre,
            addressable: true,
        }
    }
}

/// Serialize `block` with comrak and strip its outer `tag`.
fn wrapped<'a>(
    block: &'a AstNode<'a>,
    options: &Options,
    tag: &str,
    text: String,
) -> Result<Block, RenderError> {
    let html = serialize(block, options)?;
    Ok(unwrapped(&html, tag, text))
}

fn unwrapped(html: &str, tag: &str, text: String) -> Block {
    let markup = match unwrap_element(html, tag) {
        Some(inner) => MarkupNode::element(tag).with_inner(inner, text),
        None => MarkupNode::element("div").with_inner(html, text),
    };
    Block {
        markup,
        addressable: true,
    }
}

/// comrak closes the footnote list only at the end of a whole document, so
/// a definition serialized on its own may be missing `</ol></section>`.
fn close_footnotes(mut html: String) -> String {
    if !html.trim_end().ends_with("</section>") {
        html.push_str("</ol>\n</section>\n");
    }
    html
}

fn serialize<'a>(block: &'a AstNode<'a>, options: &Options) -> Result<String, RenderError> {
    let mut out = Vec::new();
    format_html(block, options, &mut out)?;
    Ok(String::from_utf8(out)?)
}

fn create_options() -> Options {
    let mut options = Options::default();

    // Enable GFM extensions
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.superscript = true;
    options.extension.description_lists = true;

    options
}

/// Strip the outer `<tag ...>` and `</tag>` from serialized markup.
fn unwrap_element<'h>(html: &'h str, tag: &str) -> Option<&'h str> {
    let html = html.trim_end();
    let open = format!("<{tag}");
    if !html.starts_with(&open) {
        return None;
    }
    // Reject prefixes of a longer tag name, e.g. `<p` against `<pre>`.
    let after = html[open.len()..].chars().next()?;
    if after != '>' && !after.is_whitespace() {
        return None;
    }
    let body_start = html.find('>')? + 1;
    let close = format!("</{tag}>");
    let body_end = html.strip_suffix(close.as_str())?.len();
    (body_start <= body_end).then(|| &html[body_start..body_end])
}

/// Text content of a block; nested blocks are separated by newlines.
fn block_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text<'a>(node: &'a AstNode<'a>, text: &mut String) {
    match &node.data.borrow().value {
        NodeValue::Text(t) => text.push_str(t),
        NodeValue::Code(code) => text.push_str(&code.literal),
        NodeValue::CodeBlock(code) => text.push_str(&code.literal),
        NodeValue::HtmlBlock(html) => text.push_str(&html.literal),
        NodeValue::SoftBreak | NodeValue::LineBreak => text.push('\n'),
        _ => {
            for (index, child) in node.children().enumerate() {
                if index > 0 && child.data.borrow().value.block() && !text.ends_with('\n') {
                    text.push('\n');
                }
                collect_text(child, text);
            }
        }
    }
}

/// Hands out ids derived from block content, so an unchanged block keeps its
/// id across renders. Repeats of identical blocks get an occurrence suffix.
#[derive(Debug, Default)]
struct IdAllocator {
    seen: HashMap<u64, usize>,
}

impl IdAllocator {
    fn allocate(&mut self, node: &MarkupNode) -> String {
        let mut hasher = DefaultHasher::new();
        node.tag().hash(&mut hasher);
        node.inner_html().hash(&mut hasher);
        let digest = hasher.finish();
        let occurrence = self.seen.entry(digest).or_insert(0);
        *occurrence += 1;
        if *occurrence == 1 {
            format!("lm-{digest:016x}")
        } else {
            format!("lm-{digest:016x}-{occurrence}")
        }
    }
}

#[cfg(test)]
mod tests;
