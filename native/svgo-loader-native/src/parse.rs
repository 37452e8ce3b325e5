//! Parse Module for the SVGO loader
//!
//! Locates the `<script>` and `<template>` regions of a component file and
//! parses template markup into a span-preserving element tree.
//!
//! Markup is parsed with tree-sitter-html. The tree keeps text and comments
//! verbatim so any subtree can be rendered back to markup after a visitor
//! renamed an element or dropped attributes. Spans are byte offsets into the
//! parsed text.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;
use tree_sitter::{Language, Node, Parser};

// ═══════════════════════════════════════════════════════════════════════════════
// REGION PATTERNS
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    /// Script block regex
    static ref SCRIPT_REGEX: Regex = Regex::new(r"(?is)<script\b([^>]*)>([\s\S]*?)</script>").unwrap();

    /// Attribute regex for parsing script attributes
    static ref ATTR_REGEX: Regex = Regex::new(r#"(?i)([a-z0-9-]+)(?:=(?:"([^"]*)"|'([^']*)'|([^>\s]+)))?"#).unwrap();

    /// Outermost template block, from the first `<template>` to the last `</template>`
    static ref TEMPLATE_REGEX: Regex = Regex::new(r"<template>[\s\S]*</template>").unwrap();

    /// Text interpolation, `{{ expr }}`
    static ref INTERPOLATION_REGEX: Regex = Regex::new(r"\{\{[\s\S]*?\}\}").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRegion<'s> {
    /// Byte offset of `content` within the file.
    pub offset: usize,
    pub content: &'s str,
    pub attributes: HashMap<String, String>,
}

impl ScriptRegion<'_> {
    pub fn lang(&self) -> Option<&str> {
        self.attributes.get("lang").map(|s| s.as_str())
    }
}

/// Every `<script>` block of a file, in source order.
pub fn script_regions(code: &str) -> Vec<ScriptRegion<'_>> {
    SCRIPT_REGEX
        .captures_iter(code)
        .filter_map(|caps| {
            let content = caps.get(2)?;
            let attr_string = caps.get(1).map(|m| m.as_str()).unwrap_or("");

            let mut attributes = HashMap::new();
            for attr_caps in ATTR_REGEX.captures_iter(attr_string) {
                if let Some(name) = attr_caps.get(1) {
                    let value = attr_caps
                        .get(2)
                        .or_else(|| attr_caps.get(3))
                        .or_else(|| attr_caps.get(4))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_else(|| "true".to_string());
                    attributes.insert(name.as_str().to_lowercase(), value);
                }
            }

            Some(ScriptRegion {
                offset: content.start(),
                content: content.as_str(),
                attributes,
            })
        })
        .collect()
}

/// The template region as `(offset, text)`, including the `<template>` tags.
pub fn template_region(code: &str) -> Option<(usize, &str)> {
    TEMPLATE_REGEX
        .find(code)
        .map(|m| (m.start(), m.as_str()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKUP TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn shifted(self, offset: usize) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// `None` for boolean attributes such as `disabled`.
    pub value: Option<String>,
    /// Quote used in the source; `None` for unquoted values.
    pub quote: Option<char>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            quote: Some('"'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<MarkupNode>,
    /// From the `<` of the open tag to the `>` of the close tag (exclusive end).
    pub span: Span,
    pub self_closing: bool,
    /// `false` for void elements and elements closed implicitly.
    pub has_end_tag: bool,
}

impl Element {
    /// Value of a static attribute. Boolean attributes read as `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|a| a.name != name);
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element(Element),
    Text(TextNode),
    Comment(CommentNode),
}

impl MarkupNode {
    pub fn span(&self) -> Span {
        match self {
            MarkupNode::Element(el) => el.span,
            MarkupNode::Text(t) => t.span,
            MarkupNode::Comment(c) => c.span,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            MarkupNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub children: Vec<MarkupNode>,
}

/// Result of parsing a template. Markup that cannot be tokenized degrades
/// instead of failing so the caller can skip the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupOutcome {
    Parsed(Document),
    Degraded(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_template(source: &str) -> MarkupOutcome {
    let mut parser = Parser::new();
    let language: Language = tree_sitter_html::LANGUAGE.into();
    if let Err(e) = parser.set_language(&language) {
        warn!(error = %e, "failed to load the HTML grammar");
        return MarkupOutcome::Degraded(format!("HTML grammar unavailable: {}", e));
    }

    let Some(tree) = parser.parse(grammar_input(source), None) else {
        return MarkupOutcome::Degraded("markup parser gave up".to_string());
    };

    let root = tree.root_node();
    if let Some(error) = first_error(root) {
        return MarkupOutcome::Degraded(format!(
            "malformed markup at byte {} ({})",
            error.start_byte(),
            if error.is_missing() { "missing token" } else { "unexpected input" }
        ));
    }

    let mut cursor = root.walk();
    let nodes: Vec<Node> = root.children(&mut cursor).collect();
    MarkupOutcome::Parsed(Document {
        children: content(&nodes, 0, source.len(), source),
    })
}

/// The bytes handed to the grammar. Interpolation bodies and stray `&` are
/// blanked so expressions like `{{ a < b }}` stay text. Byte offsets match
/// `source`, and every slice is taken from `source`.
fn grammar_input(source: &str) -> Vec<u8> {
    let mut bytes = source.as_bytes().to_vec();

    for m in INTERPOLATION_REGEX.find_iter(source) {
        bytes[m.start() + 2..m.end() - 2].fill(b' ');
    }

    for i in 0..bytes.len() {
        if bytes[i] == b'&'
            && !bytes
                .get(i + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'#')
        {
            bytes[i] = b' ';
        }
    }

    bytes
}

fn first_error<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn slice<'s>(src: &'s str, node: Node<'_>) -> &'s str {
    src.get(node.byte_range()).unwrap_or("")
}

/// Markup nodes for the byte range `start..end` of a container. Bytes not
/// covered by an element or comment (text, entities, doctypes, raw text,
/// stray close tags) are kept as text.
fn content(nodes: &[Node<'_>], start: usize, end: usize, src: &str) -> Vec<MarkupNode> {
    let mut out = Vec::new();
    let mut pos = start;

    for node in nodes {
        let built = match node.kind() {
            "element" | "script_element" | "style_element" => {
                MarkupNode::Element(element(*node, src))
            }
            "comment" => MarkupNode::Comment(comment(*node, src)),
            _ => continue,
        };
        push_text(&mut out, src, pos, node.start_byte());
        pos = node.end_byte();
        out.push(built);
    }

    push_text(&mut out, src, pos, end);
    out
}

fn push_text(out: &mut Vec<MarkupNode>, src: &str, start: usize, end: usize) {
    if start >= end {
        return;
    }
    if let Some(value) = src.get(start..end) {
        out.push(MarkupNode::Text(TextNode {
            value: value.to_string(),
            span: Span::new(start, end),
        }));
    }
}

fn element(node: Node<'_>, src: &str) -> Element {
    let mut cursor = node.walk();
    let parts: Vec<Node> = node.children(&mut cursor).collect();

    let open = parts
        .first()
        .copied()
        .filter(|p| matches!(p.kind(), "start_tag" | "self_closing_tag"));
    let close = parts.iter().copied().find(|p| p.kind() == "end_tag");

    let (name, attributes) = open.map(|tag| open_tag(tag, src)).unwrap_or_default();
    let content_start = open.map_or(node.start_byte(), |tag| tag.end_byte());
    let content_end = close.map_or(node.end_byte(), |tag| tag.start_byte());

    Element {
        name,
        attributes,
        children: content(&parts, content_start, content_end, src),
        span: Span::new(node.start_byte(), node.end_byte()),
        self_closing: open.is_some_and(|tag| tag.kind() == "self_closing_tag"),
        has_end_tag: close.is_some(),
    }
}

fn open_tag(tag: Node<'_>, src: &str) -> (String, Vec<Attribute>) {
    let mut name = String::new();
    let mut attributes = Vec::new();

    let mut cursor = tag.walk();
    for part in tag.named_children(&mut cursor) {
        match part.kind() {
            "tag_name" => name = slice(src, part).to_string(),
            "attribute" => attributes.push(attribute(part, src)),
            _ => {}
        }
    }

    (name, attributes)
}

fn attribute(node: Node<'_>, src: &str) -> Attribute {
    let mut attr = Attribute {
        name: String::new(),
        value: None,
        quote: None,
    };

    let mut cursor = node.walk();
    for part in node.named_children(&mut cursor) {
        match part.kind() {
            "attribute_name" => attr.name = slice(src, part).to_string(),
            "attribute_value" => attr.value = Some(slice(src, part).to_string()),
            "quoted_attribute_value" => {
                let raw = slice(src, part);
                attr.quote = raw.chars().next();
                let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or("");
                attr.value = Some(inner.to_string());
            }
            _ => {}
        }
    }

    attr
}

fn comment(node: Node<'_>, src: &str) -> CommentNode {
    let raw = slice(src, node);
    let value = raw
        .strip_prefix("<!--")
        .and_then(|rest| rest.strip_suffix("-->"))
        .unwrap_or(raw);
    CommentNode {
        value: value.to_string(),
        span: Span::new(node.start_byte(), node.end_byte()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn render(node: &MarkupNode) -> String {
    let mut out = String::new();
    render_into(node, &mut out);
    out
}

pub fn render_element(element: &Element) -> String {
    let mut out = String::new();
    render_element_into(element, &mut out);
    out
}

fn render_into(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Element(el) => render_element_into(el, out),
        MarkupNode::Text(t) => out.push_str(&t.value),
        MarkupNode::Comment(c) => {
            out.push_str("<!--");
            out.push_str(&c.value);
            out.push_str("-->");
        }
    }
}

fn render_element_into(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for attr in &el.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        if let Some(value) = &attr.value {
            out.push('=');
            match attr.quote {
                Some(q) => {
                    out.push(q);
                    out.push_str(value);
                    out.push(q);
                }
                None => out.push_str(value),
            }
        }
    }

    if el.self_closing && el.children.is_empty() {
        out.push_str(" />");
        return;
    }
    out.push('>');
    for child in &el.children {
        render_into(child, out);
    }
    if el.has_end_tag {
        out.push_str("</");
        out.push_str(&el.name);
        out.push('>');
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
