//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! We support the subset of HTML that documents and header/footer fragments
//! actually use:
//! - Block: div, p, h1-h6, ul, ol, li, table, tr, td, th, pre, blockquote, hr
//! - Inline: span, a, b, strong, i, em, u, code, br, img
//! - Raw text: style and script bodies are kept verbatim
//!
//! Styling comes from the `style` attribute.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of a supported element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    /// `h1` to `h6`.
    Heading(u8),
    Ul,
    Ol,
    Li,
    Table,
    Thead,
    Tbody,
    Tr,
    Td,
    Th,
    Pre,
    Blockquote,
    Hr,
    Span,
    A,
    Strong,
    Em,
    U,
    Code,
    Br,
    Img,
    Style,
    Script,
    Title,
    Link,
    Meta,
    Body,
    Html,
    Head,
    /// Catch-all for unknown tags – they are kept and laid out as blocks.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "div" | "section" | "article" | "header" | "footer" | "main" | "nav" | "aside" => {
                Tag::Div
            }
            "p" => Tag::P,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" | "tfoot" => Tag::Tbody,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "pre" => Tag::Pre,
            "blockquote" => Tag::Blockquote,
            "hr" => Tag::Hr,
            "span" | "small" | "sub" | "sup" | "label" => Tag::Span,
            "a" => Tag::A,
            "b" | "strong" => Tag::Strong,
            "i" | "em" | "cite" => Tag::Em,
            "u" => Tag::U,
            "code" | "kbd" | "samp" | "tt" => Tag::Code,
            "br" => Tag::Br,
            "img" => Tag::Img,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "title" => Tag::Title,
            "link" => Tag::Link,
            "meta" => Tag::Meta,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            _ => Tag::Unknown(lower),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span | Tag::A | Tag::Strong | Tag::Em | Tag::U | Tag::Code | Tag::Br
        )
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Hr | Tag::Img | Tag::Link | Tag::Meta)
            || matches!(self, Tag::Unknown(name) if matches!(name.as_str(), "input" | "col" | "source" | "wbr"))
    }

    /// Elements whose body is raw text, not markup.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script)
    }

    /// Elements that never produce visible output.
    pub fn is_hidden(&self) -> bool {
        matches!(
            self,
            Tag::Head | Tag::Style | Tag::Script | Tag::Title | Tag::Link | Tag::Meta
        )
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Tag::Heading(level) => Some(*level),
            _ => None,
        }
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    /// Concatenated text of all descendants, `<br>` as a newline.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) if e.tag == Tag::Br => out.push('\n'),
            DomNode::Element(e) if e.tag.is_hidden() => {}
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes.
///
/// Malformed markup never fails: unmatched closing tags are dropped and
/// unclosed elements end with their parent.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Names of the currently open elements.
    open: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            open: Vec::new(),
        }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace_preserve();
            if self.eof() {
                break;
            }
            if self.starts_with("</") {
                let name = self.peek_closing_name();
                if self.open.iter().any(|open| *open == name) {
                    break;
                }
                // Stray closing tag.
                self.skip_closing_tag();
                continue;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            // Doctype / processing instruction
            self.skip_past('>');
            return None;
        }
        let next_is_name = self.input[self.pos..]
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_alphabetic());
        if self.starts_with("<") && next_is_name {
            Some(self.parse_element())
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // A lone '<' that does not open a tag is text.
        if self.starts_with("<") {
            self.advance(1);
        }
        while !self.eof() && !self.starts_with("<") {
            self.advance(1);
        }
        let text = &self.input[start..self.pos];
        DomNode::Text(decode_entities(text))
    }

    fn parse_element(&mut self) -> DomNode {
        // Consume '<'
        self.advance(1);
        let tag_name = self.parse_tag_name().to_ascii_lowercase();
        let tag = Tag::from_name(&tag_name);
        let mut elem = ElementNode::new(tag.clone());

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute();
            if key.is_empty() {
                // Junk inside the tag; skip one char so we always progress.
                self.advance(1);
                continue;
            }
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }

        if self.starts_with("/>") {
            self.advance(2);
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance(1);
        }
        if tag.is_void() {
            return DomNode::Element(elem);
        }

        if tag.is_raw_text() {
            let close = format!("</{tag_name}");
            let rest = &self.input[self.pos..];
            let end = rest
                .to_ascii_lowercase()
                .find(&close)
                .map_or(self.input.len(), |i| self.pos + i);
            let body = &self.input[self.pos..end];
            if !body.is_empty() {
                elem.children.push(DomNode::Text(body.to_string()));
            }
            self.pos = end;
            self.skip_closing_tag();
            return DomNode::Element(elem);
        }

        self.open.push(tag_name.clone());
        elem.children = self.parse_nodes();
        self.open.pop();

        if self.starts_with("</") && self.peek_closing_name() == tag_name {
            self.skip_closing_tag();
        }

        DomNode::Element(elem)
    }

    fn parse_tag_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn peek_closing_name(&self) -> String {
        self.input[self.pos + 2..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == ':')
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn skip_closing_tag(&mut self) {
        if self.starts_with("</") {
            self.skip_past('>');
        }
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_tag_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1); // skip '='
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ["\"", "'"] {
            if self.starts_with(quote) {
                self.advance(1);
                let start = self.pos;
                while !self.eof() && !self.starts_with(quote) {
                    self.advance(1);
                }
                let val = &self.input[start..self.pos];
                if !self.eof() {
                    self.advance(1);
                }
                return decode_entities(val);
            }
        }
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_whitespace() || c == '>' {
                break;
            }
            self.advance(1);
        }
        decode_entities(&self.input[start..self.pos])
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance(1);
        }
    }

    fn skip_whitespace_preserve(&mut self) {
        // Skip runs of pure whitespace between elements.
        let saved = self.pos;
        self.skip_whitespace();
        // Whitespace before text belongs to the text.
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn skip_comment(&mut self) {
        self.advance(4); // skip <!--
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(3);
        }
    }

    fn skip_past(&mut self, end: char) {
        while let Some(c) = self.current_char() {
            self.advance(1);
            if c == end {
                break;
            }
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self, n: usize) {
        // Advance by `n` characters (not bytes).
        for _ in 0..n {
            if let Some(c) = self.current_char() {
                self.pos += c.len_utf8();
            }
        }
    }
}

/// Decode the named entities we care about plus numeric references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "laquo" => '«',
        "raquo" => '»',
        "bull" => '•',
        "euro" => '€',
        _ => return None,
    };
    Some(c)
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            // Recurse into <html>
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

/// The `<title>` text, if any.
pub fn document_title(nodes: &[DomNode]) -> Option<String> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Title {
                let title = e.text_content().trim().to_string();
                return (!title.is_empty()).then_some(title);
            }
            if let Some(title) = document_title(&e.children) {
                return Some(title);
            }
        }
    }
    None
}

/// Every `<style>` block and `<link>` tag in `html`, verbatim and in
/// document order.
pub fn style_markup(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::new();
    let mut from = 0;
    while let Some(found) = next_style_tag(&lower[from..]) {
        let start = from + found;
        let end = if lower[start..].starts_with("<style") {
            lower[start..]
                .find("</style>")
                .map_or(html.len(), |i| start + i + "</style>".len())
        } else {
            lower[start..].find('>').map_or(html.len(), |i| start + i + 1)
        };
        out.push_str(&html[start..end]);
        from = end;
    }
    out
}

fn next_style_tag(lower: &str) -> Option<usize> {
    let tag_at = |needle: &str| {
        lower.match_indices(needle).map(|(i, _)| i).find(|&i| {
            lower[i + needle.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
        })
    };
    match (tag_at("<style"), tag_at("<link")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// All elements in document order.
pub fn walk_elements<'a>(nodes: &'a [DomNode], visit: &mut impl FnMut(&'a ElementNode)) {
    for node in nodes {
        if let DomNode::Element(e) = node {
            visit(e);
            walk_elements(&e.children, visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            other => panic!("Expected element, got {other:?}"),
        }
    }

    #[test]
    fn parse_simple_div() {
        let html = r#"<div style="color: red"><p>Hello</p></div>"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        let div = element(&nodes[0]);
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.inline_style(), Some("color: red"));
        assert_eq!(div.children.len(), 1);
    }

    #[test]
    fn parse_void_elements() {
        let nodes = parse_html(r#"<p>a<br>b<img src="logo.png"></p><hr>"#);
        assert_eq!(nodes.len(), 2);
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 4);
        assert_eq!(element(&p.children[3]).src(), Some("logo.png"));
        assert_eq!(p.text_content(), "a\nb");
        assert_eq!(element(&nodes[1]).tag, Tag::Hr);
    }

    #[test]
    fn parse_nested_inline() {
        let nodes = parse_html("<p>Hello <strong>world</strong>!</p>");
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 3); // "Hello ", <strong>, "!"
        assert_eq!(p.text_content(), "Hello world!");
    }

    #[test]
    fn style_and_script_bodies_are_raw() {
        let nodes = parse_html("<style>p > a { color: red }</style><script>if (a < b) {}</script><p>x</p>");
        assert_eq!(nodes.len(), 3);
        let style = element(&nodes[0]);
        assert_eq!(style.children, vec![DomNode::Text("p > a { color: red }".into())]);
        let script = element(&nodes[1]);
        assert_eq!(script.tag, Tag::Script);
        assert_eq!(element(&nodes[2]).tag, Tag::P);
    }

    #[test]
    fn mismatched_tags_recover() {
        let nodes = parse_html("<div><p>one</div><p>two</p></span>tail");
        assert_eq!(nodes.len(), 3);
        let div = element(&nodes[0]);
        assert_eq!(div.text_content(), "one");
        assert_eq!(element(&nodes[1]).text_content(), "two");
        assert_eq!(nodes[2], DomNode::Text("tail".into()));
    }

    #[test]
    fn entities_decode() {
        assert_eq!(decode_entities("a &amp; b &lt;3 &#8211; &#x41; &unknown; &"), "a & b <3 \u{2013} A &unknown; &");
    }

    #[test]
    fn body_and_title() {
        let nodes = parse_html(
            "<!DOCTYPE html><html><head><title> Report </title></head><body><h2>Hi</h2></body></html>",
        );
        assert_eq!(document_title(&nodes).as_deref(), Some("Report"));
        let body = body_children(&nodes);
        assert_eq!(element(&body[0]).tag, Tag::Heading(2));
    }

    #[test]
    fn style_markup_is_collected_verbatim() {
        let html = r#"<head><STYLE>h1{color:red}</STYLE><link rel="stylesheet" href="a.css"><linker></head><p>x</p>"#;
        assert_eq!(
            style_markup(html),
            r#"<STYLE>h1{color:red}</STYLE><link rel="stylesheet" href="a.css">"#
        );
        assert_eq!(style_markup("<p>none</p>"), "");
    }

    #[test]
    fn parse_table() {
        let html = "<table><tr><th>Name</th><th>Age</th></tr><tr><td>Alice</td><td>30</td></tr></table>";
        let nodes = parse_html(html);
        let table = element(&nodes[0]);
        assert_eq!(table.tag, Tag::Table);
        assert_eq!(table.children.len(), 2);
    }
}
