//! Arena HTML tree
//!
//! Pages are parsed with `scraper` and copied into a flat arena of nodes.
//! Each node owns the indices of its children; there are no parent links,
//! so subtrees are edited by filtering child lists from the top down.
//! Scripts and comments never enter the arena.

use crate::converter::styles::style_object;
use scraper::{ElementRef, Html};

/// Index of a node in its tree
pub type NodeId = usize;

/// Elements dropped while building the arena
const DROPPED_ELEMENTS: &[&str] = &["script", "noscript", "template"];

/// Elements rendered without children
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_element(&self, name: &str) -> bool {
        self.tag() == Some(name)
    }
}

/// A parsed document held as an index arena
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl DocumentTree {
    /// Parses a full HTML document; the root is the `<html>` element
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut tree = Self {
            nodes: Vec::new(),
            root: 0,
        };
        tree.root = tree.build(document.root_element());
        tree
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Copies the element and its subtree into the arena in document order
    ///
    /// Walks with an explicit stack, so nesting depth is bounded by memory
    /// rather than by the thread stack.
    fn build(&mut self, element: ElementRef<'_>) -> NodeId {
        let root = self.push(element_kind(element.value()));
        let mut stack: Vec<_> = element.children().map(|child| (child, root)).collect();
        stack.reverse();

        while let Some((node, parent)) = stack.pop() {
            let id = match node.value() {
                scraper::Node::Text(text) => {
                    let text: &str = text;
                    if text.trim().is_empty() {
                        continue;
                    }
                    self.push(NodeKind::Text(text.to_string()))
                }
                scraper::Node::Element(el) if DROPPED_ELEMENTS.contains(&el.name()) => continue,
                scraper::Node::Element(el) => {
                    let id = self.push(element_kind(el));
                    let first = stack.len();
                    stack.extend(node.children().map(|child| (child, id)));
                    stack[first..].reverse();
                    id
                }
                _ => continue,
            };
            self.nodes[parent].children.push(id);
        }

        root
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Number of nodes reachable from the root
    pub fn len(&self) -> usize {
        self.descendants(self.root).len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id].kind {
            match attrs.iter_mut().find(|(key, _)| key == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id].kind {
            attrs.retain(|(key, _)| key != name);
        }
    }

    pub fn rename(&mut self, id: NodeId, new_tag: &str) {
        if let NodeKind::Element { tag, .. } = &mut self.nodes[id].kind {
            *tag = new_tag.to_string();
        }
    }

    /// Reachable nodes below `id` in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev().copied());
        }
        out
    }

    pub fn find_all(&self, from: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|&id| self.nodes[id].is_element(tag))
            .collect()
    }

    pub fn find_first(&self, from: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(from)
            .into_iter()
            .find(|&id| self.nodes[id].is_element(tag))
    }

    /// Text below `id` with runs of whitespace collapsed
    pub fn text(&self, id: NodeId) -> String {
        self.raw_text(id)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Text below `id` exactly as parsed
    pub fn raw_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Text(text) = &self.nodes[id].kind {
            out.push_str(text);
        }
        for child in self.descendants(id) {
            if let NodeKind::Text(text) = &self.nodes[child].kind {
                out.push_str(text);
            }
        }
        out
    }

    /// Detaches every node under `id` matching `remove`, with its subtree
    pub fn remove_where(&mut self, id: NodeId, remove: &dyn Fn(&Node) -> bool) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let children = std::mem::take(&mut self.nodes[next].children);
            let kept: Vec<NodeId> = children
                .into_iter()
                .filter(|&child| !remove(&self.nodes[child]))
                .collect();
            stack.extend(kept.iter().copied());
            self.nodes[next].children = kept;
        }
    }

    /// Renders `id` and its subtree as JSX
    pub fn to_jsx(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_jsx(id, &mut out);
        out
    }

    /// Renders only the children of `id`, wrapped in a fragment
    pub fn children_to_jsx(&self, id: NodeId) -> String {
        let mut out = String::from("<>");
        for &child in &self.nodes[id].children {
            self.write_jsx(child, &mut out);
        }
        out.push_str("</>");
        out
    }

    fn write_jsx(&self, id: NodeId, out: &mut String) {
        let mut stack = vec![JsxStep::Open(id)];
        while let Some(step) = stack.pop() {
            let id = match step {
                JsxStep::Open(id) => id,
                JsxStep::Close(tag) => {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                    continue;
                }
            };

            let node = &self.nodes[id];
            match &node.kind {
                NodeKind::Text(text) => out.push_str(&escape_text(text)),
                NodeKind::Element { tag, attrs } => {
                    out.push('<');
                    out.push_str(tag);
                    for (name, value) in attrs {
                        write_attr(name, value, out);
                    }

                    if node.children.is_empty() || VOID_ELEMENTS.contains(&tag.as_str()) {
                        out.push_str(" />");
                        continue;
                    }

                    out.push('>');
                    stack.push(JsxStep::Close(tag));
                    stack.extend(node.children.iter().rev().map(|&child| JsxStep::Open(child)));
                }
            }
        }
    }
}

enum JsxStep<'a> {
    Open(NodeId),
    Close(&'a str),
}

fn element_kind(element: &scraper::node::Element) -> NodeKind {
    let mut attrs: Vec<(String, String)> = element
        .attrs()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect();
    attrs.sort();
    NodeKind::Element {
        tag: element.name().to_ascii_lowercase(),
        attrs,
    }
}

fn write_attr(name: &str, value: &str, out: &mut String) {
    // Inline event handlers are script
    if name.starts_with("on") {
        return;
    }

    if name == "style" {
        out.push_str(" style={");
        out.push_str(&style_object(value));
        out.push('}');
        return;
    }

    out.push(' ');
    out.push_str(jsx_attr_name(name));
    out.push_str("=\"");
    out.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
    out.push('"');
}

fn jsx_attr_name(name: &str) -> &str {
    match name {
        "class" => "className",
        "for" => "htmlFor",
        "tabindex" => "tabIndex",
        "readonly" => "readOnly",
        "maxlength" => "maxLength",
        "colspan" => "colSpan",
        "rowspan" => "rowSpan",
        "srcset" => "srcSet",
        "crossorigin" => "crossOrigin",
        "http-equiv" => "httpEquiv",
        "accept-charset" => "acceptCharset",
        other => other,
    }
}

fn escape_text(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        match c {
            '{' => out.push_str("{'{'}"),
            '}' => out.push_str("{'}'}"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
    out
}

/// Collapses whitespace runs to one space, keeping a leading/trailing space
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_and_comments_are_dropped() {
        let tree = DocumentTree::parse(
            "<html><body><!-- note --><script>alert(1)</script><p>Hi</p></body></html>",
        );
        let body = tree.find_first(tree.root(), "body").unwrap();

        assert!(tree.find_first(tree.root(), "script").is_none());
        assert_eq!(tree.node(body).children.len(), 1);
        assert_eq!(tree.text(body), "Hi");
    }

    #[test]
    fn test_children_are_indices_in_document_order() {
        let tree = DocumentTree::parse("<body><ul><li>a</li><li>b</li></ul></body>");
        let items = tree.find_all(tree.root(), "li");
        assert_eq!(items.len(), 2);
        assert!(items[0] < items[1]);
        assert_eq!(tree.text(items[1]), "b");
    }

    #[test]
    fn test_remove_where_detaches_subtrees() {
        let mut tree = DocumentTree::parse("<body><nav><a href='/'>x</a></nav><p>y</p></body>");
        let before = tree.len();
        let root = tree.root();
        tree.remove_where(root, &|node: &Node| node.is_element("nav"));

        assert!(tree.find_first(root, "nav").is_none());
        assert!(tree.find_first(root, "a").is_none());
        assert_eq!(tree.len(), before - 3);
    }

    #[test]
    fn test_jsx_rendering() {
        let tree = DocumentTree::parse(
            r#"<body><div class="box" onclick="go()"><img src="/a.png" alt="A"><label for="x">{1 < 2}</label></div></body>"#,
        );
        let div = tree.find_first(tree.root(), "div").unwrap();

        assert_eq!(
            tree.to_jsx(div),
            r#"<div className="box"><img alt="A" src="/a.png" /><label htmlFor="x">{'{'}1 &lt; 2{'}'}</label></div>"#
        );
    }

    #[test]
    fn test_inline_style_becomes_object() {
        let tree = DocumentTree::parse(r#"<body><p style="margin-top: 0; color: red">x</p></body>"#);
        let p = tree.find_first(tree.root(), "p").unwrap();
        assert_eq!(
            tree.to_jsx(p),
            r#"<p style={{ marginTop: "0", color: "red" }}>x</p>"#
        );
    }

    #[test]
    fn test_deeply_nested_document() {
        let depth = 20_000;
        let html = format!(
            "<html><body>{}<p>deep</p>{}<nav>n</nav></body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        let mut tree = DocumentTree::parse(&html);
        let root = tree.root();

        assert_eq!(tree.find_all(root, "div").len(), depth);
        let p = tree.find_first(root, "p").unwrap();
        assert_eq!(tree.text(p), "deep");

        tree.remove_where(root, &|node: &Node| node.is_element("nav"));
        assert!(tree.find_first(root, "nav").is_none());

        let body = tree.find_first(root, "body").unwrap();
        let jsx = tree.children_to_jsx(body);
        assert!(jsx.starts_with("<><div><div>"));
        assert!(jsx.contains("<p>deep</p>"));
        assert_eq!(jsx.matches("</div>").count(), depth);
    }

    #[test]
    fn test_attribute_edits() {
        let mut tree = DocumentTree::parse(r#"<body><a href="/about">About</a></body>"#);
        let a = tree.find_first(tree.root(), "a").unwrap();
        tree.rename(a, "Link");
        tree.remove_attr(a, "href");
        tree.set_attr(a, "to", "/about");

        assert_eq!(tree.to_jsx(a), r#"<Link to="/about">About</Link>"#);
    }
}
