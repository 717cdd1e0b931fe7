//! Arena-based HTML DOM used by the content iterator.
//!
//! Documents are parsed leniently with html5ever into a flat vector of nodes
//! linked by indices, and can be queried with CSS selectors.

mod select;
mod sink;

use std::collections::HashMap;

use html5ever::driver::ParseOpts;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{QualName, ns, parse_document};

pub use select::{ElementRef, Selector};
use sink::DomSink;

/// Index of a node in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element {
        /// Boxed so that references survive arena growth.
        name: Box<QualName>,
        attrs: Vec<Attribute>,
        id: Option<String>,
        classes: Vec<String>,
    },
    Text(String),
    Comment,
    Doctype,
}

#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// An HTML document stored as an arena of nodes.
pub struct Document {
    nodes: Vec<Node>,
    document: NodeId,
    id_map: HashMap<String, NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document holding only its root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: NodeId::NONE,
            id_map: HashMap::new(),
        };
        dom.document = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    /// Parse `html` the way a browser would with scripting disabled.
    /// Malformed markup never fails.
    pub fn parse(html: &str) -> Self {
        let opts = ParseOpts {
            tree_builder: TreeBuilderOpts {
                scripting_enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        parse_document(DomSink::default(), opts)
            .one(html)
            .into_document()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    pub(crate) fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        let mut id = None;
        let mut classes = Vec::new();
        for attr in &attrs {
            match attr.name.local.as_ref() {
                "id" => id = Some(attr.value.clone()),
                "class" => classes = attr.value.split_whitespace().map(str::to_string).collect(),
                _ => {}
            }
        }

        let node_id = self.alloc(Node::new(NodeData::Element {
            name: Box::new(name),
            attrs,
            id: id.clone(),
            classes,
        }));
        if let Some(id) = id {
            self.id_map.entry(id).or_insert(node_id);
        }
        node_id
    }

    pub(crate) fn create_text(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text)))
    }

    pub(crate) fn create_node(&mut self, data: NodeData) -> NodeId {
        self.alloc(Node::new(data))
    }

    pub(crate) fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.get(parent).map_or(NodeId::NONE, |n| n.last_child);

        if let Some(node) = self.get_mut(child) {
            node.parent = parent;
            node.prev_sibling = last_child;
            node.next_sibling = NodeId::NONE;
        }
        if let Some(last) = self.get_mut(last_child) {
            last.next_sibling = child;
        }
        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    pub(crate) fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let (parent, prev) = self
            .get(sibling)
            .map_or((NodeId::NONE, NodeId::NONE), |n| (n.parent, n.prev_sibling));

        if let Some(node) = self.get_mut(new_node) {
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = sibling;
        }
        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }
        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = new_node;
        }
    }

    /// Append `text` to `parent`, merging with a trailing text node.
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.get(parent).map_or(NodeId::NONE, |n| n.last_child);
        if let Some(Node {
            data: NodeData::Text(existing),
            ..
        }) = self.get_mut(last_child)
        {
            existing.push_str(text);
            return;
        }
        let node = self.create_text(text.to_string());
        self.append(parent, node);
    }

    pub(crate) fn detach(&mut self, target: NodeId) {
        let Some(node) = self.get(target) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }
        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }
        if let Some(node) = self.get_mut(target) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    pub fn children(&self, parent: NodeId) -> Children<'_> {
        Children {
            dom: self,
            current: self.get(parent).map_or(NodeId::NONE, |n| n.first_child),
        }
    }

    /// Element children of `parent`, in document order.
    pub fn element_children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent).filter(|&c| self.is_element(c))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(NodeId::is_some)
    }

    /// First element in document order accepted by `predicate`.
    pub fn find(&self, predicate: impl Fn(NodeId, &Node) -> bool) -> Option<NodeId> {
        let mut stack = vec![self.document];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                if predicate(id, node) {
                    return Some(id);
                }
                let mut children: Vec<_> = self.children(id).collect();
                children.reverse();
                stack.extend(children);
            }
        }
        None
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find(|id, _| self.element_name(id) == Some(tag))
    }

    /// Every element of the document, in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.document];
        while let Some(id) = stack.pop() {
            if self.is_element(id) {
                out.push(id);
            }
            let mut children: Vec<_> = self.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    pub fn get_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn qual_name(&self, id: NodeId) -> Option<&QualName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name.as_ref()),
            _ => None,
        })
    }

    /// Local name of an element, e.g. `p`.
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        self.qual_name(id).map(|name| name.local.as_ref())
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Value of the attribute with the given local name, in any namespace.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name.local.as_ref() == name)
            .map(|a| a.value.as_str())
    }

    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    pub fn element_classes(&self, id: NodeId) -> &[String] {
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Language declared on `id` itself with `xml:lang` or `lang`.
    pub fn declared_language(&self, id: NodeId) -> Option<&str> {
        let attrs = self.attrs(id);
        let xml_lang = attrs.iter().find(|a| {
            a.name.local.as_ref() == "xml:lang"
                || (a.name.ns == ns!(xml) && a.name.local.as_ref() == "lang")
        });
        xml_lang
            .or_else(|| attrs.iter().find(|a| a.name.local.as_ref() == "lang" && a.name.ns == ns!()))
            .map(|a| a.value.as_str())
    }

    /// Language of `id`, inherited from the nearest ancestor declaring one.
    pub fn language(&self, id: NodeId) -> Option<&str> {
        let mut current = id;
        while current.is_some() {
            if let Some(lang) = self.declared_language(current) {
                return Some(lang);
            }
            current = self.get(current).map_or(NodeId::NONE, |n| n.parent);
        }
        None
    }

    /// Elements matching `selector`, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|&id| selector.matches(ElementRef::new(self, id)))
            .collect()
    }

    pub fn select_first(&self, selector: &Selector) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|&id| selector.matches(ElementRef::new(self, id)))
    }
}

pub struct Children<'a> {
    dom: &'a Document,
    current: NodeId,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self.dom.get(id).map_or(NodeId::NONE, |n| n.next_sibling);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structure() {
        let dom = Document::parse(r#"<html><body><div id="main" class="a b"><p>First</p><p>Second</p></div></body></html>"#);
        let div = dom.find_by_tag("div").unwrap();
        assert_eq!(dom.element_id(div), Some("main"));
        assert_eq!(dom.element_classes(div), ["a", "b"]);
        assert_eq!(dom.get_by_id("main"), Some(div));

        let paragraphs: Vec<_> = dom.element_children(div).collect();
        assert_eq!(paragraphs.len(), 2);
        let text = dom.children(paragraphs[1]).next().unwrap();
        assert_eq!(dom.text(text), Some("Second"));
        assert_eq!(dom.parent(paragraphs[0]), Some(div));
    }

    #[test]
    fn test_text_around_comments() {
        let dom = Document::parse("<p>Hello, <!-- c -->World<br>!</p>");
        let p = dom.find_by_tag("p").unwrap();
        let texts: Vec<_> = dom.children(p).filter_map(|c| dom.text(c)).collect();
        assert_eq!(texts, ["Hello, ", "World", "!"]);
    }

    #[test]
    fn test_malformed_markup() {
        let dom = Document::parse("<p>unclosed <b>bold <i>both</p><p>next");
        assert!(dom.find_by_tag("body").is_some());
        assert_eq!(dom.elements().iter().filter(|&&e| dom.element_name(e) == Some("p")).count(), 2);
    }

    #[test]
    fn test_noscript_content_is_markup() {
        let dom = Document::parse("<body><noscript><p>fallback</p></noscript></body>");
        assert!(dom.find_by_tag("p").is_some());
    }

    #[test]
    fn test_inherited_language() {
        let dom = Document::parse(
            r#"<html lang="en"><body><div xml:lang="fr"><p><span>salut</span></p></div><p>hi</p></body></html>"#,
        );
        let span = dom.find_by_tag("span").unwrap();
        assert_eq!(dom.language(span), Some("fr"));
        let body = dom.find_by_tag("body").unwrap();
        assert_eq!(dom.language(body), Some("en"));
        assert_eq!(dom.declared_language(body), None);
    }
}
