// Arena DOM for tests

use super::{DomTree, FrameAccessError, Fragment, Selector, SpanSpec};
use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum Kind {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: Kind,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug)]
struct Frame {
    id: String,
    root: Option<usize>,
}

#[derive(Debug)]
pub struct MemoryDom {
    nodes: RefCell<Vec<NodeData>>,
    frames: RefCell<Vec<Frame>>,
}

const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "textarea"];

impl MemoryDom {
    /// A document with an empty `<body>` root.
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(vec![NodeData {
                kind: Kind::Element {
                    tag: "body".to_string(),
                    attrs: BTreeMap::new(),
                },
                parent: None,
                children: Vec::new(),
            }]),
            frames: RefCell::new(Vec::new()),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn element(&self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let kind = Kind::Element {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        self.push(Some(parent.0), kind)
    }

    pub fn text_node(&self, parent: NodeId, text: &str) -> NodeId {
        self.push(Some(parent.0), Kind::Text(text.to_string()))
    }

    /// Add an `<iframe id=..>`; returns the frame's body when same-origin.
    pub fn add_frame(&self, id: &str, same_origin: bool) -> Option<NodeId> {
        let root = same_origin.then(|| {
            self.push(
                None,
                Kind::Element {
                    tag: "body".to_string(),
                    attrs: BTreeMap::new(),
                },
            )
        });
        self.frames.borrow_mut().push(Frame {
            id: id.to_string(),
            root: root.map(|r| r.0),
        });
        root
    }

    /// Detach `node` from its parent, as a page script would.
    pub fn detach(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent].children.retain(|&c| c != node.0);
        }
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[node.0]
            .children
            .iter()
            .map(|&c| NodeId(c))
            .collect()
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.nodes.borrow()[node.0].kind {
            Kind::Element { tag, .. } => Some(tag.clone()),
            Kind::Text(_) => None,
        }
    }

    /// Serialized markup, for assertions.
    pub fn html(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        write_html(&nodes, node.0, &mut out);
        out
    }

    fn push(&self, parent: Option<usize>, kind: Kind) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.len();
        nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            nodes[parent].children.push(id);
        }
        NodeId(id)
    }

    fn build_span(&self, parent: Option<usize>, spec: &SpanSpec) -> usize {
        let mut attrs: BTreeMap<String, String> = spec
            .attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        if !spec.classes.is_empty() {
            attrs.insert("class".to_string(), spec.classes.join(" "));
        }
        let span = self.push(
            parent,
            Kind::Element {
                tag: "span".to_string(),
                attrs,
            },
        );
        if !spec.text.is_empty() {
            self.push(Some(span.0), Kind::Text(spec.text.clone()));
        }
        span.0
    }

    /// Put `new` where `old` is in its parent's children and detach `old`.
    fn swap(&self, old: usize, new: usize) {
        let mut nodes = self.nodes.borrow_mut();
        let Some(parent) = nodes[old].parent else {
            return;
        };
        // `new` was created detached or as the parent's last child.
        if let Some(prev) = nodes[new].parent {
            nodes[prev].children.retain(|&c| c != new);
        }
        if let Some(pos) = nodes[parent].children.iter().position(|&c| c == old) {
            nodes[parent].children[pos] = new;
        }
        nodes[new].parent = Some(parent);
        nodes[old].parent = None;
    }

    fn is_root(&self, id: usize) -> bool {
        id == 0 || self.frames.borrow().iter().any(|f| f.root == Some(id))
    }

    fn element_matches(&self, id: usize, selector: Selector) -> bool {
        let nodes = self.nodes.borrow();
        let Kind::Element { tag, attrs } = &nodes[id].kind else {
            return false;
        };
        let has_class = |c: &str| {
            attrs
                .get("class")
                .is_some_and(|v| v.split_whitespace().any(|x| x == c))
        };
        let is_address_link = |n: &NodeData| match &n.kind {
            Kind::Element { tag, attrs } => {
                tag == "a" && attrs.get("href").is_some_and(|h| h.contains("/address/"))
            }
            Kind::Text(_) => false,
        };
        match selector {
            Selector::AddressLink => is_address_link(&nodes[id]),
            Selector::AddressLinkSpan => {
                tag == "span" && ancestors(&nodes, id).any(|a| is_address_link(&nodes[a]))
            }
            Selector::HighlightTarget => {
                tag == "span" && attrs.contains_key("data-highlight-target")
            }
            Selector::HashTag => has_class("hash-tag"),
            Selector::AddressData => attrs.contains_key("data-address"),
            Selector::AddressTitle => attrs.get("title").is_some_and(|t| t.contains("0x")),
            Selector::TruncatedText => {
                tag == "span"
                    && (has_class("text-truncate")
                        || nodes[id].parent.is_some_and(|p| {
                            matches!(&nodes[p].kind, Kind::Element { tag, .. } if tag == "td")
                        }))
            }
        }
    }

    fn descendants(&self, id: usize) -> Vec<usize> {
        let nodes = self.nodes.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<usize> = nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(nodes[next].children.iter().rev().copied());
        }
        out
    }

    fn class_list(&self, id: usize) -> Vec<String> {
        match &self.nodes.borrow()[id].kind {
            Kind::Element { attrs, .. } => attrs
                .get("class")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            Kind::Text(_) => Vec::new(),
        }
    }

    fn set_class_list(&self, id: usize, classes: &[String]) {
        if let Kind::Element { attrs, .. } = &mut self.nodes.borrow_mut()[id].kind {
            if classes.is_empty() {
                attrs.remove("class");
            } else {
                attrs.insert("class".to_string(), classes.join(" "));
            }
        }
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

fn ancestors(nodes: &[NodeData], id: usize) -> impl Iterator<Item = usize> + '_ {
    std::iter::successors(nodes[id].parent, move |&p| nodes[p].parent)
}

fn write_html(nodes: &[NodeData], id: usize, out: &mut String) {
    match &nodes[id].kind {
        Kind::Text(text) => out.push_str(text),
        Kind::Element { tag, attrs } => {
            out.push('<');
            out.push_str(tag);
            for (k, v) in attrs {
                out.push_str(&format!(" {}=\"{}\"", k, v));
            }
            out.push('>');
            for &child in &nodes[id].children {
                write_html(nodes, child, out);
            }
            out.push_str(&format!("</{}>", tag));
        }
    }
}

impl DomTree for MemoryDom {
    type Node = NodeId;

    fn document_root(&self) -> Option<NodeId> {
        Some(self.root())
    }

    fn frame_roots(&self, id_patterns: &[String]) -> Vec<Result<NodeId, FrameAccessError>> {
        self.frames
            .borrow()
            .iter()
            .filter(|f| id_patterns.iter().any(|p| f.id.contains(p.as_str())))
            .map(|f| {
                f.root
                    .map(NodeId)
                    .ok_or_else(|| FrameAccessError::CrossOrigin(f.id.clone()))
            })
            .collect()
    }

    fn query_all(&self, root: &NodeId, selector: Selector) -> Vec<NodeId> {
        self.descendants(root.0)
            .into_iter()
            .filter(|&id| self.element_matches(id, selector))
            .map(NodeId)
            .collect()
    }

    fn query_class(&self, root: &NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(root.0)
            .into_iter()
            .filter(|&id| self.class_list(id).iter().any(|c| c == class))
            .map(NodeId)
            .collect()
    }

    fn matches(&self, node: &NodeId, selector: Selector) -> bool {
        self.element_matches(node.0, selector)
    }

    fn is_attached(&self, node: &NodeId) -> bool {
        let nodes = self.nodes.borrow();
        let top = ancestors(&nodes, node.0).last().unwrap_or(node.0);
        drop(nodes);
        self.is_root(top)
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.nodes.borrow()[node.0].kind {
            Kind::Element { attrs, .. } => attrs.get(name).cloned(),
            Kind::Text(_) => None,
        }
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) {
        if let Kind::Element { attrs, .. } = &mut self.nodes.borrow_mut()[node.0].kind {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) {
        if let Kind::Element { attrs, .. } = &mut self.nodes.borrow_mut()[node.0].kind {
            attrs.remove(name);
        }
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.class_list(node.0).iter().any(|c| c == class)
    }

    fn add_class(&self, node: &NodeId, class: &str) {
        let mut classes = self.class_list(node.0);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_class_list(node.0, &classes);
        }
    }

    fn remove_class(&self, node: &NodeId, class: &str) {
        let mut classes = self.class_list(node.0);
        classes.retain(|c| c != class);
        self.set_class_list(node.0, &classes);
    }

    fn text(&self, node: &NodeId) -> String {
        let nodes = self.nodes.borrow();
        if let Kind::Text(text) = &nodes[node.0].kind {
            return text.clone();
        }
        drop(nodes);
        let nodes = self.nodes.borrow();
        self.descendants(node.0)
            .into_iter()
            .filter_map(|id| match &nodes[id].kind {
                Kind::Text(text) => Some(text.clone()),
                Kind::Element { .. } => None,
            })
            .collect()
    }

    fn set_text(&self, node: &NodeId, text: &str) {
        let mut nodes = self.nodes.borrow_mut();
        if let Kind::Text(existing) = &mut nodes[node.0].kind {
            *existing = text.to_string();
            return;
        }
        let children = std::mem::take(&mut nodes[node.0].children);
        for child in children {
            nodes[child].parent = None;
        }
        drop(nodes);
        self.push(Some(node.0), Kind::Text(text.to_string()));
    }

    fn parent_element(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes.borrow()[node.0].parent.map(NodeId)
    }

    fn closest(&self, node: &NodeId, selector: Selector) -> Option<NodeId> {
        let chain: Vec<usize> = {
            let nodes = self.nodes.borrow();
            std::iter::once(node.0).chain(ancestors(&nodes, node.0)).collect()
        };
        chain
            .into_iter()
            .find(|&id| self.element_matches(id, selector))
            .map(NodeId)
    }

    fn within_class(&self, node: &NodeId, classes: &[&str]) -> bool {
        let chain: Vec<usize> = {
            let nodes = self.nodes.borrow();
            std::iter::once(node.0).chain(ancestors(&nodes, node.0)).collect()
        };
        chain
            .into_iter()
            .any(|id| self.class_list(id).iter().any(|c| classes.contains(&c.as_str())))
    }

    fn contains_class(&self, node: &NodeId, classes: &[&str]) -> bool {
        self.descendants(node.0)
            .into_iter()
            .any(|id| self.class_list(id).iter().any(|c| classes.contains(&c.as_str())))
    }

    fn insert_after(&self, node: &NodeId, span: &SpanSpec) {
        let Some(parent) = self.nodes.borrow()[node.0].parent else {
            return;
        };
        let new = self.build_span(None, span);
        let mut nodes = self.nodes.borrow_mut();
        let pos = nodes[parent]
            .children
            .iter()
            .position(|&c| c == node.0)
            .map_or(nodes[parent].children.len(), |p| p + 1);
        nodes[parent].children.insert(pos, new);
        nodes[new].parent = Some(parent);
    }

    fn text_nodes(&self, root: &NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<usize> = nodes[root.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            match &nodes[id].kind {
                Kind::Text(_) => out.push(NodeId(id)),
                Kind::Element { tag, .. } if SKIPPED_TAGS.contains(&tag.as_str()) => {}
                Kind::Element { .. } => stack.extend(nodes[id].children.iter().rev().copied()),
            }
        }
        out
    }

    fn replace_with_fragments(&self, text_node: &NodeId, wrapper: &SpanSpec, fragments: &[Fragment]) {
        if self.nodes.borrow()[text_node.0].parent.is_none() {
            return;
        }
        let wrapper_id = self.build_span(None, wrapper);
        for fragment in fragments {
            match fragment {
                Fragment::Text(text) => {
                    self.push(Some(wrapper_id), Kind::Text(text.clone()));
                }
                Fragment::Span(spec) => {
                    self.build_span(Some(wrapper_id), spec);
                }
            }
        }
        self.swap(text_node.0, wrapper_id);
    }

    fn replace_with_text(&self, node: &NodeId, text: &str) {
        if self.nodes.borrow()[node.0].parent.is_none() {
            return;
        }
        let new = self.push(None, Kind::Text(text.to_string()));
        self.swap(node.0, new.0);
    }

    fn remove(&self, node: &NodeId) {
        self.detach(*node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_and_text() {
        let dom = MemoryDom::new();
        let table = dom.element(dom.root(), "td", &[]);
        let link = dom.element(table, "a", &[("href", "/address/0xabc")]);
        let span = dom.element(link, "span", &[]);
        dom.text_node(span, "hello");

        assert_eq!(dom.query_all(&dom.root(), Selector::AddressLink), vec![link]);
        assert_eq!(dom.query_all(&dom.root(), Selector::AddressLinkSpan), vec![span]);
        assert_eq!(dom.text(&table), "hello");
        assert_eq!(dom.closest(&span, Selector::AddressLink), Some(link));
    }

    #[test]
    fn test_detached_nodes_are_not_attached() {
        let dom = MemoryDom::new();
        let outer = dom.element(dom.root(), "div", &[]);
        let inner = dom.element(outer, "span", &[]);
        dom.detach(outer);
        assert!(!dom.is_attached(&inner));
        assert!(dom.is_attached(&dom.root()));
    }

    #[test]
    fn test_text_nodes_skip_scripts() {
        let dom = MemoryDom::new();
        let script = dom.element(dom.root(), "script", &[]);
        dom.text_node(script, "var a = 1;");
        let visible = dom.text_node(dom.root(), "visible");
        assert_eq!(dom.text_nodes(&dom.root()), vec![visible]);
    }
}
