// DomTree over the live page

use mapper_core::dom::{DomTree, FrameAccessError, Fragment, Selector, SpanSpec};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlIFrameElement, Node, NodeList};

const SHOW_TEXT: u32 = 0x4;
const SKIPPED_PARENTS: [&str; 4] = ["SCRIPT", "STYLE", "NOSCRIPT", "TEXTAREA"];

pub struct WebDom {
    document: Document,
}

fn nodes(list: NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.get(i)).collect()
}

fn class_selector(classes: &[&str]) -> String {
    classes
        .iter()
        .map(|c| format!(".{}", c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn log_failure(what: &str, result: Result<(), JsValue>) {
    if let Err(e) = result {
        log::debug!("{} failed: {:?}", what, e);
    }
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// The element itself, or the parent element of a text node.
    fn element_of(node: &Node) -> Option<Element> {
        match node.dyn_ref::<Element>() {
            Some(element) => Some(element.clone()),
            None => node.parent_element(),
        }
    }

    fn build_span(&self, doc: &Document, spec: &SpanSpec) -> Result<Element, JsValue> {
        let span = doc.create_element("span")?;
        for class in &spec.classes {
            span.class_list().add_1(class)?;
        }
        for (name, value) in &spec.attributes {
            span.set_attribute(name, value)?;
        }
        if !spec.text.is_empty() {
            span.append_child(&doc.create_text_node(&spec.text))?;
        }
        Ok(span)
    }

    /// `wrapper` holding `fragments` in order, not yet attached.
    fn build_fragments(
        &self,
        doc: &Document,
        wrapper: &SpanSpec,
        fragments: &[Fragment],
    ) -> Result<Element, JsValue> {
        let outer = self.build_span(doc, wrapper)?;
        for fragment in fragments {
            let child: Node = match fragment {
                Fragment::Text(text) => doc.create_text_node(text).into(),
                Fragment::Span(spec) => self.build_span(doc, spec)?.into(),
            };
            outer.append_child(&child)?;
        }
        Ok(outer)
    }

    /// Nodes must be created by the document that will own them (frames).
    fn owner(&self, node: &Node) -> Document {
        node.owner_document().unwrap_or_else(|| self.document.clone())
    }
}

impl DomTree for WebDom {
    type Node = Node;

    fn document_root(&self) -> Option<Node> {
        self.document.body().map(Node::from)
    }

    fn frame_roots(&self, id_patterns: &[String]) -> Vec<Result<Node, FrameAccessError>> {
        let Ok(frames) = self.document.query_selector_all("iframe") else {
            return Vec::new();
        };
        nodes(frames)
            .into_iter()
            .filter_map(|n| n.dyn_into::<HtmlIFrameElement>().ok())
            .filter(|frame| {
                let id = frame.id();
                id_patterns.iter().any(|p| id.contains(p.as_str()))
            })
            .map(|frame| {
                let id = frame.id();
                match frame.content_document() {
                    Some(doc) => doc
                        .body()
                        .map(Node::from)
                        .ok_or(FrameAccessError::NotLoaded(id)),
                    // contentDocument is null for cross-origin frames
                    None if frame.content_window().is_some() => {
                        Err(FrameAccessError::CrossOrigin(id))
                    }
                    None => Err(FrameAccessError::NotLoaded(id)),
                }
            })
            .collect()
    }

    fn query_all(&self, root: &Node, selector: Selector) -> Vec<Node> {
        let Some(root) = root.dyn_ref::<Element>() else {
            return Vec::new();
        };
        match root.query_selector_all(selector.css()) {
            Ok(list) => nodes(list),
            Err(e) => {
                log::warn!("Selector {:?} failed: {:?}", selector, e);
                Vec::new()
            }
        }
    }

    fn contains(&self, root: &Node, selector: Selector) -> bool {
        root.dyn_ref::<Element>()
            .and_then(|e| e.query_selector(selector.css()).ok().flatten())
            .is_some()
    }

    fn query_class(&self, root: &Node, class: &str) -> Vec<Node> {
        let Some(root) = root.dyn_ref::<Element>() else {
            return Vec::new();
        };
        root.query_selector_all(&format!(".{}", class))
            .map(nodes)
            .unwrap_or_default()
    }

    fn matches(&self, node: &Node, selector: Selector) -> bool {
        node.dyn_ref::<Element>()
            .is_some_and(|e| e.matches(selector.css()).unwrap_or(false))
    }

    fn is_attached(&self, node: &Node) -> bool {
        node.is_connected()
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn set_attribute(&self, node: &Node, name: &str, value: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            log_failure("setAttribute", element.set_attribute(name, value));
        }
    }

    fn remove_attribute(&self, node: &Node, name: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            log_failure("removeAttribute", element.remove_attribute(name));
        }
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        node.dyn_ref::<Element>()
            .is_some_and(|e| e.class_list().contains(class))
    }

    fn add_class(&self, node: &Node, class: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            log_failure("classList.add", element.class_list().add_1(class));
        }
    }

    fn remove_class(&self, node: &Node, class: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            log_failure("classList.remove", element.class_list().remove_1(class));
        }
    }

    fn text(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text(&self, node: &Node, text: &str) {
        node.set_text_content(Some(text));
    }

    fn parent_element(&self, node: &Node) -> Option<Node> {
        node.parent_element().map(Node::from)
    }

    fn closest(&self, node: &Node, selector: Selector) -> Option<Node> {
        Self::element_of(node)?
            .closest(selector.css())
            .ok()
            .flatten()
            .map(Node::from)
    }

    fn within_class(&self, node: &Node, classes: &[&str]) -> bool {
        Self::element_of(node)
            .and_then(|e| e.closest(&class_selector(classes)).ok().flatten())
            .is_some()
    }

    fn contains_class(&self, node: &Node, classes: &[&str]) -> bool {
        node.dyn_ref::<Element>()
            .and_then(|e| e.query_selector(&class_selector(classes)).ok().flatten())
            .is_some()
    }

    fn insert_after(&self, node: &Node, span: &SpanSpec) {
        let Some(parent) = node.parent_node() else {
            return;
        };
        let result = self.build_span(&self.owner(node), span).and_then(|label| {
            parent
                .insert_before(&label, node.next_sibling().as_ref())
                .map(|_| ())
        });
        log_failure("insert label", result);
    }

    fn text_nodes(&self, root: &Node) -> Vec<Node> {
        let walker = match self.owner(root).create_tree_walker_with_what_to_show(root, SHOW_TEXT) {
            Ok(walker) => walker,
            Err(e) => {
                log::warn!("createTreeWalker failed: {:?}", e);
                return Vec::new();
            }
        };
        let mut found = Vec::new();
        while let Ok(Some(node)) = walker.next_node() {
            let skipped = node
                .parent_element()
                .is_some_and(|p| SKIPPED_PARENTS.contains(&p.tag_name().as_str()));
            // Nothing to rewrite without a hex prefix.
            let text = node.text_content().unwrap_or_default();
            if !skipped && (text.contains("0x") || text.contains("0X")) {
                found.push(node);
            }
        }
        found
    }

    fn replace_with_fragments(&self, text_node: &Node, wrapper: &SpanSpec, fragments: &[Fragment]) {
        let Some(parent) = text_node.parent_node() else {
            return;
        };
        let result = self
            .build_fragments(&self.owner(text_node), wrapper, fragments)
            .and_then(|outer| parent.replace_child(&outer, text_node).map(|_| ()));
        log_failure("replace text node", result);
    }

    fn replace_with_text(&self, node: &Node, text: &str) {
        let Some(parent) = node.parent_node() else {
            return;
        };
        let replacement = self.owner(node).create_text_node(text);
        log_failure(
            "restore text node",
            parent.replace_child(&replacement, node).map(|_| ()),
        );
    }

    fn remove(&self, node: &Node) {
        if let Some(parent) = node.parent_node() {
            log_failure("removeChild", parent.remove_child(node).map(|_| ()));
        }
    }
}
