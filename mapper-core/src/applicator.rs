// Label applicator: rewrites page nodes to show names
//
// Replace mode swaps the element text for the name and keeps the address in
// `title` and `data-original-address`. Append mode leaves the address visible
// and inserts a `(name)` label right after the element.

use crate::address::{self, Address};
use crate::dom::{
    DomTree, Fragment, SpanSpec, ANNOTATION_CLASSES, FREE_TEXT_CLASS, LABEL_CLASS, MAPPED_CLASS,
    ORIGINAL_ADDRESS_ATTR, ORIGINAL_TEXT_ATTR, ORIGINAL_TITLE_ATTR, PROCESSED_CLASS,
    TEXT_SCANNED_CLASS, WITH_LABEL_CLASS,
};
use crate::mapping::AddressMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Replaced,
    Labelled,
    AlreadyLabelled,
    /// The node left the document before we got to it.
    Stale,
}

fn tooltip(address: &Address) -> String {
    format!("Address: {}", address)
}

fn label_span(address: &Address, name: &str) -> SpanSpec {
    SpanSpec {
        classes: vec![LABEL_CLASS],
        attributes: vec![
            ("title", address.to_string()),
            (ORIGINAL_ADDRESS_ATTR, address.to_string()),
        ],
        text: format!(" ({})", name),
    }
}

fn mapped_span(address: &Address, name: &str) -> SpanSpec {
    SpanSpec {
        classes: vec![MAPPED_CLASS],
        attributes: vec![
            ("title", tooltip(address)),
            (ORIGINAL_ADDRESS_ATTR, address.to_string()),
        ],
        text: name.to_string(),
    }
}

/// Show `name` for the address held by `node`.
pub fn apply_label<D: DomTree>(
    dom: &D,
    node: &D::Node,
    address: &Address,
    name: &str,
    replace_mode: bool,
) -> Applied {
    if !dom.is_attached(node) {
        return Applied::Stale;
    }

    if replace_mode {
        if dom.attribute(node, ORIGINAL_TEXT_ATTR).is_none() {
            dom.set_attribute(node, ORIGINAL_TEXT_ATTR, &dom.text(node));
            if let Some(title) = dom.attribute(node, "title") {
                dom.set_attribute(node, ORIGINAL_TITLE_ATTR, &title);
            }
        }
        dom.set_attribute(node, ORIGINAL_ADDRESS_ATTR, address.as_str());
        dom.set_attribute(node, "title", &tooltip(address));
        dom.set_text(node, name);
        dom.add_class(node, MAPPED_CLASS);
        return Applied::Replaced;
    }

    if dom.has_class(node, WITH_LABEL_CLASS) {
        return Applied::AlreadyLabelled;
    }
    dom.insert_after(node, &label_span(address, name));
    dom.set_attribute(node, ORIGINAL_ADDRESS_ATTR, address.as_str());
    dom.add_class(node, WITH_LABEL_CLASS);
    Applied::Labelled
}

/// Rewrite every mapped address inside a raw text node.
///
/// The node is swapped for a wrapper span only when at least one address in it
/// has a name. Returns whether the node was rewritten.
pub fn rewrite_text_node<D: DomTree>(
    dom: &D,
    node: &D::Node,
    mapping: &AddressMapping,
    replace_mode: bool,
) -> bool {
    if !dom.is_attached(node) || dom.within_class(node, &ANNOTATION_CLASSES) {
        return false;
    }

    let text = dom.text(node);
    let found = address::find_all(&text);
    if !found.iter().any(|(_, a)| mapping.contains(a.as_str())) {
        return false;
    }

    let mut fragments: Vec<Fragment> = Vec::with_capacity(found.len() * 2 + 1);
    let mut cursor = 0;
    for (range, addr) in found {
        push_text(&mut fragments, &text[cursor..range.start]);
        let shown = &text[range.clone()];
        match mapping.get(addr.as_str()) {
            Some(name) if replace_mode => fragments.push(Fragment::Span(mapped_span(&addr, name))),
            Some(name) => {
                push_text(&mut fragments, shown);
                fragments.push(Fragment::Span(label_span(&addr, name)));
            }
            None => push_text(&mut fragments, shown),
        }
        cursor = range.end;
    }
    push_text(&mut fragments, &text[cursor..]);

    let wrapper = SpanSpec {
        classes: vec![FREE_TEXT_CLASS],
        attributes: vec![(ORIGINAL_TEXT_ATTR, text.clone())],
        text: String::new(),
    };
    dom.replace_with_fragments(node, &wrapper, &fragments);
    true
}

fn push_text(fragments: &mut Vec<Fragment>, piece: &str) {
    if piece.is_empty() {
        return;
    }
    if let Some(Fragment::Text(last)) = fragments.last_mut() {
        last.push_str(piece);
    } else {
        fragments.push(Fragment::Text(piece.to_string()));
    }
}

/// Undo every rewrite under `root` and clear processed markers.
pub fn restore<D: DomTree>(dom: &D, root: &D::Node) {
    for wrapper in dom.query_class(root, FREE_TEXT_CLASS) {
        let original = dom.attribute(&wrapper, ORIGINAL_TEXT_ATTR).unwrap_or_default();
        dom.replace_with_text(&wrapper, &original);
    }

    for label in dom.query_class(root, LABEL_CLASS) {
        dom.remove(&label);
    }

    for mapped in dom.query_class(root, MAPPED_CLASS) {
        if let Some(original) = dom.attribute(&mapped, ORIGINAL_TEXT_ATTR) {
            dom.set_text(&mapped, &original);
        }
        match dom.attribute(&mapped, ORIGINAL_TITLE_ATTR) {
            Some(title) => dom.set_attribute(&mapped, "title", &title),
            None => dom.remove_attribute(&mapped, "title"),
        }
        for attr in [ORIGINAL_TEXT_ATTR, ORIGINAL_TITLE_ATTR, ORIGINAL_ADDRESS_ATTR] {
            dom.remove_attribute(&mapped, attr);
        }
        dom.remove_class(&mapped, MAPPED_CLASS);
    }

    for labelled in dom.query_class(root, WITH_LABEL_CLASS) {
        dom.remove_attribute(&labelled, ORIGINAL_ADDRESS_ATTR);
        dom.remove_class(&labelled, WITH_LABEL_CLASS);
    }

    for processed in dom.query_class(root, PROCESSED_CLASS) {
        dom.remove_class(&processed, PROCESSED_CLASS);
    }
    for scanned in dom.query_class(root, TEXT_SCANNED_CLASS) {
        dom.remove_class(&scanned, TEXT_SCANNED_CLASS);
    }
}
