// DOM seam between the scanner and the page
//
// The scanner and label applicator only talk to `DomTree`. The wasm crate
// implements it over web-sys; tests use the arena DOM in `memory`.

#[cfg(test)]
pub mod memory;

use thiserror::Error;

/// Marks an element the scanner has already looked at.
pub const PROCESSED_CLASS: &str = "address-processed";
/// Element whose own text nodes the free-text pass has already examined.
pub const TEXT_SCANNED_CLASS: &str = "address-text-scanned";
/// Element whose text was replaced by a name.
pub const MAPPED_CLASS: &str = "address-mapped";
/// Element followed by a name label.
pub const WITH_LABEL_CLASS: &str = "address-with-label";
/// The inserted label itself.
pub const LABEL_CLASS: &str = "address-label";
/// Wrapper that replaced a raw text node.
pub const FREE_TEXT_CLASS: &str = "address-free-text";

pub const ORIGINAL_ADDRESS_ATTR: &str = "data-original-address";
pub const ORIGINAL_TEXT_ATTR: &str = "data-original-text";
pub const ORIGINAL_TITLE_ATTR: &str = "data-original-title";

/// Classes that mean "this subtree already shows a name".
pub const ANNOTATION_CLASSES: [&str; 4] =
    [MAPPED_CLASS, WITH_LABEL_CLASS, LABEL_CLASS, FREE_TEXT_CLASS];

/// Structural selectors for address-bearing elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    AddressLink,
    AddressLinkSpan,
    HighlightTarget,
    HashTag,
    AddressData,
    AddressTitle,
    TruncatedText,
}

impl Selector {
    /// Scan order: outer links before the spans inside them.
    pub const CANDIDATES: [Selector; 7] = [
        Selector::AddressLink,
        Selector::AddressLinkSpan,
        Selector::HighlightTarget,
        Selector::HashTag,
        Selector::AddressData,
        Selector::AddressTitle,
        Selector::TruncatedText,
    ];

    /// Cheap hints that an inserted subtree is worth a rescan.
    pub const MUTATION_HINTS: [Selector; 3] = [
        Selector::HighlightTarget,
        Selector::HashTag,
        Selector::AddressLink,
    ];

    pub fn css(self) -> &'static str {
        match self {
            Selector::AddressLink => r#"a[href*="/address/"]"#,
            Selector::AddressLinkSpan => r#"a[href*="/address/"] span"#,
            Selector::HighlightTarget => "span[data-highlight-target]",
            Selector::HashTag => ".hash-tag",
            Selector::AddressData => "[data-address]",
            Selector::AddressTitle => r#"[title*="0x"]"#,
            Selector::TruncatedText => "span.text-truncate, td > span",
        }
    }
}

/// An inline element to create: `<span class=.. attr=..>text</span>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanSpec {
    pub classes: Vec<&'static str>,
    pub attributes: Vec<(&'static str, String)>,
    pub text: String,
}

/// Piece of the markup that replaces a free-text node. Text is always inserted
/// as a text node, never parsed as HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Span(SpanSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameAccessError {
    #[error("frame '{0}' is cross-origin")]
    CrossOrigin(String),
    #[error("frame '{0}' has no document yet")]
    NotLoaded(String),
}

/// The page operations the scanner needs.
///
/// Writes to nodes that have left the document must be harmless no-ops.
pub trait DomTree {
    type Node: Clone;

    /// Root element of the top-level document.
    fn document_root(&self) -> Option<Self::Node>;

    /// Root elements of embedded frames whose id contains any of `id_patterns`.
    fn frame_roots(&self, id_patterns: &[String]) -> Vec<Result<Self::Node, FrameAccessError>>;

    /// Descendants of `root` matching `selector`, in document order.
    fn query_all(&self, root: &Self::Node, selector: Selector) -> Vec<Self::Node>;

    /// Whether any descendant of `root` matches `selector`.
    fn contains(&self, root: &Self::Node, selector: Selector) -> bool {
        !self.query_all(root, selector).is_empty()
    }

    /// Descendants of `root` carrying `class`.
    fn query_class(&self, root: &Self::Node, class: &str) -> Vec<Self::Node>;

    /// Whether `node` is an element matching `selector`.
    fn matches(&self, node: &Self::Node, selector: Selector) -> bool;

    fn is_attached(&self, node: &Self::Node) -> bool;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&self, node: &Self::Node, name: &str);

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;
    fn add_class(&self, node: &Self::Node, class: &str);
    fn remove_class(&self, node: &Self::Node, class: &str);

    /// Concatenated text of the node and its descendants.
    fn text(&self, node: &Self::Node) -> String;
    /// Replace all children with a single text node.
    fn set_text(&self, node: &Self::Node, text: &str);

    /// Parent element of `node`; `None` once detached.
    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node>;

    /// `node` or its nearest ancestor element matching `selector`.
    fn closest(&self, node: &Self::Node, selector: Selector) -> Option<Self::Node>;

    /// Whether `node` (for text nodes: its parent) or an ancestor carries any of `classes`.
    fn within_class(&self, node: &Self::Node, classes: &[&str]) -> bool;

    /// Whether a descendant of `node` carries any of `classes`.
    fn contains_class(&self, node: &Self::Node, classes: &[&str]) -> bool;

    /// Insert a new span as the next sibling of `node`.
    fn insert_after(&self, node: &Self::Node, span: &SpanSpec);

    /// Text nodes under `root`, skipping script, style, noscript and textarea.
    fn text_nodes(&self, root: &Self::Node) -> Vec<Self::Node>;

    /// Swap `text_node` for a `wrapper` span holding `fragments`.
    fn replace_with_fragments(&self, text_node: &Self::Node, wrapper: &SpanSpec, fragments: &[Fragment]);

    /// Swap `node` for a plain text node.
    fn replace_with_text(&self, node: &Self::Node, text: &str);

    fn remove(&self, node: &Self::Node);
}
