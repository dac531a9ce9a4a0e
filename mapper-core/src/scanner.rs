// Address scanner
//
// A `ScanSession` owns the mapping and settings snapshot used for scanning.
// A scan is split into a `ScanTask` that the caller drives one slice at a
// time, yielding to the page between slices.

use crate::address::{self, Address, DisplayedAddress};
use crate::applicator::{self, Applied};
use crate::config::ScannerConfig;
use crate::dom::{DomTree, Selector, ANNOTATION_CLASSES, PROCESSED_CLASS, TEXT_SCANNED_CLASS};
use crate::mapping::{AddressMapping, Settings};

/// Attributes that carry the full address explicitly.
const ADDRESS_DATA_ATTRS: [&str; 2] = ["data-highlight-target", "data-address"];

#[derive(Debug, Clone)]
enum ScanItem<N> {
    Element(N),
    Text(N),
}

/// Counters for one scan, logged at debug level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub candidates: usize,
    pub examined: usize,
    pub unresolved: usize,
    pub replaced: usize,
    pub labelled: usize,
    pub text_nodes_rewritten: usize,
    pub stale: usize,
    pub frames_skipped: usize,
}

/// Work collected by [`ScanSession::begin_scan`].
#[derive(Debug)]
pub struct ScanTask<N> {
    items: Vec<ScanItem<N>>,
    cursor: usize,
    report: ScanReport,
}

impl<N> ScanTask<N> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            report: ScanReport::default(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.items.len() - self.cursor
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.items.len()
    }

    pub fn report(&self) -> ScanReport {
        self.report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    Pending,
    Done(ScanReport),
}

/// Outcome of examining one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementOutcome {
    AlreadyProcessed,
    /// Inside or around something that already shows a name.
    Nested,
    Unresolved,
    Unmapped,
    Applied(Applied),
}

pub struct ScanSession {
    mapping: AddressMapping,
    settings: Settings,
    config: ScannerConfig,
}

impl ScanSession {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            mapping: AddressMapping::new(),
            settings: Settings::default(),
            config,
        }
    }

    pub fn update(&mut self, mapping: AddressMapping, settings: Settings) {
        log::debug!(
            "Session updated: {} mappings, enabled={}, replace_mode={}",
            mapping.len(),
            settings.enabled,
            settings.replace_mode
        );
        self.mapping = mapping;
        self.settings = settings;
    }

    pub fn mapping(&self) -> &AddressMapping {
        &self.mapping
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Scanning is pointless when disabled or when nothing is mapped.
    pub fn is_active(&self) -> bool {
        self.settings.enabled && !self.mapping.is_empty()
    }

    fn roots<D: DomTree>(&self, dom: &D, report: &mut ScanReport) -> Vec<D::Node> {
        let mut roots: Vec<D::Node> = dom.document_root().into_iter().collect();
        for frame in dom.frame_roots(&self.config.frame_id_patterns) {
            match frame {
                Ok(root) => roots.push(root),
                Err(e) => {
                    log::debug!("Skipping frame: {}", e);
                    report.frames_skipped += 1;
                }
            }
        }
        roots
    }

    /// Collect candidates from the document and allowed frames.
    pub fn begin_scan<D: DomTree>(&self, dom: &D) -> ScanTask<D::Node> {
        let mut task = ScanTask::empty();
        if !self.is_active() {
            return task;
        }

        let roots = self.roots(dom, &mut task.report);
        for root in &roots {
            for selector in Selector::CANDIDATES {
                task.items.extend(
                    dom.query_all(root, selector)
                        .into_iter()
                        .filter(|n| !dom.has_class(n, PROCESSED_CLASS))
                        .map(ScanItem::Element),
                );
            }
        }
        if self.config.free_text {
            for root in &roots {
                task.items.extend(
                    dom.text_nodes(root)
                        .into_iter()
                        .filter(|n| {
                            dom.parent_element(n)
                                .map_or(true, |p| !dom.has_class(&p, TEXT_SCANNED_CLASS))
                        })
                        .map(ScanItem::Text),
                );
            }
        }
        task.report.candidates = task.items.len();
        task
    }

    /// Process up to `batch_size` items of `task`.
    pub fn run_slice<D: DomTree>(&self, dom: &D, task: &mut ScanTask<D::Node>) -> SliceOutcome {
        let end = (task.cursor + self.config.batch_size.max(1)).min(task.items.len());
        for i in task.cursor..end {
            match &task.items[i] {
                ScanItem::Element(node) => {
                    let outcome = self.process_element(dom, node);
                    record(&mut task.report, outcome);
                }
                ScanItem::Text(node) => {
                    // The rewrite detaches `node`, so mark its parent first.
                    if let Some(parent) = dom.parent_element(node) {
                        dom.add_class(&parent, TEXT_SCANNED_CLASS);
                    }
                    if applicator::rewrite_text_node(
                        dom,
                        node,
                        &self.mapping,
                        self.settings.replace_mode,
                    ) {
                        task.report.text_nodes_rewritten += 1;
                    }
                }
            }
        }
        task.cursor = end;

        if task.is_done() {
            SliceOutcome::Done(task.report)
        } else {
            SliceOutcome::Pending
        }
    }

    /// Run a whole scan without yielding.
    pub fn scan_all<D: DomTree>(&self, dom: &D) -> ScanReport {
        let mut task = self.begin_scan(dom);
        loop {
            if let SliceOutcome::Done(report) = self.run_slice(dom, &mut task) {
                return report;
            }
        }
    }

    /// Mark, resolve and label a single element.
    pub fn process_element<D: DomTree>(&self, dom: &D, node: &D::Node) -> ElementOutcome {
        if !dom.is_attached(node) {
            return ElementOutcome::Applied(Applied::Stale);
        }
        if dom.has_class(node, PROCESSED_CLASS) {
            return ElementOutcome::AlreadyProcessed;
        }
        dom.add_class(node, PROCESSED_CLASS);

        if dom.within_class(node, &ANNOTATION_CLASSES)
            || dom.contains_class(node, &ANNOTATION_CLASSES)
        {
            return ElementOutcome::Nested;
        }

        let Some(address) = resolve_address(dom, node) else {
            return ElementOutcome::Unresolved;
        };
        let Some(name) = self.mapping.get(address.as_str()) else {
            return ElementOutcome::Unmapped;
        };
        ElementOutcome::Applied(applicator::apply_label(
            dom,
            node,
            &address,
            name,
            self.settings.replace_mode,
        ))
    }

    /// Undo all rewrites so the next scan starts from the original page.
    pub fn reset_markers<D: DomTree>(&self, dom: &D) {
        let mut report = ScanReport::default();
        for root in self.roots(dom, &mut report) {
            applicator::restore(dom, &root);
        }
        log::debug!("Processed markers cleared");
    }
}

fn record(report: &mut ScanReport, outcome: ElementOutcome) {
    match outcome {
        ElementOutcome::AlreadyProcessed | ElementOutcome::Nested => {}
        ElementOutcome::Unresolved => {
            report.examined += 1;
            report.unresolved += 1;
        }
        ElementOutcome::Unmapped => report.examined += 1,
        ElementOutcome::Applied(applied) => {
            report.examined += 1;
            match applied {
                Applied::Replaced => report.replaced += 1,
                Applied::Labelled => report.labelled += 1,
                Applied::AlreadyLabelled => {}
                Applied::Stale => report.stale += 1,
            }
        }
    }
}

/// Find the address an element stands for. First match wins:
/// 1. an explicit data attribute,
/// 2. the element's own text (a shortened display is completed from the
///    nearest address link or the title, which must agree with it),
/// 3. the element's `href`,
/// 4. a `title` holding exactly one address.
pub fn resolve_address<D: DomTree>(dom: &D, node: &D::Node) -> Option<Address> {
    for attr in ADDRESS_DATA_ATTRS {
        if let Some(found) = dom.attribute(node, attr).and_then(|v| address::find_first(&v)) {
            return Some(found);
        }
    }

    match DisplayedAddress::parse(&dom.text(node)) {
        Some(DisplayedAddress::Full(full)) => return Some(full),
        Some(DisplayedAddress::Short(short)) => {
            let from_link = dom
                .closest(node, Selector::AddressLink)
                .and_then(|link| dom.attribute(&link, "href"))
                .and_then(|href| address::find_in_link(&href));
            let from_title = || {
                dom.attribute(node, "title")
                    .and_then(|t| address::find_first(&t))
            };
            match from_link.or_else(from_title) {
                Some(full) if short.matches(&full) => return Some(full),
                Some(full) => log::debug!("Shortened address does not match {}", full),
                None => {}
            }
        }
        None => {}
    }

    if let Some(href) = dom.attribute(node, "href") {
        if let Some(found) = address::find_in_link(&href).or_else(|| address::find_first(&href)) {
            return Some(found);
        }
    }

    dom.attribute(node, "title")
        .and_then(|t| Address::parse(t.trim_start_matches("Address:")))
}
