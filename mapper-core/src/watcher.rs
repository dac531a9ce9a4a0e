// Change watcher
//
// Decides when the content script rescans. Time is passed in explicitly so the
// wasm driver can feed it `Date.now()` from its observer and timer callbacks.

use crate::config::WatcherConfig;
use crate::dom::{DomTree, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    ScanScheduled { due_at: u64 },
    Scanning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScanReason {
    Fallback,
    Mutation,
    Navigation,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub reason: ScanReason,
    /// Clear processed markers before scanning.
    pub reset_markers: bool,
}

impl ScanRequest {
    fn absorb(self, other: ScanRequest) -> ScanRequest {
        ScanRequest {
            reason: self.reason.max(other.reason),
            reset_markers: self.reset_markers || other.reset_markers,
        }
    }
}

#[derive(Debug)]
pub struct ChangeWatcher {
    state: WatchState,
    debounce_ms: u64,
    /// Work accumulated for the next scan.
    pending: Option<ScanRequest>,
    last_url: Option<String>,
}

impl ChangeWatcher {
    pub fn new(config: &WatcherConfig) -> Self {
        Self {
            state: WatchState::Idle,
            debounce_ms: config.debounce_ms,
            pending: None,
            last_url: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    fn schedule(&mut self, now: u64, request: ScanRequest) {
        self.pending = Some(match self.pending {
            Some(pending) => pending.absorb(request),
            None => request,
        });
        // A scan in progress picks this up in `finish`.
        if self.state != WatchState::Scanning {
            self.state = WatchState::ScanScheduled {
                due_at: now + self.debounce_ms,
            };
        }
    }

    /// A relevant subtree was added to the page. Restarts the debounce delay.
    pub fn notify_mutation(&mut self, now: u64) {
        self.schedule(
            now,
            ScanRequest {
                reason: ScanReason::Mutation,
                reset_markers: false,
            },
        );
    }

    /// Report the current URL. Returns true when it differs from the last one
    /// seen; the first call only records it.
    pub fn notify_url(&mut self, now: u64, url: &str) -> bool {
        match self.last_url.as_deref() {
            Some(last) if last != url => {}
            Some(_) => return false,
            None => {
                self.last_url = Some(url.to_string());
                return false;
            }
        }
        log::debug!("Navigation detected: {}", url);
        self.last_url = Some(url.to_string());
        self.schedule(
            now,
            ScanRequest {
                reason: ScanReason::Navigation,
                reset_markers: true,
            },
        );
        true
    }

    /// Mappings or settings changed: rescan from a clean page right away.
    /// While a scan runs the refresh is queued behind it.
    pub fn refresh(&mut self) -> Option<ScanRequest> {
        let request = ScanRequest {
            reason: ScanReason::Refresh,
            reset_markers: true,
        };
        if self.state == WatchState::Scanning {
            self.pending = Some(match self.pending {
                Some(pending) => pending.absorb(request),
                None => request,
            });
            return None;
        }
        let request = match self.pending.take() {
            Some(pending) => pending.absorb(request),
            None => request,
        };
        self.state = WatchState::Scanning;
        Some(request)
    }

    /// The scheduled scan, once its debounce delay has passed.
    pub fn due(&mut self, now: u64) -> Option<ScanRequest> {
        match self.state {
            WatchState::ScanScheduled { due_at } if now >= due_at => {
                self.state = WatchState::Scanning;
                Some(self.pending.take().unwrap_or(ScanRequest {
                    reason: ScanReason::Mutation,
                    reset_markers: false,
                }))
            }
            _ => None,
        }
    }

    /// Periodic tick. Starts a scan when enabled and none is running. A scan
    /// still waiting on its debounce delay runs now, so a steady stream of
    /// mutations cannot postpone scanning past one tick.
    pub fn fallback(&mut self, enabled: bool) -> Option<ScanRequest> {
        if !enabled || self.state == WatchState::Scanning {
            return None;
        }
        let request = ScanRequest {
            reason: ScanReason::Fallback,
            reset_markers: false,
        };
        self.state = WatchState::Scanning;
        Some(match self.pending.take() {
            Some(pending) => pending.absorb(request),
            None => request,
        })
    }

    /// The running scan completed. Anything queued meanwhile is scheduled.
    pub fn finish(&mut self, now: u64) {
        if self.state != WatchState::Scanning {
            return;
        }
        self.state = if self.pending.is_some() {
            WatchState::ScanScheduled {
                due_at: now + self.debounce_ms,
            }
        } else {
            WatchState::Idle
        };
    }
}

/// Cheap check on an added node before committing to a scan.
pub fn is_relevant_addition<D: DomTree>(dom: &D, node: &D::Node) -> bool {
    Selector::MUTATION_HINTS
        .iter()
        .any(|&hint| dom.matches(node, hint) || dom.contains(node, hint))
}
