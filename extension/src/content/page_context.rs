// Shared state for one page's content script
// Cloned into every observer, timer and message callback.

use super::dom::WebDom;
use crate::services::storage::{mapping_store, ChromeStorage};
use gloo_timers::callback::Timeout;
use mapper_core::config::MapperConfig;
use mapper_core::{AddressMapping, ChangeWatcher, MappingStore, ScanSession, Settings};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
pub struct PageContext {
    pub dom: Rc<WebDom>,
    pub session: Rc<RefCell<ScanSession>>,
    pub watcher: Rc<RefCell<ChangeWatcher>>,
    pub store: Rc<MappingStore<ChromeStorage>>,
    debounce: Rc<RefCell<Option<Timeout>>>,
}

impl PageContext {
    pub fn new(dom: WebDom, config: &MapperConfig) -> Self {
        Self {
            dom: Rc::new(dom),
            session: Rc::new(RefCell::new(ScanSession::new(config.scanner.clone()))),
            watcher: Rc::new(RefCell::new(ChangeWatcher::new(&config.watcher))),
            store: Rc::new(mapping_store()),
            debounce: Rc::new(RefCell::new(None)),
        }
    }

    /// Pull mapping and settings from storage into the session. A failed read
    /// leaves the page unmapped rather than stopping the script.
    pub async fn reload(&self) {
        let (mapping, settings) = match self.store.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("Loading mappings failed, continuing without: {}", e);
                (AddressMapping::new(), Settings::default())
            }
        };
        crate::apply_log_level(settings.debug);
        log::info!("Loaded {} mappings", mapping.len());
        self.session.borrow_mut().update(mapping, settings);
    }

    /// Replace the pending debounce timer. Dropping the old one cancels it.
    pub fn set_debounce(&self, timeout: Option<Timeout>) {
        *self.debounce.borrow_mut() = timeout;
    }
}
