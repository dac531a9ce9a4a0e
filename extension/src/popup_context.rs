// Popup-wide context using Dioxus context API
// Components reach the mapping store and tab relay through it.

use crate::chrome::{self, error_text, to_js};
use crate::services::storage::{mapping_store, ChromeStorage};
use dioxus::prelude::*;
use mapper_core::{AddressMapping, MappingStore, Relay, RelayAction, Settings, StorageError};
use std::rc::Rc;

#[derive(Clone)]
pub struct PopupContext {
    pub store: Rc<MappingStore<ChromeStorage>>,
    relay: Rc<Relay>,
    pub max_display: usize,
}

// Contexts don't need real equality
impl PartialEq for PopupContext {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.store, &other.store)
    }
}

impl PopupContext {
    pub fn new() -> Self {
        let config = crate::config();
        Self {
            store: Rc::new(mapping_store()),
            relay: Rc::new(Relay::new(&config.relay)),
            max_display: config.popup.max_display,
        }
    }

    /// Read mapping and settings into the popup's signals.
    pub async fn load(
        &self,
        mut mapping: Signal<AddressMapping>,
        mut settings: Signal<Settings>,
    ) -> Result<(), StorageError> {
        let (loaded_mapping, loaded_settings) = self.store.load().await?;
        crate::apply_log_level(loaded_settings.debug);
        mapping.set(loaded_mapping);
        settings.set(loaded_settings);
        Ok(())
    }

    /// Re-read the mapping after a write and tell open pages to rescan.
    pub async fn after_change(&self, mut mapping: Signal<AddressMapping>) {
        match self.store.load_mapping().await {
            Ok(fresh) => mapping.set(fresh),
            Err(e) => log::error!("Reloading mappings failed: {}", e),
        }
        self.notify_tabs().await;
    }

    /// Send `refreshMappings` to every tab; tabs without the content script are skipped.
    pub async fn notify_tabs(&self) {
        let tabs = match chrome::tabs::query_all().await {
            Ok(tabs) => tabs,
            Err(e) => {
                log::warn!("Listing tabs failed: {}", error_text(&e));
                return;
            }
        };
        for action in self.relay.refresh_targets(&tabs) {
            let RelayAction::SendToTab { tab_id, message } = action else {
                continue;
            };
            let Ok(payload) = message.to_value() else {
                continue;
            };
            let sent = match to_js(&payload) {
                Ok(js) => chrome::tabs::send_message(tab_id, js).await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                log::debug!("Tab {} not refreshed: {}", tab_id, error_text(&e));
            }
        }
    }
}

impl Default for PopupContext {
    fn default() -> Self {
        Self::new()
    }
}
