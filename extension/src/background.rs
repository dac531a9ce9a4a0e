// Background service worker logic
// The JS glue registers chrome listeners synchronously (service workers need
// that) and forwards each event here. Decisions come from the core relay;
// this module only carries them out.

use crate::chrome::{self, error_text, from_js, to_js};
use crate::services::storage::mapping_store;
use futures::future::join_all;
use mapper_core::relay::{InstallReason, TabInfo};
use mapper_core::store::{Items, StorageBackend};
use mapper_core::{ExtensionMessage, Relay, RelayAction};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;

fn relay() -> Relay {
    Relay::new(&crate::config().relay)
}

/// Called once per service worker start. Restores the badge.
#[wasm_bindgen]
pub async fn init_background() -> Result<(), JsValue> {
    let store = mapping_store();
    let total = match store.metadata().await {
        Ok(Some(metadata)) => metadata.total_count,
        Ok(None) => store.load_mapping().await.map(|m| m.len()).unwrap_or(0),
        Err(e) => {
            log::warn!("Reading mapping metadata failed: {}", e);
            0
        }
    };
    perform(relay().badge(total)).await?;
    log::info!("Background ready ({} mappings)", total);
    Ok(())
}

#[wasm_bindgen]
pub async fn handle_install(reason: String) -> Result<(), JsValue> {
    let reason: InstallReason = from_js(&JsValue::from_str(&reason))?;
    log::info!("Extension installed or updated: {:?}", reason);
    for action in relay().on_installed(reason) {
        perform(action).await?;
    }
    Ok(())
}

/// `changes` as delivered by `chrome.storage.onChanged` for the local area.
#[wasm_bindgen]
pub async fn handle_storage_changed(changes: JsValue) -> Result<(), JsValue> {
    let changes: Value = from_js(&changes)?;
    let tabs = chrome::tabs::query_all().await?;
    let actions = relay().on_storage_changed(&changes, &tabs);
    perform_all(actions).await;
    Ok(())
}

/// Tab reached `status: complete`.
#[wasm_bindgen]
pub async fn handle_tab_updated(tab: JsValue) -> Result<(), JsValue> {
    let tab: TabInfo = from_js(&tab)?;
    let enabled = match mapping_store().get_settings().await {
        Ok(settings) => settings.enabled,
        Err(e) => {
            log::warn!("Reading settings failed: {}", e);
            true
        }
    };
    if let Some(action) = relay().on_tab_updated(&tab, enabled) {
        if let Err(e) = perform(action).await {
            // Usually the script is already there or the page forbids injection.
            log::debug!("Content script injection skipped: {}", error_text(&e));
        }
    }
    Ok(())
}

#[wasm_bindgen]
pub async fn handle_context_menu(info: JsValue, tab: JsValue) -> Result<(), JsValue> {
    let info: Value = from_js(&info)?;
    let tab: Option<TabInfo> = from_js(&tab).unwrap_or(None);
    let menu_id = info
        .get("menuItemId")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let selection = info.get("selectionText").and_then(Value::as_str);

    if let Some(action) = relay().on_context_menu(menu_id, selection, tab.as_ref()) {
        perform(action).await?;
    }
    Ok(())
}

/// Returns the value for `sendResponse`, or `undefined` when there is none.
#[wasm_bindgen]
pub async fn handle_message(message: JsValue) -> Result<JsValue, JsValue> {
    let value: Value = from_js(&message)?;
    let message = match ExtensionMessage::from_value(&value) {
        Ok(message) => message,
        Err(e) => {
            log::debug!("Ignoring message: {}", e);
            return Ok(JsValue::UNDEFINED);
        }
    };
    match relay().on_message(&message) {
        Some(action) => perform(action).await,
        None => Ok(JsValue::UNDEFINED),
    }
}

async fn perform_all(actions: Vec<RelayAction>) {
    for result in join_all(actions.into_iter().map(perform)).await {
        if let Err(e) = result {
            log::debug!("Relay action failed: {}", error_text(&e));
        }
    }
}

async fn perform(action: RelayAction) -> Result<JsValue, JsValue> {
    match action {
        RelayAction::WriteDefaultSettings => {
            let written = mapping_store()
                .ensure_default_settings()
                .await
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            log::info!("Default settings written: {}", written);
        }
        RelayAction::ShowNotification { title, message } => {
            chrome::notifications::show(&title, &message).await?;
        }
        RelayAction::CreateContextMenus(items) => {
            chrome::context_menus::replace_all(items).await?;
        }
        RelayAction::SendToTab { tab_id, message } => {
            let payload = message
                .to_value()
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            // Tabs without a content script reject; that's expected.
            if let Err(e) = chrome::tabs::send_message(tab_id, to_js(&payload)?).await {
                log::debug!("Tab {} did not take the message: {}", tab_id, error_text(&e));
            }
        }
        RelayAction::SetBadge { text, color } => {
            chrome::action::set_badge(&text, &color).await?;
        }
        RelayAction::InjectContentScript { tab_id } => {
            chrome::scripting::inject_content_script(tab_id).await?;
        }
        RelayAction::OpenPopup => {
            chrome::action::open_popup().await?;
        }
        RelayAction::ReadStorage { keys } => {
            let items = mapping_store()
                .backend()
                .get(&keys)
                .await
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            return to_js(&items);
        }
        RelayAction::WriteStorage { data } => {
            write_storage(data).await?;
            return to_js(&json!({ "success": true }));
        }
    }
    Ok(JsValue::UNDEFINED)
}

async fn write_storage(data: Items) -> Result<(), JsValue> {
    mapping_store()
        .backend()
        .set(data)
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
