// Chrome extension API bindings
// Only the calls this extension makes. Promise-returning APIs are awaited with JsFuture.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen]
extern "C" {
    // chrome.storage.local
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    fn storage_get(keys: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    fn storage_set(items: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = remove)]
    fn storage_remove(keys: JsValue) -> Result<js_sys::Promise, JsValue>;

    // chrome.runtime
    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    fn runtime_on_message(callback: &js_sys::Function);

    // chrome.tabs
    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
    fn tabs_query(query_info: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    fn tabs_send_message(tab_id: i32, message: JsValue) -> Result<js_sys::Promise, JsValue>;

    // chrome.action
    #[wasm_bindgen(catch, js_namespace = ["chrome", "action"], js_name = setBadgeText)]
    fn action_set_badge_text(details: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "action"], js_name = setBadgeBackgroundColor)]
    fn action_set_badge_background_color(details: JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "action"], js_name = openPopup)]
    fn action_open_popup() -> Result<js_sys::Promise, JsValue>;

    // chrome.notifications
    #[wasm_bindgen(catch, js_namespace = ["chrome", "notifications"], js_name = create)]
    fn notifications_create(options: JsValue) -> Result<js_sys::Promise, JsValue>;

    // chrome.contextMenus
    #[wasm_bindgen(catch, js_namespace = ["chrome", "contextMenus"], js_name = removeAll)]
    fn context_menus_remove_all() -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "contextMenus"], js_name = create)]
    fn context_menus_create(properties: JsValue) -> Result<JsValue, JsValue>;

    // chrome.scripting
    #[wasm_bindgen(catch, js_namespace = ["chrome", "scripting"], js_name = executeScript)]
    fn scripting_execute_script(injection: JsValue) -> Result<js_sys::Promise, JsValue>;

    // navigator.clipboard
    #[wasm_bindgen(catch, js_namespace = ["navigator", "clipboard"], js_name = writeText)]
    fn clipboard_write_text(text: &str) -> Result<js_sys::Promise, JsValue>;
}

/// Serialize through JSON so serde field names reach the chrome API unchanged.
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))?;
    js_sys::JSON::parse(&json)
}

pub fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, JsValue> {
    let json: String = if value.is_undefined() {
        "null".to_string()
    } else {
        js_sys::JSON::stringify(value)?.into()
    };
    serde_json::from_str(&json).map_err(|e| JsValue::from_str(&format!("Parse error: {}", e)))
}

/// Readable text for a rejected promise or thrown error.
pub fn error_text(error: &JsValue) -> String {
    js_sys::Reflect::get(error, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| error.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}

async fn settle(promise: Result<js_sys::Promise, JsValue>) -> Result<JsValue, JsValue> {
    JsFuture::from(promise?).await
}

pub mod storage {
    use super::*;

    pub async fn get(keys: &[String]) -> Result<JsValue, JsValue> {
        settle(storage_get(to_js(keys)?)).await
    }

    pub async fn set(items: JsValue) -> Result<(), JsValue> {
        settle(storage_set(items)).await.map(|_| ())
    }

    pub async fn remove(keys: &[String]) -> Result<(), JsValue> {
        settle(storage_remove(to_js(keys)?)).await.map(|_| ())
    }
}

pub mod runtime {
    use super::*;

    /// `callback(message, sender, sendResponse)`; return `true` to answer later.
    pub fn on_message(callback: &js_sys::Function) {
        runtime_on_message(callback);
    }
}

pub mod tabs {
    use super::*;
    use mapper_core::relay::TabInfo;

    pub async fn query_all() -> Result<Vec<TabInfo>, JsValue> {
        let tabs = settle(tabs_query(js_sys::Object::new().into())).await?;
        from_js(&tabs)
    }

    pub async fn send_message(tab_id: i32, message: JsValue) -> Result<JsValue, JsValue> {
        settle(tabs_send_message(tab_id, message)).await
    }
}

pub mod action {
    use super::*;
    use serde_json::json;

    pub async fn set_badge(text: &str, color: &str) -> Result<(), JsValue> {
        settle(action_set_badge_text(to_js(&json!({ "text": text }))?)).await?;
        if !text.is_empty() {
            settle(action_set_badge_background_color(to_js(&json!({ "color": color }))?)).await?;
        }
        Ok(())
    }

    pub async fn open_popup() -> Result<(), JsValue> {
        settle(action_open_popup()).await.map(|_| ())
    }
}

pub mod notifications {
    use super::*;
    use serde_json::json;

    pub const ICON: &str = "icons/icon48.png";

    pub async fn show(title: &str, message: &str) -> Result<(), JsValue> {
        let options = json!({
            "type": "basic",
            "iconUrl": ICON,
            "title": title,
            "message": message,
        });
        settle(notifications_create(to_js(&options)?)).await.map(|_| ())
    }
}

pub mod context_menus {
    use super::*;
    use mapper_core::relay::ContextMenuItem;
    use serde_json::json;

    /// Recreate the menu from scratch so updates don't hit duplicate ids.
    pub async fn replace_all(items: &[ContextMenuItem]) -> Result<(), JsValue> {
        settle(context_menus_remove_all()).await?;
        for item in items {
            context_menus_create(to_js(&json!({
                "id": item.id,
                "title": item.title,
                "contexts": ["selection"],
            }))?)?;
        }
        Ok(())
    }
}

pub mod scripting {
    use super::*;
    use serde_json::json;

    pub const CONTENT_SCRIPT: &str = "content.js";

    pub async fn inject_content_script(tab_id: i32) -> Result<(), JsValue> {
        let injection = json!({
            "target": { "tabId": tab_id },
            "files": [CONTENT_SCRIPT],
        });
        settle(scripting_execute_script(to_js(&injection)?)).await.map(|_| ())
    }
}

pub mod clipboard {
    use super::*;

    pub async fn write_text(text: &str) -> Result<(), JsValue> {
        settle(clipboard_write_text(text)).await.map(|_| ())
    }
}
