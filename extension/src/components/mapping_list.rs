use super::Status;
use crate::icons;
use crate::popup_context::PopupContext;
use dioxus::prelude::*;
use mapper_core::{Address, AddressMapping};
use wasm_bindgen::{JsCast, JsValue};

#[component]
pub fn MappingList(mapping: Signal<AddressMapping>, status: Signal<Option<Status>>) -> Element {
    let ctx = use_context::<PopupContext>();
    let max_display = ctx.max_display;
    let total = mapping.read().len();

    let export_ctx = ctx.clone();
    let on_export = move |_| {
        let ctx = export_ctx.clone();
        spawn(async move {
            if mapping.read().is_empty() {
                status.set(Status::error("No mappings to export"));
                return;
            }
            let result = match ctx.store.export_csv().await {
                Ok(csv_text) => download_csv(&csv_text).map_err(|e| crate::chrome::error_text(&e)),
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(filename) => status.set(Status::success(format!("Exported {}", filename))),
                Err(e) => status.set(Status::error(format!("Error: {}", e))),
            }
        });
    };

    let on_clear = move |_| {
        let count = mapping.read().len();
        if count == 0 {
            return;
        }
        if !confirm(&format!("Are you sure you want to delete all {} mappings?", count)) {
            return;
        }
        let ctx = ctx.clone();
        spawn(async move {
            match ctx.store.clear().await {
                Ok(()) => {
                    status.set(Status::success("All mappings cleared"));
                    ctx.after_change(mapping).await;
                }
                Err(e) => status.set(Status::error(format!("Error: {}", e))),
            }
        });
    };

    let rows: Vec<(String, String)> = mapping
        .read()
        .iter()
        .take(max_display)
        .map(|(address, name)| (address.to_string(), name.to_string()))
        .collect();

    let heading = if total > max_display {
        format!("Total mappings: {} (showing first {})", total, max_display)
    } else {
        format!("Total mappings: {}", total)
    };

    rsx! {
        div { class: "p-3 bg-white rounded-lg shadow space-y-2",
            div { class: "flex items-center justify-between",
                h2 { class: "text-sm font-semibold text-gray-800", "{heading}" }
                div { class: "flex space-x-2",
                    button {
                        class: "p-1 text-gray-600 hover:text-blue-600",
                        title: "Export CSV",
                        onclick: on_export,
                        icons::Download { class: Some("w-4 h-4".to_string()) }
                    }
                    button {
                        class: "p-1 text-gray-600 hover:text-red-600",
                        title: "Clear all",
                        onclick: on_clear,
                        icons::Trash { class: Some("w-4 h-4".to_string()) }
                    }
                }
            }

            if rows.is_empty() {
                p { class: "text-xs text-gray-500", "No mappings yet" }
            } else {
                ul { class: "max-h-64 overflow-y-auto divide-y text-xs",
                    for (address, name) in rows {
                        MappingRow { key: "{address}", address: address.clone(), name, mapping, status }
                    }
                }
            }
        }
    }
}

#[component]
fn MappingRow(
    address: String,
    name: String,
    mapping: Signal<AddressMapping>,
    status: Signal<Option<Status>>,
) -> Element {
    let ctx = use_context::<PopupContext>();
    let short = Address::parse(&address)
        .map(|a| a.abbreviate())
        .unwrap_or_else(|| address.clone());

    let target = address.clone();
    let on_delete = move |_| {
        let ctx = ctx.clone();
        let target = target.clone();
        spawn(async move {
            match ctx.store.remove(&target).await {
                Ok(_) => ctx.after_change(mapping).await,
                Err(e) => status.set(Status::error(format!("Error: {}", e))),
            }
        });
    };

    rsx! {
        li { class: "flex items-center justify-between py-1",
            div { class: "min-w-0",
                p { class: "font-medium text-gray-900 truncate", "{name}" }
                p { class: "font-mono text-gray-500", title: "{address}", "{short}" }
            }
            button {
                class: "p-1 text-gray-400 hover:text-red-600",
                title: "Delete",
                onclick: on_delete,
                icons::X { class: Some("w-3 h-3".to_string()) }
            }
        }
    }
}

fn confirm(message: &str) -> bool {
    web_sys::window()
        .and_then(|w| w.confirm_with_message(message).ok())
        .unwrap_or(false)
}

/// Offer `csv_text` as `wallet_mappings_<YYYY-MM-DD>.csv`; returns the file name.
fn download_csv(csv_text: &str) -> Result<String, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let parts = js_sys::Array::of1(&JsValue::from_str(csv_text));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("text/csv");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;

    let date: String = js_sys::Date::new_0()
        .to_iso_string()
        .as_string()
        .unwrap_or_default()
        .chars()
        .take(10)
        .collect();
    let filename = format!("wallet_mappings_{}.csv", date);

    let anchor: web_sys::HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(&url);
    anchor.set_download(&filename);
    anchor.click();
    web_sys::Url::revoke_object_url(&url)?;
    Ok(filename)
}
