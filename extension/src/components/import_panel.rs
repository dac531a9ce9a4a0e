use super::Status;
use crate::icons;
use crate::popup_context::PopupContext;
use dioxus::prelude::*;
use mapper_core::AddressMapping;

#[component]
pub fn ImportPanel(mapping: Signal<AddressMapping>, status: Signal<Option<Status>>) -> Element {
    let ctx = use_context::<PopupContext>();
    let mut selected = use_signal(|| None::<(String, String)>);
    let mut importing = use_signal(|| false);

    let on_file = move |evt: FormEvent| {
        spawn(async move {
            let Some(engine) = evt.files() else {
                selected.set(None);
                return;
            };
            let Some(name) = engine.files().into_iter().next() else {
                selected.set(None);
                return;
            };
            match engine.read_file_to_string(&name).await {
                Some(text) => selected.set(Some((name, text))),
                None => {
                    selected.set(None);
                    status.set(Status::error(format!("Error: could not read {}", name)));
                }
            }
        });
    };

    let on_import = move |_| {
        let Some((_, text)) = selected.read().clone() else {
            status.set(Status::error("Please select a CSV file"));
            return;
        };
        let ctx = ctx.clone();
        spawn(async move {
            importing.set(true);
            status.set(Status::info("Importing..."));
            match ctx.store.import_csv(&text).await {
                Ok(summary) => {
                    selected.set(None);
                    status.set(Status::success(format!(
                        "Imported {} new mappings. Total: {}",
                        summary.imported, summary.total
                    )));
                    ctx.after_change(mapping).await;
                }
                Err(e) => {
                    log::error!("Import failed: {}", e);
                    status.set(Status::error(format!("Error: {}", e)));
                }
            }
            importing.set(false);
        });
    };

    let file_label = selected
        .read()
        .as_ref()
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| "No file selected".to_string());

    rsx! {
        div { class: "p-3 bg-white rounded-lg shadow space-y-2",
            h2 { class: "text-sm font-semibold text-gray-800", "Import CSV" }
            p { class: "text-xs text-gray-500", "One mapping per line: address,name" }
            input {
                r#type: "file",
                accept: ".csv",
                class: "block w-full text-xs",
                onchange: on_file,
            }
            p { class: "text-xs text-gray-500 truncate", "{file_label}" }
            button {
                class: "w-full flex items-center justify-center px-3 py-2 bg-blue-600 text-white text-sm rounded hover:bg-blue-700 disabled:opacity-50",
                disabled: importing(),
                onclick: on_import,
                icons::Upload { class: Some("w-4 h-4 mr-2".to_string()) }
                if importing() { "Importing..." } else { "Import" }
            }
        }
    }
}
