use super::Status;
use crate::icons;
use crate::popup_context::PopupContext;
use dioxus::prelude::*;
use mapper_core::{Address, AddressMapping};

#[component]
pub fn AddMapping(mapping: Signal<AddressMapping>, status: Signal<Option<Status>>) -> Element {
    let ctx = use_context::<PopupContext>();
    let mut address = use_signal(String::new);
    let mut name = use_signal(String::new);

    let on_add = move |_| {
        let raw_address = address.read().trim().to_string();
        let raw_name = name.read().trim().to_string();
        if raw_address.is_empty() || raw_name.is_empty() {
            status.set(Status::error("Please enter both address and name"));
            return;
        }
        let Some(parsed) = Address::parse(&raw_address) else {
            status.set(Status::error(
                "Invalid address: expected 0x followed by 40 hex characters",
            ));
            return;
        };

        let ctx = ctx.clone();
        spawn(async move {
            match ctx.store.insert(&parsed, &raw_name).await {
                Ok(total) => {
                    status.set(Status::success(format!(
                        "Added {} as {}. Total: {}",
                        parsed.abbreviate(),
                        raw_name,
                        total
                    )));
                    address.set(String::new());
                    name.set(String::new());
                    ctx.after_change(mapping).await;
                }
                Err(e) => status.set(Status::error(format!("Error: {}", e))),
            }
        });
    };

    rsx! {
        div { class: "p-3 bg-white rounded-lg shadow space-y-2",
            h2 { class: "text-sm font-semibold text-gray-800", "Add mapping" }
            input {
                class: "w-full px-2 py-1 border rounded text-sm font-mono",
                placeholder: "0x...",
                value: "{address}",
                oninput: move |evt| address.set(evt.value()),
            }
            input {
                class: "w-full px-2 py-1 border rounded text-sm",
                placeholder: "Name",
                value: "{name}",
                oninput: move |evt| name.set(evt.value()),
            }
            button {
                class: "w-full flex items-center justify-center px-3 py-2 bg-green-600 text-white text-sm rounded hover:bg-green-700",
                onclick: on_add,
                icons::Plus { class: Some("w-4 h-4 mr-2".to_string()) }
                "Add"
            }
        }
    }
}
