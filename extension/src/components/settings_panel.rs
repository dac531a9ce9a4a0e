use super::Status;
use crate::popup_context::PopupContext;
use dioxus::prelude::*;
use mapper_core::{SettingToggle, Settings};

#[component]
pub fn SettingsPanel(settings: Signal<Settings>, status: Signal<Option<Status>>) -> Element {
    let ctx = use_context::<PopupContext>();
    let current = *settings.read();

    // One handler per toggle; each owns its own handle on the context.
    let toggle = move |switch: SettingToggle| {
        let ctx = ctx.clone();
        move |_: FormEvent| {
            let next = settings.read().toggled(switch);
            spawn(save(ctx.clone(), next, settings, status));
        }
    };
    let on_enabled = toggle(SettingToggle::Enabled);
    let on_replace = toggle(SettingToggle::ReplaceMode);
    let on_debug = toggle(SettingToggle::Debug);

    rsx! {
        div { class: "p-3 bg-white rounded-lg shadow space-y-2",
            label { class: "flex items-center justify-between text-sm text-gray-700",
                span { "Enabled" }
                input {
                    r#type: "checkbox",
                    checked: current.enabled,
                    onchange: on_enabled,
                }
            }
            label { class: "flex items-center justify-between text-sm text-gray-700",
                span { "Replace address with name" }
                input {
                    r#type: "checkbox",
                    checked: current.replace_mode,
                    onchange: on_replace,
                }
            }
            label { class: "flex items-center justify-between text-sm text-gray-700",
                span { "Debug logging" }
                input {
                    r#type: "checkbox",
                    checked: current.debug,
                    onchange: on_debug,
                }
            }
        }
    }
}

async fn save(
    ctx: PopupContext,
    next: Settings,
    mut settings: Signal<Settings>,
    mut status: Signal<Option<Status>>,
) {
    match ctx.store.set_settings(next).await {
        Ok(()) => {
            settings.set(next);
            ctx.notify_tabs().await;
        }
        Err(e) => status.set(Status::error(format!("Error: {}", e))),
    }
}
