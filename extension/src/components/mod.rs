mod add_mapping;
mod import_panel;
mod mapping_list;
mod settings_panel;

use crate::icons;
use crate::popup_context::PopupContext;
use add_mapping::AddMapping;
use dioxus::prelude::*;
use import_panel::ImportPanel;
use mapper_core::{AddressMapping, Settings, StoreChange};
use mapping_list::MappingList;
use settings_panel::SettingsPanel;

#[derive(Clone, Copy, PartialEq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// Feedback line shown under the action that produced it.
#[derive(Clone, PartialEq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
}

impl Status {
    pub fn info(text: impl Into<String>) -> Option<Self> {
        Some(Self { kind: StatusKind::Info, text: text.into() })
    }

    pub fn success(text: impl Into<String>) -> Option<Self> {
        Some(Self { kind: StatusKind::Success, text: text.into() })
    }

    pub fn error(text: impl Into<String>) -> Option<Self> {
        Some(Self { kind: StatusKind::Error, text: text.into() })
    }
}

#[component]
pub fn App() -> Element {
    use_context_provider(PopupContext::new);
    let ctx = use_context::<PopupContext>();

    let mapping = use_signal(AddressMapping::new);
    let settings = use_signal(Settings::default);
    let mut status = use_signal(|| None::<Status>);

    // Writes made from this popup: keep its own log level in step.
    use_hook(|| {
        ctx.store.subscribe(|change| match change {
            StoreChange::Settings(settings) => crate::apply_log_level(settings.debug),
            StoreChange::Mappings { total } => log::info!("Mappings saved ({} total)", total),
        })
    });

    use_future(move || {
        let ctx = ctx.clone();
        async move {
            if let Err(e) = ctx.load(mapping, settings).await {
                log::error!("Loading popup state failed: {}", e);
                status.set(Status::error(format!("Error: {}", e)));
            }
        }
    });

    rsx! {
        div { class: "w-96 p-4 bg-gray-50 space-y-4",
            div { class: "flex items-center",
                icons::Tag { class: Some("w-5 h-5 text-blue-600 mr-2".to_string()) }
                h1 { class: "text-lg font-bold text-gray-900", "Address Mapper" }
            }

            SettingsPanel { settings, status }
            ImportPanel { mapping, status }
            AddMapping { mapping, status }
            StatusLine { status }
            MappingList { mapping, status }
        }
    }
}

#[component]
fn StatusLine(status: Signal<Option<Status>>) -> Element {
    let Some(current) = status.read().clone() else {
        return rsx! {};
    };
    let color = match current.kind {
        StatusKind::Info => "text-blue-600",
        StatusKind::Success => "text-green-600",
        StatusKind::Error => "text-red-600",
    };
    rsx! {
        p { class: "text-sm {color}", "{current.text}" }
    }
}
