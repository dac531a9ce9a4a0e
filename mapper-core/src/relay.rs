// Background relay
//
// The service worker forwards each browser event here and carries out the
// returned actions against the chrome APIs. Nothing in this module touches the
// browser, so every reaction can be tested natively.

use crate::address;
use crate::config::RelayConfig;
use crate::message::{ExtensionMessage, RuntimeRequest};
use crate::store::{Items, LEGACY_MAPPING_KEYS, METADATA_KEY};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

pub const NOTIFICATION_TITLE: &str = "Address Mapper";
pub const WELCOME_TITLE: &str = "Address Mapper installed!";
pub const WELCOME_MESSAGE: &str =
    "Click the extension icon to import a CSV file and start mapping addresses.";

pub const COPY_ADDRESS_MENU: &str = "copyAddress";
pub const ADD_MAPPING_MENU: &str = "addMapping";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    ChromeUpdate,
    SharedModuleUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TabInfo {
    pub id: Option<i32>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMenuItem {
    pub id: &'static str,
    pub title: &'static str,
}

/// Both entries apply to selected text.
pub const CONTEXT_MENUS: [ContextMenuItem; 2] = [
    ContextMenuItem {
        id: COPY_ADDRESS_MENU,
        title: "Copy original address",
    },
    ContextMenuItem {
        id: ADD_MAPPING_MENU,
        title: "Add to address mapping",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub enum RelayAction {
    WriteDefaultSettings,
    ShowNotification { title: String, message: String },
    CreateContextMenus(&'static [ContextMenuItem]),
    /// Best effort: tabs without a content script just miss it.
    SendToTab { tab_id: i32, message: ExtensionMessage },
    SetBadge { text: String, color: String },
    InjectContentScript { tab_id: i32 },
    OpenPopup,
    /// Answer the sender with these storage values.
    ReadStorage { keys: Vec<String> },
    /// Write and answer `{success: true}`.
    WriteStorage { data: Items },
}

/// `""` for no mappings, the count up to 999, then `999+`.
pub fn badge_text(count: usize) -> String {
    match count {
        0 => String::new(),
        1..=999 => count.to_string(),
        _ => "999+".to_string(),
    }
}

pub struct Relay {
    supported_domains: Vec<String>,
    badge_color: String,
}

impl Relay {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            supported_domains: config.supported_domains.clone(),
            badge_color: config.badge_color.clone(),
        }
    }

    /// Host equals a supported domain or is one of its subdomains.
    pub fn is_supported_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.supported_domains.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }

    pub fn badge(&self, count: usize) -> RelayAction {
        RelayAction::SetBadge {
            text: badge_text(count),
            color: self.badge_color.clone(),
        }
    }

    pub fn on_installed(&self, reason: InstallReason) -> Vec<RelayAction> {
        let mut actions = Vec::new();
        if reason == InstallReason::Install {
            actions.push(RelayAction::WriteDefaultSettings);
            actions.push(RelayAction::ShowNotification {
                title: WELCOME_TITLE.to_string(),
                message: WELCOME_MESSAGE.to_string(),
            });
        }
        actions.push(RelayAction::CreateContextMenus(&CONTEXT_MENUS));
        actions
    }

    /// `changes` is the `chrome.storage.onChanged` object:
    /// `{key: {oldValue?, newValue?}}`.
    pub fn on_storage_changed(&self, changes: &Value, tabs: &[TabInfo]) -> Vec<RelayAction> {
        let mut actions: Vec<RelayAction> = self
            .tabs_on_supported_domains(tabs)
            .map(|tab_id| RelayAction::SendToTab {
                tab_id,
                message: RuntimeRequest::StorageChanged {
                    changes: changes.clone(),
                }
                .into(),
            })
            .collect();

        if let Some(total) = mapping_total(changes) {
            actions.push(self.badge(total));
        }
        actions
    }

    /// Tab finished loading.
    pub fn on_tab_updated(&self, tab: &TabInfo, enabled: bool) -> Option<RelayAction> {
        let tab_id = tab.id?;
        let url = tab.url.as_deref()?;
        if !enabled || !self.is_supported_url(url) {
            return None;
        }
        Some(RelayAction::InjectContentScript { tab_id })
    }

    pub fn on_context_menu(
        &self,
        menu_id: &str,
        selection: Option<&str>,
        tab: Option<&TabInfo>,
    ) -> Option<RelayAction> {
        match menu_id {
            COPY_ADDRESS_MENU => {
                let found = address::find_first(selection?)?;
                Some(RelayAction::SendToTab {
                    tab_id: tab?.id?,
                    message: RuntimeRequest::CopyToClipboard {
                        text: found.to_string(),
                    }
                    .into(),
                })
            }
            ADD_MAPPING_MENU => Some(RelayAction::OpenPopup),
            other => {
                log::debug!("Ignoring context menu item '{}'", other);
                None
            }
        }
    }

    pub fn on_message(&self, message: &ExtensionMessage) -> Option<RelayAction> {
        let ExtensionMessage::Request(request) = message else {
            return None;
        };
        match request {
            RuntimeRequest::GetStorage { keys } => Some(RelayAction::ReadStorage { keys: keys.clone() }),
            RuntimeRequest::SetStorage { data } => Some(RelayAction::WriteStorage { data: data.clone() }),
            RuntimeRequest::ShowNotification { title, message } => {
                Some(RelayAction::ShowNotification {
                    title: title.clone().unwrap_or_else(|| NOTIFICATION_TITLE.to_string()),
                    message: message.clone(),
                })
            }
            RuntimeRequest::StorageChanged { .. } | RuntimeRequest::CopyToClipboard { .. } => None,
        }
    }

    /// Tabs that should receive `refreshMappings` after a popup edit.
    pub fn refresh_targets(&self, tabs: &[TabInfo]) -> Vec<RelayAction> {
        tabs.iter()
            .filter_map(|tab| tab.id)
            .map(|tab_id| RelayAction::SendToTab {
                tab_id,
                message: ExtensionMessage::RefreshMappings,
            })
            .collect()
    }

    fn tabs_on_supported_domains<'a>(&'a self, tabs: &'a [TabInfo]) -> impl Iterator<Item = i32> + 'a {
        tabs.iter().filter_map(|tab| match (tab.id, tab.url.as_deref()) {
            (Some(id), Some(url)) if self.is_supported_url(url) => Some(id),
            _ => None,
        })
    }
}

/// New mapping count when a change touches mapping keys.
fn mapping_total(changes: &Value) -> Option<usize> {
    let changes = changes.as_object()?;
    if let Some(change) = changes.get(METADATA_KEY) {
        return Some(
            change
                .pointer("/newValue/totalCount")
                .and_then(Value::as_u64)
                .map_or(0, |n| n as usize),
        );
    }
    for key in LEGACY_MAPPING_KEYS {
        if let Some(change) = changes.get(key) {
            return Some(
                change
                    .get("newValue")
                    .and_then(Value::as_object)
                    .map_or(0, |m| m.len()),
            );
        }
    }
    // Chunk writes always come with a metadata write.
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn relay() -> Relay {
        Relay::new(&RelayConfig::default())
    }

    fn tab(id: i32, url: &str) -> TabInfo {
        TabInfo {
            id: Some(id),
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn test_supported_domains() {
        let r = relay();
        assert!(r.is_supported_url("https://etherscan.io/address/0x1"));
        assert!(r.is_supported_url("https://sepolia.etherscan.io/tx/0x1"));
        assert!(r.is_supported_url("https://arbiscan.io/"));
        assert!(!r.is_supported_url("https://notetherscan.io/"));
        assert!(!r.is_supported_url("https://example.com/?q=etherscan.io"));
        assert!(!r.is_supported_url("chrome://extensions"));
        assert!(!r.is_supported_url("not a url"));
    }

    #[test]
    fn test_badge_text() {
        assert_eq!(badge_text(0), "");
        assert_eq!(badge_text(42), "42");
        assert_eq!(badge_text(999), "999");
        assert_eq!(badge_text(1_000), "999+");
    }

    #[test]
    fn test_install_writes_defaults_and_welcomes() {
        let actions = relay().on_installed(InstallReason::Install);
        assert_eq!(actions[0], RelayAction::WriteDefaultSettings);
        assert!(matches!(actions[1], RelayAction::ShowNotification { .. }));
        assert_eq!(actions[2], RelayAction::CreateContextMenus(&CONTEXT_MENUS));

        let update = relay().on_installed(InstallReason::Update);
        assert_eq!(update, vec![RelayAction::CreateContextMenus(&CONTEXT_MENUS)]);
    }

    #[test]
    fn test_storage_change_reaches_supported_tabs_and_badge() {
        let changes = json!({
            "mappings_metadata": {"newValue": {"chunkCount": 2, "totalCount": 150, "lastUpdated": 1}},
            "mappings_chunk_0": {"newValue": {}}
        });
        let tabs = [
            tab(1, "https://etherscan.io/"),
            tab(2, "https://example.com/"),
            TabInfo { id: Some(3), url: None },
            tab(4, "https://bscscan.com/tx/1"),
        ];
        let actions = relay().on_storage_changed(&changes, &tabs);

        let targets: Vec<i32> = actions
            .iter()
            .filter_map(|a| match a {
                RelayAction::SendToTab { tab_id, .. } => Some(*tab_id),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec![1, 4]);
        assert_eq!(
            actions.last(),
            Some(&RelayAction::SetBadge {
                text: "150".to_string(),
                color: "#007cba".to_string(),
            })
        );
    }

    #[test]
    fn test_badge_cleared_and_settings_only_changes() {
        let r = relay();
        let cleared = r.on_storage_changed(&json!({"mappings_metadata": {"oldValue": {}}}), &[]);
        assert_eq!(cleared, vec![r.badge(0)]);

        let settings = r.on_storage_changed(&json!({"settings": {"newValue": {"enabled": false}}}), &[]);
        assert!(settings.is_empty());

        let legacy = r.on_storage_changed(
            &json!({"addressMap": {"newValue": {"0xa": "A", "0xb": "B"}}}),
            &[],
        );
        assert_eq!(legacy, vec![r.badge(2)]);
    }

    #[test]
    fn test_tab_updated_injects_only_when_enabled() {
        let r = relay();
        let scan = tab(7, "https://polygonscan.com/address/0x1");
        assert_eq!(
            r.on_tab_updated(&scan, true),
            Some(RelayAction::InjectContentScript { tab_id: 7 })
        );
        assert_eq!(r.on_tab_updated(&scan, false), None);
        assert_eq!(r.on_tab_updated(&tab(8, "https://example.com"), true), None);
    }

    #[test]
    fn test_context_menu_copy_and_add() {
        let r = relay();
        let t = tab(5, "https://etherscan.io/");
        let selection = "owner 0x00000000000000000000000000000000000000B0 (verified)";
        assert_eq!(
            r.on_context_menu(COPY_ADDRESS_MENU, Some(selection), Some(&t)),
            Some(RelayAction::SendToTab {
                tab_id: 5,
                message: RuntimeRequest::CopyToClipboard {
                    text: "0x00000000000000000000000000000000000000b0".to_string(),
                }
                .into(),
            })
        );
        assert_eq!(r.on_context_menu(COPY_ADDRESS_MENU, Some("no address"), Some(&t)), None);
        assert_eq!(r.on_context_menu(ADD_MAPPING_MENU, None, None), Some(RelayAction::OpenPopup));
        assert_eq!(r.on_context_menu("other", None, None), None);
    }

    #[test]
    fn test_message_passthrough() {
        let r = relay();
        let notify = ExtensionMessage::from_value(&json!({
            "type": "SHOW_NOTIFICATION",
            "message": "done"
        }))
        .unwrap();
        assert_eq!(
            r.on_message(&notify),
            Some(RelayAction::ShowNotification {
                title: NOTIFICATION_TITLE.to_string(),
                message: "done".to_string(),
            })
        );

        let get = ExtensionMessage::from_value(&json!({"type": "GET_STORAGE", "keys": ["settings"]}))
            .unwrap();
        assert_eq!(
            r.on_message(&get),
            Some(RelayAction::ReadStorage {
                keys: vec!["settings".to_string()]
            })
        );
        assert_eq!(r.on_message(&ExtensionMessage::RefreshMappings), None);
    }

    #[test]
    fn test_refresh_targets_skip_tabs_without_id() {
        let tabs = [tab(1, "https://example.com"), TabInfo { id: None, url: None }];
        assert_eq!(
            relay().refresh_targets(&tabs),
            vec![RelayAction::SendToTab {
                tab_id: 1,
                message: ExtensionMessage::RefreshMappings,
            }]
        );
    }
}
