// Messages exchanged between popup, background and content scripts
//
// The popup talks to content scripts with `{"action": "refreshMappings"}`;
// everything else is `{"type": "SCREAMING_CASE", ...}`.

use crate::error::MessageError;
use crate::store::Items;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const REFRESH_ACTION: &str = "refreshMappings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeRequest {
    /// Background to content: storage changed (informational).
    StorageChanged { changes: Value },
    /// Content to background: read from extension storage.
    GetStorage { keys: Vec<String> },
    /// Content to background: write to extension storage.
    SetStorage { data: Items },
    ShowNotification {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        message: String,
    },
    /// Background to content: put `text` on the clipboard.
    CopyToClipboard { text: String },
}

impl RuntimeRequest {
    const TAGS: [&'static str; 5] = [
        "STORAGE_CHANGED",
        "GET_STORAGE",
        "SET_STORAGE",
        "SHOW_NOTIFICATION",
        "COPY_TO_CLIPBOARD",
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionMessage {
    RefreshMappings,
    Request(RuntimeRequest),
}

impl ExtensionMessage {
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        if let Some(action) = value.get("action").and_then(Value::as_str) {
            return match action {
                REFRESH_ACTION => Ok(Self::RefreshMappings),
                other => Err(MessageError::Unknown(other.to_string())),
            };
        }

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MessageError::Untagged)?;
        if !RuntimeRequest::TAGS.contains(&kind) {
            return Err(MessageError::Unknown(kind.to_string()));
        }
        Ok(Self::Request(serde_json::from_value(value.clone())?))
    }

    pub fn to_value(&self) -> Result<Value, MessageError> {
        match self {
            Self::RefreshMappings => Ok(json!({ "action": REFRESH_ACTION })),
            Self::Request(request) => Ok(serde_json::to_value(request)?),
        }
    }
}

impl From<RuntimeRequest> for ExtensionMessage {
    fn from(request: RuntimeRequest) -> Self {
        Self::Request(request)
    }
}
