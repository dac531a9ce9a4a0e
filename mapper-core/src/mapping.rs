// Address book model: address -> display name, plus user settings

use crate::address::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Address -> display name. Keys are canonical lower-case addresses, kept in
/// sorted order so chunking and CSV export are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressMapping(BTreeMap<String, String>);

impl AddressMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; the latest name for an address wins.
    pub fn insert(&mut self, address: &Address, name: impl Into<String>) -> Option<String> {
        self.0.insert(address.as_str().to_string(), name.into())
    }

    /// Look up a name; `address` is lower-cased first.
    pub fn get(&self, address: &str) -> Option<&str> {
        if address.bytes().any(|b| b.is_ascii_uppercase()) {
            self.0.get(&address.to_ascii_lowercase()).map(String::as_str)
        } else {
            self.0.get(address).map(String::as_str)
        }
    }

    pub fn remove(&mut self, address: &str) -> Option<String> {
        self.0.remove(&address.to_ascii_lowercase())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(a, n)| (a.as_str(), n.as_str()))
    }

    /// Merge `incoming` into `self`; incoming names replace existing ones.
    pub fn merge(&mut self, incoming: AddressMapping) {
        self.0.extend(incoming.0);
    }

    /// Add entries from `other` that `self` does not have yet.
    pub(crate) fn extend_missing(&mut self, other: AddressMapping) {
        for (address, name) in other.0 {
            self.0.entry(address).or_insert(name);
        }
    }

    /// Ordered partition into groups of at most `size` entries.
    pub fn chunks(&self, size: usize) -> Vec<AddressMapping> {
        let size = size.max(1);
        let mut chunks = Vec::with_capacity(self.len().div_ceil(size));
        let mut current = BTreeMap::new();
        for (address, name) in &self.0 {
            current.insert(address.clone(), name.clone());
            if current.len() == size {
                chunks.push(AddressMapping(std::mem::take(&mut current)));
            }
        }
        if !current.is_empty() {
            chunks.push(AddressMapping(current));
        }
        chunks
    }
}

impl FromIterator<(Address, String)> for AddressMapping {
    fn from_iter<I: IntoIterator<Item = (Address, String)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (address, name) in iter {
            mapping.insert(&address, name);
        }
        mapping
    }
}

/// User-facing switches, persisted under the `settings` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Scan pages at all.
    pub enabled: bool,
    /// Replace the address text with the name instead of appending a label.
    pub replace_mode: bool,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            replace_mode: false,
            debug: false,
        }
    }
}

/// One user-facing switch in [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingToggle {
    Enabled,
    ReplaceMode,
    Debug,
}

impl Settings {
    /// Copy with one switch flipped.
    pub fn toggled(self, toggle: SettingToggle) -> Self {
        match toggle {
            SettingToggle::Enabled => Self { enabled: !self.enabled, ..self },
            SettingToggle::ReplaceMode => Self { replace_mode: !self.replace_mode, ..self },
            SettingToggle::Debug => Self { debug: !self.debug, ..self },
        }
    }
}

/// Describes the chunk layout currently persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkMetadata {
    pub chunk_count: usize,
    pub total_count: usize,
    /// Milliseconds since the Unix epoch.
    pub last_updated: u64,
}
