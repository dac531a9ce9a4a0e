// Chunked persistence for the address book
//
// Key layout:
//   mappings_metadata  -> {chunkCount, totalCount, lastUpdated}
//   mappings_chunk_<i> -> {address: name, ...} for i in [0, chunkCount)
//   settings           -> {enabled, replaceMode, debug}
// Legacy flat keys (`mappings`, `addressMap`, `enabled`) are only read.

use crate::csv;
use crate::error::StorageError;
use crate::mapping::{AddressMapping, ChunkMetadata, Settings};
use crate::address::Address;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;

pub const METADATA_KEY: &str = "mappings_metadata";
pub const CHUNK_KEY_PREFIX: &str = "mappings_chunk_";
pub const SETTINGS_KEY: &str = "settings";
pub const LEGACY_MAPPING_KEYS: [&str; 2] = ["mappings", "addressMap"];
pub const LEGACY_ENABLED_KEY: &str = "enabled";
pub const DEFAULT_CHUNK_SIZE: usize = 100;

pub type Items = serde_json::Map<String, Value>;

pub fn chunk_key(index: usize) -> String {
    format!("{}{}", CHUNK_KEY_PREFIX, index)
}

/// Key/value persistence in the shape of `chrome.storage.local`.
///
/// `set` with several items must apply all of them or none.
#[async_trait(?Send)]
pub trait StorageBackend {
    /// Values for the requested keys; absent keys are omitted.
    async fn get(&self, keys: &[String]) -> Result<Items, StorageError>;
    async fn set(&self, items: Items) -> Result<(), StorageError>;
    async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;
}

/// In-memory backend with an optional quota on the JSON-encoded size.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<Items>,
    quota_bytes: Option<usize>,
    reject_writes: RefCell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Make every following `set` fail until switched off again.
    pub fn set_reject_writes(&self, reject: bool) {
        *self.reject_writes.borrow_mut() = reject;
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }

    pub fn raw(&self, key: &str) -> Option<Value> {
        self.items.borrow().get(key).cloned()
    }

    /// Write a value directly, bypassing quota checks (seeding legacy data).
    pub fn insert_raw(&self, key: &str, value: Value) {
        self.items.borrow_mut().insert(key.to_string(), value);
    }
}

fn entry_size(key: &str, value: &Value) -> usize {
    key.len() + value.to_string().len()
}

#[async_trait(?Send)]
impl StorageBackend for MemoryStorage {
    async fn get(&self, keys: &[String]) -> Result<Items, StorageError> {
        let items = self.items.borrow();
        Ok(keys
            .iter()
            .filter_map(|k| items.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn set(&self, new_items: Items) -> Result<(), StorageError> {
        if *self.reject_writes.borrow() {
            return Err(StorageError::Rejected("writes disabled".to_string()));
        }

        let mut items = self.items.borrow_mut();
        if let Some(limit) = self.quota_bytes {
            let replaced: usize = new_items
                .keys()
                .filter_map(|k| items.get(k).map(|v| entry_size(k, v)))
                .sum();
            let added: usize = new_items.iter().map(|(k, v)| entry_size(k, v)).sum();
            let current: usize = items.iter().map(|(k, v)| entry_size(k, v)).sum();
            let needed = current - replaced + added;
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }
        items.extend(new_items);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.borrow_mut();
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}

/// Chunk keys and metadata for one save.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkLayout {
    pub chunks: Vec<(String, AddressMapping)>,
    pub metadata: ChunkMetadata,
}

/// Partition `mapping` into `chunk_size` groups, keeping address order.
pub fn plan_chunks(mapping: &AddressMapping, chunk_size: usize, now_ms: u64) -> ChunkLayout {
    let chunks: Vec<(String, AddressMapping)> = mapping
        .chunks(chunk_size)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| (chunk_key(i), chunk))
        .collect();
    let metadata = ChunkMetadata {
        chunk_count: chunks.len(),
        total_count: mapping.len(),
        last_updated: now_ms,
    };
    ChunkLayout { chunks, metadata }
}

/// Emitted to subscribers after a successful write.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Mappings { total: usize },
    Settings(Settings),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub total: usize,
}

fn system_clock() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Address book and settings on top of a [`StorageBackend`].
pub struct MappingStore<B> {
    backend: B,
    chunk_size: usize,
    clock: fn() -> u64,
    subscribers: RefCell<Vec<Box<dyn Fn(&StoreChange)>>>,
}

impl<B: StorageBackend> MappingStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            chunk_size: DEFAULT_CHUNK_SIZE,
            clock: system_clock,
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Replace the timestamp source (wasm has no system clock).
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn subscribe(&self, callback: impl Fn(&StoreChange) + 'static) {
        self.subscribers.borrow_mut().push(Box::new(callback));
    }

    fn notify(&self, change: StoreChange) {
        for callback in self.subscribers.borrow().iter() {
            callback(&change);
        }
    }

    /// Mapping and settings together, as the content script needs them.
    pub async fn load(&self) -> Result<(AddressMapping, Settings), StorageError> {
        let mapping = self.load_mapping().await?;
        let settings = self.get_settings().await?;
        Ok((mapping, settings))
    }

    pub async fn load_mapping(&self) -> Result<AddressMapping, StorageError> {
        let metadata = match self.read_metadata().await? {
            Some(metadata) if metadata.chunk_count > 0 => metadata,
            _ => return self.load_legacy().await,
        };

        let keys: Vec<String> = (0..metadata.chunk_count).map(chunk_key).collect();
        let items = self.backend.get(&keys).await?;

        let mut mapping = AddressMapping::new();
        let mut skipped = 0usize;
        for key in &keys {
            match decode::<AddressMapping>(&items, key) {
                Ok(Some(chunk)) => mapping.extend_missing(chunk),
                Ok(None) => skipped += 1,
                Err(e) => {
                    log::warn!("Skipping unreadable chunk: {}", e);
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            log::warn!(
                "{} of {} mapping chunks missing or malformed, loaded {} entries",
                skipped,
                metadata.chunk_count,
                mapping.len()
            );
        } else {
            log::debug!("Loaded {} mappings from {} chunks", mapping.len(), keys.len());
        }
        Ok(mapping)
    }

    async fn load_legacy(&self) -> Result<AddressMapping, StorageError> {
        let keys: Vec<String> = LEGACY_MAPPING_KEYS.iter().map(|k| k.to_string()).collect();
        let items = self.backend.get(&keys).await?;
        for key in &keys {
            if let Some(legacy) = decode::<AddressMapping>(&items, key)? {
                log::info!("Loaded {} mappings from legacy key '{}'", legacy.len(), key);
                return Ok(normalize_legacy(legacy));
            }
        }
        Ok(AddressMapping::new())
    }

    async fn read_metadata(&self) -> Result<Option<ChunkMetadata>, StorageError> {
        let items = self.backend.get(&[METADATA_KEY.to_string()]).await?;
        decode(&items, METADATA_KEY)
    }

    pub async fn metadata(&self) -> Result<Option<ChunkMetadata>, StorageError> {
        self.read_metadata().await
    }

    /// Replace the stored mapping.
    ///
    /// All chunks and the metadata are committed in a single `set`, so a
    /// failed write leaves the previous mapping readable. Chunk keys left over
    /// from a larger previous save are removed afterwards.
    pub async fn save(&self, mapping: &AddressMapping) -> Result<(), StorageError> {
        let previous = self.read_metadata().await?.unwrap_or_default();
        let layout = plan_chunks(mapping, self.chunk_size, (self.clock)());

        let mut commit = Items::new();
        for (key, chunk) in &layout.chunks {
            commit.insert(key.clone(), serde_json::to_value(chunk)?);
        }
        commit.insert(METADATA_KEY.to_string(), serde_json::to_value(layout.metadata)?);

        if let Err(e) = self.backend.set(commit).await {
            log::error!("Saving {} mappings failed: {}", mapping.len(), e);
            return Err(e);
        }

        let mut stale: Vec<String> = (layout.metadata.chunk_count..previous.chunk_count)
            .map(chunk_key)
            .collect();
        stale.extend(LEGACY_MAPPING_KEYS.iter().map(|k| k.to_string()));
        if let Err(e) = self.backend.remove(&stale).await {
            // The new layout is committed; leftovers are never read.
            log::warn!("Removing stale mapping keys failed: {}", e);
        }

        log::info!(
            "Saved {} mappings in {} chunks",
            layout.metadata.total_count,
            layout.metadata.chunk_count
        );
        self.notify(StoreChange::Mappings {
            total: layout.metadata.total_count,
        });
        Ok(())
    }

    /// Merge `incoming` into the stored mapping (incoming wins) and save.
    pub async fn import(&self, incoming: AddressMapping) -> Result<ImportSummary, StorageError> {
        let imported = incoming.len();
        let mut mapping = self.load_mapping().await?;
        mapping.merge(incoming);
        self.save(&mapping).await?;
        Ok(ImportSummary {
            imported,
            total: mapping.len(),
        })
    }

    pub async fn import_csv(&self, csv_text: &str) -> Result<ImportSummary, StorageError> {
        self.import(csv::parse(csv_text)).await
    }

    pub async fn insert(&self, address: &Address, name: &str) -> Result<usize, StorageError> {
        let mut mapping = self.load_mapping().await?;
        mapping.insert(address, name.trim());
        self.save(&mapping).await?;
        Ok(mapping.len())
    }

    /// Delete one entry; returns whether it existed.
    pub async fn remove(&self, address: &str) -> Result<bool, StorageError> {
        let mut mapping = self.load_mapping().await?;
        if mapping.remove(address).is_none() {
            return Ok(false);
        }
        self.save(&mapping).await?;
        Ok(true)
    }

    pub async fn export_csv(&self) -> Result<String, StorageError> {
        Ok(csv::serialize(&self.load_mapping().await?))
    }

    /// Remove every mapping key, including legacy ones. Settings are kept.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let previous = self.read_metadata().await?.unwrap_or_default();
        let mut keys: Vec<String> = (0..previous.chunk_count).map(chunk_key).collect();
        keys.push(METADATA_KEY.to_string());
        keys.extend(LEGACY_MAPPING_KEYS.iter().map(|k| k.to_string()));
        self.backend.remove(&keys).await?;

        log::info!("Cleared all mappings");
        self.notify(StoreChange::Mappings { total: 0 });
        Ok(())
    }

    pub async fn get_settings(&self) -> Result<Settings, StorageError> {
        let keys = [SETTINGS_KEY.to_string(), LEGACY_ENABLED_KEY.to_string()];
        let items = self.backend.get(&keys).await?;
        if let Some(settings) = decode::<Settings>(&items, SETTINGS_KEY)? {
            return Ok(settings);
        }
        let enabled = items
            .get(LEGACY_ENABLED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(true);
        Ok(Settings {
            enabled,
            ..Settings::default()
        })
    }

    pub async fn set_settings(&self, settings: Settings) -> Result<(), StorageError> {
        let mut items = Items::new();
        items.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);
        self.backend.set(items).await?;
        self.notify(StoreChange::Settings(settings));
        Ok(())
    }

    /// Write default settings unless some are stored already.
    pub async fn ensure_default_settings(&self) -> Result<bool, StorageError> {
        let items = self.backend.get(&[SETTINGS_KEY.to_string()]).await?;
        if items.contains_key(SETTINGS_KEY) {
            return Ok(false);
        }
        self.set_settings(Settings::default()).await?;
        Ok(true)
    }
}

fn decode<T: DeserializeOwned>(items: &Items, key: &str) -> Result<Option<T>, StorageError> {
    match items.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|source| StorageError::Malformed {
                key: key.to_string(),
                source,
            }),
    }
}

// Legacy data was written without validation.
fn normalize_legacy(legacy: AddressMapping) -> AddressMapping {
    legacy
        .iter()
        .filter_map(|(address, name)| Address::parse(address).map(|a| (a, name.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::rc::Rc;

    fn addr(n: usize) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn mapping_of(size: usize) -> AddressMapping {
        (0..size).map(|i| (addr(i), format!("wallet {}", i))).collect()
    }

    fn store() -> MappingStore<MemoryStorage> {
        MappingStore::new(MemoryStorage::new()).with_clock(|| 1_700_000_000_000)
    }

    fn chunk_keys_in(storage: &MemoryStorage) -> Vec<String> {
        storage
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(CHUNK_KEY_PREFIX))
            .collect()
    }

    #[tokio::test]
    async fn test_save_then_load_across_chunk_boundaries() {
        for size in [0, 1, 99, 100, 101, 250] {
            let store = store();
            let mapping = mapping_of(size);
            store.save(&mapping).await.unwrap();

            assert_eq!(store.load_mapping().await.unwrap(), mapping, "size {}", size);

            let metadata = store.metadata().await.unwrap().unwrap();
            assert_eq!(metadata.chunk_count, size.div_ceil(DEFAULT_CHUNK_SIZE));
            assert_eq!(metadata.total_count, size);
            assert_eq!(metadata.last_updated, 1_700_000_000_000);
            assert_eq!(chunk_keys_in(store.backend()).len(), metadata.chunk_count);
        }
    }

    #[tokio::test]
    async fn test_chunks_are_disjoint_and_cover_mapping() {
        let store = store();
        let mapping = mapping_of(250);
        store.save(&mapping).await.unwrap();

        let mut seen = std::collections::HashSet::new();
        for key in chunk_keys_in(store.backend()) {
            let chunk = store.backend().raw(&key).unwrap();
            for address in chunk.as_object().unwrap().keys() {
                assert!(seen.insert(address.clone()), "{} in two chunks", address);
            }
        }
        assert_eq!(seen.len(), 250);
    }

    #[tokio::test]
    async fn test_smaller_save_removes_stale_chunks() {
        let store = store();
        store.save(&mapping_of(250)).await.unwrap();
        store.save(&mapping_of(42)).await.unwrap();

        assert_eq!(chunk_keys_in(store.backend()), vec![chunk_key(0)]);
        assert_eq!(store.load_mapping().await.unwrap(), mapping_of(42));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_mapping() {
        let store = MappingStore::new(MemoryStorage::with_quota(40_000));
        let original = mapping_of(150);
        store.save(&original).await.unwrap();

        let err = store.save(&mapping_of(2_000)).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(store.load_mapping().await.unwrap(), original);

        store.backend().set_reject_writes(true);
        assert!(matches!(
            store.save(&mapping_of(3)).await,
            Err(StorageError::Rejected(_))
        ));
        assert_eq!(store.load_mapping().await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_missing_chunk_is_tolerated() {
        let store = store();
        store.save(&mapping_of(250)).await.unwrap();
        store.backend().remove(&[chunk_key(1)]).await.unwrap();

        assert_eq!(store.load_mapping().await.unwrap().len(), 150);
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_skipped() {
        let store = store();
        store.save(&mapping_of(250)).await.unwrap();
        store.backend().insert_raw(&chunk_key(1), json!(["not", "a", "map"]));

        let mapping = store.load_mapping().await.unwrap();
        assert_eq!(mapping.len(), 150);
        assert!(mapping.contains(addr(0).as_str()));
        assert!(!mapping.contains(addr(100).as_str()));
        assert!(mapping.contains(addr(249).as_str()));
    }

    #[tokio::test]
    async fn test_legacy_fallback_when_metadata_absent() {
        let store = store();
        store.backend().insert_raw(
            "addressMap",
            json!({ "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA": "Legacy", "bogus": "x" }),
        );
        store.backend().insert_raw("enabled", json!(false));

        let (mapping, settings) = store.load().await.unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping.get("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            Some("Legacy")
        );
        assert!(!settings.enabled);

        // Saving migrates to the chunked scheme and drops legacy keys.
        store.save(&mapping).await.unwrap();
        assert!(store.backend().raw("addressMap").is_none());
        assert_eq!(store.load_mapping().await.unwrap(), mapping);
    }

    #[tokio::test]
    async fn test_zero_chunk_metadata_falls_back_to_legacy() {
        let store = store();
        store
            .backend()
            .insert_raw(METADATA_KEY, json!({ "chunkCount": 0, "totalCount": 0 }));
        store.backend().insert_raw(
            "mappings",
            json!({ "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb": "Old" }),
        );
        assert_eq!(store.load_mapping().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_settings() {
        let store = store();
        let settings = Settings {
            enabled: false,
            replace_mode: true,
            debug: false,
        };
        store.set_settings(settings).await.unwrap();
        store.save(&mapping_of(120)).await.unwrap();
        store.backend().insert_raw("mappings", json!({}));

        store.clear().await.unwrap();

        assert!(store.load_mapping().await.unwrap().is_empty());
        assert_eq!(store.backend().keys(), vec![SETTINGS_KEY.to_string()]);
        assert_eq!(store.get_settings().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_import_merges_and_reports() {
        let store = store();
        store.save(&mapping_of(3)).await.unwrap();

        let csv = format!("address,name\n{},Renamed\n{},Fresh\n", addr(0), addr(10));
        let summary = store.import_csv(&csv).await.unwrap();

        assert_eq!(summary, ImportSummary { imported: 2, total: 4 });
        let mapping = store.load_mapping().await.unwrap();
        assert_eq!(mapping.get(addr(0).as_str()), Some("Renamed"));
        assert_eq!(mapping.get(addr(10).as_str()), Some("Fresh"));
    }

    #[tokio::test]
    async fn test_insert_remove_and_export() {
        let store = store();
        assert_eq!(store.insert(&addr(7), "  Seven ").await.unwrap(), 1);
        assert!(!store.remove(addr(8).as_str()).await.unwrap());
        assert_eq!(
            store.export_csv().await.unwrap(),
            format!("address,name\n{},Seven\n", addr(7))
        );
        let shouted = addr(7).as_str().to_uppercase().replace("0X", "0x");
        assert!(store.remove(&shouted).await.unwrap());
        assert!(store.load_mapping().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        store.save(&mapping_of(5)).await.unwrap();
        store.ensure_default_settings().await.unwrap();
        assert!(!store.ensure_default_settings().await.unwrap());
        store.clear().await.unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                StoreChange::Mappings { total: 5 },
                StoreChange::Settings(Settings::default()),
                StoreChange::Mappings { total: 0 },
            ]
        );
    }

    #[test]
    fn test_plan_chunks_layout() {
        let layout = plan_chunks(&mapping_of(201), 100, 9);
        let keys: Vec<&str> = layout.chunks.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["mappings_chunk_0", "mappings_chunk_1", "mappings_chunk_2"]);
        assert_eq!(layout.chunks[2].1.len(), 1);
        assert_eq!(
            layout.metadata,
            ChunkMetadata {
                chunk_count: 3,
                total_count: 201,
                last_updated: 9
            }
        );
    }
}
