// chrome.storage.local backend for the mapping store

use crate::chrome::{self, error_text, from_js, to_js};
use async_trait::async_trait;
use mapper_core::store::{Items, StorageBackend};
use mapper_core::{MappingStore, StorageError};

/// `chrome.storage.local`. A single `set` call is applied atomically by the
/// browser, which the chunked save relies on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

#[async_trait(?Send)]
impl StorageBackend for ChromeStorage {
    async fn get(&self, keys: &[String]) -> Result<Items, StorageError> {
        let result = chrome::storage::get(keys)
            .await
            .map_err(|e| StorageError::ReadFailed(error_text(&e)))?;
        from_js(&result).map_err(|e| StorageError::ReadFailed(error_text(&e)))
    }

    async fn set(&self, items: Items) -> Result<(), StorageError> {
        let value = to_js(&items).map_err(|e| StorageError::Rejected(error_text(&e)))?;
        chrome::storage::set(value)
            .await
            .map_err(|e| StorageError::Rejected(error_text(&e)))
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        chrome::storage::remove(keys)
            .await
            .map_err(|e| StorageError::Rejected(error_text(&e)))
    }
}

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

/// The mapping store every extension context uses.
pub fn mapping_store() -> MappingStore<ChromeStorage> {
    MappingStore::new(ChromeStorage)
        .with_chunk_size(crate::config().storage.chunk_size)
        .with_clock(now_ms)
}
