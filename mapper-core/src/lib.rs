//! Platform-free core of the address mapper extension.
//!
//! Everything here runs natively so it can be tested without a browser; the
//! `extension` crate plugs in `chrome.storage`, the page DOM and the timers.

pub mod address;
pub mod applicator;
pub mod config;
pub mod csv;
pub mod dom;
pub mod error;
pub mod mapping;
pub mod message;
pub mod relay;
pub mod scanner;
pub mod store;
pub mod watcher;

pub use address::{Address, DisplayedAddress, ShortAddress};
pub use config::MapperConfig;
pub use error::{MessageError, StorageError};
pub use mapping::{AddressMapping, ChunkMetadata, SettingToggle, Settings};
pub use message::{ExtensionMessage, RuntimeRequest};
pub use relay::{Relay, RelayAction};
pub use scanner::{ScanReport, ScanSession, ScanTask, SliceOutcome};
pub use store::{MappingStore, MemoryStorage, StorageBackend, StoreChange};
pub use watcher::{ChangeWatcher, ScanRequest, WatchState};
