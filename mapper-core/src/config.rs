use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Tunables for every part of the extension. Each section falls back to its
/// defaults when missing from the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub storage: StorageConfig,
    pub scanner: ScannerConfig,
    pub watcher: WatcherConfig,
    pub relay: RelayConfig,
    pub popup: PopupConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Entries per `mappings_chunk_<i>` key.
    pub chunk_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Elements handled per animation frame.
    pub batch_size: usize,
    /// Also rewrite addresses found in raw text nodes.
    pub free_text: bool,
    /// Same-origin iframes whose id contains one of these are scanned too.
    pub frame_id_patterns: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            free_text: true,
            frame_id_patterns: vec!["token".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub debounce_ms: u64,
    pub fallback_interval_ms: u64,
    pub url_poll_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2_000,
            fallback_interval_ms: 3_000,
            url_poll_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub supported_domains: Vec<String>,
    pub badge_color: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            supported_domains: ["arbiscan.io", "etherscan.io", "bscscan.com", "polygonscan.com"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            badge_color: "#007cba".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    /// Entries listed in the popup; the count always covers everything.
    pub max_display: usize,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self { max_display: 100 }
    }
}

impl MapperConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MapperConfig =
            toml::from_str(content).context("Failed to parse mapper config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read config file: {}", path))?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.chunk_size == 0 {
            anyhow::bail!("storage.chunk_size must be at least 1");
        }
        if self.scanner.batch_size == 0 {
            anyhow::bail!("scanner.batch_size must be at least 1");
        }
        if self.watcher.fallback_interval_ms == 0 || self.watcher.url_poll_ms == 0 {
            anyhow::bail!("watcher intervals must be positive");
        }
        Ok(())
    }
}
