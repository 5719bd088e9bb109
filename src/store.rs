// Persistence layer
// Everything cross-invocation (settings, whitelist, analysis cache,
// history) goes through one async key-value store. The coordination
// context never keeps an authoritative in-memory copy of these.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::PhishguardError;
use crate::models::{HistoryEntry, Settings, SettingsPatch};

pub const KEY_SETTINGS: &str = "settings";
pub const KEY_WHITELIST: &str = "whitelist";
pub const KEY_ANALYSIS_CACHE: &str = "analysis_cache";
pub const KEY_HISTORY: &str = "history";

/// History log keeps only the most recent entries
pub const HISTORY_LIMIT: usize = 100;

/// Async key-value store seam. Writes are serialized per key by the
/// implementation; the pipeline assumes last-write-wins, not
/// compare-and-swap.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, PhishguardError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), PhishguardError>;
    async fn remove(&self, key: &str) -> Result<(), PhishguardError>;

    /// Read several keys from one store state. Used where two reads
    /// must observe the same snapshot (CheckStatus).
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Value>>, PhishguardError>;
}

/// In-memory store: tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PhishguardError> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PhishguardError> {
        self.data.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PhishguardError> {
        self.data.lock().await.remove(key);
        Ok(())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Value>>, PhishguardError> {
        let data = self.data.lock().await;
        Ok(keys.iter().map(|k| data.get(*k).cloned()).collect())
    }
}

/// JSON-file-backed store used by the CLI. The whole map is held in
/// memory and flushed to disk on every write.
pub struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, Value>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PhishguardError> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| PhishguardError::StoreUnavailable(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(PhishguardError::StoreUnavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn flush(&self, data: &HashMap<String, Value>) -> Result<(), PhishguardError> {
        let raw = serde_json::to_string_pretty(data)
            .map_err(|e| PhishguardError::StoreUnavailable(e.to_string()))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| PhishguardError::StoreUnavailable(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PhishguardError> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PhishguardError> {
        let mut data = self.data.lock().await;
        data.insert(key.to_string(), value);
        self.flush(&data)
    }

    async fn remove(&self, key: &str) -> Result<(), PhishguardError> {
        let mut data = self.data.lock().await;
        data.remove(key);
        self.flush(&data)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Value>>, PhishguardError> {
        let data = self.data.lock().await;
        Ok(keys.iter().map(|k| data.get(*k).cloned()).collect())
    }
}

/// Persisted user settings. Reads fall back to defaults so a store
/// failure never blocks a scan; writes propagate the failure.
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Settings {
        match self.store.get(KEY_SETTINGS).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("malformed settings record, using defaults: {}", e);
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("settings read failed, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    pub async fn save(&self, settings: &Settings) -> Result<(), PhishguardError> {
        let value = serde_json::to_value(settings)
            .map_err(|e| PhishguardError::StoreUnavailable(e.to_string()))?;
        self.store.set(KEY_SETTINGS, value).await
    }

    /// Read-merge-write partial update, last write wins
    pub async fn update(&self, patch: &SettingsPatch) -> Result<Settings, PhishguardError> {
        let mut settings = self.load().await;
        patch.apply(&mut settings);
        self.save(&settings).await?;
        Ok(settings)
    }
}

/// Persisted set of domains exempt from scanning and escalation
pub struct WhitelistStore {
    store: Arc<dyn KeyValueStore>,
}

impl WhitelistStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn all(&self) -> Vec<String> {
        match self.store.get(KEY_WHITELIST).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("whitelist read failed, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn contains(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.all().await.iter().any(|d| *d == domain)
    }

    /// Add a domain; returns false when it was already present
    pub async fn add(&self, domain: &str) -> Result<bool, PhishguardError> {
        let domain = domain.to_lowercase();
        let mut domains = self.all().await;
        if domains.contains(&domain) {
            return Ok(false);
        }
        domains.push(domain);
        self.store
            .set(KEY_WHITELIST, serde_json::to_value(&domains).unwrap_or_default())
            .await?;
        Ok(true)
    }

    pub async fn remove(&self, domain: &str) -> Result<bool, PhishguardError> {
        let domain = domain.to_lowercase();
        let mut domains = self.all().await;
        let before = domains.len();
        domains.retain(|d| *d != domain);
        if domains.len() == before {
            return Ok(false);
        }
        self.store
            .set(KEY_WHITELIST, serde_json::to_value(&domains).unwrap_or_default())
            .await?;
        Ok(true)
    }
}

/// Append-only analysis history, bounded to the latest HISTORY_LIMIT
pub struct HistoryLog {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn recent(&self) -> Vec<HistoryEntry> {
        match self.store.get(KEY_HISTORY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub async fn append(&self, entry: HistoryEntry) -> Result<(), PhishguardError> {
        let mut entries = self.recent().await;
        entries.push(entry);
        if entries.len() > HISTORY_LIMIT {
            let excess = entries.len() - HISTORY_LIMIT;
            entries.drain(..excess);
        }
        self.store
            .set(KEY_HISTORY, serde_json::to_value(&entries).unwrap_or_default())
            .await
    }
}
