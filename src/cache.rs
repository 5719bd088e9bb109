// Analysis cache
// Persisted URL → verdict map with a 24h TTL. Expiry is lazy: a stale
// entry is purged on the read that finds it. No size cap.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PhishguardError;
use crate::models::AnalysisVerdict;
use crate::store::{KeyValueStore, KEY_ANALYSIS_CACHE};

/// Entries older than this are treated as absent
pub const CACHE_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub verdict: AnalysisVerdict,
    pub stored_at: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: i64) -> bool {
        now - self.stored_at <= CACHE_TTL_SECS
    }
}

pub struct AnalysisCache {
    store: Arc<dyn KeyValueStore>,
}

impl AnalysisCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn read_map(&self) -> HashMap<String, CacheEntry> {
        match self.store.get(KEY_ANALYSIS_CACHE).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("cache read failed, treating as miss: {}", e);
                HashMap::new()
            }
        }
    }

    async fn write_map(&self, map: &HashMap<String, CacheEntry>) -> Result<(), PhishguardError> {
        let value = serde_json::to_value(map)
            .map_err(|e| PhishguardError::StoreUnavailable(e.to_string()))?;
        self.store.set(KEY_ANALYSIS_CACHE, value).await
    }

    /// Fresh verdict for the URL, or None. A stale entry found here is
    /// removed as a side effect and never resurrected.
    pub async fn get(&self, url: &str, now: i64) -> Option<AnalysisVerdict> {
        let mut map = self.read_map().await;
        match map.get(url) {
            Some(entry) if entry.is_fresh(now) => {
                debug!("cache hit for {}", url);
                Some(entry.verdict.clone())
            }
            Some(_) => {
                debug!("cache entry for {} expired, purging", url);
                map.remove(url);
                if let Err(e) = self.write_map(&map).await {
                    warn!("failed to purge expired cache entry: {}", e);
                }
                None
            }
            None => None,
        }
    }

    pub async fn put(
        &self,
        url: &str,
        verdict: AnalysisVerdict,
        now: i64,
    ) -> Result<(), PhishguardError> {
        let mut map = self.read_map().await;
        map.insert(
            url.to_string(),
            CacheEntry {
                url: url.to_string(),
                verdict,
                stored_at: now,
            },
        );
        self.write_map(&map).await
    }
}
