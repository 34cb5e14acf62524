//! Verification cache.
//!
//! A durable, URL-keyed record of past verification results, stored as one
//! JSON blob in the key-value store. URLs are matched exactly, without
//! normalization. Freshness is judged per half: a link status or safety verdict
//! written more than [`FRESHNESS_WINDOW_MS`] ago reads as absent but is not
//! purged; the next write for that URL replaces it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::warn;

use crate::services::clock::Clock;
use crate::services::kv_store::{KeyValueStore, VERIFICATION_CACHE_KEY};
use crate::types::errors::StorageError;
use crate::types::verification::{CacheEntry, LinkStatus, SafetyData};

/// Maximum age of a usable entry: 24 hours.
pub const FRESHNESS_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

type CacheMap = HashMap<String, CacheEntry>;

/// Persistent verification cache.
pub struct VerificationCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    // Serializes read-modify-write of the blob.
    write_lock: Mutex<()>,
}

impl VerificationCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the fresh part of the entry for `url`: each half is present only
    /// if it was written less than the freshness window ago.
    pub fn get(&self, url: &str) -> Result<Option<CacheEntry>, StorageError> {
        let now = self.clock.now_millis();
        let mut entries = self.load()?;
        Ok(entries.remove(url).and_then(|entry| fresh_part(entry, now)))
    }

    /// The fresh part of every entry, read in one pass over the blob.
    pub fn fresh_entries(&self) -> Result<HashMap<String, CacheEntry>, StorageError> {
        let now = self.clock.now_millis();
        Ok(self
            .load()?
            .into_iter()
            .filter_map(|(url, entry)| fresh_part(entry, now).map(|entry| (url, entry)))
            .collect())
    }

    /// Writes a result for `url`, stamping each supplied half with now.
    ///
    /// A `None` field keeps the other half of the existing entry together with
    /// its own write time, so the status pass and the safety pass can each
    /// record their half without extending the other's life. Stale halves are
    /// dropped.
    pub fn put(
        &self,
        url: &str,
        link_status: Option<LinkStatus>,
        safety_data: Option<SafetyData>,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let now = self.clock.now_millis();
        let mut entries = self.load()?;
        let previous = entries.remove(url).and_then(|entry| fresh_part(entry, now));
        let (old_status, old_status_at, old_safety, old_safety_at) = match previous {
            Some(entry) => (
                entry.link_status,
                entry.link_checked_at,
                entry.safety_data,
                entry.safety_checked_at,
            ),
            None => (None, None, None, None),
        };
        let (link_status, link_checked_at) = match link_status {
            Some(status) => (Some(status), Some(now)),
            None => (old_status, old_status_at),
        };
        let (safety_data, safety_checked_at) = match safety_data {
            Some(safety) => (Some(safety), Some(now)),
            None => (old_safety, old_safety_at),
        };
        entries.insert(
            url.to_string(),
            CacheEntry {
                link_status,
                link_checked_at,
                safety_data,
                safety_checked_at,
                timestamp: now,
            },
        );
        self.save(&entries)
    }

    /// Drops any entry for `url`, fresh or stale.
    pub fn evict(&self, url: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries = self.load()?;
        if entries.remove(url).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    fn load(&self) -> Result<CacheMap, StorageError> {
        match self.store.get(VERIFICATION_CACHE_KEY)? {
            None => Ok(CacheMap::new()),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    // A corrupt blob is treated as empty; the next put rewrites it.
                    warn!("Discarding unreadable verification cache: {}", e);
                    Ok(CacheMap::new())
                }
            },
        }
    }

    fn save(&self, entries: &CacheMap) -> Result<(), StorageError> {
        let raw = serde_json::to_string(entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.set(VERIFICATION_CACHE_KEY, &raw)
    }
}

fn is_fresh(written_at: i64, now: i64) -> bool {
    now - written_at < FRESHNESS_WINDOW_MS
}

/// Strips stale halves, making every surviving half carry its own write time.
/// `None` when nothing fresh is left.
fn fresh_part(entry: CacheEntry, now: i64) -> Option<CacheEntry> {
    let link_at = entry.link_written_at();
    let safety_at = entry.safety_written_at();
    let link_status = entry.link_status.filter(|_| is_fresh(link_at, now));
    let safety_data = entry.safety_data.filter(|_| is_fresh(safety_at, now));
    if link_status.is_none() && safety_data.is_none() {
        return None;
    }
    Some(CacheEntry {
        link_checked_at: link_status.map(|_| link_at),
        safety_checked_at: safety_data.as_ref().map(|_| safety_at),
        link_status,
        safety_data,
        timestamp: entry.timestamp,
    })
}
