//! Verification scheduler.
//!
//! Runs the two verification passes over the shared tree. The status pass
//! handles bookmarks still `Unchecked`; the safety pass handles bookmarks whose
//! safety is still `Unknown`. The passes run independently, but each checks
//! its bookmarks strictly one at a time, and a pass started while another of
//! the same kind is running waits for it to finish. The durable cache is
//! consulted first, and an in-flight map keeps two near-simultaneous checks of
//! one URL from both reaching the network. Results are merged only while the
//! bookmark still points at the URL that was checked.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};

use crate::managers::tree_engine::{self, Decision, EmptyFolders, TreeState};
use crate::services::safety_checker::SafetyChecker;
use crate::services::settings_engine::SettingsEngine;
use crate::services::status_checker::StatusChecker;
use crate::services::verification_cache::VerificationCache;
use crate::types::bookmark::{BookmarkItem, BookmarkNode};
use crate::types::errors::SessionError;
use crate::types::verification::{CacheEntry, LinkStatus, SafetyData, SafetyStatus};

/// Number of bookmarks each pass actually processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub status_checked: usize,
    pub safety_checked: usize,
}

/// Session-scoped map of checks currently in flight, keyed by URL.
///
/// A caller arriving while a check for the same key runs awaits that check's
/// outcome instead of starting its own. Entries leave the map when the check
/// completes, so nothing here outlives the session or replaces the cache.
struct InFlight<T> {
    calls: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T: Clone> InFlight<T> {
    fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    async fn run<F, Fut>(&self, key: &str, check: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = {
            let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
            calls
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        let value = cell.get_or_init(check).await.clone();
        let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
        if calls.get(key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            calls.remove(key);
        }
        value
    }
}

/// Sequences checker calls and writes results to the cache and the tree.
pub struct VerificationScheduler {
    cache: Arc<VerificationCache>,
    status_checker: Arc<dyn StatusChecker>,
    safety_checker: Arc<dyn SafetyChecker>,
    settings: Arc<SettingsEngine>,
    status_calls: InFlight<LinkStatus>,
    safety_calls: InFlight<SafetyData>,
    // Held for the length of a pass.
    status_pass: AsyncMutex<()>,
    safety_pass: AsyncMutex<()>,
}

impl VerificationScheduler {
    pub fn new(
        cache: Arc<VerificationCache>,
        status_checker: Arc<dyn StatusChecker>,
        safety_checker: Arc<dyn SafetyChecker>,
        settings: Arc<SettingsEngine>,
    ) -> Self {
        Self {
            cache,
            status_checker,
            safety_checker,
            settings,
            status_calls: InFlight::new(),
            safety_calls: InFlight::new(),
            status_pass: AsyncMutex::new(()),
            safety_pass: AsyncMutex::new(()),
        }
    }

    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    /// Copies fresh cached results onto bookmarks that have none yet, reading
    /// the cache once. Unsettled safety verdicts are left for the safety pass.
    pub fn apply_cached(&self, tree: &TreeState) {
        let entries = match self.cache.fresh_entries() {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Could not read verification cache: {}", err);
                return;
            }
        };
        if entries.is_empty() {
            return;
        }
        tree.apply(|nodes| {
            tree_engine::rebuild(nodes, EmptyFolders::Keep, &mut |node| {
                let BookmarkNode::Bookmark(item) = node else {
                    return Decision::Keep;
                };
                let Some(entry) = entries.get(&item.url) else {
                    return Decision::Keep;
                };
                let mut updated = item.clone();
                if item.status == LinkStatus::Unchecked {
                    if let Some(status) = entry.link_status.filter(|s| s.is_terminal()) {
                        updated.status = status;
                    }
                }
                if item.safety.status == SafetyStatus::Unknown {
                    if let Some(safety) = entry.safety_data.as_ref().filter(|s| s.status.is_settled()) {
                        updated.safety = safety.clone();
                    }
                }
                if updated == *item {
                    Decision::Keep
                } else {
                    Decision::Replace(updated)
                }
            })
        });
    }

    /// Runs both passes concurrently and waits for both.
    pub async fn verify_all(&self, tree: &TreeState) -> PassSummary {
        let (status_checked, safety_checked) =
            tokio::join!(self.run_status_pass(tree), self.run_safety_pass(tree));
        PassSummary {
            status_checked,
            safety_checked,
        }
    }

    /// Checks every `Unchecked` bookmark, one at a time, in traversal order.
    /// Waits for a status pass already in progress before taking its queue.
    pub async fn run_status_pass(&self, tree: &TreeState) -> usize {
        let _pass = self.status_pass.lock().await;
        let queue = pending(&tree.snapshot(), |item| item.status == LinkStatus::Unchecked);
        if queue.is_empty() {
            return 0;
        }
        info!("Status pass started: {} bookmark(s)", queue.len());
        let mut checked = 0;
        for id in queue {
            // Re-read: an edit, recheck or reload may have moved on since the snapshot.
            let Some(item) = tree.bookmark(&id) else { continue };
            if item.status != LinkStatus::Unchecked {
                continue;
            }
            self.verify_status(tree, &id, &item.url, false).await;
            checked += 1;
        }
        info!("Status pass finished: {} checked", checked);
        checked
    }

    /// Checks every bookmark with `Unknown` safety, one at a time, in traversal order.
    /// Waits for a safety pass already in progress before taking its queue.
    pub async fn run_safety_pass(&self, tree: &TreeState) -> usize {
        let _pass = self.safety_pass.lock().await;
        let queue = pending(&tree.snapshot(), |item| item.safety.status == SafetyStatus::Unknown);
        if queue.is_empty() {
            return 0;
        }
        info!("Safety pass started: {} bookmark(s)", queue.len());
        let credential = self.settings.safety_credential();
        let mut checked = 0;
        for id in queue {
            let Some(item) = tree.bookmark(&id) else { continue };
            if item.safety.status != SafetyStatus::Unknown {
                continue;
            }
            self.verify_safety(tree, &id, &item.url, credential.as_deref(), None).await;
            checked += 1;
        }
        info!("Safety pass finished: {} checked", checked);
        checked
    }

    /// Re-verifies one bookmark, bypassing freshness: its cache entry is evicted
    /// first. A scan already submitted for the URL is resumed, not resubmitted.
    pub async fn recheck(&self, tree: &TreeState, id: &str) -> Result<(), SessionError> {
        let url = match tree_engine::find_node(&tree.snapshot(), id) {
            Some(BookmarkNode::Bookmark(item)) => item.url.clone(),
            Some(BookmarkNode::Folder(_)) => return Err(SessionError::NotABookmark(id.to_string())),
            None => return Err(SessionError::NotFound(id.to_string())),
        };

        let previous = match self.cache.get(&url) {
            Ok(entry) => entry
                .and_then(|e| e.safety_data)
                .filter(|s| s.status == SafetyStatus::Scanning),
            Err(err) => {
                warn!("Could not read cache entry for {}: {}", url, err);
                None
            }
        };
        if let Err(err) = self.cache.evict(&url) {
            warn!("Could not evict cache entry for {}: {}", url, err);
        }

        let credential = self.settings.safety_credential();
        tokio::join!(
            self.verify_status(tree, id, &url, true),
            self.verify_safety(tree, id, &url, credential.as_deref(), previous),
        );
        Ok(())
    }

    async fn verify_status(&self, tree: &TreeState, id: &str, url: &str, force: bool) {
        tree.merge_status_for(id, url, LinkStatus::Checking);

        if !force {
            if let Some(status) = self.cached(url).and_then(|e| e.link_status).filter(|s| s.is_terminal()) {
                debug!("Status for {} served from cache: {:?}", url, status);
                tree.merge_status_for(id, url, status);
                return;
            }
        }

        let status = self
            .status_calls
            .run(url, || async move {
                let status = self.status_checker.check(url).await;
                if let Err(err) = self.cache.put(url, Some(status), None) {
                    warn!("Could not cache status for {}: {}", url, err);
                }
                status
            })
            .await;
        tree.merge_status_for(id, url, status);
    }

    async fn verify_safety(
        &self,
        tree: &TreeState,
        id: &str,
        url: &str,
        credential: Option<&str>,
        previous: Option<SafetyData>,
    ) {
        tree.merge_safety_for(id, url, &SafetyData::checking());

        let mut previous = previous;
        if previous.is_none() {
            if let Some(cached) = self.cached(url).and_then(|e| e.safety_data) {
                if cached.status.is_settled() {
                    debug!("Safety for {} served from cache: {:?}", url, cached.status);
                    tree.merge_safety_for(id, url, &cached);
                    return;
                }
                previous = Some(cached);
            }
        }

        let previous = previous.as_ref();
        let safety = self
            .safety_calls
            .run(url, || async move {
                let safety = self
                    .safety_checker
                    .check(url, credential, previous)
                    .await;
                // Unknown and rate-limited verdicts teach nothing durable; caching
                // them would also refresh the entry's status timestamp.
                if !matches!(safety.status, SafetyStatus::Unknown | SafetyStatus::RateLimited) {
                    if let Err(err) = self.cache.put(url, None, Some(safety.clone())) {
                        warn!("Could not cache safety verdict for {}: {}", url, err);
                    }
                }
                safety
            })
            .await;
        tree.merge_safety_for(id, url, &safety);
    }

    fn cached(&self, url: &str) -> Option<CacheEntry> {
        match self.cache.get(url) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Could not read cache entry for {}: {}", url, err);
                None
            }
        }
    }
}

/// Ids of bookmarks matching `wanted`, in traversal order.
fn pending<F>(nodes: &[BookmarkNode], wanted: F) -> Vec<String>
where
    F: Fn(&BookmarkItem) -> bool,
{
    tree_engine::collect_bookmarks(nodes)
        .into_iter()
        .filter(|item| wanted(item))
        .map(|item| item.id.clone())
        .collect()
}
