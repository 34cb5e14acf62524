//! Bookmark session.
//!
//! The context object a presentation layer talks to. It owns the in-memory
//! tree, the verification scheduler and the pending-deletion state, and is
//! shared as `Arc<BookmarkSession>` between the caller, the store watcher and
//! the background verification task.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::managers::bookmark_store::BookmarkStore;
use crate::managers::tree_engine::{self, BookmarkFilter, TreeState};
use crate::managers::verification_scheduler::{PassSummary, VerificationScheduler};
use crate::services::{safety_checker, tag_codec, tree_transformer};
use crate::types::bookmark::{BookmarkChanges, BookmarkEdit, BookmarkItem, BookmarkNode, CreateDetails, StoreEvent};
use crate::types::errors::SessionError;
use crate::types::settings::SessionConfig;

/// A deletion waiting out the undo window.
struct PendingDeletion {
    item: BookmarkItem,
    token: u64,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct DeletionState {
    pending: Option<PendingDeletion>,
    /// Last deletion committed to the store, restorable through `create`.
    last_committed: Option<BookmarkItem>,
    next_token: u64,
}

pub struct BookmarkSession {
    store: Arc<dyn BookmarkStore>,
    scheduler: VerificationScheduler,
    tree: TreeState,
    config: SessionConfig,
    deletion: Mutex<DeletionState>,
    last_error: Mutex<Option<String>>,
}

impl BookmarkSession {
    pub fn new(
        store: Arc<dyn BookmarkStore>,
        scheduler: VerificationScheduler,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            scheduler,
            tree: TreeState::default(),
            config,
            deletion: Mutex::new(DeletionState::default()),
            last_error: Mutex::new(None),
        })
    }

    /// Reads the native tree, rebuilds the in-memory tree and re-applies fresh
    /// cached results. Every bookmark starts from `Unchecked`/`Unknown`.
    pub async fn load(&self) -> Result<(), SessionError> {
        let native = match self.store.get_tree().await {
            Ok(native) => native,
            Err(err) => {
                self.record_error(format!("Failed to load bookmarks: {}", err));
                return Err(err.into());
            }
        };
        self.tree.replace(tree_transformer::transform_tree(&native));
        self.scheduler.apply_cached(&self.tree);
        info!(
            "Loaded {} bookmark(s)",
            tree_engine::count_bookmarks(&self.tree.snapshot())
        );
        Ok(())
    }

    pub async fn verify_all(&self) -> PassSummary {
        self.scheduler.verify_all(&self.tree).await
    }

    /// Runs both verification passes in a background task.
    pub fn spawn_verification(self: &Arc<Self>) -> JoinHandle<PassSummary> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.verify_all().await })
    }

    /// Manual recheck of one bookmark, bypassing the cache.
    pub async fn recheck(&self, id: &str) -> Result<(), SessionError> {
        self.scheduler.recheck(&self.tree, id).await
    }

    /// Reloads on every store notification until the channel closes. Bursts of
    /// events are coalesced into one reload; a lagged receiver also reloads.
    pub fn watch(self: Arc<Self>, mut events: broadcast::Receiver<StoreEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        while matches!(events.try_recv(), Ok(_) | Err(TryRecvError::Lagged(_))) {}
                        match self.load().await {
                            Ok(()) => {
                                self.spawn_verification();
                            }
                            Err(err) => warn!("Reload after store change failed: {}", err),
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Writes an edit through to the store and mirrors the stored result.
    ///
    /// Tags are encoded into the stored title. Verification state is reset only
    /// when the URL changed, and the new URL is then queued for verification.
    /// On failure the tree is left untouched.
    pub async fn edit_bookmark(
        self: &Arc<Self>,
        id: &str,
        edit: BookmarkEdit,
    ) -> Result<BookmarkItem, SessionError> {
        let current = self.require_bookmark(id)?;
        let changes = BookmarkChanges {
            title: tag_codec::encode(&edit.title, &edit.tags),
            url: edit.url.clone(),
            keyword: edit.keyword.clone().filter(|k| !k.is_empty()),
        };
        let native = match self.store.update(id, changes).await {
            Ok(native) => native,
            Err(err) => {
                self.record_error(format!("Failed to save bookmark: {}", err));
                return Err(err.into());
            }
        };

        let mut updated = match tree_transformer::transform_node(&native) {
            Some(BookmarkNode::Bookmark(item)) => item,
            _ => BookmarkItem {
                title: edit.title,
                url: edit.url,
                tags: edit.tags,
                keyword: edit.keyword,
                ..current.clone()
            },
        };
        let url_changed = updated.url != current.url;
        if url_changed {
            updated.reset_verification();
        } else {
            updated.status = current.status;
            updated.safety = current.safety.clone();
        }

        let replacement = updated.clone();
        self.tree.apply(|nodes| {
            tree_engine::update_bookmark(nodes, id, |item| *item = replacement.clone())
        });
        if url_changed {
            self.spawn_verification();
        }
        Ok(updated)
    }

    /// Starts a deletion. The bookmark disappears from [`visible_tree`](Self::visible_tree)
    /// at once but reaches the store only when the undo window elapses. A
    /// deletion already pending is committed immediately.
    pub async fn delete_bookmark(self: &Arc<Self>, id: &str) -> Result<(), SessionError> {
        let item = self.require_bookmark(id)?;
        let previous = {
            let mut deletion = self.deletion();
            if deletion.pending.as_ref().is_some_and(|p| p.item.id == id) {
                return Ok(());
            }
            let previous = deletion.pending.take();
            deletion.next_token += 1;
            let token = deletion.next_token;
            let session = Arc::clone(self);
            let window = self.config.undo_window;
            let timer = tokio::spawn(async move {
                tokio::time::sleep(window).await;
                session.commit_pending(token).await;
            });
            deletion.pending = Some(PendingDeletion { item, token, timer });
            previous
        };

        if let Some(previous) = previous {
            previous.timer.abort();
            self.commit(previous.item).await;
        }
        Ok(())
    }

    /// Cancels the pending deletion, returning the bookmark it would have removed.
    pub fn undo_delete(&self) -> Option<BookmarkItem> {
        let pending = self.deletion().pending.take()?;
        pending.timer.abort();
        info!("Deletion of {} undone", pending.item.id);
        Some(pending.item)
    }

    /// Commits the pending deletion now instead of waiting for the timer.
    pub async fn flush_pending_deletion(&self) {
        let pending = self.deletion().pending.take();
        if let Some(pending) = pending {
            pending.timer.abort();
            self.commit(pending.item).await;
        }
    }

    /// Recreates the most recently committed deletion at its old position.
    /// Returns the new node id, or `None` when nothing is restorable.
    pub async fn restore_deleted(&self) -> Result<Option<String>, SessionError> {
        let Some(item) = self.deletion().last_committed.take() else {
            return Ok(None);
        };
        let details = CreateDetails {
            parent_id: item.parent_id.clone(),
            title: tag_codec::encode(&item.title, &item.tags),
            url: Some(item.url.clone()),
            index: item.index,
        };
        match self.store.create(details).await {
            Ok(node) => {
                info!("Restored bookmark {} as {}", item.id, node.id);
                self.load().await?;
                Ok(Some(node.id))
            }
            Err(err) => {
                self.record_error(format!("Failed to restore bookmark: {}", err));
                self.deletion().last_committed = Some(item);
                Err(err.into())
            }
        }
    }

    pub fn pending_deletion(&self) -> Option<BookmarkItem> {
        self.deletion().pending.as_ref().map(|p| p.item.clone())
    }

    /// The tree as displayed: filtered, searched, with empty folders pruned and
    /// any pending deletion hidden.
    pub fn visible_tree(&self, filter: BookmarkFilter, search: &str) -> Vec<BookmarkNode> {
        let hidden = self.deletion().pending.as_ref().map(|p| p.item.id.clone());
        tree_engine::filter_tree(
            &self.tree.snapshot(),
            |item| hidden.as_deref() != Some(item.id.as_str()) && filter.matches(item),
            |item| tree_engine::matches_search(item, search),
        )
    }

    pub fn snapshot(&self) -> Vec<BookmarkNode> {
        self.tree.snapshot()
    }

    pub fn bookmark(&self, id: &str) -> Option<BookmarkItem> {
        self.tree.bookmark(id)
    }

    /// Link to the safety service's domain report for a bookmark.
    pub fn safety_report_url(&self, id: &str) -> Result<String, SessionError> {
        let item = self.require_bookmark(id)?;
        match safety_checker::domain_report_url(&item.url) {
            Ok(link) => Ok(link),
            Err(err) => {
                self.record_error(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Returns and clears the last user-facing error message.
    pub fn take_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
    }

    async fn commit_pending(&self, token: u64) {
        let pending = {
            let mut deletion = self.deletion();
            match &deletion.pending {
                Some(p) if p.token == token => deletion.pending.take(),
                _ => None,
            }
        };
        if let Some(pending) = pending {
            self.commit(pending.item).await;
        }
    }

    async fn commit(&self, item: BookmarkItem) {
        match self.store.remove(&item.id).await {
            Ok(()) => {
                self.tree.apply(|nodes| tree_engine::remove_node(nodes, &item.id));
                info!("Deleted bookmark {}", item.id);
                self.deletion().last_committed = Some(item);
            }
            Err(err) => {
                // The bookmark stays in the tree and becomes visible again.
                self.record_error(format!("Failed to delete bookmark: {}", err));
            }
        }
    }

    fn require_bookmark(&self, id: &str) -> Result<BookmarkItem, SessionError> {
        match tree_engine::find_node(&self.tree.snapshot(), id) {
            Some(BookmarkNode::Bookmark(item)) => Ok(item.clone()),
            Some(BookmarkNode::Folder(_)) => Err(SessionError::NotABookmark(id.to_string())),
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    fn record_error(&self, message: String) {
        warn!("{}", message);
        *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = Some(message);
    }

    fn deletion(&self) -> MutexGuard<'_, DeletionState> {
        self.deletion.lock().unwrap_or_else(|p| p.into_inner())
    }
}
