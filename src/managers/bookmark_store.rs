//! Bookmark store adapter.
//!
//! [`BookmarkStore`] is the narrow contract the verification subsystem needs
//! from a native bookmark store: read the tree, update, remove and create
//! nodes, and notify when anything changed. [`SqliteBookmarkStore`] implements
//! it over the local database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::database::connection::Database;
use crate::types::bookmark::{BookmarkChanges, CreateDetails, NativeNode, StoreEvent};
use crate::types::errors::StoreError;

/// Id of the synthetic root folder wrapping the whole tree.
pub const ROOT_ID: &str = "root";

const EVENT_CAPACITY: usize = 64;

/// Trait defining the native bookmark store contract.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// The native roots. Implementations may wrap everything in one root folder.
    async fn get_tree(&self) -> Result<Vec<NativeNode>, StoreError>;
    async fn update(&self, id: &str, changes: BookmarkChanges) -> Result<NativeNode, StoreError>;
    async fn remove(&self, id: &str) -> Result<(), StoreError>;
    async fn create(&self, details: CreateDetails) -> Result<NativeNode, StoreError>;
    /// Change notifications; one event per successful mutation.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Bookmark store backed by SQLite.
pub struct SqliteBookmarkStore {
    db: Arc<Database>,
    events: broadcast::Sender<StoreEvent>,
}

impl SqliteBookmarkStore {
    pub fn new(db: Arc<Database>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { db, events }
    }

    /// Current time in epoch milliseconds, the native `dateAdded` unit.
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Maps a native parent id to the column value; the root is `NULL`.
    fn parent_column(parent_id: Option<&str>) -> Option<&str> {
        parent_id.filter(|p| *p != ROOT_ID)
    }

    fn folder_exists(conn: &Connection, folder_id: &str) -> Result<bool, StoreError> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bookmark_folders WHERE id = ?1",
                params![folder_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Next free position among all children (folders and bookmarks) of a parent.
    fn next_position(conn: &Connection, parent: Option<&str>) -> Result<i64, StoreError> {
        conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM ( \
                 SELECT position FROM bookmarks WHERE folder_id IS ?1 \
                 UNION ALL \
                 SELECT position FROM bookmark_folders WHERE parent_id IS ?1)",
            params![parent],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Opens a gap at `position` by shifting later siblings down by one.
    fn shift_siblings(conn: &Connection, parent: Option<&str>, position: i64) -> Result<(), StoreError> {
        conn.execute(
            "UPDATE bookmarks SET position = position + 1 WHERE folder_id IS ?1 AND position >= ?2",
            params![parent, position],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute(
            "UPDATE bookmark_folders SET position = position + 1 WHERE parent_id IS ?1 AND position >= ?2",
            params![parent, position],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Reads a bookmark row (`id, url, title, keyword, folder_id, position, created_at`).
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<NativeNode> {
        let folder_id: Option<String> = row.get(4)?;
        let position: i64 = row.get(5)?;
        Ok(NativeNode {
            id: row.get(0)?,
            url: Some(row.get(1)?),
            title: Some(row.get(2)?),
            keyword: row.get(3)?,
            parent_id: Some(folder_id.unwrap_or_else(|| ROOT_ID.to_string())),
            index: Some(position as u32),
            date_added: Some(row.get(6)?),
            children: None,
            unmodifiable: false,
        })
    }

    /// Reads a folder row (`id, name, parent_id, position, created_at`).
    fn row_to_folder(row: &rusqlite::Row) -> rusqlite::Result<NativeNode> {
        let parent_id: Option<String> = row.get(2)?;
        let position: i64 = row.get(3)?;
        Ok(NativeNode {
            id: row.get(0)?,
            title: Some(row.get(1)?),
            parent_id: Some(parent_id.unwrap_or_else(|| ROOT_ID.to_string())),
            index: Some(position as u32),
            date_added: Some(row.get(4)?),
            children: Some(Vec::new()),
            ..NativeNode::default()
        })
    }

    fn load_bookmark(conn: &Connection, id: &str) -> Result<Option<NativeNode>, StoreError> {
        conn.query_row(
            "SELECT id, url, title, keyword, folder_id, position, created_at FROM bookmarks WHERE id = ?1",
            params![id],
            Self::row_to_bookmark,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn load_all(conn: &Connection) -> Result<Vec<NativeNode>, StoreError> {
        let mut nodes = Vec::new();

        let mut stmt = conn
            .prepare("SELECT id, name, parent_id, position, created_at FROM bookmark_folders")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_folder)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for row in rows {
            nodes.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        let mut stmt = conn
            .prepare("SELECT id, url, title, keyword, folder_id, position, created_at FROM bookmarks")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_bookmark)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        for row in rows {
            nodes.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(nodes)
    }

    /// Builds the children of `parent` from the flat node list, ordered by position.
    fn assemble(parent: &str, by_parent: &mut HashMap<String, Vec<NativeNode>>) -> Vec<NativeNode> {
        let mut children = by_parent.remove(parent).unwrap_or_default();
        children.sort_by_key(|node| node.index);
        for child in children.iter_mut() {
            if child.children.is_some() {
                child.children = Some(Self::assemble(&child.id, by_parent));
            }
        }
        children
    }
}

#[async_trait]
impl BookmarkStore for SqliteBookmarkStore {
    async fn get_tree(&self) -> Result<Vec<NativeNode>, StoreError> {
        let nodes = Self::load_all(&self.db.connection())?;
        let mut by_parent: HashMap<String, Vec<NativeNode>> = HashMap::new();
        for node in nodes {
            let parent = node.parent_id.clone().unwrap_or_else(|| ROOT_ID.to_string());
            by_parent.entry(parent).or_default().push(node);
        }
        let root = NativeNode {
            id: ROOT_ID.to_string(),
            children: Some(Self::assemble(ROOT_ID, &mut by_parent)),
            ..NativeNode::default()
        };
        Ok(vec![root])
    }

    async fn update(&self, id: &str, changes: BookmarkChanges) -> Result<NativeNode, StoreError> {
        let updated = {
            let conn = self.db.connection();
            let affected = conn
                .execute(
                    "UPDATE bookmarks SET title = ?1, url = ?2, keyword = ?3, updated_at = ?4 WHERE id = ?5",
                    params![changes.title, changes.url, changes.keyword, Self::now(), id],
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;
            if affected == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Self::load_bookmark(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?
        };
        self.notify(StoreEvent::Changed);
        Ok(updated)
    }

    /// Removes a bookmark, or a folder together with everything beneath it.
    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        {
            let conn = self.db.connection();
            let affected = conn
                .execute("DELETE FROM bookmarks WHERE id = ?1", params![id])
                .map_err(|e| StoreError::Database(e.to_string()))?;
            if affected == 0 {
                let affected = conn
                    .execute("DELETE FROM bookmark_folders WHERE id = ?1", params![id])
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                if affected == 0 {
                    return Err(StoreError::NotFound(id.to_string()));
                }
            }
        }
        self.notify(StoreEvent::Removed);
        Ok(())
    }

    /// Creates a bookmark (when `url` is set) or a folder. `index` inserts at
    /// that sibling position; otherwise the node is appended.
    async fn create(&self, details: CreateDetails) -> Result<NativeNode, StoreError> {
        let created = {
            let conn = self.db.connection();
            let parent = Self::parent_column(details.parent_id.as_deref());
            if let Some(pid) = parent {
                if !Self::folder_exists(&conn, pid)? {
                    return Err(StoreError::FolderNotFound(pid.to_string()));
                }
            }

            let next = Self::next_position(&conn, parent)?;
            let position = match details.index {
                Some(index) if i64::from(index) < next => {
                    Self::shift_siblings(&conn, parent, i64::from(index))?;
                    i64::from(index)
                }
                _ => next,
            };

            let id = Uuid::new_v4().to_string();
            let now = Self::now();
            let is_folder = details.url.is_none();
            match details.url.as_deref() {
                Some(url) => {
                    conn.execute(
                        "INSERT INTO bookmarks (id, url, title, keyword, folder_id, position, created_at, updated_at) \
                         VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?6)",
                        params![id, url, details.title, parent, position, now],
                    )
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO bookmark_folders (id, name, parent_id, position, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![id, details.title, parent, position, now],
                    )
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                }
            }

            NativeNode {
                id,
                title: Some(details.title),
                url: details.url,
                children: if is_folder { Some(Vec::new()) } else { None },
                date_added: Some(now),
                parent_id: Some(parent.unwrap_or(ROOT_ID).to_string()),
                index: Some(position as u32),
                keyword: None,
                unmodifiable: false,
            }
        };
        self.notify(StoreEvent::Created);
        Ok(created)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
