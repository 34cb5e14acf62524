//! Unit tests for the SQLite-backed bookmark store.

use std::sync::Arc;

use bookmark_sentinel::database::Database;
use bookmark_sentinel::managers::bookmark_store::{BookmarkStore, SqliteBookmarkStore, ROOT_ID};
use bookmark_sentinel::types::bookmark::{BookmarkChanges, CreateDetails, NativeNode, StoreEvent};
use bookmark_sentinel::types::errors::StoreError;
use tokio::sync::broadcast::error::TryRecvError;

fn store() -> SqliteBookmarkStore {
    SqliteBookmarkStore::new(Arc::new(Database::open_in_memory().expect("open_in_memory failed")))
}

fn details(parent: Option<&str>, title: &str, url: Option<&str>, index: Option<u32>) -> CreateDetails {
    CreateDetails {
        parent_id: parent.map(str::to_string),
        title: title.to_string(),
        url: url.map(str::to_string),
        index,
    }
}

fn root_children(tree: &[NativeNode]) -> &[NativeNode] {
    assert_eq!(tree.len(), 1, "tree is wrapped in a single root");
    assert_eq!(tree[0].id, ROOT_ID);
    tree[0].children.as_deref().unwrap()
}

#[tokio::test]
async fn test_empty_store_has_empty_root() {
    let tree = store().get_tree().await.unwrap();
    assert!(root_children(&tree).is_empty());
}

#[tokio::test]
async fn test_create_bookmark_and_folder() {
    let store = store();
    let folder = store.create(details(None, "Work", None, None)).await.unwrap();
    assert_eq!(folder.children, Some(vec![]));
    assert_eq!(folder.parent_id.as_deref(), Some(ROOT_ID));

    let bm = store
        .create(details(Some(&folder.id), "Docs", Some("https://docs.rs"), None))
        .await
        .unwrap();
    assert_eq!(bm.url.as_deref(), Some("https://docs.rs"));
    assert!(bm.children.is_none());

    let tree = store.get_tree().await.unwrap();
    let work = &root_children(&tree)[0];
    assert_eq!(work.title.as_deref(), Some("Work"));
    let children = work.children.as_ref().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, bm.id);
    assert_eq!(children[0].parent_id.as_deref(), Some(folder.id.as_str()));
}

#[tokio::test]
async fn test_create_with_index_inserts_between_siblings() {
    let store = store();
    let a = store.create(details(None, "A", Some("https://a.test"), None)).await.unwrap();
    let c = store.create(details(None, "C", Some("https://c.test"), None)).await.unwrap();
    let b = store.create(details(None, "B", Some("https://b.test"), Some(1))).await.unwrap();

    let tree = store.get_tree().await.unwrap();
    let order: Vec<&str> = root_children(&tree).iter().map(|n| n.id.as_str()).collect();
    assert_eq!(order, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);
}

#[tokio::test]
async fn test_create_in_missing_folder_fails() {
    let err = store()
        .create(details(Some("nope"), "X", Some("https://x.test"), None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::FolderNotFound(_)));
}

#[tokio::test]
async fn test_update_returns_stored_node() {
    let store = store();
    let bm = store.create(details(None, "Old", Some("https://old.test"), None)).await.unwrap();

    let updated = store
        .update(
            &bm.id,
            BookmarkChanges {
                title: "[t] New".to_string(),
                url: "https://new.test".to_string(),
                keyword: Some("kw".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title.as_deref(), Some("[t] New"));
    assert_eq!(updated.url.as_deref(), Some("https://new.test"));
    assert_eq!(updated.keyword.as_deref(), Some("kw"));
}

#[tokio::test]
async fn test_update_missing_bookmark_fails() {
    let err = store()
        .update(
            "missing",
            BookmarkChanges {
                title: "T".to_string(),
                url: "https://t.test".to_string(),
                keyword: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_remove_folder_removes_contents() {
    let store = store();
    let folder = store.create(details(None, "F", None, None)).await.unwrap();
    store
        .create(details(Some(&folder.id), "In", Some("https://in.test"), None))
        .await
        .unwrap();

    store.remove(&folder.id).await.unwrap();

    let tree = store.get_tree().await.unwrap();
    assert!(root_children(&tree).is_empty());
    assert!(matches!(store.remove(&folder.id).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_mutations_notify_subscribers() {
    let store = store();
    let mut events = store.subscribe();

    let bm = store.create(details(None, "A", Some("https://a.test"), None)).await.unwrap();
    store
        .update(
            &bm.id,
            BookmarkChanges {
                title: "B".to_string(),
                url: "https://a.test".to_string(),
                keyword: None,
            },
        )
        .await
        .unwrap();
    store.remove(&bm.id).await.unwrap();
    let _ = store.remove(&bm.id).await;

    assert_eq!(events.try_recv().unwrap(), StoreEvent::Created);
    assert_eq!(events.try_recv().unwrap(), StoreEvent::Changed);
    assert_eq!(events.try_recv().unwrap(), StoreEvent::Removed);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)), "failed removal is silent");
}
