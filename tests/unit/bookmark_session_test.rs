//! Tests for the bookmark session: load, edit write-through, delete with undo,
//! restore, store failures and reload on store notifications.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bookmark_sentinel::database::Database;
use bookmark_sentinel::managers::bookmark_session::BookmarkSession;
use bookmark_sentinel::managers::bookmark_store::{BookmarkStore, SqliteBookmarkStore};
use bookmark_sentinel::managers::tree_engine::{collect_bookmarks, BookmarkFilter};
use bookmark_sentinel::managers::verification_scheduler::VerificationScheduler;
use bookmark_sentinel::services::clock::SystemClock;
use bookmark_sentinel::services::kv_store::MemoryKeyValueStore;
use bookmark_sentinel::services::safety_checker::SafetyChecker;
use bookmark_sentinel::services::settings_engine::SettingsEngine;
use bookmark_sentinel::services::status_checker::StatusChecker;
use bookmark_sentinel::services::verification_cache::VerificationCache;
use bookmark_sentinel::types::bookmark::{
    BookmarkChanges, BookmarkEdit, BookmarkNode, CreateDetails, NativeNode, StoreEvent,
};
use bookmark_sentinel::types::errors::{SessionError, StoreError};
use bookmark_sentinel::types::settings::SessionConfig;
use bookmark_sentinel::types::verification::{LinkStatus, SafetyData, SafetyStatus};
use tokio::sync::broadcast;

/// Delegates to a real store, counting removals and failing on demand.
struct CountingStore {
    inner: SqliteBookmarkStore,
    removes: AtomicUsize,
    fail_remove: AtomicBool,
    fail_update: AtomicBool,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: SqliteBookmarkStore::new(Arc::new(Database::open_in_memory().unwrap())),
            removes: AtomicUsize::new(0),
            fail_remove: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
        }
    }

    fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookmarkStore for CountingStore {
    async fn get_tree(&self) -> Result<Vec<NativeNode>, StoreError> {
        self.inner.get_tree().await
    }

    async fn update(&self, id: &str, changes: BookmarkChanges) -> Result<NativeNode, StoreError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("read-only node".to_string()));
        }
        self.inner.update(id, changes).await
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(StoreError::Database("disk full".to_string()));
        }
        self.inner.remove(id).await
    }

    async fn create(&self, details: CreateDetails) -> Result<NativeNode, StoreError> {
        self.inner.create(details).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}

/// Reports every URL live after 10ms, remembering what it was asked.
#[derive(Default)]
struct AlwaysLive {
    checked: Mutex<Vec<String>>,
}

impl AlwaysLive {
    fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusChecker for AlwaysLive {
    async fn check(&self, url: &str) -> LinkStatus {
        self.checked.lock().unwrap().push(url.to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        LinkStatus::Live
    }
}

struct AlwaysSafe;

#[async_trait]
impl SafetyChecker for AlwaysSafe {
    async fn check(&self, _url: &str, _credential: Option<&str>, _previous: Option<&SafetyData>) -> SafetyData {
        SafetyData::with_status(SafetyStatus::Safe)
    }
}

struct Fixture {
    session: Arc<BookmarkSession>,
    store: Arc<CountingStore>,
    status: Arc<AlwaysLive>,
    work: String,
    rust: String,
    news: String,
}

async fn create(store: &CountingStore, parent: Option<&str>, title: &str, url: Option<&str>) -> String {
    store
        .create(CreateDetails {
            parent_id: parent.map(str::to_string),
            title: title.to_string(),
            url: url.map(str::to_string),
            index: None,
        })
        .await
        .unwrap()
        .id
}

/// Work/{[lang] Rust -> rust-lang.org}, News -> news.example at the top level.
async fn fixture() -> Fixture {
    let store = Arc::new(CountingStore::new());
    let work = create(&store, None, "Work", None).await;
    let rust = create(&store, Some(&work), "[lang] Rust", Some("https://www.rust-lang.org")).await;
    let news = create(&store, None, "News", Some("https://news.example")).await;

    let kv = Arc::new(MemoryKeyValueStore::new());
    let cache = Arc::new(VerificationCache::new(kv.clone(), Arc::new(SystemClock)));
    let settings = Arc::new(SettingsEngine::new(kv));
    settings.set_api_key("key").unwrap();
    let status = Arc::new(AlwaysLive::default());
    let scheduler = VerificationScheduler::new(cache, status.clone(), Arc::new(AlwaysSafe), settings);
    let session = BookmarkSession::new(store.clone(), scheduler, SessionConfig::default());
    session.load().await.unwrap();

    Fixture {
        session,
        store,
        status,
        work,
        rust,
        news,
    }
}

fn visible_ids(session: &BookmarkSession) -> Vec<String> {
    collect_bookmarks(&session.visible_tree(BookmarkFilter::All, ""))
        .into_iter()
        .map(|item| item.id.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_load_builds_typed_tree() {
    let f = fixture().await;
    let tree = f.session.snapshot();

    assert_eq!(tree.len(), 2);
    let BookmarkNode::Folder(work) = &tree[0] else {
        panic!("expected Work folder first");
    };
    assert_eq!(work.id, f.work);
    let rust = f.session.bookmark(&f.rust).unwrap();
    assert_eq!(rust.title, "Rust");
    assert_eq!(rust.tags, vec!["lang"]);
    assert_eq!(rust.status, LinkStatus::Unchecked);
}

#[tokio::test(start_paused = true)]
async fn test_delete_commits_after_undo_window() {
    let f = fixture().await;

    f.session.delete_bookmark(&f.news).await.unwrap();
    assert_eq!(visible_ids(&f.session), vec![f.rust.clone()]);
    assert_eq!(f.session.pending_deletion().unwrap().id, f.news);
    assert_eq!(f.store.removes(), 0);

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(f.store.removes(), 1);
    assert!(f.session.pending_deletion().is_none());
    assert!(f.session.bookmark(&f.news).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_undo_within_window_keeps_bookmark() {
    let f = fixture().await;

    f.session.delete_bookmark(&f.news).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let restored = f.session.undo_delete().expect("pending deletion");
    assert_eq!(restored.id, f.news);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(f.store.removes(), 0);
    assert_eq!(visible_ids(&f.session), vec![f.rust.clone(), f.news.clone()]);
}

#[tokio::test(start_paused = true)]
async fn test_second_delete_commits_the_first_immediately() {
    let f = fixture().await;

    f.session.delete_bookmark(&f.news).await.unwrap();
    f.session.delete_bookmark(&f.rust).await.unwrap();

    assert_eq!(f.store.removes(), 1);
    assert!(f.session.bookmark(&f.news).is_none());
    assert_eq!(f.session.pending_deletion().unwrap().id, f.rust);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(f.store.removes(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_removal_brings_bookmark_back() {
    let f = fixture().await;
    f.store.fail_remove.store(true, Ordering::SeqCst);

    f.session.delete_bookmark(&f.news).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(f.store.removes(), 1);
    assert!(visible_ids(&f.session).contains(&f.news));
    let message = f.session.take_error().expect("error surfaced");
    assert!(message.contains("disk full"));
    assert!(f.session.take_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_flush_commits_without_waiting() {
    let f = fixture().await;
    f.session.delete_bookmark(&f.news).await.unwrap();
    f.session.flush_pending_deletion().await;
    assert_eq!(f.store.removes(), 1);
    assert!(f.session.bookmark(&f.news).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_restore_recreates_last_committed_deletion() {
    let f = fixture().await;
    f.session.delete_bookmark(&f.rust).await.unwrap();
    f.session.flush_pending_deletion().await;

    let new_id = f.session.restore_deleted().await.unwrap().expect("restorable");

    let restored = f.session.bookmark(&new_id).unwrap();
    assert_eq!(restored.url, "https://www.rust-lang.org");
    assert_eq!(restored.title, "Rust");
    assert_eq!(restored.tags, vec!["lang"]);
    assert_eq!(restored.parent_id.as_deref(), Some(f.work.as_str()));
    assert_eq!(f.session.restore_deleted().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_deleting_a_folder_is_rejected() {
    let f = fixture().await;
    assert!(matches!(
        f.session.delete_bookmark(&f.work).await,
        Err(SessionError::NotABookmark(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_edit_without_url_change_keeps_verification() {
    let f = fixture().await;
    f.session.verify_all().await;
    assert_eq!(f.session.bookmark(&f.news).unwrap().status, LinkStatus::Live);

    let edited = f
        .session
        .edit_bookmark(
            &f.news,
            BookmarkEdit {
                title: "Daily News".to_string(),
                url: "https://news.example".to_string(),
                tags: vec!["daily".to_string(), "read".to_string()],
                keyword: Some("n".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.title, "Daily News");
    assert_eq!(edited.tags, vec!["daily", "read"]);
    assert_eq!(edited.keyword.as_deref(), Some("n"));
    assert_eq!(edited.status, LinkStatus::Live);
    assert_eq!(edited.safety.status, SafetyStatus::Safe);
    assert_eq!(f.session.bookmark(&f.news).unwrap(), edited);

    let native = f.store.get_tree().await.unwrap();
    let stored = native[0]
        .children
        .as_ref()
        .unwrap()
        .iter()
        .find(|n| n.id == f.news)
        .unwrap();
    assert_eq!(stored.title.as_deref(), Some("[daily][read] Daily News"));
}

#[tokio::test(start_paused = true)]
async fn test_edit_with_url_change_resets_verification() {
    let f = fixture().await;
    f.session.verify_all().await;

    let edited = f
        .session
        .edit_bookmark(
            &f.news,
            BookmarkEdit {
                title: "News".to_string(),
                url: "https://news.example/v2".to_string(),
                tags: vec![],
                keyword: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.status, LinkStatus::Unchecked);
    assert_eq!(edited.safety.status, SafetyStatus::Unknown);
    assert_eq!(f.session.bookmark(&f.news).unwrap().url, "https://news.example/v2");

    tokio::time::sleep(Duration::from_secs(1)).await;

    let news = f.session.bookmark(&f.news).unwrap();
    assert_eq!(news.status, LinkStatus::Live);
    assert_eq!(news.safety.status, SafetyStatus::Safe);
    assert!(f.status.checked().contains(&"https://news.example/v2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_check_verifies_new_url() {
    let f = fixture().await;
    let verification = f.session.spawn_verification();
    // Rust is checked first, News from 10ms to 20ms.
    tokio::time::sleep(Duration::from_millis(15)).await;

    f.session
        .edit_bookmark(
            &f.news,
            BookmarkEdit {
                title: "News".to_string(),
                url: "https://news.example/v2".to_string(),
                tags: vec![],
                keyword: None,
            },
        )
        .await
        .unwrap();
    verification.await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let news = f.session.bookmark(&f.news).unwrap();
    assert_eq!(news.url, "https://news.example/v2");
    assert_eq!(news.status, LinkStatus::Live);
    assert_eq!(
        f.status.checked(),
        vec![
            "https://www.rust-lang.org".to_string(),
            "https://news.example".to_string(),
            "https://news.example/v2".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_edit_leaves_tree_unchanged() {
    let f = fixture().await;
    let before = f.session.snapshot();
    f.store.fail_update.store(true, Ordering::SeqCst);

    let result = f
        .session
        .edit_bookmark(
            &f.news,
            BookmarkEdit {
                title: "Changed".to_string(),
                url: "https://changed.example".to_string(),
                tags: vec![],
                keyword: None,
            },
        )
        .await;

    assert!(matches!(result, Err(SessionError::Store(StoreError::Rejected(_)))));
    assert_eq!(f.session.snapshot(), before);
    assert!(f.session.take_error().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_visible_tree_filters_and_searches() {
    let f = fixture().await;

    let searched = f.session.visible_tree(BookmarkFilter::All, "LANG");
    assert_eq!(collect_bookmarks(&searched).len(), 1);
    assert_eq!(searched[0].id(), f.work);

    assert!(f.session.visible_tree(BookmarkFilter::Live, "").is_empty());
    f.session.verify_all().await;
    assert_eq!(collect_bookmarks(&f.session.visible_tree(BookmarkFilter::Live, "")).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_safety_report_link_uses_domain() {
    let f = fixture().await;
    assert_eq!(
        f.session.safety_report_url(&f.rust).unwrap(),
        "https://www.virustotal.com/gui/domain/www.rust-lang.org"
    );

    let odd = create(&f.store, None, "Script", Some("javascript:void(0)")).await;
    f.session.load().await.unwrap();
    assert!(matches!(
        f.session.safety_report_url(&odd),
        Err(SessionError::Report(_))
    ));
    assert!(f.session.take_error().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_watcher_reloads_on_store_change() {
    let f = fixture().await;
    let watcher = f.session.clone().watch(f.store.subscribe());

    let added = create(&f.store, Some(&f.work), "Docs", Some("https://docs.example")).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let item = f.session.bookmark(&added).expect("reloaded");
    assert_eq!(item.status, LinkStatus::Live, "reload triggers verification");
    watcher.abort();
}

#[tokio::test(start_paused = true)]
async fn test_reload_reapplies_cached_results() {
    let f = fixture().await;
    f.session.verify_all().await;

    f.session.load().await.unwrap();

    let news = f.session.bookmark(&f.news).unwrap();
    assert_eq!(news.status, LinkStatus::Live);
    assert_eq!(news.safety.status, SafetyStatus::Safe);
}
