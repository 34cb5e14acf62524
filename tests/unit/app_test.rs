//! End-to-end wiring test: in-memory app, real checkers, no credential.

use std::time::Duration;

use bookmark_sentinel::app::App;
use bookmark_sentinel::managers::bookmark_store::BookmarkStore;
use bookmark_sentinel::types::bookmark::CreateDetails;
use bookmark_sentinel::types::settings::SessionConfig;
use bookmark_sentinel::types::verification::{LinkStatus, SafetyStatus};

fn config() -> SessionConfig {
    SessionConfig {
        status_timeout: Duration::from_secs(2),
        safety_api_base: "http://127.0.0.1:1".to_string(),
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn start_loads_and_verifies() {
    bookmark_sentinel::logging::init_for_tests();
    let app = App::open_in_memory(config()).unwrap();
    let node = app
        .store
        .create(CreateDetails {
            parent_id: None,
            title: "[local] Closed port".to_string(),
            url: Some("http://127.0.0.1:1/".to_string()),
            index: None,
        })
        .await
        .unwrap();

    let tasks = app.start().await.unwrap();
    let summary = tasks.verification.await.unwrap();
    tasks.watcher.abort();

    assert_eq!(summary.status_checked, 1);
    let item = app.session.bookmark(&node.id).unwrap();
    assert_eq!(item.title, "Closed port");
    assert_eq!(item.status, LinkStatus::Dead);
    assert_eq!(item.safety.status, SafetyStatus::Unknown);
    assert!(item.safety.message.is_some());
}

#[tokio::test]
async fn shutdown_commits_pending_deletion() {
    let app = App::open_in_memory(config()).unwrap();
    let node = app
        .store
        .create(CreateDetails {
            parent_id: None,
            title: "Temp".to_string(),
            url: Some("http://127.0.0.1:1/temp".to_string()),
            index: None,
        })
        .await
        .unwrap();
    app.session.load().await.unwrap();

    app.session.delete_bookmark(&node.id).await.unwrap();
    app.shutdown().await;

    let native = app.store.get_tree().await.unwrap();
    assert!(native[0].children.as_ref().unwrap().is_empty());
}
